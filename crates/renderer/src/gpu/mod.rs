//! GPU side of the renderer.
//!
//! - `context` owns wgpu instance/device/surface wiring for the preview window
//!   and a surfaceless device for offscreen dispatch.
//! - `kernels` generates the WGSL kernel table and the index arithmetic that
//!   selects one of its entry points.
//! - `uniforms` mirrors the shader blocks and resolves binding names once.
//! - `pipeline` compiles the kernel table and the instanced point draw.
//! - `dispatch` owns the position buffer lifecycle and records compute passes.

mod context;
mod dispatch;
pub mod kernels;
mod pipeline;
mod uniforms;

pub(crate) use context::GpuContext;
pub use context::HeadlessGpu;
pub use dispatch::GpuDispatchPipeline;
pub(crate) use pipeline::{create_depth_view, PointPipeline};
pub use uniforms::{BindingSlots, CameraUniforms, GraphUniforms};
