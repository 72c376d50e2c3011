//! Renderer crate for morphgraph.
//!
//! The crate turns the scheduler's timing state into point positions and
//! draws them. The overall flow per frame is:
//!
//! ```text
//!   winit frame clock
//!          │ delta
//!          ▼
//!   TransitionScheduler::advance ──▶ FrameSample { time, from, to, progress }
//!          │
//!          ├─▶ CpuSurfaceUpdater ──▶ Vec<Vec3> ──▶ upload ─┐
//!          │                                              ├─▶ instanced cube draw
//!          └─▶ GpuDispatchPipeline ──▶ compute pass ──────┘
//! ```
//!
//! Exactly one backend owns a position buffer at a time. Both feed the same
//! draw: the CPU path uploads its slice into a storage buffer, the GPU path
//! binds the buffer its compute kernels wrote in the same command encoder.

mod camera;
pub mod cpu;
mod frame;
pub mod gpu;
pub mod grid;
mod headless;
mod window;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use graphconfig::{Backend, GraphConfig};
use scheduler::TransitionScheduler;
use tracing::{error, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

pub use camera::{Frustum, OrbitCamera};
pub use cpu::{evaluate_into, CpuSurfaceUpdater};
pub use frame::{log_phase_change, FrameSample, PipelineError};
pub use gpu::{GpuDispatchPipeline, HeadlessGpu};
pub use grid::{Bounds, GridConfig};
pub use headless::{simulate, SimulationReport};

use window::PreviewState;

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Validated graph settings, CLI overrides already applied.
    pub graph: GraphConfig,
    /// Seed used when the graph settings do not pin one.
    pub seed: u64,
}

/// Entry point for the interactive preview.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn run(&mut self) -> Result<()> {
        self.run_window_preview()
    }

    /// Opens the preview window and drives the `winit` event loop.
    ///
    /// The loop doubles as the frame clock: every redraw advances the
    /// scheduler by the wall-clock time since the previous frame.
    fn run_window_preview(&self) -> Result<()> {
        let graph = &self.config.graph;
        let scheduler = TransitionScheduler::from_config(graph, self.config.seed)
            .context("failed to build transition scheduler")?;

        let event_loop = EventLoop::new().context("failed to initialize event loop")?;
        let window = WindowBuilder::new()
            .with_title(graph.window.title.as_str())
            .with_inner_size(PhysicalSize::new(graph.window.width, graph.window.height))
            .build(&event_loop)
            .context("failed to create preview window")?;
        let window = Arc::new(window);

        let mut state = PreviewState::new(window, scheduler, graph.backend, graph.resolution)?;
        state.window().request_redraw();

        event_loop
            .run(move |event, elwt| {
                elwt.set_control_flow(ControlFlow::Poll);

                match event {
                    Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                        match event {
                            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                                elwt.exit();
                            }
                            WindowEvent::KeyboardInput {
                                event:
                                    KeyEvent {
                                        logical_key,
                                        state: ElementState::Pressed,
                                        repeat: false,
                                        ..
                                    },
                                ..
                            } => {
                                if state.handle_key(&logical_key) {
                                    elwt.exit();
                                }
                            }
                            WindowEvent::Resized(new_size) => {
                                state.resize(new_size);
                            }
                            WindowEvent::RedrawRequested => match state.render_frame() {
                                Ok(()) => {}
                                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                                    state.resize(state.size());
                                }
                                Err(wgpu::SurfaceError::OutOfMemory) => {
                                    error!("surface out of memory; exiting");
                                    elwt.exit();
                                }
                                Err(wgpu::SurfaceError::Timeout) => {
                                    warn!("surface timeout; retrying next frame");
                                }
                                Err(other) => {
                                    warn!("surface error: {other:?}; retrying next frame");
                                }
                            },
                            _ => {}
                        }
                    }
                    Event::AboutToWait => {
                        state.window().request_redraw();
                    }
                    _ => {}
                }
            })
            .map_err(|err| anyhow!("event loop error: {err}"))
    }
}

/// Resolution a backend will actually run at, with a warning when clamped.
pub fn effective_resolution(backend: Backend, requested: u32) -> u32 {
    let clamped = backend.clamp_resolution(requested);
    if clamped != requested {
        warn!(
            requested,
            clamped,
            %backend,
            "resolution outside backend range; clamping"
        );
    }
    clamped
}
