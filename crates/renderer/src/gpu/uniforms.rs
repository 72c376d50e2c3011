use std::mem::offset_of;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::naga;

use crate::frame::{FrameSample, PipelineError};
use crate::grid::GridConfig;

/// Per-frame block read by every compute kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GraphUniforms {
    pub resolution: u32,
    pub step: f32,
    pub time: f32,
    pub transition_progress: f32,
}

impl GraphUniforms {
    pub fn new(grid: &GridConfig, sample: &FrameSample) -> Self {
        Self {
            resolution: grid.resolution(),
            step: grid.step(),
            time: sample.time,
            // Steady kernels never read the blend weight.
            transition_progress: sample.progress.unwrap_or(0.0),
        }
    }
}

/// Camera block for the instanced point draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub step: f32,
    pub _padding: [f32; 3],
}

impl CameraUniforms {
    pub fn new(view_proj: Mat4, step: f32) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            step,
            _padding: [0.0; 3],
        }
    }
}

/// Binding numbers and uniform offsets resolved by name from the compute
/// program, once per pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSlots {
    pub uniforms: u32,
    pub positions: u32,
    pub resolution: u32,
    pub step: u32,
    pub time: u32,
    pub transition_progress: u32,
}

impl BindingSlots {
    pub fn reflect(module: &naga::Module) -> Result<Self, PipelineError> {
        let (uniforms, uniform_ty) = find_global(module, "graph", naga::AddressSpace::Uniform)?;
        let (positions, _) = find_global(
            module,
            "positions",
            naga::AddressSpace::Storage {
                access: naga::StorageAccess::LOAD | naga::StorageAccess::STORE,
            },
        )?;

        let members = match &module.types[uniform_ty].inner {
            naga::TypeInner::Struct { members, .. } => members,
            _ => return Err(PipelineError::Binding("graph")),
        };
        let offset = |name: &'static str| {
            members
                .iter()
                .find(|member| member.name.as_deref() == Some(name))
                .map(|member| member.offset)
                .ok_or(PipelineError::Binding(name))
        };

        Ok(Self {
            uniforms,
            positions,
            resolution: offset("resolution")?,
            step: offset("step")?,
            time: offset("time")?,
            transition_progress: offset("transition_progress")?,
        })
    }

    /// Confirms that [`GraphUniforms`] can be uploaded as one block.
    pub fn check_layout(&self) -> Result<(), PipelineError> {
        let expected = [
            ("resolution", self.resolution, offset_of!(GraphUniforms, resolution)),
            ("step", self.step, offset_of!(GraphUniforms, step)),
            ("time", self.time, offset_of!(GraphUniforms, time)),
            (
                "transition_progress",
                self.transition_progress,
                offset_of!(GraphUniforms, transition_progress),
            ),
        ];
        for (name, reflected, host) in expected {
            if reflected as usize != host {
                return Err(PipelineError::Binding(name));
            }
        }
        Ok(())
    }
}

fn find_global(
    module: &naga::Module,
    name: &'static str,
    space: naga::AddressSpace,
) -> Result<(u32, naga::Handle<naga::Type>), PipelineError> {
    module
        .global_variables
        .iter()
        .map(|(_, global)| global)
        .find(|global| global.name.as_deref() == Some(name) && global.space == space)
        .and_then(|global| global.binding.as_ref().map(|binding| (binding.binding, global.ty)))
        .ok_or(PipelineError::Binding(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::kernels::generate_kernel_table;
    use catalog::{FunctionCatalog, FunctionName};

    #[test]
    fn reflects_kernel_table_bindings() {
        let source = generate_kernel_table(&FunctionCatalog::new());
        let module = naga::front::wgsl::parse_str(&source).unwrap();
        let slots = BindingSlots::reflect(&module).unwrap();
        assert_eq!(slots.uniforms, 0);
        assert_eq!(slots.positions, 1);
        assert_eq!(
            (slots.resolution, slots.step, slots.time, slots.transition_progress),
            (0, 4, 8, 12)
        );
        slots.check_layout().unwrap();
    }

    #[test]
    fn missing_binding_is_reported() {
        let module = naga::front::wgsl::parse_str(
            "@group(0) @binding(3) var<storage, read_write> positions: array<f32>;",
        )
        .unwrap();
        assert_eq!(
            BindingSlots::reflect(&module).unwrap_err(),
            PipelineError::Binding("graph")
        );
    }

    #[test]
    fn uniforms_follow_frame_sample() {
        let grid = GridConfig::new(40).unwrap();
        let steady = GraphUniforms::new(&grid, &FrameSample::steady(FunctionName::Wave, 1.5));
        assert_eq!(steady.resolution, 40);
        assert_eq!(steady.step, 0.05);
        assert_eq!(steady.time, 1.5);
        assert_eq!(steady.transition_progress, 0.0);
        assert_eq!(std::mem::size_of::<GraphUniforms>(), 16);
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 80);
    }
}
