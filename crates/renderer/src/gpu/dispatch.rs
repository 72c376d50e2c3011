use anyhow::{Context, Result};
use catalog::FunctionCatalog;
use glam::Vec3;
use graphconfig::GPU_RESOLUTION_RANGE;

use super::kernels::{dispatch_groups, kernel_for_sample};
use super::pipeline::KernelTable;
use super::uniforms::GraphUniforms;
use crate::frame::{FrameSample, PipelineError};
use crate::grid::GridConfig;

const POSITION_STRIDE: u64 = 3 * std::mem::size_of::<f32>() as u64;

struct PositionBuffer {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Compute backend: evaluates every grid cell on the device into a storage
/// buffer that the point draw then reads in place.
pub struct GpuDispatchPipeline {
    device: wgpu::Device,
    queue: wgpu::Queue,
    catalog: FunctionCatalog,
    grid: GridConfig,
    kernels: KernelTable,
    uniform_buffer: wgpu::Buffer,
    positions: Option<PositionBuffer>,
}

impl GpuDispatchPipeline {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        catalog: FunctionCatalog,
        grid: GridConfig,
    ) -> Result<Self> {
        check_resolution(grid.resolution())?;
        let kernels = KernelTable::new(device, &catalog).context("failed to build kernels")?;
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("graph uniforms"),
            size: std::mem::size_of::<GraphUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            catalog,
            grid,
            kernels,
            uniform_buffer,
            positions: None,
        })
    }

    pub fn grid(&self) -> &GridConfig {
        &self.grid
    }

    pub fn is_active(&self) -> bool {
        self.positions.is_some()
    }

    /// Allocates the position buffer for the current resolution.
    pub fn activate(&mut self) -> Result<(), PipelineError> {
        if self.is_active() {
            return Err(PipelineError::AlreadyActive);
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("graph positions"),
            size: self.grid.point_count() as u64 * POSITION_STRIDE,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let bind_group = self
            .kernels
            .bind(&self.device, &self.uniform_buffer, &buffer);
        tracing::debug!(
            resolution = self.grid.resolution(),
            bytes = buffer.size(),
            "gpu positions allocated"
        );
        self.positions = Some(PositionBuffer { buffer, bind_group });
        Ok(())
    }

    /// Stops issuing work and releases the position buffer.
    pub fn deactivate(&mut self) {
        if let Some(positions) = self.positions.take() {
            positions.buffer.destroy();
            tracing::debug!("gpu positions released");
        }
    }

    pub fn set_resolution(&mut self, resolution: u32) -> Result<(), PipelineError> {
        if self.is_active() {
            return Err(PipelineError::ResizeWhileActive);
        }
        check_resolution(resolution)?;
        self.grid = GridConfig::new(resolution).map_err(|_| PipelineError::Resolution {
            requested: resolution,
            min: *GPU_RESOLUTION_RANGE.start(),
            max: *GPU_RESOLUTION_RANGE.end(),
        })?;
        Ok(())
    }

    /// Buffer holding `resolution²` packed positions while active.
    pub fn positions_buffer(&self) -> Option<&wgpu::Buffer> {
        self.positions.as_ref().map(|positions| &positions.buffer)
    }

    /// Kernel selected for `sample`; the diagonal entry while steady.
    pub fn kernel_for(&self, sample: &FrameSample) -> Result<usize, PipelineError> {
        kernel_for_sample(&self.catalog, sample)
    }

    /// Uploads the frame uniforms and records the compute pass into `encoder`.
    ///
    /// Draws recorded later in the same encoder observe the written positions.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        sample: &FrameSample,
    ) -> Result<(), PipelineError> {
        let positions = self.positions.as_ref().ok_or(PipelineError::Inactive)?;
        let kernel = &self.kernels.pipelines[self.kernel_for(sample)?];
        let uniforms = GraphUniforms::new(&self.grid, sample);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let groups = dispatch_groups(self.grid.resolution());
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("graph dispatch"),
            timestamp_writes: None,
        });
        pass.set_pipeline(kernel);
        pass.set_bind_group(0, &positions.bind_group, &[]);
        pass.dispatch_workgroups(groups, groups, 1);
        Ok(())
    }

    /// Records and submits one frame of compute work on its own.
    pub fn dispatch(&self, sample: &FrameSample) -> Result<(), PipelineError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("graph dispatch encoder"),
            });
        self.encode(&mut encoder, sample)?;
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Copies the positions back to the host, blocking until the device is idle.
    pub fn read_positions(&self) -> Result<Vec<Vec3>> {
        let positions = self
            .positions
            .as_ref()
            .ok_or(PipelineError::Inactive)?;
        let size = positions.buffer.size();
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("graph positions readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("graph readback encoder"),
            });
        encoder.copy_buffer_to_buffer(&positions.buffer, 0, &readback, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .context("failed waiting for position readback")?;
        receiver
            .recv()
            .context("readback callback dropped")?
            .context("failed to map position readback")?;

        let data = slice.get_mapped_range();
        let values: Vec<Vec3> = bytemuck::cast_slice::<u8, f32>(&data)
            .chunks_exact(3)
            .map(Vec3::from_slice)
            .collect();
        drop(data);
        readback.unmap();
        Ok(values)
    }
}

impl Drop for GpuDispatchPipeline {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn check_resolution(resolution: u32) -> Result<(), PipelineError> {
    if GPU_RESOLUTION_RANGE.contains(&resolution) {
        Ok(())
    } else {
        Err(PipelineError::Resolution {
            requested: resolution,
            min: *GPU_RESOLUTION_RANGE.start(),
            max: *GPU_RESOLUTION_RANGE.end(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::evaluate_into;
    use crate::gpu::HeadlessGpu;
    use catalog::FunctionName;

    fn headless() -> Option<HeadlessGpu> {
        match HeadlessGpu::new() {
            Ok(gpu) => Some(gpu),
            Err(err) => {
                eprintln!("skipping GPU test: {err:#}");
                None
            }
        }
    }

    #[test]
    fn buffer_follows_activation_lifecycle() {
        let Some(gpu) = headless() else { return };
        let grid = GridConfig::new(50).unwrap();
        let mut pipeline =
            GpuDispatchPipeline::new(&gpu.device, &gpu.queue, FunctionCatalog::new(), grid)
                .unwrap();
        assert!(pipeline.positions_buffer().is_none());
        pipeline.activate().unwrap();
        assert_eq!(pipeline.positions_buffer().unwrap().size(), 2500 * 12);
        assert_eq!(pipeline.activate().unwrap_err(), PipelineError::AlreadyActive);
        assert_eq!(
            pipeline.set_resolution(64).unwrap_err(),
            PipelineError::ResizeWhileActive
        );
        pipeline.deactivate();
        assert!(pipeline.positions_buffer().is_none());
        pipeline.set_resolution(64).unwrap();
        pipeline.activate().unwrap();
        assert_eq!(pipeline.positions_buffer().unwrap().size(), 64 * 64 * 12);
    }

    #[test]
    fn dispatch_requires_activation() {
        let Some(gpu) = headless() else { return };
        let pipeline = GpuDispatchPipeline::new(
            &gpu.device,
            &gpu.queue,
            FunctionCatalog::new(),
            GridConfig::new(10).unwrap(),
        )
        .unwrap();
        let sample = FrameSample::steady(FunctionName::Wave, 0.0);
        assert_eq!(pipeline.dispatch(&sample).unwrap_err(), PipelineError::Inactive);
    }

    #[test]
    fn device_positions_match_cpu_evaluation() {
        let Some(gpu) = headless() else { return };
        let catalog = FunctionCatalog::new();
        let grid = GridConfig::new(21).unwrap();
        let mut pipeline =
            GpuDispatchPipeline::new(&gpu.device, &gpu.queue, catalog.clone(), grid).unwrap();
        pipeline.activate().unwrap();

        for sample in [
            FrameSample::steady(FunctionName::Ripple, 1.25),
            FrameSample {
                time: 3.5,
                from: FunctionName::Sphere,
                to: FunctionName::Torus,
                progress: Some(0.3),
            },
        ] {
            pipeline.dispatch(&sample).unwrap();
            let device = pipeline.read_positions().unwrap();
            let mut host = vec![Vec3::ZERO; grid.point_count()];
            evaluate_into(&grid, &catalog, &sample, &mut host);
            assert_eq!(device.len(), host.len());
            for (gpu_point, cpu_point) in device.iter().zip(&host) {
                assert!(
                    (*gpu_point - *cpu_point).length() < 1e-3,
                    "{gpu_point:?} vs {cpu_point:?}"
                );
            }
        }
    }

    #[test]
    fn rejects_resolution_outside_gpu_range() {
        let Some(gpu) = headless() else { return };
        let err = GpuDispatchPipeline::new(
            &gpu.device,
            &gpu.queue,
            FunctionCatalog::new(),
            GridConfig::new(4000).unwrap(),
        )
        .err()
        .expect("resolution rejected");
        assert!(err.to_string().contains("4000"));
    }
}
