use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use catalog::FunctionCatalog;
use graphconfig::Backend;
use scheduler::TransitionScheduler;
use tracing::{error, info};
use winit::dpi::PhysicalSize;
use winit::keyboard::{Key, NamedKey};
use winit::window::Window;

use crate::camera::{Frustum, OrbitCamera};
use crate::cpu::CpuSurfaceUpdater;
use crate::frame::{log_phase_change, FrameSample};
use crate::gpu::{
    create_depth_view, CameraUniforms, GpuContext, GpuDispatchPipeline, PointPipeline,
};
use crate::grid::GridConfig;

/// The single backend currently producing positions, plus the bind group the
/// point draw reads them through.
enum ActiveBackend {
    Cpu {
        updater: CpuSurfaceUpdater,
        upload: wgpu::Buffer,
        bind_group: wgpu::BindGroup,
    },
    Gpu {
        pipeline: GpuDispatchPipeline,
        bind_group: wgpu::BindGroup,
    },
}

impl ActiveBackend {
    fn activate(
        kind: Backend,
        gpu: &GpuContext,
        points: &PointPipeline,
        catalog: &FunctionCatalog,
        resolution: u32,
    ) -> Result<Self> {
        let grid = GridConfig::new(crate::effective_resolution(kind, resolution))?;

        match kind {
            Backend::Cpu => {
                let mut updater = CpuSurfaceUpdater::new(catalog.clone(), grid)?;
                updater.activate()?;
                let upload = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("cpu positions upload"),
                    size: (grid.point_count() * std::mem::size_of::<glam::Vec3>()) as u64,
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = points.bind(&gpu.device, &upload);
                Ok(Self::Cpu {
                    updater,
                    upload,
                    bind_group,
                })
            }
            Backend::Gpu => {
                let mut pipeline =
                    GpuDispatchPipeline::new(&gpu.device, &gpu.queue, catalog.clone(), grid)?;
                pipeline.activate()?;
                let buffer = pipeline
                    .positions_buffer()
                    .context("gpu positions missing after activation")?;
                let bind_group = points.bind(&gpu.device, buffer);
                Ok(Self::Gpu {
                    pipeline,
                    bind_group,
                })
            }
        }
    }

    fn deactivate(&mut self) {
        match self {
            Self::Cpu { updater, upload, .. } => {
                updater.deactivate();
                upload.destroy();
            }
            Self::Gpu { pipeline, .. } => pipeline.deactivate(),
        }
    }

    fn kind(&self) -> Backend {
        match self {
            Self::Cpu { .. } => Backend::Cpu,
            Self::Gpu { .. } => Backend::Gpu,
        }
    }

    fn grid(&self) -> &GridConfig {
        match self {
            Self::Cpu { updater, .. } => updater.grid(),
            Self::Gpu { pipeline, .. } => pipeline.grid(),
        }
    }

    fn bind_group(&self) -> &wgpu::BindGroup {
        match self {
            Self::Cpu { bind_group, .. } | Self::Gpu { bind_group, .. } => bind_group,
        }
    }

    /// Produces this frame's positions: uploads them from the host or records
    /// the compute pass ahead of the draw.
    fn update(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        sample: &FrameSample,
    ) -> Result<(), crate::PipelineError> {
        match self {
            Self::Cpu {
                updater, upload, ..
            } => {
                let positions = updater.update(sample)?;
                queue.write_buffer(upload, 0, bytemuck::cast_slice(positions));
                Ok(())
            }
            Self::Gpu { pipeline, .. } => pipeline.encode(encoder, sample),
        }
    }
}

/// Everything the preview window needs between frames.
pub(crate) struct PreviewState {
    window: Arc<Window>,
    gpu: GpuContext,
    depth: wgpu::TextureView,
    points: PointPipeline,
    camera: OrbitCamera,
    scheduler: TransitionScheduler,
    backend: ActiveBackend,
    resolution: u32,
    started: Instant,
    last_frame: Instant,
    culled: bool,
}

impl PreviewState {
    pub(crate) fn new(
        window: Arc<Window>,
        scheduler: TransitionScheduler,
        backend: Backend,
        resolution: u32,
    ) -> Result<Self> {
        let gpu = GpuContext::new(window.as_ref(), window.inner_size())?;
        let depth = create_depth_view(&gpu.device, gpu.size.width, gpu.size.height);
        let points = PointPipeline::new(&gpu.device, gpu.config.format);
        let backend =
            ActiveBackend::activate(backend, &gpu, &points, scheduler.catalog(), resolution)?;
        info!(
            backend = %backend.kind(),
            resolution = backend.grid().resolution(),
            function = %scheduler.current(),
            mode = %scheduler.mode(),
            "preview ready (space: next function, b: toggle backend, esc: quit)"
        );
        let now = Instant::now();

        Ok(Self {
            window,
            gpu,
            depth,
            points,
            camera: OrbitCamera::default(),
            scheduler,
            backend,
            resolution,
            started: now,
            last_frame: now,
            culled: false,
        })
    }

    pub(crate) fn window(&self) -> &Window {
        self.window.as_ref()
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.gpu.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.gpu.resize(new_size);
        self.depth = create_depth_view(&self.gpu.device, new_size.width, new_size.height);
    }

    /// Handles a pressed key; returns `true` when the preview should close.
    pub(crate) fn handle_key(&mut self, key: &Key) -> bool {
        match key {
            Key::Named(NamedKey::Escape) => return true,
            Key::Named(NamedKey::Space) => {
                let time = self.started.elapsed().as_secs_f32();
                for change in self.scheduler.skip() {
                    log_phase_change(&change, time);
                }
            }
            Key::Character(text) if text.as_str().eq_ignore_ascii_case("b") => {
                let next = match self.backend.kind() {
                    Backend::Cpu => Backend::Gpu,
                    Backend::Gpu => Backend::Cpu,
                };
                if let Err(err) = self.switch_backend(next) {
                    error!("failed to switch backend: {err:#}");
                }
            }
            _ => {}
        }
        false
    }

    fn switch_backend(&mut self, next: Backend) -> Result<()> {
        self.backend.deactivate();
        let activated = ActiveBackend::activate(
            next,
            &self.gpu,
            &self.points,
            self.scheduler.catalog(),
            self.resolution,
        );
        match activated {
            Ok(backend) => {
                self.backend = backend;
                info!(
                    backend = %next,
                    resolution = self.backend.grid().resolution(),
                    "switched backend"
                );
                Ok(())
            }
            Err(err) => {
                let previous = self.backend.kind();
                self.backend = ActiveBackend::activate(
                    previous,
                    &self.gpu,
                    &self.points,
                    self.scheduler.catalog(),
                    self.resolution,
                )?;
                Err(err)
            }
        }
    }

    pub(crate) fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        let time = now.duration_since(self.started).as_secs_f32();
        for change in self.scheduler.advance(delta) {
            log_phase_change(&change, time);
        }
        let sample = FrameSample::from_scheduler(&self.scheduler, time);

        let frame = self.gpu.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        let positions_ready = match self.backend.update(&self.gpu.queue, &mut encoder, &sample) {
            Ok(()) => true,
            Err(err) => {
                error!("failed to update positions: {err}");
                false
            }
        };

        let grid = *self.backend.grid();
        let view_proj = self.camera.view_proj(self.gpu.aspect(), time);
        let visible = Frustum::from_view_proj(view_proj).intersects(&grid.bounds());
        if visible == self.culled {
            self.culled = !visible;
            tracing::debug!(culled = self.culled, "grid visibility changed");
        }
        let camera = CameraUniforms::new(view_proj, grid.step());
        self.gpu.queue.write_buffer(
            &self.points.camera_buffer,
            0,
            bytemuck::bytes_of(&camera),
        );

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("points pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.03,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if positions_ready && visible {
                self.points.draw(
                    &mut pass,
                    self.backend.bind_group(),
                    grid.point_count() as u32,
                );
            }
        }

        self.gpu.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl Drop for PreviewState {
    fn drop(&mut self) {
        self.backend.deactivate();
    }
}
