//! Offscreen runs without a window, driven by a fixed frame delta.

use anyhow::{Context, Result};
use glam::Vec3;
use graphconfig::Backend;
use scheduler::{PhaseChange, TransitionScheduler};

use crate::cpu::CpuSurfaceUpdater;
use crate::frame::{log_phase_change, FrameSample};
use crate::gpu::{GpuDispatchPipeline, HeadlessGpu};
use crate::grid::{Bounds, GridConfig};

/// Summary of a fixed-step run.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub backend: Backend,
    pub resolution: u32,
    pub frames: u32,
    pub time: f32,
    /// Phase changes with the host time they happened at.
    pub changes: Vec<(f32, PhaseChange)>,
    pub final_sample: FrameSample,
    pub bounds: Bounds,
    /// Mean of the final positions.
    pub centroid: Vec3,
    /// Final positions lying outside `bounds`.
    pub escaped: usize,
}

pub fn simulate(
    mut scheduler: TransitionScheduler,
    backend: Backend,
    resolution: u32,
    frames: u32,
    delta: f32,
) -> Result<SimulationReport> {
    let grid = GridConfig::new(resolution)?;
    let catalog = scheduler.catalog().clone();
    let mut changes = Vec::new();
    let mut time = 0.0f32;
    let mut sample = FrameSample::from_scheduler(&scheduler, time);

    let mut step = |scheduler: &mut TransitionScheduler, time: &mut f32| {
        *time += delta;
        for change in scheduler.advance(delta) {
            log_phase_change(&change, *time);
            changes.push((*time, change));
        }
        FrameSample::from_scheduler(scheduler, *time)
    };

    let positions = match backend {
        Backend::Cpu => {
            let mut updater = CpuSurfaceUpdater::new(catalog, grid)?;
            updater.activate()?;
            for _ in 0..frames {
                sample = step(&mut scheduler, &mut time);
                updater.update(&sample)?;
            }
            let positions = updater.positions().map(<[Vec3]>::to_vec);
            updater.deactivate();
            positions.context("cpu positions missing after run")?
        }
        Backend::Gpu => {
            let gpu = HeadlessGpu::new()?;
            let mut pipeline = GpuDispatchPipeline::new(&gpu.device, &gpu.queue, catalog, grid)?;
            pipeline.activate()?;
            for _ in 0..frames {
                sample = step(&mut scheduler, &mut time);
                pipeline.dispatch(&sample)?;
            }
            let positions = pipeline.read_positions()?;
            pipeline.deactivate();
            positions
        }
    };

    let bounds = grid.bounds();
    let centroid = if positions.is_empty() {
        Vec3::ZERO
    } else {
        positions.iter().copied().sum::<Vec3>() / positions.len() as f32
    };
    let escaped = positions
        .iter()
        .filter(|point| !bounds.contains(**point))
        .count();

    Ok(SimulationReport {
        backend,
        resolution,
        frames,
        time,
        changes,
        final_sample: sample,
        bounds,
        centroid,
        escaped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{FunctionCatalog, FunctionName, TransitionMode};
    use scheduler::TransitionTimings;

    fn scheduler() -> TransitionScheduler {
        TransitionScheduler::new(
            FunctionCatalog::new(),
            TransitionMode::Cycle,
            TransitionTimings::new(1.0, 0.5).unwrap(),
            FunctionName::Wave,
            8,
        )
        .unwrap()
    }

    #[test]
    fn cpu_run_reports_phase_changes() {
        let report = simulate(scheduler(), Backend::Cpu, 20, 150, 0.02).unwrap();
        assert_eq!(report.frames, 150);
        assert!((report.time - 3.0).abs() < 1e-3);
        let began = report
            .changes
            .iter()
            .filter(|(_, change)| matches!(change, PhaseChange::Began { .. }))
            .count();
        assert_eq!(began, 2);
        assert_eq!(report.escaped, 0);
    }

    #[test]
    fn zero_frames_keep_initial_function() {
        let report = simulate(scheduler(), Backend::Cpu, 10, 0, 0.016).unwrap();
        assert!(report.changes.is_empty());
        assert_eq!(report.final_sample, FrameSample::steady(FunctionName::Wave, 0.0));
    }
}
