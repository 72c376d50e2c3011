//! Per-point evaluation on the CPU.

use catalog::{morph, FunctionCatalog};
use glam::Vec3;
use graphconfig::CPU_RESOLUTION_RANGE;

use crate::frame::{FrameSample, PipelineError};
use crate::grid::GridConfig;

/// Writes every cell of `grid` for `sample` into `out`, row-major.
///
/// # Panics
///
/// Panics if `out` does not hold exactly one slot per cell or a sampled
/// function is missing from `catalog`.
pub fn evaluate_into(
    grid: &GridConfig,
    catalog: &FunctionCatalog,
    sample: &FrameSample,
    out: &mut [Vec3],
) {
    assert_eq!(
        out.len(),
        grid.point_count(),
        "position slice does not match the grid"
    );
    let to = catalog.function(sample.to);
    let t = sample.time;
    match sample.progress {
        Some(progress) => {
            let from = catalog.function(sample.from);
            for (slot, u, v) in grid.cells() {
                out[slot] = morph(u, v, t, from, to, progress);
            }
        }
        None => {
            for (slot, u, v) in grid.cells() {
                out[slot] = to(u, v, t);
            }
        }
    }
}

/// CPU backend owning its position array between activate and deactivate.
#[derive(Debug)]
pub struct CpuSurfaceUpdater {
    catalog: FunctionCatalog,
    grid: GridConfig,
    positions: Option<Vec<Vec3>>,
}

impl CpuSurfaceUpdater {
    pub fn new(catalog: FunctionCatalog, grid: GridConfig) -> Result<Self, PipelineError> {
        check_resolution(grid.resolution())?;
        Ok(Self {
            catalog,
            grid,
            positions: None,
        })
    }

    pub fn grid(&self) -> &GridConfig {
        &self.grid
    }

    pub fn is_active(&self) -> bool {
        self.positions.is_some()
    }

    pub fn activate(&mut self) -> Result<(), PipelineError> {
        if self.is_active() {
            return Err(PipelineError::AlreadyActive);
        }
        self.positions = Some(vec![Vec3::ZERO; self.grid.point_count()]);
        tracing::debug!(resolution = self.grid.resolution(), "cpu positions allocated");
        Ok(())
    }

    pub fn deactivate(&mut self) {
        if self.positions.take().is_some() {
            tracing::debug!("cpu positions released");
        }
    }

    pub fn set_resolution(&mut self, resolution: u32) -> Result<(), PipelineError> {
        if self.is_active() {
            return Err(PipelineError::ResizeWhileActive);
        }
        check_resolution(resolution)?;
        self.grid = GridConfig::new(resolution).map_err(|_| PipelineError::Resolution {
            requested: resolution,
            min: *CPU_RESOLUTION_RANGE.start(),
            max: *CPU_RESOLUTION_RANGE.end(),
        })?;
        Ok(())
    }

    /// Evaluates one frame and returns the refreshed positions.
    pub fn update(&mut self, sample: &FrameSample) -> Result<&[Vec3], PipelineError> {
        for name in [sample.from, sample.to] {
            if !self.catalog.contains(name) {
                return Err(PipelineError::UnknownFunction(name));
            }
        }
        let positions = self.positions.as_mut().ok_or(PipelineError::Inactive)?;
        evaluate_into(&self.grid, &self.catalog, sample, positions);
        Ok(positions)
    }

    pub fn positions(&self) -> Option<&[Vec3]> {
        self.positions.as_deref()
    }
}

fn check_resolution(resolution: u32) -> Result<(), PipelineError> {
    if CPU_RESOLUTION_RANGE.contains(&resolution) {
        Ok(())
    } else {
        Err(PipelineError::Resolution {
            requested: resolution,
            min: *CPU_RESOLUTION_RANGE.start(),
            max: *CPU_RESOLUTION_RANGE.end(),
        })
    }
}
