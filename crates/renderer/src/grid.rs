//! Sampling grid shared by both backends.
//!
//! A grid of `resolution × resolution` cells covers `[-1, 1]²`. Cells are
//! visited row-major with `x` fastest, and cell `i` along an axis samples the
//! coordinate `(i + 0.5) * step - 1` so points sit at cell centres.

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("grid resolution must be at least 1")]
pub struct ZeroResolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridConfig {
    resolution: u32,
}

impl GridConfig {
    pub fn new(resolution: u32) -> Result<Self, ZeroResolution> {
        if resolution == 0 {
            return Err(ZeroResolution);
        }
        Ok(Self { resolution })
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Edge length of one cell in grid space.
    pub fn step(&self) -> f32 {
        2.0 / self.resolution as f32
    }

    pub fn point_count(&self) -> usize {
        let resolution = self.resolution as usize;
        resolution * resolution
    }

    /// Centre coordinate of cell `index` along one axis.
    pub fn coordinate(&self, index: u32) -> f32 {
        (index as f32 + 0.5) * self.step() - 1.0
    }

    pub fn uv(&self, x: u32, z: u32) -> (f32, f32) {
        (self.coordinate(x), self.coordinate(z))
    }

    /// Iterates `(slot, u, v)` for every cell in output order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, f32, f32)> + '_ {
        let resolution = self.resolution;
        (0..resolution).flat_map(move |z| {
            let v = self.coordinate(z);
            (0..resolution).map(move |x| ((z * resolution + x) as usize, self.coordinate(x), v))
        })
    }

    /// Conservative volume holding every point plus one cell of padding.
    pub fn bounds(&self) -> Bounds {
        Bounds {
            center: Vec3::ZERO,
            half_extent: 1.0 + self.step(),
        }
    }
}

/// Axis-aligned cube used for culling the instanced draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub center: Vec3,
    pub half_extent: f32,
}

impl Bounds {
    pub fn size(&self) -> f32 {
        2.0 * self.half_extent
    }

    pub fn min(&self) -> Vec3 {
        self.center - Vec3::splat(self.half_extent)
    }

    pub fn max(&self) -> Vec3 {
        self.center + Vec3::splat(self.half_extent)
    }

    pub fn contains(&self, point: Vec3) -> bool {
        (point - self.center).abs().max_element() <= self.half_extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_ten_samples_cell_centres() {
        let grid = GridConfig::new(10).unwrap();
        assert!((grid.step() - 0.2).abs() < 1e-6);
        let (u, v) = grid.uv(0, 0);
        assert!((u + 0.9).abs() < 1e-6 && (v + 0.9).abs() < 1e-6);
        let (u, v) = grid.uv(9, 9);
        assert!((u - 0.9).abs() < 1e-6 && (v - 0.9).abs() < 1e-6);
    }

    #[test]
    fn cells_are_row_major_with_x_fastest() {
        let grid = GridConfig::new(3).unwrap();
        let cells: Vec<_> = grid.cells().collect();
        assert_eq!(cells.len(), 9);
        for (expected, (slot, _, _)) in cells.iter().enumerate() {
            assert_eq!(expected, *slot);
        }
        assert_eq!(cells[1].2, cells[0].2);
        assert!(cells[1].1 > cells[0].1);
        assert!(cells[3].2 > cells[2].2);
        assert_eq!(cells[3].1, cells[0].1);
    }

    #[test]
    fn point_count_is_resolution_squared() {
        assert_eq!(GridConfig::new(50).unwrap().point_count(), 2500);
        assert_eq!(GridConfig::new(2000).unwrap().point_count(), 4_000_000);
    }

    #[test]
    fn bounds_pad_by_one_step() {
        let grid = GridConfig::new(10).unwrap();
        let bounds = grid.bounds();
        assert!((bounds.size() - 2.4).abs() < 1e-6);
        for (_, u, v) in grid.cells() {
            assert!(bounds.contains(Vec3::new(u, 1.0, v)));
        }
        assert!(!bounds.contains(Vec3::new(0.0, 1.3, 0.0)));
    }

    #[test]
    fn rejects_zero_resolution() {
        assert_eq!(GridConfig::new(0), Err(ZeroResolution));
    }
}
