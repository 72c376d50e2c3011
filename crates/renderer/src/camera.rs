use glam::{Mat4, Vec3, Vec4};

use crate::grid::Bounds;

/// Slowly orbiting perspective camera looking at the grid centre.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub distance: f32,
    pub height: f32,
    pub fov_y: f32,
    /// Radians per second around the vertical axis.
    pub angular_speed: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            distance: 3.6,
            height: 1.8,
            fov_y: 45f32.to_radians(),
            angular_speed: 0.15,
        }
    }
}

impl OrbitCamera {
    pub fn eye(&self, time: f32) -> Vec3 {
        let angle = -2.4 + time * self.angular_speed;
        Vec3::new(
            self.distance * angle.cos(),
            self.height,
            self.distance * angle.sin(),
        )
    }

    pub fn view_proj(&self, aspect: f32, time: f32) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye(time), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(self.fov_y, aspect.max(1e-3), 0.05, 50.0);
        proj * view
    }
}

/// Six clip planes extracted from a view-projection matrix.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub fn from_view_proj(view_proj: Mat4) -> Self {
        let row = |i: usize| view_proj.row(i);
        // wgpu clip space keeps depth in [0, w].
        let planes = [
            row(3) + row(0),
            row(3) - row(0),
            row(3) + row(1),
            row(3) - row(1),
            row(2),
            row(3) - row(2),
        ]
        .map(|plane| plane / plane.truncate().length());
        Self { planes }
    }

    /// Returns `false` only when `bounds` lies entirely outside one plane.
    pub fn intersects(&self, bounds: &Bounds) -> bool {
        let (min, max) = (bounds.min(), bounds.max());
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            let farthest = Vec3::select(normal.cmpge(Vec3::ZERO), max, min);
            normal.dot(farthest) + plane.w >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridConfig;

    #[test]
    fn default_camera_sees_the_grid() {
        let camera = OrbitCamera::default();
        let bounds = GridConfig::new(50).unwrap().bounds();
        for step in 0..20 {
            let frustum = Frustum::from_view_proj(camera.view_proj(16.0 / 9.0, step as f32 * 3.0));
            assert!(frustum.intersects(&bounds));
        }
    }

    #[test]
    fn bounds_behind_the_camera_are_culled() {
        let camera = OrbitCamera::default();
        let frustum = Frustum::from_view_proj(camera.view_proj(1.0, 0.0));
        let behind = Bounds {
            center: camera.eye(0.0) * 4.0,
            half_extent: 1.1,
        };
        assert!(!frustum.intersects(&behind));
    }
}
