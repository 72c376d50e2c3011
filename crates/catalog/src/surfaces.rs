//! Parametric surfaces shipped with the catalog.
//!
//! Every surface exists twice: as a Rust function used by the CPU path and as a
//! WGSL function used when the compute kernel table is generated. The WGSL
//! snippets expect a `PI` constant in scope and are named after
//! [`FunctionName::as_str`](crate::FunctionName::as_str).

use std::f32::consts::PI;

use glam::Vec3;

/// Pure mapping from grid coordinates and time to a point in space.
pub type Function = fn(f32, f32, f32) -> Vec3;

pub fn wave(u: f32, v: f32, t: f32) -> Vec3 {
    Vec3::new(u, (PI * (u + v + t)).sin(), v)
}

pub fn multi_wave(u: f32, v: f32, t: f32) -> Vec3 {
    let mut y = (PI * (u + 0.5 * t)).sin();
    y += 0.5 * (2.0 * PI * (v + t)).sin();
    y += (PI * (u + v + 0.25 * t)).sin();
    Vec3::new(u, y * (1.0 / 2.5), v)
}

pub fn ripple(u: f32, v: f32, t: f32) -> Vec3 {
    let d = (u * u + v * v).sqrt();
    let y = (PI * (4.0 * d - t)).sin() / (1.0 + 10.0 * d);
    Vec3::new(u, y, v)
}

pub fn sphere(u: f32, v: f32, t: f32) -> Vec3 {
    let r = 0.9 + 0.1 * (PI * (6.0 * u + 4.0 * v + t)).sin();
    let s = r * (0.5 * PI * v).cos();
    Vec3::new(s * (PI * u).sin(), r * (0.5 * PI * v).sin(), s * (PI * u).cos())
}

pub fn torus(u: f32, v: f32, t: f32) -> Vec3 {
    let r1 = 0.7 + 0.1 * (PI * (6.0 * u + 0.5 * t)).sin();
    let r2 = 0.15 + 0.05 * (PI * (8.0 * u + 4.0 * v + 2.0 * t)).sin();
    let s = r1 + r2 * (PI * v).cos();
    Vec3::new(s * (PI * u).sin(), r2 * (PI * v).sin(), s * (PI * u).cos())
}

pub(crate) const WAVE_WGSL: &str = r"fn wave(u: f32, v: f32, t: f32) -> vec3<f32> {
    return vec3<f32>(u, sin(PI * (u + v + t)), v);
}
";

pub(crate) const MULTI_WAVE_WGSL: &str = r"fn multi_wave(u: f32, v: f32, t: f32) -> vec3<f32> {
    var y = sin(PI * (u + 0.5 * t));
    y += 0.5 * sin(2.0 * PI * (v + t));
    y += sin(PI * (u + v + 0.25 * t));
    return vec3<f32>(u, y * (1.0 / 2.5), v);
}
";

pub(crate) const RIPPLE_WGSL: &str = r"fn ripple(u: f32, v: f32, t: f32) -> vec3<f32> {
    let d = sqrt(u * u + v * v);
    let y = sin(PI * (4.0 * d - t)) / (1.0 + 10.0 * d);
    return vec3<f32>(u, y, v);
}
";

pub(crate) const SPHERE_WGSL: &str = r"fn sphere(u: f32, v: f32, t: f32) -> vec3<f32> {
    let r = 0.9 + 0.1 * sin(PI * (6.0 * u + 4.0 * v + t));
    let s = r * cos(0.5 * PI * v);
    return vec3<f32>(s * sin(PI * u), r * sin(0.5 * PI * v), s * cos(PI * u));
}
";

pub(crate) const TORUS_WGSL: &str = r"fn torus(u: f32, v: f32, t: f32) -> vec3<f32> {
    let r1 = 0.7 + 0.1 * sin(PI * (6.0 * u + 0.5 * t));
    let r2 = 0.15 + 0.05 * sin(PI * (8.0 * u + 4.0 * v + 2.0 * t));
    let s = r1 + r2 * cos(PI * v);
    return vec3<f32>(s * sin(PI * u), r2 * sin(PI * v), s * cos(PI * u));
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_fields_keep_grid_coordinates() {
        for f in [wave as Function, multi_wave, ripple] {
            let p = f(0.3, -0.7, 1.25);
            assert_eq!(p.x, 0.3);
            assert_eq!(p.z, -0.7);
        }
    }

    #[test]
    fn closed_surfaces_stay_within_unit_extent() {
        for step in 0..=20 {
            let u = -1.0 + step as f32 * 0.1;
            for row in 0..=20 {
                let v = -1.0 + row as f32 * 0.1;
                for f in [sphere as Function, torus] {
                    let p = f(u, v, 0.37 * step as f32);
                    assert!(p.abs().max_element() <= 1.0 + 1e-5, "{p:?} escapes unit cube");
                }
            }
        }
    }

    #[test]
    fn ripple_origin_is_finite() {
        let p = ripple(0.0, 0.0, 0.0);
        assert!(p.y.abs() < 1e-6);
    }
}
