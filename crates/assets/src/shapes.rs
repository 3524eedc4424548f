//! Deterministic procedural point clouds.

use crate::PointCloud;
use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

/// Low-discrepancy 2-D sequence (plastic-number lattice) in `[0, 1)^2`.
fn r2(i: usize) -> Vec2 {
    const A1: f64 = 0.754_877_666_246_692_7;
    const A2: f64 = 0.569_840_290_998_053_3;
    let k = i as f64;
    Vec2::new((0.5 + A1 * k).fract() as f32, (0.5 + A2 * k).fract() as f32)
}

/// `count` points evenly spread over a sphere of `radius`.
pub fn fibonacci_sphere(name: &str, count: usize, radius: f32) -> PointCloud {
    let golden = PI * (3.0 - 5f32.sqrt());
    let positions = (0..count)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f32 + 0.5) / count as f32;
            let r = (1.0 - y * y).max(0.0).sqrt();
            let theta = golden * i as f32;
            Vec3::new(r * theta.cos(), y, r * theta.sin()) * radius
        })
        .collect();
    PointCloud::new(name, positions)
}

/// `count` points on the faces of an axis-aligned cube, cycling faces.
pub fn cube_surface(name: &str, count: usize, half_extent: f32) -> PointCloud {
    let positions = (0..count)
        .map(|i| {
            let uv = (r2(i / 6) * 2.0 - Vec2::ONE) * half_extent;
            let h = half_extent;
            match i % 6 {
                0 => Vec3::new(h, uv.x, uv.y),
                1 => Vec3::new(-h, uv.x, uv.y),
                2 => Vec3::new(uv.x, h, uv.y),
                3 => Vec3::new(uv.x, -h, uv.y),
                4 => Vec3::new(uv.x, uv.y, h),
                _ => Vec3::new(uv.x, uv.y, -h),
            }
        })
        .collect();
    PointCloud::new(name, positions)
}

/// `count` points on a torus around the y axis.
pub fn torus(name: &str, count: usize, major_radius: f32, minor_radius: f32) -> PointCloud {
    let positions = (0..count)
        .map(|i| {
            let uv = r2(i);
            let (u, v) = (uv.x * TAU, uv.y * TAU);
            let ring = major_radius + minor_radius * v.cos();
            Vec3::new(ring * u.cos(), minor_radius * v.sin(), ring * u.sin())
        })
        .collect();
    PointCloud::new(name, positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_points_lie_on_radius() {
        let cloud = fibonacci_sphere("s", 64, 2.0);
        assert_eq!(cloud.len(), 64);
        for p in &cloud.positions {
            assert!((p.length() - 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn cube_points_lie_on_faces() {
        let cloud = cube_surface("c", 60, 1.0);
        for p in &cloud.positions {
            let m = p.abs().max_element();
            assert!((m - 1.0).abs() < 1e-6, "{p} off surface");
        }
    }

    #[test]
    fn torus_points_keep_minor_radius() {
        let cloud = torus("t", 100, 1.0, 0.25);
        for p in &cloud.positions {
            let ring = Vec2::new(p.x, p.z).length() - 1.0;
            let d = Vec2::new(ring, p.y).length();
            assert!((d - 0.25).abs() < 1e-4);
        }
    }

    #[test]
    fn generators_are_deterministic() {
        assert_eq!(torus("t", 50, 1.0, 0.3), torus("t", 50, 1.0, 0.3));
        assert_eq!(cube_surface("c", 50, 1.0), cube_surface("c", 50, 1.0));
    }

    #[test]
    fn sphere_points_are_distinct() {
        let cloud = fibonacci_sphere("s", 200, 1.0);
        for (i, a) in cloud.positions.iter().enumerate() {
            for b in &cloud.positions[i + 1..] {
                assert!(a.distance(*b) > 1e-3);
            }
        }
    }
}
