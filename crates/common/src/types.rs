use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Errors from choosing or validating a state-texture grid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("particle count must be at least 1")]
    ZeroParticles,
    #[error("grid dimensions must be non-zero, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },
    #[error("grid side {side} exceeds the maximum texture dimension {max}")]
    TooLarge { side: u64, max: u32 },
}

/// Integer texel address inside a state texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TexelCoord {
    pub x: u32,
    pub y: u32,
}

impl TexelCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Dimensions of a state texture, one texel per particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    /// A `width x height` grid. Zero in either dimension is a configuration error.
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::ZeroDimension { width, height });
        }
        Ok(Self { width, height })
    }

    /// Smallest square grid holding `count` particles: side = ceil(sqrt(count)).
    ///
    /// Fails at setup when the side would exceed `max_side` (the backend's
    /// maximum 2-D texture dimension) rather than mid-simulation.
    pub fn for_particles(count: u32, max_side: u32) -> Result<Self, GridError> {
        if count == 0 {
            return Err(GridError::ZeroParticles);
        }
        let side = ceil_sqrt(u64::from(count));
        if side > u64::from(max_side) {
            return Err(GridError::TooLarge {
                side,
                max: max_side,
            });
        }
        let side = side as u32;
        Ok(Self {
            width: side,
            height: side,
        })
    }

    /// Total texels, including padding beyond the particle count.
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Texel holding particle `id`.
    pub fn coord(&self, id: u32) -> TexelCoord {
        TexelCoord {
            x: id % self.width,
            y: id / self.width,
        }
    }

    /// Particle id stored at `coord`: `y * width + x`.
    pub fn id(&self, coord: TexelCoord) -> u32 {
        coord.y * self.width + coord.x
    }

    /// Texel-centre UV the render stage samples for particle `id`.
    pub fn uv(&self, id: u32) -> Vec2 {
        let c = self.coord(id);
        Vec2::new(
            (c.x as f32 + 0.5) / self.width as f32,
            (c.y as f32 + 0.5) / self.height as f32,
        )
    }
}

/// Exact integer ceil(sqrt(n)); avoids float rounding for large counts.
fn ceil_sqrt(n: u64) -> u64 {
    let mut s = (n as f64).sqrt() as u64;
    while s * s < n {
        s += 1;
    }
    while s > 0 && (s - 1) * (s - 1) >= n {
        s -= 1;
    }
    s
}

/// Per-tick timing inputs: monotonic elapsed seconds and a sanitised delta.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameTime {
    pub elapsed: f32,
    pub delta: f32,
}

impl FrameTime {
    /// Build a frame time, clamping `raw_delta` into `[0, max_delta]`.
    ///
    /// NaN or negative deltas become 0; a stall (backgrounded tab, debugger
    /// pause) is capped at `max_delta` instead of being integrated in one step.
    pub fn new(elapsed: f32, raw_delta: f32, max_delta: f32) -> Self {
        let delta = if raw_delta.is_finite() {
            raw_delta.clamp(0.0, max_delta.max(0.0))
        } else if raw_delta == f32::INFINITY {
            max_delta.max(0.0)
        } else {
            0.0
        };
        Self { elapsed, delta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_covers_particle_count() {
        for n in [1u32, 2, 3, 4, 5, 63, 64, 65, 1000, 4096, 4097, 123_457] {
            let g = GridSize::for_particles(n, 16_384).unwrap();
            let side = (n as f64).sqrt().ceil() as u32;
            assert_eq!(g.width, side, "n={n}");
            assert_eq!(g.height, side, "n={n}");
            assert!(g.texel_count() >= n as usize);
        }
    }

    #[test]
    fn grid_rejects_zero_particles() {
        assert_eq!(
            GridSize::for_particles(0, 8192),
            Err(GridError::ZeroParticles)
        );
    }

    #[test]
    fn grid_rejects_oversized_side() {
        let err = GridSize::for_particles(65, 8).unwrap_err();
        assert_eq!(err, GridError::TooLarge { side: 9, max: 8 });
    }

    #[test]
    fn grid_rejects_zero_dimension() {
        assert!(GridSize::new(0, 4).is_err());
        assert!(GridSize::new(4, 0).is_err());
        assert!(GridSize::new(4, 4).is_ok());
    }

    #[test]
    fn coord_and_id_round_trip() {
        let g = GridSize::new(8, 8).unwrap();
        let c = g.coord(19);
        assert_eq!(c, TexelCoord::new(3, 2));
        assert_eq!(g.id(c), 19);
    }

    #[test]
    fn uv_samples_texel_centres() {
        let g = GridSize::new(4, 4).unwrap();
        assert_eq!(g.uv(0), Vec2::new(0.125, 0.125));
        assert_eq!(g.uv(5), Vec2::new(0.375, 0.375));
        assert_eq!(g.uv(15), Vec2::new(0.875, 0.875));
    }

    #[test]
    fn frame_time_clamps_delta() {
        assert_eq!(FrameTime::new(1.0, 0.016, 0.1).delta, 0.016);
        assert_eq!(FrameTime::new(1.0, 5.0, 0.1).delta, 0.1);
        assert_eq!(FrameTime::new(1.0, -0.5, 0.1).delta, 0.0);
        assert_eq!(FrameTime::new(1.0, f32::NAN, 0.1).delta, 0.0);
        assert_eq!(FrameTime::new(1.0, f32::INFINITY, 0.1).delta, 0.1);
    }
}
