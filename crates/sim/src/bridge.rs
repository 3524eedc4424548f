use crate::seed::SeedError;
use crate::texture::StateTexture;
use flowfield_common::GridSize;
use glam::{Vec2, Vec3, Vec4};
use rand::Rng;
use std::ops::Range;

/// Read-only view of the live position texture for one frame.
///
/// Borrowed from the simulation, so it cannot outlive the next tick.
#[derive(Debug, Clone, Copy)]
pub struct PositionView<'a> {
    texture: &'a StateTexture,
    count: u32,
}

impl<'a> PositionView<'a> {
    pub(crate) fn new(texture: &'a StateTexture, count: u32) -> Self {
        Self { texture, count }
    }

    /// The full texture, padding included, for upload as-is.
    pub fn texture(&self) -> &'a StateTexture {
        self.texture
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Particle texels `0..count`; padding is never exposed.
    pub fn texels(&self) -> &'a [Vec4] {
        self.texture.particles(self.count)
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + 'a {
        self.texels().iter().map(|t| t.truncate())
    }

    pub fn position(&self, id: u32) -> Option<Vec3> {
        self.texels().get(id as usize).map(|t| t.truncate())
    }
}

/// Per-particle vertex attributes the drawing stage consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleAttributes {
    count: u32,
    uvs: Vec<Vec2>,
    sizes: Vec<f32>,
    colors: Option<Vec<Vec3>>,
}

impl ParticleAttributes {
    /// Texel-centre UVs for every particle, a random size in `[0, 1)` each,
    /// and the source colours passed through unchanged.
    pub fn new<R: Rng + ?Sized>(
        grid: GridSize,
        count: u32,
        colors: Option<&[Vec3]>,
        rng: &mut R,
    ) -> Result<Self, SeedError> {
        if let Some(colors) = colors {
            if colors.len() != count as usize {
                return Err(SeedError::ColorCount {
                    colors: colors.len(),
                    points: count as usize,
                });
            }
        }
        let uvs = (0..count).map(|id| grid.uv(id)).collect();
        let sizes = (0..count).map(|_| rng.gen_range(0.0..1.0)).collect();
        Ok(Self {
            count,
            uvs,
            sizes,
            colors: colors.map(<[Vec3]>::to_vec),
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Vertices to draw. Never extends into grid padding.
    pub fn draw_range(&self) -> Range<u32> {
        0..self.count
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    pub fn colors(&self) -> Option<&[Vec3]> {
        self.colors.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn uvs_hit_texel_centres() {
        let grid = GridSize::new(4, 4).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let attrs = ParticleAttributes::new(grid, 10, None, &mut rng).unwrap();
        assert_eq!(attrs.uvs()[0], Vec2::new(0.125, 0.125));
        // particle 5 -> texel (1, 1)
        assert_eq!(attrs.uvs()[5], Vec2::new(0.375, 0.375));
        assert_eq!(attrs.uvs().len(), 10);
    }

    #[test]
    fn draw_range_stops_at_count() {
        let grid = GridSize::new(3, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let attrs = ParticleAttributes::new(grid, 7, None, &mut rng).unwrap();
        assert_eq!(attrs.draw_range(), 0..7);
        assert!(attrs.sizes().iter().all(|s| (0.0..1.0).contains(s)));
    }

    #[test]
    fn colours_pass_through() {
        let grid = GridSize::new(2, 2).unwrap();
        let colors = vec![Vec3::X, Vec3::Y, Vec3::Z];
        let mut rng = StdRng::seed_from_u64(0);
        let attrs = ParticleAttributes::new(grid, 3, Some(&colors), &mut rng).unwrap();
        assert_eq!(attrs.colors(), Some(colors.as_slice()));
    }

    #[test]
    fn colour_count_must_match() {
        let grid = GridSize::new(2, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            ParticleAttributes::new(grid, 3, Some(&[Vec3::X]), &mut rng),
            Err(SeedError::ColorCount { colors: 1, points: 3 })
        ));
    }

    #[test]
    fn view_hides_padding() {
        let grid = GridSize::new(2, 2).unwrap();
        let tex = StateTexture::filled(grid, Vec4::ONE);
        let view = PositionView::new(&tex, 3);
        assert_eq!(view.texels().len(), 3);
        assert_eq!(view.positions().count(), 3);
        assert_eq!(view.position(3), None);
        assert_eq!(view.position(2), Some(Vec3::ONE));
    }
}
