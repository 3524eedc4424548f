use crate::texture::StateTexture;
use flowfield_common::{GridError, GridSize};
use glam::{Vec3, Vec4};
use rand::Rng;

/// Errors from packing source points into the initial state texture.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("{points} points do not fit a {width}x{height} grid")]
    TooManyPoints { points: usize, width: u32, height: u32 },
    #[error("source point {index} has a non-finite coordinate")]
    NonFinite { index: usize },
    #[error("{colors} colours supplied for {points} points")]
    ColorCount { colors: usize, points: usize },
}

/// Pack `points` into a fresh state texture of size `grid`.
///
/// Texel `i` becomes `(x_i, y_i, z_i, r_i)` with `r_i` uniform in `[0, 1)`,
/// drawn once per particle. Texels past the point count stay zero.
pub fn seed_texture<R: Rng + ?Sized>(
    points: &[Vec3],
    grid: GridSize,
    rng: &mut R,
) -> Result<StateTexture, SeedError> {
    if points.len() > grid.texel_count() {
        return Err(SeedError::TooManyPoints {
            points: points.len(),
            width: grid.width,
            height: grid.height,
        });
    }
    if let Some(index) = points.iter().position(|p| !p.is_finite()) {
        return Err(SeedError::NonFinite { index });
    }

    let mut texture = StateTexture::zeroed(grid);
    for (texel, point) in texture.texels_mut().iter_mut().zip(points) {
        *texel = Vec4::new(point.x, point.y, point.z, rng.gen_range(0.0..1.0));
    }
    tracing::debug!(
        points = points.len(),
        padding = grid.texel_count() - points.len(),
        "state texture seeded"
    );
    Ok(texture)
}

/// Choose the square grid for `points` and seed it.
pub fn seed_points<R: Rng + ?Sized>(
    points: &[Vec3],
    max_side: u32,
    rng: &mut R,
) -> Result<(GridSize, StateTexture), SeedError> {
    let count = u32::try_from(points.len()).map_err(|_| GridError::TooLarge {
        side: u64::MAX,
        max: max_side,
    })?;
    let grid = GridSize::for_particles(count, max_side)?;
    let texture = seed_texture(points, grid, rng)?;
    Ok((grid, texture))
}
