use flowfield_common::{GridSize, TexelCoord};
use glam::Vec4;

/// Texel buffer length does not match its grid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("texel buffer holds {actual} texels, grid {width}x{height} needs {expected}")]
pub struct TextureSizeError {
    pub width: u32,
    pub height: u32,
    pub expected: usize,
    pub actual: usize,
}

/// A 2-D, 4-channel, single-precision float buffer: one texel per particle.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTexture {
    grid: GridSize,
    texels: Vec<Vec4>,
}

impl StateTexture {
    /// All channels zero.
    pub fn zeroed(grid: GridSize) -> Self {
        Self::filled(grid, Vec4::ZERO)
    }

    pub fn filled(grid: GridSize, value: Vec4) -> Self {
        Self {
            grid,
            texels: vec![value; grid.texel_count()],
        }
    }

    /// Wrap an existing row-major texel buffer.
    pub fn from_texels(grid: GridSize, texels: Vec<Vec4>) -> Result<Self, TextureSizeError> {
        if texels.len() != grid.texel_count() {
            return Err(TextureSizeError {
                width: grid.width,
                height: grid.height,
                expected: grid.texel_count(),
                actual: texels.len(),
            });
        }
        Ok(Self { grid, texels })
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    /// Row-major texels, padding included.
    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub fn texels_mut(&mut self) -> &mut [Vec4] {
        &mut self.texels
    }

    /// Texel of particle `id`.
    pub fn texel(&self, id: u32) -> Vec4 {
        self.texels[id as usize]
    }

    /// Integer texel fetch, the CPU counterpart of WGSL `textureLoad`.
    pub fn load(&self, coord: TexelCoord) -> Vec4 {
        self.texels[self.grid.id(coord) as usize]
    }

    /// The first `count` texels: the particles, without grid padding.
    pub fn particles(&self, count: u32) -> &[Vec4] {
        let end = (count as usize).min(self.texels.len());
        &self.texels[..end]
    }

    /// Raw `f32` view, four floats per texel, for uploads.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.texels)
    }
}
