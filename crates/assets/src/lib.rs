//! Point-cloud inputs for seeding and morphing.
//!
//! A [`PointCloud`] is an ordered list of positions with optional per-point
//! colours. Clouds come from JSON files or from the procedural generators in
//! [`shapes`]; the [`ShapeLibrary`] keeps them by name and persists to disk
//! as JSON for inspection.

pub mod shapes;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Errors from loading or validating point clouds.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed point cloud '{name}': {reason}")]
    Malformed { name: String, reason: String },
}

/// Ordered source points; index `i` becomes particle `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub name: String,
    pub positions: Vec<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<Vec3>>,
}

impl PointCloud {
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            positions,
            colors: None,
        }
    }

    pub fn with_colors(mut self, colors: Vec<Vec3>) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn colors(&self) -> Option<&[Vec3]> {
        self.colors.as_deref()
    }

    /// Positions as a flat `x, y, z, x, y, z, ...` array.
    pub fn flat_positions(&self) -> Vec<f32> {
        self.positions.iter().flat_map(|p| p.to_array()).collect()
    }

    /// Axis-aligned bounds, `None` for an empty cloud.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p))),
        )
    }

    /// Reject non-finite coordinates and colour lists of the wrong length.
    pub fn validate(&self) -> Result<(), AssetError> {
        if let Some(i) = self.positions.iter().position(|p| !p.is_finite()) {
            return Err(self.malformed(format!("position {i} is not finite")));
        }
        if let Some(colors) = &self.colors {
            if colors.len() != self.positions.len() {
                return Err(self.malformed(format!(
                    "{} colours for {} positions",
                    colors.len(),
                    self.positions.len()
                )));
            }
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let cloud: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        cloud.validate()?;
        tracing::debug!(path = %path.display(), name = %cloud.name, points = cloud.len(), "point cloud loaded");
        Ok(cloud)
    }

    fn malformed(&self, reason: String) -> AssetError {
        AssetError::Malformed {
            name: self.name.clone(),
            reason,
        }
    }
}

/// Named point clouds, iterated in name order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShapeLibrary {
    shapes: BTreeMap<String, PointCloud>,
}

impl ShapeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sphere, cube and torus with deliberately different point counts.
    pub fn procedural(base_count: usize) -> Self {
        let mut lib = Self::new();
        lib.insert(shapes::fibonacci_sphere("sphere", base_count, 1.0));
        lib.insert(shapes::cube_surface("cube", base_count * 3 / 4, 1.0));
        lib.insert(shapes::torus("torus", base_count / 2, 1.0, 0.35));
        lib
    }

    /// Add or replace a cloud under its own name.
    pub fn insert(&mut self, cloud: PointCloud) {
        self.shapes.insert(cloud.name.clone(), cloud);
    }

    pub fn get(&self, name: &str) -> Option<&PointCloud> {
        self.shapes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointCloud> {
        self.shapes.values()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let file = std::fs::File::open(path)?;
        let lib: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        for cloud in lib.iter() {
            cloud.validate()?;
        }
        Ok(lib)
    }
}

pub fn crate_info() -> &'static str {
    "flowfield-assets v0.1.0"
}
