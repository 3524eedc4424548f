//! Shared value types for the flowfield workspace.
//!
//! # Invariants
//! - Particle `id` maps to texel `(id % width, id / width)` for the lifetime of a simulation.
//! - Render-side UVs address texel centres, never texel corners.

mod types;

pub use types::{FrameTime, GridError, GridSize, TexelCoord};

pub fn crate_info() -> &'static str {
    "flowfield-common v0.1.0"
}
