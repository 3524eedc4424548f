//! wgpu backend for the flowfield simulation.
//!
//! Each variable is an `Rgba32Float` ping-pong pair; each pass is a
//! full-screen triangle whose fragment shader writes one texel per particle.
//! Dependencies are bound as textures and read with `textureLoad`, so no
//! filtering ever blends neighbouring particles.
//!
//! # Invariants
//! - The render target of a pass is never bound as one of its inputs.
//! - Grids larger than the device's 2-D texture limit fail at build time.
//! - All passes of one tick are submitted together, in schedule order.

mod gpu;
pub mod shaders;
mod uniforms;

pub use gpu::{GpuContext, GpuError, WgpuComputation, WgpuComputationBuilder, padded_bytes_per_row};
pub use uniforms::SimUniforms;

pub fn crate_info() -> &'static str {
    "flowfield-render-wgpu v0.1.0"
}
