//! Texture-resident particle simulation.
//!
//! Per-particle state lives in 4-channel float textures, one texel per
//! particle. Each declared variable owns a ping-pong [`StatePool`]; every
//! tick the [`Computation`] runs one full-texture pass per variable in
//! dependency order and flips that variable's pool.
//!
//! # Invariants
//! - A pass never reads the buffer it writes: the pool only hands out the
//!   live buffer by shared reference and the back buffer by `&mut`.
//! - Cross-variable reads observe this tick's value; self reads observe the
//!   previous tick's value.
//! - Non-self dependency cycles are rejected when the computation is built.
//! - Grid padding (texels `>= N`) is zero at seed time and never exposed to
//!   the draw stage.

mod bridge;
mod clock;
mod computation;
mod config;
mod flow;
mod graph;
mod pool;
mod rule;
mod seed;
mod simulation;
mod texture;

pub use bridge::{ParticleAttributes, PositionView};
pub use clock::FrameClock;
pub use computation::{Computation, ComputationBuilder, ComputeError, DEFAULT_MAX_DELTA};
pub use config::{ConfigError, SimConfig};
pub use flow::{FlowFieldParams, FlowFieldRule};
pub use graph::{GraphError, Schedule, VariableGraph, VariableId};
pub use pool::StatePool;
pub use rule::{PassContext, PassInputs, UpdateRule};
pub use seed::{seed_points, seed_texture, SeedError};
pub use simulation::{ParticleSimulation, SimulationError, PARTICLES};
pub use texture::{StateTexture, TextureSizeError};

pub fn crate_info() -> &'static str {
    "flowfield-sim v0.1.0"
}
