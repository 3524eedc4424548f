use crate::bridge::{ParticleAttributes, PositionView};
use crate::computation::{ComputeError, Computation};
use crate::config::{ConfigError, SimConfig};
use crate::flow::{FlowFieldParams, FlowFieldRule};
use crate::graph::VariableId;
use crate::seed::{seed_points, SeedError};
use flowfield_common::{FrameTime, GridSize};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Name of the position variable.
pub const PARTICLES: &str = "particles";

/// Errors from building a [`ParticleSimulation`]. Any of them aborts setup.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error(transparent)]
    Compute(#[from] ComputeError),
}

/// One self-dependent position variable advected through the flow field.
pub struct ParticleSimulation {
    computation: Computation,
    particles: VariableId,
    count: u32,
    attributes: ParticleAttributes,
}

impl ParticleSimulation {
    /// Seed from `points` (and optional per-point colours) and resolve the
    /// schedule. The point count, not `config.particles`, sets N.
    pub fn new(
        points: &[Vec3],
        colors: Option<&[Vec3]>,
        config: &SimConfig,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let _span = tracing::info_span!("simulation_setup", points = points.len()).entered();

        let mut rng = StdRng::seed_from_u64(config.rng_seed);
        let (grid, initial) = seed_points(points, config.max_texture_dimension, &mut rng)?;
        let count = points.len() as u32;
        let attributes = ParticleAttributes::new(grid, count, colors, &mut rng)?;

        let mut builder = Computation::builder(grid)
            .with_params(config.flow)
            .with_max_delta(config.max_delta);
        // Field seed derives from the run seed; truncation is fine for noise.
        let rule = FlowFieldRule::new(config.rng_seed as u32);
        let particles = builder.add_variable(PARTICLES, initial, rule)?;
        builder.set_dependencies(particles, &[particles])?;
        let computation = builder.build()?;

        tracing::info!(
            count,
            width = grid.width,
            height = grid.height,
            "particle simulation ready"
        );
        Ok(Self {
            computation,
            particles,
            count,
            attributes,
        })
    }

    pub fn tick(&mut self, dt: f32, elapsed: f32) {
        self.computation.tick(dt, elapsed);
    }

    pub fn compute(&mut self, time: FrameTime) {
        self.computation.compute(time);
    }

    /// Live position state for this frame. Re-query after every tick.
    pub fn current_position_texture(&self) -> PositionView<'_> {
        PositionView::new(self.computation.current_texture(self.particles), self.count)
    }

    pub fn attributes(&self) -> &ParticleAttributes {
        &self.attributes
    }

    pub fn params(&self) -> &FlowFieldParams {
        self.computation.params()
    }

    pub fn params_mut(&mut self) -> &mut FlowFieldParams {
        self.computation.params_mut()
    }

    pub fn live_index(&self) -> usize {
        self.computation.live_index(self.particles)
    }

    pub fn flips(&self) -> u64 {
        self.computation.flips(self.particles)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn grid(&self) -> GridSize {
        self.computation.grid()
    }

    pub fn computation(&self) -> &Computation {
        &self.computation
    }
}
