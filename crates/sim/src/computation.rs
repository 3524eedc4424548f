use crate::flow::FlowFieldParams;
use crate::graph::{GraphError, Schedule, VariableGraph, VariableId};
use crate::pool::StatePool;
use crate::rule::{run_pass, PassContext, PassInputs, UpdateRule};
use crate::texture::StateTexture;
use flowfield_common::{FrameTime, GridSize};
use std::cmp::Ordering;

/// Default upper bound on a tick's delta, in seconds.
pub const DEFAULT_MAX_DELTA: f32 = 0.1;

/// Errors from assembling a computation.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("initial texture for '{name}' is {actual_width}x{actual_height}, computation grid is {width}x{height}")]
    SizeMismatch {
        name: String,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("computation has no variables")]
    NoVariables,
}

struct Variable {
    rule: Box<dyn UpdateRule>,
    base: StateTexture,
    pool: StatePool<StateTexture>,
}

/// Declares variables and dependencies, then resolves them into a [`Computation`].
pub struct ComputationBuilder {
    grid: GridSize,
    graph: VariableGraph,
    variables: Vec<Variable>,
    params: FlowFieldParams,
    max_delta: f32,
}

impl ComputationBuilder {
    pub fn new(grid: GridSize) -> Self {
        Self {
            grid,
            graph: VariableGraph::new(),
            variables: Vec::new(),
            params: FlowFieldParams::default(),
            max_delta: DEFAULT_MAX_DELTA,
        }
    }

    pub fn with_params(mut self, params: FlowFieldParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_max_delta(mut self, max_delta: f32) -> Self {
        self.max_delta = max_delta;
        self
    }

    /// Declare a variable seeded with `initial`, updated by `rule`.
    ///
    /// `initial` becomes both the first live buffer and the constant base
    /// texture. The other buffer of the pool starts zeroed.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        initial: StateTexture,
        rule: impl UpdateRule + 'static,
    ) -> Result<VariableId, ComputeError> {
        let name = name.into();
        let actual = initial.grid();
        if actual != self.grid {
            return Err(ComputeError::SizeMismatch {
                name,
                width: self.grid.width,
                height: self.grid.height,
                actual_width: actual.width,
                actual_height: actual.height,
            });
        }
        let id = self.graph.add_variable(name)?;
        let back = StateTexture::zeroed(self.grid);
        self.variables.push(Variable {
            rule: Box::new(rule),
            pool: StatePool::new(initial.clone(), back),
            base: initial,
        });
        Ok(id)
    }

    /// Declare which variables `id` reads. Include `id` itself for feedback.
    pub fn set_dependencies(
        &mut self,
        id: VariableId,
        dependencies: &[VariableId],
    ) -> Result<(), ComputeError> {
        self.graph.set_dependencies(id, dependencies)?;
        Ok(())
    }

    /// Resolve the pass order. Fails fast on a cross-variable cycle.
    pub fn build(self) -> Result<Computation, ComputeError> {
        if self.variables.is_empty() {
            return Err(ComputeError::NoVariables);
        }
        let schedule = self.graph.resolve()?;
        tracing::info!(
            width = self.grid.width,
            height = self.grid.height,
            variables = self.variables.len(),
            "computation initialised"
        );
        Ok(Computation {
            grid: self.grid,
            graph: self.graph,
            schedule,
            variables: self.variables,
            params: self.params,
            max_delta: self.max_delta,
            ticks: 0,
        })
    }
}

/// Texture-resident state variables advanced by one pass each per tick.
///
/// Each tick runs the resolved schedule: for every variable, bind the live
/// buffers of its dependencies, write the pool's other buffer, flip. Cross
/// reads see this tick's value; self reads see the previous tick's.
pub struct Computation {
    grid: GridSize,
    graph: VariableGraph,
    schedule: Schedule,
    variables: Vec<Variable>,
    params: FlowFieldParams,
    max_delta: f32,
    ticks: u64,
}

impl Computation {
    pub fn builder(grid: GridSize) -> ComputationBuilder {
        ComputationBuilder::new(grid)
    }

    /// Run exactly one scheduling cycle. `dt` is clamped to `[0, max_delta]`.
    pub fn tick(&mut self, dt: f32, elapsed: f32) {
        self.compute(FrameTime::new(elapsed, dt, self.max_delta));
    }

    /// Run one scheduling cycle with an already sanitised frame time.
    pub fn compute(&mut self, time: FrameTime) {
        let _span = tracing::trace_span!("compute", tick = self.ticks).entered();
        let ctx = PassContext {
            time,
            params: &self.params,
            grid: self.grid,
        };

        for &id in self.schedule.order() {
            let idx = id.index();
            let deps = self.graph.dependencies(id);
            let (head, rest) = self.variables.split_at_mut(idx);
            let Some((own, tail)) = rest.split_first_mut() else {
                continue;
            };
            let rule = own.rule.as_ref();
            let base = &own.base;
            own.pool.write_then_flip(|live, back| {
                let bound: Vec<(VariableId, &StateTexture)> = deps
                    .iter()
                    .map(|&dep| {
                        let tex = match dep.index().cmp(&idx) {
                            Ordering::Less => head[dep.index()].pool.current(),
                            Ordering::Equal => live,
                            Ordering::Greater => tail[dep.index() - idx - 1].pool.current(),
                        };
                        (dep, tex)
                    })
                    .collect();
                let inputs = PassInputs::new(id, base, &bound);
                let _pass = tracing::trace_span!("pass", variable = self.graph.name(id)).entered();
                run_pass(rule, &ctx, &inputs, back);
            });
        }
        self.ticks += 1;
    }

    /// Live buffer of `id`. The borrow ends before the next tick can start,
    /// so callers re-query every frame.
    pub fn current_texture(&self, id: VariableId) -> &StateTexture {
        self.variables[id.index()].pool.current()
    }

    /// Constant seed texture of `id`.
    pub fn base_texture(&self, id: VariableId) -> &StateTexture {
        &self.variables[id.index()].base
    }

    pub fn live_index(&self, id: VariableId) -> usize {
        self.variables[id.index()].pool.live_index()
    }

    pub fn flips(&self, id: VariableId) -> u64 {
        self.variables[id.index()].pool.flips()
    }

    pub fn variable(&self, name: &str) -> Option<VariableId> {
        self.graph.find(name)
    }

    pub fn graph(&self) -> &VariableGraph {
        &self.graph
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn params(&self) -> &FlowFieldParams {
        &self.params
    }

    /// Tunables; changes apply from the next pass.
    pub fn params_mut(&mut self) -> &mut FlowFieldParams {
        &mut self.params
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn max_delta(&self) -> f32 {
        self.max_delta
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
