use crate::flow::FlowFieldParams;
use crate::graph::VariableId;
use crate::texture::StateTexture;
use flowfield_common::{FrameTime, GridSize, TexelCoord};
use glam::Vec4;

/// Uniform inputs shared by every pass of one tick.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    pub time: FrameTime,
    pub params: &'a FlowFieldParams,
    pub grid: GridSize,
}

/// Textures bound for one variable's pass.
///
/// `base` is the variable's seed texture, constant for the simulation's
/// lifetime. Dependencies are the live buffers of the declared variables;
/// a self-dependency resolves to the previous tick's state.
#[derive(Debug)]
pub struct PassInputs<'a> {
    variable: VariableId,
    base: &'a StateTexture,
    dependencies: &'a [(VariableId, &'a StateTexture)],
}

impl<'a> PassInputs<'a> {
    pub fn new(
        variable: VariableId,
        base: &'a StateTexture,
        dependencies: &'a [(VariableId, &'a StateTexture)],
    ) -> Self {
        Self {
            variable,
            base,
            dependencies,
        }
    }

    /// The variable being written by this pass.
    pub fn variable(&self) -> VariableId {
        self.variable
    }

    pub fn base(&self) -> &'a StateTexture {
        self.base
    }

    /// Live texture of a declared dependency, `None` if `id` was not declared.
    pub fn get(&self, id: VariableId) -> Option<&'a StateTexture> {
        self.dependencies
            .iter()
            .find(|(dep, _)| *dep == id)
            .map(|(_, tex)| *tex)
    }

    /// The variable's own state from the previous tick, if it is self-dependent.
    pub fn previous(&self) -> Option<&'a StateTexture> {
        self.get(self.variable)
    }

    /// Dependencies in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = (VariableId, &'a StateTexture)> + '_ {
        self.dependencies.iter().copied()
    }
}

/// Per-texel update rule executed during a variable's pass.
///
/// Implementations must be pure in their arguments: the scheduler relies on
/// that to evaluate texels in any order without read-after-write hazards.
pub trait UpdateRule: Send + Sync {
    /// Compute the new value of the texel at `coord`.
    fn texel(&self, ctx: &PassContext<'_>, coord: TexelCoord, inputs: &PassInputs<'_>) -> Vec4;
}

impl<F> UpdateRule for F
where
    F: Fn(&PassContext<'_>, TexelCoord, &PassInputs<'_>) -> Vec4 + Send + Sync,
{
    fn texel(&self, ctx: &PassContext<'_>, coord: TexelCoord, inputs: &PassInputs<'_>) -> Vec4 {
        self(ctx, coord, inputs)
    }
}

/// Evaluate `rule` over every texel of `target`.
pub(crate) fn run_pass(
    rule: &dyn UpdateRule,
    ctx: &PassContext<'_>,
    inputs: &PassInputs<'_>,
    target: &mut StateTexture,
) {
    let grid = target.grid();
    for (i, texel) in target.texels_mut().iter_mut().enumerate() {
        *texel = rule.texel(ctx, grid.coord(i as u32), inputs);
    }
}
