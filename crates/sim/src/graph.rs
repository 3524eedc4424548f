use std::collections::BTreeSet;

/// Handle to a declared state variable. Indexes declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(usize);

impl VariableId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Errors from declaring or resolving the variable graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("variable '{0}' is already declared")]
    DuplicateVariable(String),
    #[error("variable index {0} is not declared in this graph")]
    UnknownVariable(usize),
    #[error("dependency cycle between variables: {}", .variables.join(", "))]
    Cycle { variables: Vec<String> },
}

#[derive(Debug, Clone)]
struct VariableDecl {
    name: String,
    dependencies: Vec<VariableId>,
}

/// Named state variables and the variables each one reads.
///
/// Self-dependencies are feedback (read previous tick), not edges for
/// ordering. Any other cycle is rejected by [`VariableGraph::resolve`].
#[derive(Debug, Clone, Default)]
pub struct VariableGraph {
    variables: Vec<VariableDecl>,
}

impl VariableGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable with no dependencies.
    pub fn add_variable(&mut self, name: impl Into<String>) -> Result<VariableId, GraphError> {
        let name = name.into();
        if self.find(&name).is_some() {
            return Err(GraphError::DuplicateVariable(name));
        }
        self.variables.push(VariableDecl {
            name,
            dependencies: Vec::new(),
        });
        Ok(VariableId(self.variables.len() - 1))
    }

    /// Replace the dependency list of `id`. Duplicates are dropped, order kept.
    pub fn set_dependencies(
        &mut self,
        id: VariableId,
        dependencies: &[VariableId],
    ) -> Result<(), GraphError> {
        self.check(id)?;
        let mut seen = BTreeSet::new();
        let mut deps = Vec::with_capacity(dependencies.len());
        for &dep in dependencies {
            self.check(dep)?;
            if seen.insert(dep) {
                deps.push(dep);
            }
        }
        self.variables[id.0].dependencies = deps;
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<VariableId> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .map(VariableId)
    }

    pub fn name(&self, id: VariableId) -> &str {
        &self.variables[id.0].name
    }

    pub fn dependencies(&self, id: VariableId) -> &[VariableId] {
        &self.variables[id.0].dependencies
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = VariableId> + '_ {
        (0..self.variables.len()).map(VariableId)
    }

    /// Topologically order the variables (Kahn's algorithm, self-edges ignored).
    ///
    /// Ties resolve to declaration order so the schedule is deterministic.
    pub fn resolve(&self) -> Result<Schedule, GraphError> {
        let n = self.variables.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (v, decl) in self.variables.iter().enumerate() {
            for dep in &decl.dependencies {
                if dep.0 != v {
                    in_degree[v] += 1;
                    dependents[dep.0].push(v);
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&v| in_degree[v] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(v) = ready.pop_first() {
            order.push(VariableId(v));
            for &d in &dependents[v] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        if order.len() < n {
            let variables = (0..n)
                .filter(|&v| in_degree[v] > 0)
                .map(|v| self.variables[v].name.clone())
                .collect();
            return Err(GraphError::Cycle { variables });
        }

        tracing::debug!(
            order = ?order.iter().map(|id| self.name(*id)).collect::<Vec<_>>(),
            "variable graph resolved"
        );
        Ok(Schedule { order })
    }

    fn check(&self, id: VariableId) -> Result<(), GraphError> {
        if id.0 < self.variables.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownVariable(id.0))
        }
    }
}

/// Pass order for one tick, resolved once at setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    order: Vec<VariableId>,
}

impl Schedule {
    pub fn order(&self) -> &[VariableId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
