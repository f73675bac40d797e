//! Model construction: index sets, variable space, objective and the live
//! constraint graph of one [`FiberModel`] instance.

pub(crate) mod builder;
mod error;
mod groups;
mod linear;
mod objective;
mod sets;
mod vars;

pub use error::ModelError;
pub use groups::{ConstraintGraph, GroupId};
pub use linear::{emit_lp, Constraint, LinearExpr, LpProblem, ObjSense, Sense, VarId};
pub use sets::IndexSets;
pub use vars::{VarKey, VarSpace};

use crate::results::{self, FlowResults};
use crate::scenario::ScenarioState;
use crate::solve::{self, LpSolver, RelaxationReport, SolveReport, SolveStatus};
use crate::ParameterStore;
use builder::Rules;
use tracing::{info, warn};

/// Weight applied to every objective term.
pub const OBJECTIVE_WEIGHT: f64 = 0.01;
/// Model quantities are million short tons; reporting is in short tons.
pub const UNIT_SCALE: f64 = 1000.0;

/// One built model: variables and objective fixed at construction, constraint
/// groups replaceable by the scenario operations.
///
/// Every method that mutates or solves takes `&mut self`; a model shared
/// between threads has to be wrapped in a lock by its owner.
#[derive(Debug, Clone)]
pub struct FiberModel {
    pub(crate) name: String,
    pub(crate) params: ParameterStore,
    pub(crate) sets: IndexSets,
    pub(crate) vars: VarSpace,
    pub(crate) objective: LinearExpr,
    pub(crate) graph: ConstraintGraph,
    pub(crate) state: ScenarioState,
    last_status: Option<SolveStatus>,
}

impl FiberModel {
    /// Declare variables, set the objective and install every base group.
    ///
    /// Nothing is returned unless every group was built; a failing group
    /// aborts the whole build.
    pub fn build(name: impl Into<String>, params: &ParameterStore, products: &[String]) -> Result<Self, ModelError> {
        let name = name.into();
        let sets = sets::build_sets(params, products)?;
        let vars = VarSpace::declare(&sets);
        let state = ScenarioState::default();

        let (objective, graph) = {
            let rules = Rules {
                params,
                sets: &sets,
                vars: &vars,
                state: &state,
            };
            let objective = objective::build_objective(&rules)?;
            let mut graph = ConstraintGraph::new();
            for id in GroupId::ALL {
                graph.install(id, rules.build(id)?);
            }
            (objective, graph)
        };

        info!(
            model = %name,
            products = sets.products.len(),
            variables = vars.len(),
            constraints = graph.len(),
            "built fiber model"
        );
        Ok(FiberModel {
            name,
            params: params.clone(),
            sets,
            vars,
            objective,
            graph,
            state,
            last_status: None,
        })
    }

    pub(crate) fn rules(&self) -> Rules<'_> {
        self.rules_with(&self.state)
    }

    pub(crate) fn rules_with<'a>(&'a self, state: &'a ScenarioState) -> Rules<'a> {
        Rules {
            params: &self.params,
            sets: &self.sets,
            vars: &self.vars,
            state,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn sets(&self) -> &IndexSets {
        &self.sets
    }

    pub fn vars(&self) -> &VarSpace {
        &self.vars
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn graph(&self) -> &ConstraintGraph {
        &self.graph
    }

    pub fn constraints(&self, id: GroupId) -> Option<&[Constraint]> {
        self.graph.group(id)
    }

    pub fn state(&self) -> &ScenarioState {
        &self.state
    }

    /// Status of the most recent solve, if any.
    pub fn last_status(&self) -> Option<SolveStatus> {
        self.last_status
    }

    /// Drop a group from the live set. Scenario operations that later target
    /// it fail with [`ModelError::GroupNotFound`].
    pub fn remove_group(&mut self, id: GroupId) -> Result<Vec<Constraint>, ModelError> {
        warn!(model = %self.name, group = %id, "removing constraint group");
        self.graph.remove(id)
    }

    /// Snapshot of the live model as a flat LP.
    pub fn problem(&self) -> LpProblem {
        LpProblem {
            var_names: self.vars.names().to_vec(),
            objective: self.objective.clone(),
            sense: ObjSense::Minimize,
            constraints: self.graph.rows().cloned().collect(),
        }
    }

    /// The live model in LP file format.
    pub fn to_lp_string(&self) -> String {
        emit_lp(&self.problem())
    }

    /// Rebuild `ids` under `state` without touching the live graph.
    pub(crate) fn rebuild(
        &self,
        state: &ScenarioState,
        ids: &[GroupId],
    ) -> Result<Vec<(GroupId, Vec<Constraint>)>, ModelError> {
        let rules = self.rules_with(state);
        ids.iter().map(|id| Ok((*id, rules.build(*id)?))).collect()
    }

    /// Install replacements and the state they were built from, together.
    pub(crate) fn commit(
        &mut self,
        state: ScenarioState,
        replacements: Vec<(GroupId, Vec<Constraint>)>,
    ) -> Result<(), ModelError> {
        self.graph.replace_all(replacements)?;
        self.state = state;
        Ok(())
    }

    /// Solve the live model. Infeasibility is reported through the status;
    /// the model stays usable either way.
    pub fn solve<S: LpSolver + ?Sized>(&mut self, solver: &S) -> Result<SolveReport, ModelError> {
        let lp = self.problem();
        let solution = solve::solve_screened(solver, &lp)?;
        self.last_status = Some(solution.status);

        match solution.status {
            SolveStatus::Optimal => {
                let objective = lp.objective().eval(&solution.values);
                let flows = results::extract(&self.rules(), &solution.values)?;
                info!(model = %self.name, solver = solver.name(), objective, "optimal");
                Ok(SolveReport {
                    status: SolveStatus::Optimal,
                    objective: Some(objective),
                    flows: Some(flows.to_unit(results::Unit::ShortTons)),
                })
            }
            status => {
                warn!(
                    model = %self.name,
                    solver = solver.name(),
                    ?status,
                    "no optimal solution; adjust the scenario and solve again"
                );
                Ok(SolveReport {
                    status,
                    objective: None,
                    flows: None,
                })
            }
        }
    }

    /// Elastic copy of the live model solved for minimum total violation.
    /// Diagnostic only; the live model is not modified.
    pub fn relax<S: LpSolver + ?Sized>(&self, solver: &S) -> Result<RelaxationReport, ModelError> {
        solve::relax(solver, &self.problem())
    }

    /// Model-unit results for an arbitrary assignment, e.g. one read back
    /// from an external solver run.
    pub fn extract(&self, values: &[f64]) -> Result<FlowResults, ModelError> {
        results::extract(&self.rules(), values)
    }
}
