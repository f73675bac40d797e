//! Solver seam: backends take a flat [`LpProblem`] and return a status with
//! one value per variable.

mod native;
mod relax;
mod scip;

pub use native::GoodLpSolver;
pub use relax::{relax, RelaxationReport, Violation};
pub use scip::{parse_scip_sol, ScipSol, ScipSolver};

use crate::model::{LpProblem, ModelError};
use crate::results::FlowResults;
use serde::Serialize;
use tracing::{debug, warn};

/// Tolerance for rows that carry no variable after normalization.
const SCREEN_TOL: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Other,
}

/// Raw backend answer. `values` is indexed by `VarId` and only filled when optimal.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub status: SolveStatus,
    pub values: Vec<f64>,
}

impl Solution {
    pub fn without_values(status: SolveStatus) -> Self {
        Solution { status, values: vec![] }
    }
}

pub trait LpSolver {
    fn name(&self) -> &'static str;

    /// Solve with every variable bounded below by zero.
    fn solve_lp(&self, lp: &LpProblem) -> Result<Solution, ModelError>;
}

impl<T: LpSolver + ?Sized> LpSolver for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn solve_lp(&self, lp: &LpProblem) -> Result<Solution, ModelError> {
        (**self).solve_lp(lp)
    }
}

/// Outcome of [`FiberModel::solve`](crate::FiberModel::solve).
#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    pub status: SolveStatus,
    /// Weighted cost, including the constant export term.
    pub objective: Option<f64>,
    /// Extracted flows in reporting units; `None` unless optimal.
    pub flows: Option<FlowResults>,
}

impl SolveReport {
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}

/// Drop rows without variables before the backend sees them. A violated
/// one makes the whole problem infeasible.
pub(crate) fn solve_screened<S: LpSolver + ?Sized>(solver: &S, lp: &LpProblem) -> Result<Solution, ModelError> {
    let mut screened = LpProblem {
        var_names: lp.var_names.clone(),
        objective: lp.objective.clone(),
        sense: lp.sense,
        constraints: Vec::with_capacity(lp.constraints.len()),
    };
    for c in &lp.constraints {
        if !c.expr().is_constant() {
            screened.constraints.push(c.clone());
            continue;
        }
        if !c.sense().holds(0.0, c.rhs(), SCREEN_TOL) {
            warn!(row = c.name(), group = %c.group(), rhs = c.rhs(), "row without variables cannot hold");
            return Ok(Solution::without_values(SolveStatus::Infeasible));
        }
        debug!(row = c.name(), "dropping trivially satisfied row");
    }

    let solution = solver.solve_lp(&screened)?;
    if solution.status == SolveStatus::Optimal && solution.values.len() != lp.num_vars() {
        return Err(ModelError::Solver {
            solver: solver.name(),
            detail: format!("{} values for {} variables", solution.values.len(), lp.num_vars()),
        });
    }
    Ok(solution)
}
