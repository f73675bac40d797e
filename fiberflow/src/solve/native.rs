use crate::model::{LinearExpr, LpProblem, ModelError, ObjSense, Sense};
use crate::solve::{LpSolver, Solution, SolveStatus};
use good_lp::variable::ProblemVariables;
use good_lp::{
    constraint, default_solver, variable, Expression, ResolutionError, Solution as _, SolverModel, Variable,
};
use tracing::debug;

/// In-process backend on `good_lp` (pure-Rust `microlp` by default).
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver;

fn expression(e: &LinearExpr, vars: &[Variable]) -> Expression {
    let mut out = Expression::default();
    for (v, c) in e.terms() {
        out += vars[v.index()] * c;
    }
    out
}

impl LpSolver for GoodLpSolver {
    fn name(&self) -> &'static str {
        "good_lp"
    }

    fn solve_lp(&self, lp: &LpProblem) -> Result<Solution, ModelError> {
        let mut pv = ProblemVariables::new();
        let vars: Vec<Variable> = (0..lp.num_vars()).map(|_| pv.add(variable().min(0))).collect();
        let objective = expression(lp.objective(), &vars);

        let rows = lp.constraints().iter().map(|c| {
            let lhs = expression(c.expr(), &vars);
            match c.sense() {
                Sense::Le => constraint::leq(lhs, c.rhs()),
                Sense::Ge => constraint::geq(lhs, c.rhs()),
                Sense::Eq => constraint::eq(lhs, c.rhs()),
            }
        });
        let model = match lp.sense() {
            ObjSense::Minimize => pv.minimise(objective),
            ObjSense::Maximize => pv.maximise(objective),
        }
        .using(default_solver)
        .with_all(rows);

        debug!(vars = vars.len(), rows = lp.constraints().len(), "handing problem to good_lp");
        match model.solve() {
            Ok(sol) => Ok(Solution {
                status: SolveStatus::Optimal,
                values: vars.iter().map(|v| sol.value(*v)).collect(),
            }),
            Err(ResolutionError::Infeasible) => Ok(Solution::without_values(SolveStatus::Infeasible)),
            Err(ResolutionError::Unbounded) => Ok(Solution::without_values(SolveStatus::Other)),
            Err(e) => Err(ModelError::Solver {
                solver: self.name(),
                detail: e.to_string(),
            }),
        }
    }
}
