use crate::model::{Constraint, GroupId, LinearExpr, LpProblem, ModelError, ObjSense, Sense};
use crate::solve::{LpSolver, SolveStatus};
use serde::Serialize;
use tracing::info;

const REPORT_TOL: f64 = 1e-6;

/// A row that only holds once its slack is opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub constraint: String,
    pub group: GroupId,
    /// `ArtP_*` raises the row's left-hand side, `ArtN_*` lowers it.
    pub slack: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelaxationReport {
    pub status: SolveStatus,
    pub total_violation: f64,
    pub violations: Vec<Violation>,
}

impl RelaxationReport {
    /// Groups that carry at least one violation, in group order.
    pub fn groups(&self) -> Vec<GroupId> {
        let mut g: Vec<_> = self.violations.iter().map(|v| v.group).collect();
        g.sort();
        g.dedup();
        g
    }
}

/// Elastic copy of `lp`: every row gets a penalized slack in each direction it
/// can be violated, and the objective becomes the total slack.
fn elastic(lp: &LpProblem) -> (LpProblem, Vec<(usize, String)>) {
    let mut out = LpProblem {
        var_names: lp.var_names.clone(),
        objective: LinearExpr::zero(),
        sense: ObjSense::Minimize,
        constraints: Vec::with_capacity(lp.constraints.len()),
    };
    // (row, slack name) per slack variable, in VarId order after the originals
    let mut owners = vec![];

    for (k, c) in lp.constraints.iter().enumerate() {
        let mut expr = c.expr().clone();
        if matches!(c.sense(), Sense::Ge | Sense::Eq) {
            let name = format!("ArtP_{k}");
            let s = out.push_var(name.clone());
            expr.add_term(s, 1.0);
            out.objective.add_term(s, 1.0);
            owners.push((k, name));
        }
        if matches!(c.sense(), Sense::Le | Sense::Eq) {
            let name = format!("ArtN_{k}");
            let s = out.push_var(name.clone());
            expr.add_term(s, -1.0);
            out.objective.add_term(s, 1.0);
            owners.push((k, name));
        }
        out.constraints.push(Constraint::new(
            c.group(),
            c.name().to_string(),
            expr,
            c.sense(),
            LinearExpr::from_const(c.rhs()),
        ));
    }
    (out, owners)
}

/// Solve the elastic copy of `lp` and report every slack that had to open.
/// `lp` itself is left as is.
pub fn relax<S: LpSolver + ?Sized>(solver: &S, lp: &LpProblem) -> Result<RelaxationReport, ModelError> {
    let (elastic, owners) = elastic(lp);
    let sol = solver.solve_lp(&elastic)?;
    if sol.status != SolveStatus::Optimal {
        return Ok(RelaxationReport {
            status: sol.status,
            total_violation: 0.0,
            violations: vec![],
        });
    }

    let first_slack = lp.num_vars();
    let mut violations = vec![];
    for (n, (row, slack)) in owners.into_iter().enumerate() {
        let amount = sol.values.get(first_slack + n).copied().unwrap_or(0.0);
        if amount > REPORT_TOL {
            let c = &lp.constraints[row];
            violations.push(Violation {
                constraint: c.name().to_string(),
                group: c.group(),
                slack,
                amount,
            });
        }
    }
    let total_violation = violations.iter().map(|v| v.amount).sum();
    info!(violations = violations.len(), total_violation, "relaxation solved");
    Ok(RelaxationReport {
        status: SolveStatus::Optimal,
        total_violation,
        violations,
    })
}
