use crate::model::{emit_lp, LpProblem, ModelError};
use crate::solve::{LpSolver, Solution, SolveStatus};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, error};

/// Runs the `scip` executable on an LP file and reads back its `.sol` file.
#[derive(Debug, Clone)]
pub struct ScipSolver {
    pub bin: PathBuf,
    /// Parent of the scratch directory each solve writes its `.lp` and
    /// `.sol` files into; the scratch directory is removed afterwards.
    pub work_dir: PathBuf,
}

impl Default for ScipSolver {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ScipSolver {
    /// `SCIP_BIN` if set, otherwise `scip` from `PATH`; files go to the temp dir.
    pub fn from_env() -> Self {
        let bin = std::env::var("SCIP_BIN").unwrap_or_else(|_| "scip".to_string());
        ScipSolver {
            bin: PathBuf::from(bin),
            work_dir: std::env::temp_dir(),
        }
    }

    fn fail(&self, detail: impl Into<String>) -> ModelError {
        ModelError::Solver {
            solver: "scip",
            detail: detail.into(),
        }
    }
}

impl LpSolver for ScipSolver {
    fn name(&self) -> &'static str {
        "scip"
    }

    fn solve_lp(&self, lp: &LpProblem) -> Result<Solution, ModelError> {
        // dropped (and deleted) on every return path
        let scratch = tempfile::Builder::new()
            .prefix("fiberflow-")
            .tempdir_in(&self.work_dir)?;
        let lp_path = scratch.path().join("problem.lp");
        let sol_path = scratch.path().join("problem.sol");
        std::fs::write(&lp_path, emit_lp(lp))?;

        let mut child = Command::new(&self.bin)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                self.fail(format!(
                    "cannot spawn `{}`: {e} (install SCIP or set SCIP_BIN)",
                    self.bin.display()
                ))
            })?;

        let cmds = format!(
            "read {}\nset write printzeros TRUE\noptimize\nwrite solution {}\nquit\n",
            lp_path.display(),
            sol_path.display()
        );
        child
            .stdin
            .as_mut()
            .ok_or_else(|| self.fail("stdin not captured"))?
            .write_all(cmds.as_bytes())?;

        let out = child.wait_with_output()?;
        if !out.status.success() {
            error!(
                status = %out.status,
                stdout = %String::from_utf8_lossy(&out.stdout),
                stderr = %String::from_utf8_lossy(&out.stderr),
                "scip exited with failure"
            );
            return Err(self.fail(format!("exited with {}", out.status)));
        }

        let text = std::fs::read_to_string(&sol_path)
            .map_err(|e| self.fail(format!("cannot read `{}`: {e}", sol_path.display())))?;
        let sol = parse_scip_sol(&text);
        debug!(status = ?sol.status, objective = ?sol.objective, "read scip solution");

        let status = match sol.status.as_deref() {
            Some(s) if s.contains("infeasible") => SolveStatus::Infeasible,
            Some(s) if s.contains("optimal") => SolveStatus::Optimal,
            _ => SolveStatus::Other,
        };
        if status != SolveStatus::Optimal {
            return Ok(Solution::without_values(status));
        }
        let values = lp
            .var_names()
            .iter()
            .map(|n| sol.values.get(n).copied().unwrap_or(0.0))
            .collect();
        Ok(Solution { status, values })
    }
}

/// Contents of a SCIP `.sol` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScipSol {
    /// Text after `solution status:`.
    pub status: Option<String>,
    pub objective: Option<f64>,
    pub values: HashMap<String, f64>,
}

/// Parse a SCIP `.sol` file.
/// - ignores comments
/// - parses status and objective value if present
/// - parses "<var> <value>" assignments
pub fn parse_scip_sol(sol: &str) -> ScipSol {
    let mut out = ScipSol::default();

    for line in sol.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("solution status:") {
            out.status = Some(rest.trim().to_string());
            continue;
        }
        if let Some(rest) = line
            .strip_prefix("objective value:")
            .or_else(|| line.strip_prefix("objective value ="))
        {
            out.objective = rest.trim().parse::<f64>().ok();
            continue;
        }

        let mut it = line.split_whitespace();
        let Some(name) = it.next() else { continue };
        let Some(val) = it.next() else { continue };
        if let Ok(v) = val.parse::<f64>() {
            out.values.insert(name.to_string(), v);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optimal_sol() {
        let text = "solution status: optimal solution found\n\
                    objective value:                                   50\n\
                    rFiber2Pulp__F__P                                   5 \t(obj:10)\n\
                    rResidue__F                                         0 \t(obj:0)\n";
        let sol = parse_scip_sol(text);
        assert_eq!(sol.status.as_deref(), Some("optimal solution found"));
        assert_eq!(sol.objective, Some(50.0));
        assert_eq!(sol.values["rFiber2Pulp__F__P"], 5.0);
        assert_eq!(sol.values["rResidue__F"], 0.0);
    }

    #[test]
    fn test_parse_infeasible_sol() {
        let sol = parse_scip_sol("solution status: infeasible\nno solution available\n");
        assert_eq!(sol.status.as_deref(), Some("infeasible"));
        assert!(sol.values.is_empty());
        assert_eq!(sol.objective, None);
    }

    fn empty_lp() -> LpProblem {
        LpProblem {
            var_names: vec!["x".into()],
            objective: crate::model::LinearExpr::zero(),
            sense: crate::model::ObjSense::Minimize,
            constraints: vec![],
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_scratch_files_are_removed() {
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = tempfile::tempdir().unwrap();
        let bin = bin_dir.path().join("scip");
        std::fs::write(
            &bin,
            "#!/bin/sh\n\
             while read -r a b c; do\n\
               if [ \"$a $b\" = \"write solution\" ]; then echo 'solution status: infeasible' > \"$c\"; fi\n\
             done\n",
        )
        .unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let work = tempfile::tempdir().unwrap();
        let solver = ScipSolver {
            bin,
            work_dir: work.path().to_path_buf(),
        };
        for _ in 0..3 {
            let sol = solver.solve_lp(&empty_lp()).unwrap();
            assert_eq!(sol.status, SolveStatus::Infeasible);
        }
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);

        let failing = ScipSolver {
            bin: PathBuf::from("/nonexistent/scip-binary"),
            work_dir: work.path().to_path_buf(),
        };
        assert!(failing.solve_lp(&empty_lp()).is_err());
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_binary_is_solver_error() {
        let solver = ScipSolver {
            bin: PathBuf::from("/nonexistent/scip-binary"),
            work_dir: std::env::temp_dir(),
        };
        let err = solver.solve_lp(&empty_lp()).unwrap_err();
        assert!(matches!(err, ModelError::Solver { solver: "scip", .. }), "{err}");
    }
}
