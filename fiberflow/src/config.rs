//! Run and solver configuration, and loading of parameter stores.

use crate::model::ModelError;
use crate::solve::{GoodLpSolver, LpSolver, ScipSolver};
use crate::ParameterStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum SolverConfig {
    /// In-process `good_lp`.
    #[default]
    Native,
    /// External `scip` executable.
    Scip {
        #[serde(default)]
        bin: Option<PathBuf>,
        #[serde(default)]
        work_dir: Option<PathBuf>,
    },
}

impl SolverConfig {
    /// SCIP when `SCIP_BIN` is set, the native backend otherwise.
    pub fn from_env() -> Self {
        match std::env::var_os("SCIP_BIN") {
            Some(bin) => SolverConfig::Scip {
                bin: Some(PathBuf::from(bin)),
                work_dir: None,
            },
            None => SolverConfig::Native,
        }
    }

    pub fn build(&self) -> Box<dyn LpSolver> {
        match self {
            SolverConfig::Native => Box::new(GoodLpSolver),
            SolverConfig::Scip { bin, work_dir } => {
                let mut scip = ScipSolver::from_env();
                if let Some(bin) = bin {
                    scip.bin = bin.clone();
                }
                if let Some(dir) = work_dir {
                    scip.work_dir = dir.clone();
                }
                Box::new(scip)
            }
        }
    }
}

fn default_name() -> String {
    "base".to_string()
}

/// One model run: which products to build over and how to solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Selected products; empty selects every product in the store.
    #[serde(default)]
    pub products: Vec<String>,
    /// Seed for scenario sampling.
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub solver: SolverConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            name: default_name(),
            products: vec![],
            seed: 0,
            solver: SolverConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The explicit selection, or all products of `params` in store order.
    pub fn products_for(&self, params: &ParameterStore) -> Vec<String> {
        if self.products.is_empty() {
            params.product_names()
        } else {
            self.products.clone()
        }
    }
}

impl ParameterStore {
    pub fn from_json_str(text: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_config_tags() {
        let native: SolverConfig = serde_json::from_str(r#"{"backend":"native"}"#).unwrap();
        assert_eq!(native, SolverConfig::Native);
        let scip: SolverConfig = serde_json::from_str(r#"{"backend":"scip","bin":"/opt/scip/bin/scip"}"#).unwrap();
        assert_eq!(
            scip,
            SolverConfig::Scip {
                bin: Some(PathBuf::from("/opt/scip/bin/scip")),
                work_dir: None
            }
        );
        assert_eq!(scip.build().name(), "scip");
        assert_eq!(native.build().name(), "good_lp");
    }

    #[test]
    fn test_run_config_defaults() {
        let cfg: RunConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RunConfig::default());
        let params = crate::testkit::two_grade();
        assert_eq!(cfg.products_for(&params), vec!["Board", "News"]);
    }

    #[test]
    fn test_bad_store_is_json_error() {
        let err = ParameterStore::from_json_str("{\"products\": 3}").unwrap_err();
        assert!(matches!(err, ModelError::Json(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RunConfig::from_path("/nonexistent/fiberflow-run.json").unwrap_err();
        assert!(matches!(err, ModelError::Io(_)));
    }
}
