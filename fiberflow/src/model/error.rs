//! Error type shared by model construction, scenario mutation and solving.
//!
//! Infeasibility is not an error: it is reported through
//! [`SolveStatus`](crate::solve::SolveStatus).

use crate::model::GroupId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// Parameter tables do not line up with the declared index sets.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A rule referenced an index with no parameter value.
    #[error("cannot build `{group}`: no value for {missing}")]
    ConstraintBuild { group: &'static str, missing: String },
    /// A mutation targeted a group that is not installed.
    #[error("constraint group `{}` is not installed", .0.label())]
    GroupNotFound(GroupId),
    /// Scenario parameter out of domain; the model was left untouched.
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
    /// The solver backend itself failed (not an infeasible model).
    #[error("solver `{solver}` failed: {detail}")]
    Solver { solver: &'static str, detail: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    pub(crate) fn missing(group: GroupId, missing: impl Into<String>) -> Self {
        ModelError::ConstraintBuild {
            group: group.label(),
            missing: missing.into(),
        }
    }
}
