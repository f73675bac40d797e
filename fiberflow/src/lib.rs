use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod config;
pub mod model;
pub mod results;
pub mod scenario;
pub mod solve;

#[cfg(test)]
pub(crate) mod testkit;

pub use config::{RunConfig, SolverConfig};
pub use model::{Constraint, FiberModel, GroupId, LinearExpr, LpProblem, ModelError, Sense, VarId, VarKey};
pub use results::{FlowResults, Unit};
pub use scenario::{Degradation, RecoverySystem, ScenarioOutcome, ScenarioState};
pub use solve::{GoodLpSolver, LpSolver, RelaxationReport, ScipSolver, SolveReport, SolveStatus};

/// Two-level lookup table: row -> column -> value.
pub type Table = BTreeMap<String, BTreeMap<String, f64>>;

pub(crate) fn table_get(table: &Table, row: &str, col: &str) -> Option<f64> {
    table.get(row).and_then(|r| r.get(col)).copied()
}

/// Recovered fiber grade category. Drives mixed-paper yield loss and the
/// per-category degradation bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FiberCategory {
    Subs,
    High,
    Corrugated,
    Mixed,
    News,
}

impl FiberCategory {
    pub fn all() -> [FiberCategory; 5] {
        [
            FiberCategory::Subs,
            FiberCategory::High,
            FiberCategory::Corrugated,
            FiberCategory::Mixed,
            FiberCategory::News,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FiberCategory::Subs => "SUBS",
            FiberCategory::High => "HIGH",
            FiberCategory::Corrugated => "CORRUGATED",
            FiberCategory::Mixed => "MIXED",
            FiberCategory::News => "NEWS",
        }
    }

    /// Fraction of fiber lost to degradation, as a `[low, high)` interval.
    pub fn degradation_bounds(&self) -> (f64, f64) {
        match self {
            FiberCategory::Subs => (0.125, 0.135),
            FiberCategory::High => (0.135, 0.15),
            FiberCategory::Corrugated => (0.15, 0.17),
            FiberCategory::Mixed => (0.17, 0.20),
            FiberCategory::News => (0.20, 0.25),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveredFiber {
    pub code: String,
    pub category: FiberCategory,
    /// Domestic price ($/short ton).
    pub price: f64,
    pub export_price: f64,
    /// Baseline export volume; also the export ceiling.
    pub export_old: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VirginFiber {
    pub code: String,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PulpKind {
    /// Pulped in the same mill that makes the product.
    #[default]
    Integrated,
    /// Bought on the market (deinked pulp on the recovered side).
    Market,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pulp {
    pub name: String,
    #[serde(default)]
    pub kind: PulpKind,
    /// Production cost ($/short ton).
    pub cost: f64,
    /// Pulp-to-product yield.
    pub pulp_yield: f64,
    /// Production capacity; `None` is uncapped.
    #[serde(default)]
    pub capacity: Option<f64>,
    /// Recipe shares are exact rather than bounded.
    #[serde(default)]
    pub exact_recipe: bool,
}

/// How a product's average recycled content is constrained in the base case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecycledContentPolicy {
    /// Capped at the baseline average; free to go lower.
    #[default]
    Floating,
    /// Held exactly at the baseline average.
    Pinned,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub cost: f64,
    pub old_rate: f64,
    pub max_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub policy: RecycledContentPolicy,
    /// Recycled-content levels, ascending, each in [0, 1].
    pub levels: Vec<f64>,
    pub old_demand: Vec<f64>,
    pub min_demand: Vec<f64>,
    pub max_demand: Vec<f64>,
    pub domestic_consumption: f64,
    pub non_fiber_fraction: f64,
    /// Share of consumption passing through each waste source.
    pub source_share: BTreeMap<String, f64>,
    pub collection: BTreeMap<String, Collection>,
    /// Recovered fiber -> source -> share of the collected product ending up as that fiber.
    pub recovery_share: Table,
    /// Minimum use of market pulps.
    #[serde(default)]
    pub min_pulp: BTreeMap<String, f64>,
    /// Pulp -> maximum use per recycled-content level.
    pub max_pulp_use: BTreeMap<String, Vec<f64>>,
}

impl Product {
    /// Demand-weighted baseline recycled content.
    pub fn baseline_average(&self) -> f64 {
        let total: f64 = self.old_demand.iter().sum();
        let weighted: f64 = self
            .levels
            .iter()
            .zip(&self.old_demand)
            .map(|(r, d)| r * d)
            .sum();
        weighted / total
    }

    pub fn old_demand_total(&self) -> f64 {
        self.old_demand.iter().sum()
    }

    /// Volume consumed through `source`.
    pub fn consumed(&self, source: &str) -> Option<f64> {
        self.source_share
            .get(source)
            .map(|share| share * self.domestic_consumption)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub name: String,
    pub channel_yield: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContaminationSettings {
    pub affected_sources: Vec<String>,
    /// Observed contamination rates the stochastic draw is fitted to.
    pub literature_rates: Vec<f64>,
}

impl Default for ContaminationSettings {
    fn default() -> Self {
        Self {
            affected_sources: vec!["Residential".into(), "Retail".into()],
            literature_rates: vec![0.272, 0.17, 0.19, 0.24],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ChannelVolumes {
    pub consumption: f64,
    pub collection: f64,
    pub recovery: f64,
}

impl ChannelVolumes {
    pub fn scaled(&self, k: f64) -> Self {
        Self {
            consumption: self.consumption * k,
            collection: self.collection * k,
            recovery: self.recovery * k,
        }
    }
}

/// Pre-scenario volumes used for differencing downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Baseline {
    #[serde(default)]
    pub fiber_to_pulp: Table,
    #[serde(default)]
    pub pulp_to_product: Table,
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelVolumes>,
    /// Recovered fiber -> baseline export. Filled from the fiber table on extraction.
    #[serde(default)]
    pub export: BTreeMap<String, f64>,
    /// Product -> baseline demand per recycled-content level. Filled on extraction.
    #[serde(default)]
    pub demand: BTreeMap<String, Vec<f64>>,
}

fn default_non_fiber_yield() -> f64 {
    0.99
}

/// Every numeric input of the model, keyed by grade, pulp, product and source names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterStore {
    pub recovered_fibers: Vec<RecoveredFiber>,
    #[serde(default)]
    pub virgin_fibers: Vec<VirginFiber>,
    pub recovered_pulps: Vec<Pulp>,
    #[serde(default)]
    pub virgin_pulps: Vec<Pulp>,
    pub products: Vec<Product>,
    pub sources: Vec<Source>,
    /// Fiber -> pulp yield, recovered and virgin fibers alike.
    pub fiber_to_pulp_yield: Table,
    /// Fiber -> pulp exact recipe share.
    #[serde(default)]
    pub recipe_yield: Table,
    pub recipe_min: Table,
    pub recipe_max: Table,
    #[serde(default = "default_non_fiber_yield")]
    pub non_fiber_yield: f64,
    #[serde(default)]
    pub contamination: ContaminationSettings,
    #[serde(default)]
    pub baseline: Baseline,
}

impl ParameterStore {
    pub fn product(&self, name: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.name == name)
    }

    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn product_names(&self) -> Vec<String> {
        self.products.iter().map(|p| p.name.clone()).collect()
    }
}
