use crate::{FiberCategory, RecoveredFiber};
use serde::Serialize;
use std::collections::BTreeMap;

/// Working copy of recovered fiber-to-pulp yield losses.
///
/// The two degradation kinds are stored separately and multiplied together,
/// so a mixed-paper loss and a fiber degradation compose, while repeating
/// either one replaces its own earlier setting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct YieldOverlay {
    /// Percent yield lost by MIXED-category fibers.
    pub mixed_paper_loss: Option<f64>,
    /// Fraction of fiber lost per category.
    pub degradation: BTreeMap<FiberCategory, f64>,
}

impl YieldOverlay {
    /// Multiplier applied to every baseline yield of `fiber`.
    pub fn factor(&self, fiber: &RecoveredFiber) -> f64 {
        let mut k = 1.0;
        if fiber.category == FiberCategory::Mixed {
            if let Some(pct) = self.mixed_paper_loss {
                k *= 1.0 - pct / 100.0;
            }
        }
        if let Some(loss) = self.degradation.get(&fiber.category) {
            k *= 1.0 - loss;
        }
        k
    }

    pub fn is_empty(&self) -> bool {
        self.mixed_paper_loss.is_none() && self.degradation.is_empty()
    }
}

/// Collection-yield adjustment on the contamination-affected sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContaminationOverlay {
    pub sources: Vec<String>,
    pub multiplier: f64,
    /// Cap adjusted yields at 1 (dual-stream recovery can push them above).
    pub cap_at_one: bool,
}

impl ContaminationOverlay {
    pub fn apply(&self, source: &str, base: f64) -> f64 {
        if !self.sources.iter().any(|s| s == source) {
            return base;
        }
        let v = base * self.multiplier;
        if self.cap_at_one {
            v.min(1.0)
        } else {
            v
        }
    }
}

/// Everything a scenario can change. Mutable groups are a pure function of
/// the parameter store and this state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioState {
    pub yields: YieldOverlay,
    pub contamination: Option<ContaminationOverlay>,
    /// Product -> percent change of domestic consumption.
    pub demand_change: BTreeMap<String, f64>,
    /// Product -> recycled-content increase in percentage points.
    pub recycled_targets: BTreeMap<String, f64>,
}

impl ScenarioState {
    pub fn is_baseline(&self) -> bool {
        *self == ScenarioState::default()
    }

    pub fn demand_factor(&self, product: &str) -> f64 {
        1.0 + self.demand_change.get(product).copied().unwrap_or(0.0) / 100.0
    }
}
