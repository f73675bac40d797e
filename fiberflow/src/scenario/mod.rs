//! Scenario operations on a built [`FiberModel`].
//!
//! Each operation validates its parameters, derives a candidate
//! [`ScenarioState`], rebuilds the groups it owns from that state and only
//! then swaps them in. A failing operation leaves the model as it was.
//!
//! | operation | groups replaced |
//! |---|---|
//! | recycled-content targets | max demand, pinned, ceiling, target |
//! | mixed-paper yield, fiber degradation | recovered pulp inflow, recovered recipe min/max/exact |
//! | demand change | total demand |
//! | collection contamination | recovered fiber availability |
//! | reset | every mutable group |

mod sampling;
mod state;

pub use sampling::{sample_contamination, sample_degradation};
pub use state::{ContaminationOverlay, ScenarioState, YieldOverlay};

use crate::model::{FiberModel, GroupId, ModelError};
use crate::{FiberCategory, RecycledContentPolicy};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::info;

const TARGET_GROUPS: [GroupId; 4] = [
    GroupId::MaxDemand,
    GroupId::RecycledContentPinned,
    GroupId::RecycledContentCeiling,
    GroupId::RecycledContentTarget,
];

const YIELD_GROUPS: [GroupId; 4] = [
    GroupId::RecoveredPulpInflow,
    GroupId::RecoveredRecipeMin,
    GroupId::RecoveredRecipeMax,
    GroupId::RecoveredRecipeExact,
];

/// Curbside recovery system behind the contamination scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoverySystem {
    /// Current mix of systems; collection yields are left alone.
    Mix,
    /// Single-stream recovery: yields drop by the contamination rate.
    Ssr,
    /// Dual-stream recovery: yields rise by the contamination rate, capped at 1.
    Dual,
}

impl FromStr for RecoverySystem {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mix" => Ok(RecoverySystem::Mix),
            "ssr" => Ok(RecoverySystem::Ssr),
            "dual" => Ok(RecoverySystem::Dual),
            _ => Err(ModelError::InvalidScenario(format!(
                "unknown recovery system `{s}` (expected mix, ssr or dual)"
            ))),
        }
    }
}

/// How recovered fiber yields degrade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Degradation {
    /// Draw one loss per fiber category within its bounds.
    Sampled,
    /// The same loss fraction, in `(0, 1]`, for every fiber.
    Uniform(f64),
}

/// What an operation changed, plus any values it drew.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub replaced: Vec<GroupId>,
    pub contamination_rate: Option<f64>,
    pub degradation: BTreeMap<FiberCategory, f64>,
}

fn invalid(msg: impl Into<String>) -> ModelError {
    ModelError::InvalidScenario(msg.into())
}

impl FiberModel {
    fn apply_state(&mut self, op: &str, state: ScenarioState, groups: &[GroupId]) -> Result<ScenarioOutcome, ModelError> {
        let replacements = self.rebuild(&state, groups)?;
        self.commit(state, replacements)?;
        info!(model = %self.name, scenario = op, groups = groups.len(), "scenario applied");
        Ok(ScenarioOutcome {
            replaced: groups.to_vec(),
            ..ScenarioOutcome::default()
        })
    }

    fn selected(&self, product: &str) -> Result<usize, ModelError> {
        self.sets
            .product_index(product)
            .ok_or_else(|| invalid(format!("product `{product}` is not in this model")))
    }

    /// Raise the average recycled content of each listed product by the given
    /// percentage points. Earlier targets are replaced; an empty list removes
    /// them all.
    pub fn set_recycled_content_targets(&mut self, targets: &[(&str, f64)]) -> Result<ScenarioOutcome, ModelError> {
        let mut next = self.state.clone();
        next.recycled_targets.clear();
        for &(name, delta) in targets {
            let t = self.selected(name)?;
            let product = &self.params.products[self.sets.product_rows[t]];
            if product.policy == RecycledContentPolicy::Pinned {
                return Err(invalid(format!("product `{name}` has pinned recycled content")));
            }
            if !delta.is_finite() {
                return Err(invalid(format!("target increase for `{name}` is not finite")));
            }
            let share = product.baseline_average() + delta / 100.0;
            if !(0.0..=1.0).contains(&share) {
                return Err(invalid(format!(
                    "target share {share:.4} for `{name}` is outside [0, 1]"
                )));
            }
            next.recycled_targets.insert(name.to_string(), delta);
        }
        self.apply_state("recycled_content_targets", next, &TARGET_GROUPS)
    }

    /// Lower the yield of MIXED-category fibers by `percent`.
    pub fn degrade_mixed_paper_yield(&mut self, percent: f64) -> Result<ScenarioOutcome, ModelError> {
        if !(0.0..100.0).contains(&percent) {
            return Err(invalid(format!("mixed-paper yield loss {percent}% is outside [0, 100)")));
        }
        let mut next = self.state.clone();
        next.yields.mixed_paper_loss = Some(percent);
        self.apply_state("mixed_paper_yield", next, &YIELD_GROUPS)
    }

    /// Lower every recovered fiber yield by a per-category loss, on top of any
    /// mixed-paper loss already in place.
    pub fn degrade_fibers<R: Rng + ?Sized>(
        &mut self,
        degradation: Degradation,
        rng: &mut R,
    ) -> Result<ScenarioOutcome, ModelError> {
        let losses = match degradation {
            Degradation::Uniform(f) => {
                if !(f > 0.0 && f <= 1.0) {
                    return Err(invalid(format!("degradation factor {f} is outside (0, 1]")));
                }
                FiberCategory::all().into_iter().map(|c| (c, f)).collect()
            }
            Degradation::Sampled => sample_degradation(rng),
        };
        let mut next = self.state.clone();
        next.yields.degradation = losses.clone();
        let mut outcome = self.apply_state("fiber_degradation", next, &YIELD_GROUPS)?;
        if degradation == Degradation::Sampled {
            outcome.degradation = losses;
        }
        Ok(outcome)
    }

    /// Scale domestic consumption of the listed products by `1 + percent/100`.
    /// Products not listed go back to their baseline consumption.
    pub fn change_demand(&mut self, changes: &[(&str, f64)]) -> Result<ScenarioOutcome, ModelError> {
        let mut next = self.state.clone();
        next.demand_change.clear();
        for &(name, pct) in changes {
            self.selected(name)?;
            if !pct.is_finite() || pct <= -100.0 {
                return Err(invalid(format!("demand change {pct}% for `{name}` must be finite and above -100%")));
            }
            next.demand_change.insert(name.to_string(), pct);
        }
        self.apply_state("demand_change", next, &[GroupId::TotalDemand])
    }

    /// Adjust collection yields of the contamination-affected sources.
    ///
    /// A `custom_rate` in `(0, 1]` always lowers them by that fraction.
    /// Otherwise the rate is drawn from the literature rates and applied as
    /// `system` dictates.
    pub fn contaminate_collection<R: Rng + ?Sized>(
        &mut self,
        system: &str,
        custom_rate: Option<f64>,
        rng: &mut R,
    ) -> Result<ScenarioOutcome, ModelError> {
        let system: RecoverySystem = system.parse()?;
        if let Some(rate) = custom_rate {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(invalid(format!("contamination rate {rate} is outside (0, 1]")));
            }
        }
        let settings = &self.params.contamination;
        if let Some(s) = settings
            .affected_sources
            .iter()
            .find(|s| !self.sets.sources.contains(s))
        {
            return Err(invalid(format!("affected source `{s}` is not a waste source of this model")));
        }

        let (overlay, sampled) = match (custom_rate, system) {
            (Some(rate), _) => (Some((1.0 - rate, false)), None),
            (None, RecoverySystem::Mix) => (None, None),
            (None, RecoverySystem::Ssr) => {
                let c = sample_contamination(&settings.literature_rates, rng)?;
                (Some((1.0 - c, false)), Some(c))
            }
            (None, RecoverySystem::Dual) => {
                let c = sample_contamination(&settings.literature_rates, rng)?;
                (Some((1.0 + c, true)), Some(c))
            }
        };

        let mut next = self.state.clone();
        next.contamination = overlay.map(|(multiplier, cap_at_one)| ContaminationOverlay {
            sources: settings.affected_sources.clone(),
            multiplier,
            cap_at_one,
        });
        let mut outcome = self.apply_state("contamination", next, &[GroupId::RecoveredFiberAvailability])?;
        outcome.contamination_rate = sampled.or(custom_rate);
        Ok(outcome)
    }

    /// Drop every scenario overlay and rebuild all mutable groups from the
    /// parameter store.
    pub fn reset(&mut self) -> Result<ScenarioOutcome, ModelError> {
        self.apply_state("reset", ScenarioState::default(), &GroupId::MUTABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sense;
    use crate::testkit;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn model() -> FiberModel {
        let params = testkit::two_grade();
        FiberModel::build("scenario", &params, &testkit::products(&params)).unwrap()
    }

    #[test]
    fn test_recovery_system_names() {
        assert_eq!("SSR".parse::<RecoverySystem>().unwrap(), RecoverySystem::Ssr);
        assert_eq!("dual".parse::<RecoverySystem>().unwrap(), RecoverySystem::Dual);
        assert!(matches!(
            "single".parse::<RecoverySystem>(),
            Err(ModelError::InvalidScenario(_))
        ));
    }

    #[test]
    fn test_targets_reject_pinned_and_unknown() {
        let mut m = model();
        let before = m.graph().clone();
        assert!(matches!(
            m.set_recycled_content_targets(&[("News", 5.0)]),
            Err(ModelError::InvalidScenario(_))
        ));
        assert!(matches!(
            m.set_recycled_content_targets(&[("Tissue", 5.0)]),
            Err(ModelError::InvalidScenario(_))
        ));
        // baseline 50% + 60 points
        assert!(m.set_recycled_content_targets(&[("Board", 60.0)]).is_err());
        assert_eq!(m.graph(), &before);
        assert!(m.state().is_baseline());
    }

    #[test]
    fn test_targets_replace_previous_set() {
        let mut m = model();
        let out = m.set_recycled_content_targets(&[("Board", 5.0)]).unwrap();
        assert_eq!(out.replaced, TARGET_GROUPS.to_vec());
        let floor = m.constraints(GroupId::RecycledContentTarget).unwrap();
        assert_eq!(floor.len(), 1);
        assert_eq!(floor[0].sense(), Sense::Ge);
        m.set_recycled_content_targets(&[]).unwrap();
        assert!(m.constraints(GroupId::RecycledContentTarget).unwrap().is_empty());
        assert_eq!(m.constraints(GroupId::RecycledContentCeiling).unwrap().len(), 1);
    }

    #[test]
    fn test_yield_losses_compose_and_repeat_idempotently() {
        let mut m = model();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        m.degrade_mixed_paper_yield(10.0).unwrap();
        let once = m.graph().clone();
        m.degrade_mixed_paper_yield(10.0).unwrap();
        assert_eq!(m.graph(), &once);

        m.degrade_fibers(Degradation::Uniform(0.1), &mut rng).unwrap();
        let mix = &m.params.recovered_fibers[1];
        let occ = &m.params.recovered_fibers[0];
        assert!((m.state().yields.factor(mix) - 0.81).abs() < 1e-12);
        assert!((m.state().yields.factor(occ) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_sampled_degradation_is_reported() {
        let mut m = model();
        let out = m
            .degrade_fibers(Degradation::Sampled, &mut ChaCha8Rng::seed_from_u64(9))
            .unwrap();
        assert_eq!(out.degradation.len(), 5);
        assert_eq!(out.degradation, m.state().yields.degradation);
    }

    #[test]
    fn test_degradation_domain() {
        let mut m = model();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(m.degrade_fibers(Degradation::Uniform(0.0), &mut rng).is_err());
        assert!(m.degrade_fibers(Degradation::Uniform(1.5), &mut rng).is_err());
        assert!(m.degrade_mixed_paper_yield(100.0).is_err());
        assert!(m.degrade_mixed_paper_yield(-1.0).is_err());
        assert!(m.state().is_baseline());
    }

    #[test]
    fn test_demand_change_domain() {
        let mut m = model();
        assert!(m.change_demand(&[("Board", -100.0)]).is_err());
        assert!(m.change_demand(&[("Board", f64::NAN)]).is_err());
        assert!(m.change_demand(&[("Tissue", 5.0)]).is_err());
        m.change_demand(&[("Board", 10.0)]).unwrap();
        let rows = m.constraints(GroupId::TotalDemand).unwrap();
        assert!((rows[0].rhs() - 4.4).abs() < 1e-12);
        assert!((rows[1].rhs() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_contamination_rates() {
        let mut m = model();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let before = m.graph().clone();
        assert!(m.contaminate_collection("ssr", Some(1.5), &mut rng).is_err());
        assert!(m.contaminate_collection("ssr", Some(0.0), &mut rng).is_err());
        assert!(m.contaminate_collection("triple", None, &mut rng).is_err());
        assert_eq!(m.graph(), &before);

        let out = m.contaminate_collection("mix", Some(0.25), &mut rng).unwrap();
        assert_eq!(out.contamination_rate, Some(0.25));
        assert_eq!(m.state().contamination.as_ref().map(|c| c.multiplier), Some(0.75));

        let out = m.contaminate_collection("mix", None, &mut rng).unwrap();
        assert_eq!(out.contamination_rate, None);
        assert!(m.state().contamination.is_none());
        assert_eq!(m.graph(), &before);
    }

    #[test]
    fn test_contamination_unknown_source() {
        let mut params = testkit::two_grade();
        params.contamination.affected_sources = vec!["Retail".into()];
        let mut m = FiberModel::build("c", &params, &testkit::products(&params)).unwrap();
        let err = m
            .contaminate_collection("ssr", None, &mut ChaCha8Rng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidScenario(_)), "{err}");
    }

    #[test]
    fn test_missing_group_aborts_whole_operation() {
        let mut m = model();
        m.remove_group(GroupId::RecoveredRecipeExact).unwrap();
        let before = m.graph().clone();
        let err = m.degrade_mixed_paper_yield(10.0).unwrap_err();
        assert!(matches!(err, ModelError::GroupNotFound(GroupId::RecoveredRecipeExact)));
        assert_eq!(m.graph(), &before);
        assert!(m.state().is_baseline());
    }

    #[test]
    fn test_reset_restores_base_graph() {
        let mut m = model();
        let base = m.graph().clone();
        m.set_recycled_content_targets(&[("Board", 5.0)]).unwrap();
        m.degrade_mixed_paper_yield(20.0).unwrap();
        m.change_demand(&[("News", -5.0)]).unwrap();
        m.contaminate_collection("dual", None, &mut ChaCha8Rng::seed_from_u64(2))
            .unwrap();
        assert_ne!(m.graph(), &base);
        let out = m.reset().unwrap();
        assert_eq!(out.replaced, GroupId::MUTABLE.to_vec());
        assert_eq!(m.graph(), &base);
        assert!(m.state().is_baseline());
    }
}
