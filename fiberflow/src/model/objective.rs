use crate::model::builder::Rules;
use crate::model::error::ModelError;
use crate::model::linear::LinearExpr;
use crate::model::vars::VarKey;
use crate::model::{OBJECTIVE_WEIGHT, UNIT_SCALE};
use crate::PulpKind;

fn unknown(missing: String) -> ModelError {
    ModelError::ConstraintBuild {
        group: "objective",
        missing,
    }
}

/// Weighted total cost. Built once per model; scenarios never touch it.
///
/// Volumes are in million short tons and prices per short ton, hence the
/// unit factor on every volume term. Collection deltas are rates and are
/// priced against the consumed volume directly.
pub(crate) fn build_objective(rules: &Rules<'_>) -> Result<LinearExpr, ModelError> {
    let w = OBJECTIVE_WEIGHT;
    let u = UNIT_SCALE;
    let params = rules.params;
    let sets = rules.sets;
    let var = |key: VarKey| rules.vars.id(key).ok_or_else(|| unknown(format!("variable {key:?}")));
    let mut obj = LinearExpr::zero();

    // fiber purchase; market pulp is priced through its pulp cost
    for (p, pulp) in params.recovered_pulps.iter().enumerate() {
        if pulp.kind == PulpKind::Market {
            continue;
        }
        for (i, fiber) in params.recovered_fibers.iter().enumerate() {
            obj.add_term(var(VarKey::RecoveredFiberToPulp { fiber: i, pulp: p })?, fiber.price * w * u);
        }
    }
    for (q, pulp) in params.virgin_pulps.iter().enumerate() {
        if pulp.kind == PulpKind::Market {
            continue;
        }
        for (j, fiber) in params.virgin_fibers.iter().enumerate() {
            obj.add_term(var(VarKey::VirginFiberToPulp { fiber: j, pulp: q })?, fiber.price * w * u);
        }
    }

    // pulp production
    for (r, t) in sets.demand_arcs() {
        for (p, pulp) in params.recovered_pulps.iter().enumerate() {
            let key = VarKey::RecoveredPulpToProduct { pulp: p, level: r, product: t };
            obj.add_term(var(key)?, pulp.cost * w * u);
        }
        for (q, pulp) in params.virgin_pulps.iter().enumerate() {
            let key = VarKey::VirginPulpToProduct { pulp: q, level: r, product: t };
            obj.add_term(var(key)?, pulp.cost * w * u);
        }
    }

    // incremental collection
    for t in 0..sets.products.len() {
        let product = rules.product(t);
        for (s, source) in sets.sources.iter().enumerate() {
            let c = product
                .collection
                .get(source)
                .ok_or_else(|| unknown(format!("collection[{}][{source}]", product.name)))?;
            let consumed = product
                .consumed(source)
                .ok_or_else(|| unknown(format!("source_share[{}][{source}]", product.name)))?;
            let delta = var(VarKey::CollectionDelta { product: t, source: s })?;
            obj.add_term(delta, w * c.cost * consumed);
        }
    }

    // revenue forgone by keeping fiber at home instead of exporting it
    for (i, fiber) in params.recovered_fibers.iter().enumerate() {
        let k = w * u * (fiber.export_price - fiber.price);
        obj.constant += k * fiber.export_old;
        obj.add_term(var(VarKey::ExportNew(i))?, -k);
    }

    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sets::build_sets;
    use crate::model::vars::VarSpace;
    use crate::scenario::ScenarioState;
    use crate::testkit;

    #[test]
    fn test_objective_terms() {
        let params = testkit::two_grade();
        let sets = build_sets(&params, &testkit::products(&params)).unwrap();
        let vars = VarSpace::declare(&sets);
        let state = ScenarioState::default();
        let rules = Rules {
            params: &params,
            sets: &sets,
            vars: &vars,
            state: &state,
        };
        let obj = build_objective(&rules).unwrap();

        let x = vars.id(VarKey::RecoveredFiberToPulp { fiber: 0, pulp: 0 }).unwrap();
        assert!((obj.coefficient(x) - 10.0).abs() < 1e-9);
        let y = vars.id(VarKey::VirginFiberToPulp { fiber: 0, pulp: 0 }).unwrap();
        assert!((obj.coefficient(y) - 20.0).abs() < 1e-9);
        // Board via Residential: 0.01 * 1 * (0.5 * 4)
        let delta = vars.id(VarKey::CollectionDelta { product: 0, source: 0 }).unwrap();
        assert!((obj.coefficient(delta) - 0.02).abs() < 1e-12);
        // OCC: 0.01 * 1000 * (1.5 - 1.0)
        let e = vars.id(VarKey::ExportNew(0)).unwrap();
        assert!((obj.coefficient(e) + 5.0).abs() < 1e-9);
        assert!((obj.constant() - (5.0 * 1.0 + 3.0 * 1.0)).abs() < 1e-9);
    }
}
