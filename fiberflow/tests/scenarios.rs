use fiberflow::model::{FiberModel, GroupId, ModelError, VarKey};
use fiberflow::solve::{GoodLpSolver, SolveStatus};
use fiberflow::{Degradation, FlowResults, ParameterStore};
use float_eq::assert_float_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const SINGLE_GRADE: &str = include_str!("../data/single_grade.json");
const TWO_GRADE: &str = include_str!("../data/two_grade.json");
const REGIONAL: &str = include_str!("../data/regional.json");

fn store(text: &str) -> ParameterStore {
    ParameterStore::from_json_str(text).unwrap()
}

fn build(text: &str) -> FiberModel {
    let params = store(text);
    FiberModel::build("test", &params, &params.product_names()).unwrap()
}

fn solve(model: &mut FiberModel) -> (f64, FlowResults) {
    let report = model.solve(&GoodLpSolver).unwrap();
    assert_eq!(report.status, SolveStatus::Optimal);
    (report.objective.unwrap(), report.flows.unwrap())
}

#[test]
fn test_single_grade_costs_fiber_only() {
    let mut model = build(SINGLE_GRADE);
    let (objective, flows) = solve(&mut model);
    // 0.01 weight x 1000 unit factor x unit price x 5 fiber
    assert_float_eq!(objective, 50.0, abs <= 1e-6);
    assert_float_eq!(flows.recovered_fiber_to_pulp["F"]["P"], 5000.0, abs <= 1e-4);
    assert_float_eq!(flows.residue["F"], 0.0, abs <= 1e-4);
    assert_float_eq!(flows.export["F"], 0.0, abs <= 1e-4);
    assert_float_eq!(flows.total_demand("A"), 2000.0, abs <= 1e-4);
    assert_float_eq!(flows.total_demand("B"), 3000.0, abs <= 1e-4);
}

#[test]
fn test_pulp_inflow_matches_production() {
    let params = store(TWO_GRADE);
    let mut model = build(TWO_GRADE);
    let (_, flows) = solve(&mut model);
    for (pulp, produced) in &flows.pulp_production {
        let mut inflow = 0.0;
        for table in [&flows.recovered_fiber_to_pulp, &flows.virgin_fiber_to_pulp] {
            for (fiber, row) in table {
                if let Some(x) = row.get(pulp) {
                    inflow += params.fiber_to_pulp_yield[fiber][pulp] * x;
                }
            }
        }
        assert_float_eq!(inflow, *produced, abs <= 1e-4);
    }
}

#[test]
fn test_total_demand_equals_consumption() {
    let params = store(TWO_GRADE);
    let mut model = build(TWO_GRADE);
    let (_, flows) = solve(&mut model);
    for product in &params.products {
        assert_float_eq!(
            flows.total_demand(&product.name),
            product.domestic_consumption * 1000.0,
            abs <= 1e-4
        );
    }
}

#[test]
fn test_reapplying_a_target_is_idempotent() {
    let mut once = build(TWO_GRADE);
    once.set_recycled_content_targets(&[("Board", 10.0)]).unwrap();
    let mut twice = build(TWO_GRADE);
    twice.set_recycled_content_targets(&[("Board", 10.0)]).unwrap();
    twice.set_recycled_content_targets(&[("Board", 10.0)]).unwrap();
    assert_eq!(once.graph(), twice.graph());

    let (a, flows_a) = solve(&mut once);
    let (b, flows_b) = solve(&mut twice);
    assert_float_eq!(a, b, abs <= 1e-9);
    assert_eq!(flows_a, flows_b);
}

#[test]
fn test_reset_reproduces_base_optimum() {
    let mut model = build(TWO_GRADE);
    let (base, _) = solve(&mut model);

    let mut rng = ChaCha8Rng::seed_from_u64(11);
    model.set_recycled_content_targets(&[("Board", 10.0)]).unwrap();
    model.degrade_mixed_paper_yield(15.0).unwrap();
    model.degrade_fibers(Degradation::Sampled, &mut rng).unwrap();
    model.change_demand(&[("Board", 5.0)]).unwrap();
    model.contaminate_collection("ssr", None, &mut rng).unwrap();
    assert!(!model.state().is_baseline());

    model.reset().unwrap();
    let (after, _) = solve(&mut model);
    assert_float_eq!(after, base, abs <= 1e-6);
}

#[test]
fn test_higher_target_never_lowers_recycled_fiber() {
    let mut model = build(TWO_GRADE);
    let mut last = f64::NEG_INFINITY;
    for delta in [0.0, 5.0, 10.0, 20.0, 25.0] {
        model.set_recycled_content_targets(&[("Board", delta)]).unwrap();
        let (_, flows) = solve(&mut model);
        let recycled = flows.recycled_fiber_weight("Board");
        assert!(recycled >= last - 1e-4, "delta {delta}: {recycled} < {last}");
        last = recycled;
    }
}

#[test]
fn test_zero_demand_change_is_the_base_case() {
    let mut base = build(TWO_GRADE);
    let (expected, _) = solve(&mut base);

    let mut model = build(TWO_GRADE);
    model.change_demand(&[("Board", 0.0), ("News", 0.0)]).unwrap();
    assert_eq!(model.constraints(GroupId::TotalDemand), base.constraints(GroupId::TotalDemand));
    let (objective, _) = solve(&mut model);
    assert_float_eq!(objective, expected, abs <= 1e-9);
}

#[test]
fn test_demand_change_scales_consumption() {
    let mut model = build(TWO_GRADE);
    model.change_demand(&[("Board", 10.0)]).unwrap();
    let (_, flows) = solve(&mut model);
    assert_float_eq!(flows.total_demand("Board"), 4400.0, abs <= 1e-4);
    assert_float_eq!(flows.total_demand("News"), 2000.0, abs <= 1e-4);
}

#[test]
fn test_yield_losses_compose() {
    let mut model = build(TWO_GRADE);
    let occ = model.vars().id(VarKey::RecoveredFiberToPulp { fiber: 0, pulp: 0 }).unwrap();
    let mix = model.vars().id(VarKey::RecoveredFiberToPulp { fiber: 1, pulp: 0 }).unwrap();
    let inflow = |m: &FiberModel, v| m.constraints(GroupId::RecoveredPulpInflow).unwrap()[0].expr().coefficient(v);

    model.degrade_mixed_paper_yield(10.0).unwrap();
    assert_float_eq!(inflow(&model, mix), 0.72, abs <= 1e-12);
    assert_float_eq!(inflow(&model, occ), 0.9, abs <= 1e-12);

    let mut rng = ChaCha8Rng::seed_from_u64(0);
    model.degrade_fibers(Degradation::Uniform(0.1), &mut rng).unwrap();
    assert_float_eq!(inflow(&model, occ), 0.81, abs <= 1e-12);
    assert_float_eq!(inflow(&model, mix), 0.648, abs <= 1e-12);

    // repeating the mixed-paper loss does not stack it
    model.degrade_mixed_paper_yield(10.0).unwrap();
    assert_float_eq!(inflow(&model, mix), 0.648, abs <= 1e-12);
}

#[test]
fn test_invalid_contamination_leaves_model_untouched() {
    let mut model = build(TWO_GRADE);
    let before = model.graph().clone();
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    for (system, rate) in [("single", None), ("ssr", Some(1.5)), ("dual", Some(-0.2))] {
        let err = model.contaminate_collection(system, rate, &mut rng).unwrap_err();
        assert!(matches!(err, ModelError::InvalidScenario(_)), "{system}: {err}");
    }
    assert_eq!(model.graph(), &before);
    assert!(model.state().is_baseline());
}

#[test]
fn test_seeded_contamination_is_reproducible() {
    let mut a = build(TWO_GRADE);
    let mut b = build(TWO_GRADE);
    let out_a = a
        .contaminate_collection("dual", None, &mut ChaCha8Rng::seed_from_u64(21))
        .unwrap();
    let out_b = b
        .contaminate_collection("dual", None, &mut ChaCha8Rng::seed_from_u64(21))
        .unwrap();
    assert_eq!(out_a, out_b);
    assert!(out_a.contamination_rate.is_some());
    assert_eq!(out_a.replaced, vec![GroupId::RecoveredFiberAvailability]);
    assert_eq!(a.graph(), b.graph());
}

#[test]
fn test_contamination_without_its_group_is_group_not_found() {
    let mut model = build(TWO_GRADE);
    model.remove_group(GroupId::RecoveredFiberAvailability).unwrap();
    let err = model
        .contaminate_collection("ssr", Some(0.2), &mut ChaCha8Rng::seed_from_u64(1))
        .unwrap_err();
    assert!(matches!(err, ModelError::GroupNotFound(GroupId::RecoveredFiberAvailability)));
    assert!(model.state().contamination.is_none());
}

#[test]
fn test_missing_recipe_bound_fails_the_build() {
    let mut params = store(TWO_GRADE);
    params.recipe_min.remove("MIX");
    let err = FiberModel::build("broken", &params, &params.product_names()).unwrap_err();
    assert!(
        matches!(err, ModelError::ConstraintBuild { group: "recovered_recipe_min", .. }),
        "{err}"
    );
}

#[test]
fn test_misaligned_levels_fail_as_configuration() {
    let mut params = store(TWO_GRADE);
    params.products[1].max_demand.push(10.0);
    let err = FiberModel::build("broken", &params, &params.product_names()).unwrap_err();
    assert!(matches!(err, ModelError::Configuration(_)), "{err}");
}

#[test]
fn test_infeasible_target_is_reported_and_recoverable() {
    let mut model = build(TWO_GRADE);
    let (base, _) = solve(&mut model);

    // more recycled Board than the collected fiber can supply
    model.set_recycled_content_targets(&[("Board", 45.0)]).unwrap();
    let report = model.solve(&GoodLpSolver).unwrap();
    assert_eq!(report.status, SolveStatus::Infeasible);
    assert!(report.flows.is_none());
    assert_eq!(model.last_status(), Some(SolveStatus::Infeasible));

    let diagnosis = model.relax(&GoodLpSolver).unwrap();
    assert_eq!(diagnosis.status, SolveStatus::Optimal);
    assert!(diagnosis.total_violation > 1e-6);
    assert!(!diagnosis.violations.is_empty());

    model.set_recycled_content_targets(&[]).unwrap();
    let (after, _) = solve(&mut model);
    assert_float_eq!(after, base, abs <= 1e-6);
}

#[test]
fn test_regional_sample_meets_market_pulp_minimums() {
    let params = store(REGIONAL);
    let mut model = build(REGIONAL);
    let (_, flows) = solve(&mut model);
    let by_product = flows.pulp_by_product();
    for product in &params.products {
        for (pulp, min) in &product.min_pulp {
            assert!(
                by_product[pulp][&product.name] >= min * 1000.0 - 1e-4,
                "{pulp} -> {}",
                product.name
            );
        }
    }
    assert!(flows.to_pretty_json().unwrap().contains("\"Deinked Market\""));
}

#[test]
fn test_lp_export_lists_every_row() {
    let model = build(TWO_GRADE);
    let lp = model.to_lp_string();
    let rows = lp.lines().filter(|l| l.starts_with(' ') && l.contains(": ")).count();
    // objective line plus one per constraint
    assert_eq!(rows, model.graph().len() + 1);
}
