//! Extraction of solved flows into name-keyed tables.

use crate::model::builder::Rules;
use crate::model::{GroupId, ModelError, VarKey, UNIT_SCALE};
use crate::{Baseline, ChannelVolumes, Table};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Unit the model is built in.
    MillionShortTons,
    /// Reporting unit.
    ShortTons,
}

impl Unit {
    fn per_model_unit(self) -> f64 {
        match self {
            Unit::MillionShortTons => 1.0,
            Unit::ShortTons => UNIT_SCALE,
        }
    }
}

/// Product -> one value per recycled-content level.
pub type LevelTable = BTreeMap<String, Vec<f64>>;

/// Solved flows keyed like the variable index sets.
///
/// Volumes follow `unit`; collection rates are fractions and never scaled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowResults {
    pub unit: Unit,
    /// Recovered fiber -> pulp.
    pub recovered_fiber_to_pulp: Table,
    /// Virgin fiber -> pulp.
    pub virgin_fiber_to_pulp: Table,
    /// Recovered and virgin pulps alike.
    pub pulp_production: BTreeMap<String, f64>,
    /// Pulp -> product -> per level.
    pub pulp_to_product: BTreeMap<String, LevelTable>,
    pub export: BTreeMap<String, f64>,
    pub residue: BTreeMap<String, f64>,
    pub demand: LevelTable,
    pub fiber_weight: LevelTable,
    pub non_fiber_weight: LevelTable,
    /// Level values, for reading the per-level vectors.
    pub levels: LevelTable,
    /// Product -> source -> new collection rate.
    pub collection: Table,
    /// Product -> source -> collection rate increase.
    pub collection_delta: Table,
    /// Recovered fiber -> volume recovered by the collection increase.
    pub additional_recovery: BTreeMap<String, f64>,
    pub channels: BTreeMap<String, ChannelVolumes>,
    /// Pre-scenario volumes for differencing.
    pub baseline: Baseline,
}

fn scale_map(m: &mut BTreeMap<String, f64>, k: f64) {
    m.values_mut().for_each(|v| *v *= k);
}

fn scale_table(t: &mut Table, k: f64) {
    t.values_mut().for_each(|row| scale_map(row, k));
}

fn scale_levels(t: &mut LevelTable, k: f64) {
    t.values_mut().flatten().for_each(|v| *v *= k);
}

impl FlowResults {
    /// Same results expressed in `unit`.
    pub fn to_unit(&self, unit: Unit) -> FlowResults {
        let k = unit.per_model_unit() / self.unit.per_model_unit();
        let mut out = self.clone();
        out.unit = unit;
        if k == 1.0 {
            return out;
        }
        scale_table(&mut out.recovered_fiber_to_pulp, k);
        scale_table(&mut out.virgin_fiber_to_pulp, k);
        scale_map(&mut out.pulp_production, k);
        out.pulp_to_product.values_mut().for_each(|t| scale_levels(t, k));
        scale_map(&mut out.export, k);
        scale_map(&mut out.residue, k);
        scale_levels(&mut out.demand, k);
        scale_levels(&mut out.fiber_weight, k);
        scale_levels(&mut out.non_fiber_weight, k);
        scale_map(&mut out.additional_recovery, k);
        out.channels.values_mut().for_each(|c| *c = c.scaled(k));
        scale_table(&mut out.baseline.fiber_to_pulp, k);
        scale_table(&mut out.baseline.pulp_to_product, k);
        out.baseline.channels.values_mut().for_each(|c| *c = c.scaled(k));
        scale_map(&mut out.baseline.export, k);
        scale_levels(&mut out.baseline.demand, k);
        out
    }

    /// Pulp -> product, summed over levels.
    pub fn pulp_by_product(&self) -> Table {
        self.pulp_to_product
            .iter()
            .map(|(pulp, per_product)| {
                let row = per_product
                    .iter()
                    .map(|(product, levels)| (product.clone(), levels.iter().sum::<f64>()))
                    .collect();
                (pulp.clone(), row)
            })
            .collect()
    }

    pub fn total_demand(&self, product: &str) -> f64 {
        self.demand.get(product).map(|d| d.iter().sum::<f64>()).unwrap_or(0.0)
    }

    /// Fiber weight of `product` supplied by recycled pulp.
    pub fn recycled_fiber_weight(&self, product: &str) -> f64 {
        match (self.levels.get(product), self.fiber_weight.get(product)) {
            (Some(levels), Some(fw)) => levels.iter().zip(fw).map(|(r, w)| r * w).sum(),
            _ => 0.0,
        }
    }

    pub fn to_pretty_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Read every variable of the model out of `values` (indexed by `VarId`),
/// in model units.
pub(crate) fn extract(rules: &Rules<'_>, values: &[f64]) -> Result<FlowResults, ModelError> {
    let sets = rules.sets;
    let params = rules.params;
    // extraction reads the availability rule's coefficients
    let g = GroupId::RecoveredFiberAvailability;
    let val = |key: VarKey| -> Result<f64, ModelError> {
        let id = rules.vars.get(key, g)?;
        Ok(values.get(id.index()).copied().unwrap_or(0.0))
    };

    let mut recovered_fiber_to_pulp = Table::new();
    for (i, fiber) in sets.recovered_fibers.iter().enumerate() {
        let row = recovered_fiber_to_pulp.entry(fiber.clone()).or_default();
        for (p, pulp) in sets.recovered_pulps.iter().enumerate() {
            row.insert(pulp.clone(), val(VarKey::RecoveredFiberToPulp { fiber: i, pulp: p })?);
        }
    }
    let mut virgin_fiber_to_pulp = Table::new();
    for (j, fiber) in sets.virgin_fibers.iter().enumerate() {
        let row = virgin_fiber_to_pulp.entry(fiber.clone()).or_default();
        for (q, pulp) in sets.virgin_pulps.iter().enumerate() {
            row.insert(pulp.clone(), val(VarKey::VirginFiberToPulp { fiber: j, pulp: q })?);
        }
    }

    let mut pulp_production = BTreeMap::new();
    let mut pulp_to_product: BTreeMap<String, LevelTable> = BTreeMap::new();
    for (p, pulp) in sets.recovered_pulps.iter().enumerate() {
        pulp_production.insert(pulp.clone(), val(VarKey::RecoveredPulpProduction(p))?);
        let per_product = pulp_to_product.entry(pulp.clone()).or_default();
        for (t, product) in sets.products.iter().enumerate() {
            let flows = (0..sets.levels[t].len())
                .map(|r| val(VarKey::RecoveredPulpToProduct { pulp: p, level: r, product: t }))
                .collect::<Result<Vec<_>, _>>()?;
            per_product.insert(product.clone(), flows);
        }
    }
    for (q, pulp) in sets.virgin_pulps.iter().enumerate() {
        pulp_production.insert(pulp.clone(), val(VarKey::VirginPulpProduction(q))?);
        let per_product = pulp_to_product.entry(pulp.clone()).or_default();
        for (t, product) in sets.products.iter().enumerate() {
            let flows = (0..sets.levels[t].len())
                .map(|r| val(VarKey::VirginPulpToProduct { pulp: q, level: r, product: t }))
                .collect::<Result<Vec<_>, _>>()?;
            per_product.insert(product.clone(), flows);
        }
    }

    let mut export = BTreeMap::new();
    let mut residue = BTreeMap::new();
    for (i, fiber) in sets.recovered_fibers.iter().enumerate() {
        export.insert(fiber.clone(), val(VarKey::ExportNew(i))?);
        residue.insert(fiber.clone(), val(VarKey::Residue(i))?);
    }

    let mut demand = LevelTable::new();
    let mut fiber_weight = LevelTable::new();
    let mut non_fiber_weight = LevelTable::new();
    let mut levels = LevelTable::new();
    for (t, product) in sets.products.iter().enumerate() {
        let n = sets.levels[t].len();
        let per_level = |f: &dyn Fn(usize) -> VarKey| (0..n).map(|r| val(f(r))).collect::<Result<Vec<_>, _>>();
        demand.insert(product.clone(), per_level(&|r| VarKey::Demand { level: r, product: t })?);
        fiber_weight.insert(product.clone(), per_level(&|r| VarKey::FiberWeight { level: r, product: t })?);
        non_fiber_weight.insert(product.clone(), per_level(&|r| VarKey::NonFiberWeight { level: r, product: t })?);
        levels.insert(product.clone(), sets.levels[t].clone());
    }

    let mut collection = Table::new();
    let mut collection_delta = Table::new();
    let mut channels = BTreeMap::new();
    for (t, product) in sets.products.iter().enumerate() {
        let mut volumes = ChannelVolumes {
            consumption: rules.product(t).domestic_consumption,
            ..ChannelVolumes::default()
        };
        for (s, source) in sets.sources.iter().enumerate() {
            let new = val(VarKey::CollectionNew { product: t, source: s })?;
            let delta = val(VarKey::CollectionDelta { product: t, source: s })?;
            collection.entry(product.clone()).or_default().insert(source.clone(), new);
            collection_delta.entry(product.clone()).or_default().insert(source.clone(), delta);

            // contamination only reaches the fiber availability rule, not
            // the reported channel volumes
            let consumed = rules.consumed(t, s, g)?;
            volumes.collection += consumed * new;
            volumes.recovery += consumed * new * params.sources[s].channel_yield;
        }
        channels.insert(product.clone(), volumes);
    }

    let mut additional_recovery = BTreeMap::new();
    for (i, fiber) in sets.recovered_fibers.iter().enumerate() {
        let mut extra = 0.0;
        for t in 0..sets.products.len() {
            for s in 0..sets.sources.len() {
                let delta = val(VarKey::CollectionDelta { product: t, source: s })?;
                extra += rules.recovery_yield(i, t, s, g)? * rules.consumed(t, s, g)? * delta;
            }
        }
        additional_recovery.insert(fiber.clone(), extra);
    }

    let mut baseline = params.baseline.clone();
    baseline.export = params
        .recovered_fibers
        .iter()
        .map(|f| (f.code.clone(), f.export_old))
        .collect();
    baseline.demand = (0..sets.products.len())
        .map(|t| {
            let product = rules.product(t);
            (product.name.clone(), product.old_demand.clone())
        })
        .collect();

    Ok(FlowResults {
        unit: Unit::MillionShortTons,
        recovered_fiber_to_pulp,
        virgin_fiber_to_pulp,
        pulp_production,
        pulp_to_product,
        export,
        residue,
        demand,
        fiber_weight,
        non_fiber_weight,
        levels,
        collection,
        collection_delta,
        additional_recovery,
        channels,
        baseline,
    })
}
