//! Base rules of the fiber-flow model, one function per constraint group.
//!
//! Every group is rebuilt from the parameter store and the current
//! [`ScenarioState`], which is how scenarios replace a group without
//! touching the rest of the model.

use crate::model::error::ModelError;
use crate::model::linear::{Constraint, LinearExpr, Sense, VarId};
use crate::model::sets::IndexSets;
use crate::model::vars::{VarKey, VarSpace};
use crate::model::GroupId;
use crate::scenario::ScenarioState;
use crate::{table_get, Collection, ParameterStore, Product, PulpKind, RecoveredFiber, RecycledContentPolicy};

pub(crate) struct Rules<'a> {
    pub(crate) params: &'a ParameterStore,
    pub(crate) sets: &'a IndexSets,
    pub(crate) vars: &'a VarSpace,
    pub(crate) state: &'a ScenarioState,
}

fn row_name<S: AsRef<str>>(group: GroupId, idx: &[S]) -> String {
    let idx: Vec<&str> = idx.iter().map(AsRef::as_ref).collect();
    format!("{}[{}]", group.label(), idx.join(","))
}

impl<'a> Rules<'a> {
    pub(crate) fn build(&self, id: GroupId) -> Result<Vec<Constraint>, ModelError> {
        match id {
            GroupId::RecoveredPulpInflow => self.recovered_pulp_inflow(),
            GroupId::VirginPulpInflow => self.virgin_pulp_inflow(),
            GroupId::RecoveredPulpOutflow => self.pulp_outflow(id, true),
            GroupId::VirginPulpOutflow => self.pulp_outflow(id, false),
            GroupId::RecoveredPulpMinimum => self.pulp_minimum(id, true),
            GroupId::VirginPulpMinimum => self.pulp_minimum(id, false),
            GroupId::RecoveredPulpCapacity => self.pulp_capacity(id, true),
            GroupId::VirginPulpCapacity => self.pulp_capacity(id, false),
            GroupId::RecoveredPulpLevelUse => self.pulp_level_use(id, true),
            GroupId::VirginPulpLevelUse => self.pulp_level_use(id, false),
            GroupId::RecoveredRecipeMin => self.recovered_recipe_bound(id, Sense::Ge),
            GroupId::RecoveredRecipeMax => self.recovered_recipe_bound(id, Sense::Le),
            GroupId::RecoveredRecipeExact => self.recovered_recipe_exact(),
            GroupId::VirginRecipeExact => self.virgin_recipe_exact(),
            GroupId::CollectionMax | GroupId::CollectionMin | GroupId::CollectionDelta => self.collection(id),
            GroupId::ExportCeiling => self.export_ceiling(),
            GroupId::RecoveredFiberAvailability => self.fiber_availability(),
            GroupId::TotalDemand => self.total_demand(),
            GroupId::MinDemand => self.min_demand(),
            GroupId::NonFiberMass | GroupId::FiberMass => self.mass_split(id),
            GroupId::FiberBalance | GroupId::RecycledBalance | GroupId::VirginBalance => self.production_balance(id),
            GroupId::MaxDemand => self.max_demand(),
            GroupId::RecycledContentPinned => self.recycled_pinned(),
            GroupId::RecycledContentCeiling => self.recycled_ceiling(),
            GroupId::RecycledContentTarget => self.recycled_target(),
        }
    }

    // ---- parameter lookups ----

    pub(crate) fn recovered_fiber(&self, i: usize) -> &'a RecoveredFiber {
        &self.params.recovered_fibers[i]
    }

    pub(crate) fn product(&self, t: usize) -> &'a Product {
        &self.params.products[self.sets.product_rows[t]]
    }

    fn var(&self, key: VarKey, group: GroupId) -> Result<VarId, ModelError> {
        self.vars.get(key, group)
    }

    /// Recovered fiber-to-pulp yield with the scenario yield overlay applied.
    pub(crate) fn recovered_yield(&self, i: usize, p: usize, group: GroupId) -> Result<f64, ModelError> {
        let fiber = self.recovered_fiber(i);
        let pulp = &self.sets.recovered_pulps[p];
        let base = table_get(&self.params.fiber_to_pulp_yield, &fiber.code, pulp)
            .ok_or_else(|| ModelError::missing(group, format!("fiber_to_pulp_yield[{}][{pulp}]", fiber.code)))?;
        Ok(base * self.state.yields.factor(fiber))
    }

    fn virgin_yield(&self, j: usize, q: usize, group: GroupId) -> Result<f64, ModelError> {
        let fiber = &self.sets.virgin_fibers[j];
        let pulp = &self.sets.virgin_pulps[q];
        table_get(&self.params.fiber_to_pulp_yield, fiber, pulp)
            .ok_or_else(|| ModelError::missing(group, format!("fiber_to_pulp_yield[{fiber}][{pulp}]")))
    }

    fn recipe(&self, table: &crate::Table, name: &str, fiber: &str, pulp: &str, group: GroupId) -> Result<f64, ModelError> {
        table_get(table, fiber, pulp).ok_or_else(|| ModelError::missing(group, format!("{name}[{fiber}][{pulp}]")))
    }

    pub(crate) fn consumed(&self, t: usize, s: usize, group: GroupId) -> Result<f64, ModelError> {
        let product = self.product(t);
        let source = &self.sets.sources[s];
        product
            .consumed(source)
            .ok_or_else(|| ModelError::missing(group, format!("source_share[{}][{source}]", product.name)))
    }

    pub(crate) fn collection_params(&self, t: usize, s: usize, group: GroupId) -> Result<Collection, ModelError> {
        let product = self.product(t);
        let source = &self.sets.sources[s];
        product
            .collection
            .get(source)
            .copied()
            .ok_or_else(|| ModelError::missing(group, format!("collection[{}][{source}]", product.name)))
    }

    /// Share of product `t` collected through source `s` that is recovered as fiber `i`,
    /// including channel yield and any contamination overlay.
    pub(crate) fn recovery_yield(&self, i: usize, t: usize, s: usize, group: GroupId) -> Result<f64, ModelError> {
        let fiber = &self.recovered_fiber(i).code;
        let product = self.product(t);
        let source = &self.params.sources[s];
        let share = table_get(&product.recovery_share, fiber, &source.name).ok_or_else(|| {
            ModelError::missing(group, format!("recovery_share[{}][{fiber}][{}]", product.name, source.name))
        })?;
        let base = share * source.channel_yield;
        Ok(match &self.state.contamination {
            Some(c) => c.apply(&source.name, base),
            None => base,
        })
    }

    fn level_sum(&self, t: usize, coeff: impl Fn(usize, f64) -> f64, group: GroupId) -> Result<LinearExpr, ModelError> {
        let mut e = LinearExpr::zero();
        for (r, level) in self.sets.levels[t].iter().enumerate() {
            let d = self.var(VarKey::Demand { level: r, product: t }, group)?;
            e.add_term(d, coeff(r, *level));
        }
        Ok(e)
    }

    // ---- pulp mass balance ----

    fn recovered_pulp_inflow(&self) -> Result<Vec<Constraint>, ModelError> {
        let g = GroupId::RecoveredPulpInflow;
        let mut rows = vec![];
        for (p, pulp) in self.sets.recovered_pulps.iter().enumerate() {
            let mut inflow = LinearExpr::zero();
            for i in 0..self.sets.recovered_fibers.len() {
                let x = self.var(VarKey::RecoveredFiberToPulp { fiber: i, pulp: p }, g)?;
                inflow.add_term(x, self.recovered_yield(i, p, g)?);
            }
            let prod = self.var(VarKey::RecoveredPulpProduction(p), g)?;
            rows.push(Constraint::new(g, row_name(g, &[pulp]), inflow, Sense::Eq, LinearExpr::from_var(prod, 1.0)));
        }
        Ok(rows)
    }

    fn virgin_pulp_inflow(&self) -> Result<Vec<Constraint>, ModelError> {
        let g = GroupId::VirginPulpInflow;
        let mut rows = vec![];
        for (q, pulp) in self.sets.virgin_pulps.iter().enumerate() {
            let mut inflow = LinearExpr::zero();
            for j in 0..self.sets.virgin_fibers.len() {
                let y = self.var(VarKey::VirginFiberToPulp { fiber: j, pulp: q }, g)?;
                inflow.add_term(y, self.virgin_yield(j, q, g)?);
            }
            let prod = self.var(VarKey::VirginPulpProduction(q), g)?;
            rows.push(Constraint::new(g, row_name(g, &[pulp]), inflow, Sense::Eq, LinearExpr::from_var(prod, 1.0)));
        }
        Ok(rows)
    }

    fn pulp_to_product(&self, recovered: bool, pulp: usize, level: usize, product: usize) -> VarKey {
        if recovered {
            VarKey::RecoveredPulpToProduct { pulp, level, product }
        } else {
            VarKey::VirginPulpToProduct { pulp, level, product }
        }
    }

    fn pulp_names(&self, recovered: bool) -> &'a [String] {
        if recovered {
            &self.sets.recovered_pulps
        } else {
            &self.sets.virgin_pulps
        }
    }

    fn pulp_outflow(&self, g: GroupId, recovered: bool) -> Result<Vec<Constraint>, ModelError> {
        let mut rows = vec![];
        for (p, pulp) in self.pulp_names(recovered).iter().enumerate() {
            let mut out = LinearExpr::zero();
            for (r, t) in self.sets.demand_arcs() {
                out.add_term(self.var(self.pulp_to_product(recovered, p, r, t), g)?, 1.0);
            }
            let prod_key = if recovered {
                VarKey::RecoveredPulpProduction(p)
            } else {
                VarKey::VirginPulpProduction(p)
            };
            let prod = self.var(prod_key, g)?;
            rows.push(Constraint::new(g, row_name(g, &[pulp]), out, Sense::Eq, LinearExpr::from_var(prod, 1.0)));
        }
        Ok(rows)
    }

    fn pulp_minimum(&self, g: GroupId, recovered: bool) -> Result<Vec<Constraint>, ModelError> {
        let pulps = if recovered {
            &self.params.recovered_pulps
        } else {
            &self.params.virgin_pulps
        };
        let mut rows = vec![];
        for (p, pulp) in pulps.iter().enumerate() {
            if pulp.kind != PulpKind::Market {
                continue;
            }
            for t in 0..self.sets.products.len() {
                let product = self.product(t);
                let min = product
                    .min_pulp
                    .get(&pulp.name)
                    .copied()
                    .ok_or_else(|| ModelError::missing(g, format!("min_pulp[{}][{}]", product.name, pulp.name)))?;
                let mut used = LinearExpr::zero();
                for r in 0..self.sets.levels[t].len() {
                    used.add_term(self.var(self.pulp_to_product(recovered, p, r, t), g)?, 1.0);
                }
                rows.push(Constraint::new(
                    g,
                    row_name(g, &[&pulp.name, &product.name]),
                    used,
                    Sense::Ge,
                    LinearExpr::from_const(min),
                ));
            }
        }
        Ok(rows)
    }

    fn pulp_capacity(&self, g: GroupId, recovered: bool) -> Result<Vec<Constraint>, ModelError> {
        let pulps = if recovered {
            &self.params.recovered_pulps
        } else {
            &self.params.virgin_pulps
        };
        let mut rows = vec![];
        for (p, pulp) in pulps.iter().enumerate() {
            // virgin market pulp is bought, not produced
            if !recovered && pulp.kind == PulpKind::Market {
                continue;
            }
            let Some(cap) = pulp.capacity else { continue };
            let key = if recovered {
                VarKey::RecoveredPulpProduction(p)
            } else {
                VarKey::VirginPulpProduction(p)
            };
            rows.push(Constraint::new(
                g,
                row_name(g, &[&pulp.name]),
                LinearExpr::from_var(self.var(key, g)?, 1.0),
                Sense::Le,
                LinearExpr::from_const(cap),
            ));
        }
        Ok(rows)
    }

    fn pulp_level_use(&self, g: GroupId, recovered: bool) -> Result<Vec<Constraint>, ModelError> {
        let mut rows = vec![];
        for (p, pulp) in self.pulp_names(recovered).iter().enumerate() {
            for (r, t) in self.sets.demand_arcs() {
                let product = self.product(t);
                let max = product
                    .max_pulp_use
                    .get(pulp)
                    .and_then(|v| v.get(r))
                    .copied()
                    .ok_or_else(|| ModelError::missing(g, format!("max_pulp_use[{}][{pulp}][{r}]", product.name)))?;
                let level = format!("{}", self.sets.levels[t][r]);
                rows.push(Constraint::new(
                    g,
                    row_name(g, &[pulp, &level, &product.name]),
                    LinearExpr::from_var(self.var(self.pulp_to_product(recovered, p, r, t), g)?, 1.0),
                    Sense::Le,
                    LinearExpr::from_const(max),
                ));
            }
        }
        Ok(rows)
    }

    // ---- recipes ----

    fn recovered_recipe_bound(&self, g: GroupId, sense: Sense) -> Result<Vec<Constraint>, ModelError> {
        let (table, name) = match sense {
            Sense::Ge => (&self.params.recipe_min, "recipe_min"),
            _ => (&self.params.recipe_max, "recipe_max"),
        };
        let mut rows = vec![];
        for (p, pulp) in self.sets.recovered_pulps.iter().enumerate() {
            let prod = self.var(VarKey::RecoveredPulpProduction(p), g)?;
            for (i, fiber) in self.sets.recovered_fibers.iter().enumerate() {
                let x = self.var(VarKey::RecoveredFiberToPulp { fiber: i, pulp: p }, g)?;
                let share = self.recipe(table, name, fiber, pulp, g)?;
                rows.push(Constraint::new(
                    g,
                    row_name(g, &[fiber, pulp]),
                    LinearExpr::from_var(x, self.recovered_yield(i, p, g)?),
                    sense,
                    LinearExpr::from_var(prod, share),
                ));
            }
        }
        Ok(rows)
    }

    fn recovered_recipe_exact(&self) -> Result<Vec<Constraint>, ModelError> {
        let g = GroupId::RecoveredRecipeExact;
        let mut rows = vec![];
        for (p, pulp) in self.params.recovered_pulps.iter().enumerate() {
            if !(pulp.exact_recipe || pulp.kind == PulpKind::Market) {
                continue;
            }
            let prod = self.var(VarKey::RecoveredPulpProduction(p), g)?;
            for (i, fiber) in self.sets.recovered_fibers.iter().enumerate() {
                let x = self.var(VarKey::RecoveredFiberToPulp { fiber: i, pulp: p }, g)?;
                let share = self.recipe(&self.params.recipe_yield, "recipe_yield", fiber, &pulp.name, g)?;
                rows.push(Constraint::new(
                    g,
                    row_name(g, &[fiber, &pulp.name]),
                    LinearExpr::from_var(x, self.recovered_yield(i, p, g)?),
                    Sense::Eq,
                    LinearExpr::from_var(prod, share),
                ));
            }
        }
        Ok(rows)
    }

    fn virgin_recipe_exact(&self) -> Result<Vec<Constraint>, ModelError> {
        let g = GroupId::VirginRecipeExact;
        let mut rows = vec![];
        for (q, pulp) in self.sets.virgin_pulps.iter().enumerate() {
            let prod = self.var(VarKey::VirginPulpProduction(q), g)?;
            for (j, fiber) in self.sets.virgin_fibers.iter().enumerate() {
                let y = self.var(VarKey::VirginFiberToPulp { fiber: j, pulp: q }, g)?;
                let share = self.recipe(&self.params.recipe_yield, "recipe_yield", fiber, pulp, g)?;
                rows.push(Constraint::new(
                    g,
                    row_name(g, &[fiber, pulp]),
                    LinearExpr::from_var(y, self.virgin_yield(j, q, g)?),
                    Sense::Eq,
                    LinearExpr::from_var(prod, share),
                ));
            }
        }
        Ok(rows)
    }

    // ---- recovery and export ----

    fn collection(&self, g: GroupId) -> Result<Vec<Constraint>, ModelError> {
        let mut rows = vec![];
        for (t, product) in self.sets.products.iter().enumerate() {
            for (s, source) in self.sets.sources.iter().enumerate() {
                let c = self.collection_params(t, s, g)?;
                let new = self.var(VarKey::CollectionNew { product: t, source: s }, g)?;
                let lhs = LinearExpr::from_var(new, 1.0);
                let name = row_name(g, &[product, source]);
                let row = match g {
                    GroupId::CollectionMax => Constraint::new(g, name, lhs, Sense::Le, LinearExpr::from_const(c.max_rate)),
                    GroupId::CollectionMin => Constraint::new(g, name, lhs, Sense::Ge, LinearExpr::from_const(c.old_rate)),
                    _ => {
                        let delta = self.var(VarKey::CollectionDelta { product: t, source: s }, g)?;
                        Constraint::new(g, name, lhs.sub(LinearExpr::from_var(delta, 1.0)), Sense::Eq, LinearExpr::from_const(c.old_rate))
                    }
                };
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn export_ceiling(&self) -> Result<Vec<Constraint>, ModelError> {
        let g = GroupId::ExportCeiling;
        let mut rows = vec![];
        for (i, fiber) in self.params.recovered_fibers.iter().enumerate() {
            rows.push(Constraint::new(
                g,
                row_name(g, &[&fiber.code]),
                LinearExpr::from_var(self.var(VarKey::ExportNew(i), g)?, 1.0),
                Sense::Le,
                LinearExpr::from_const(fiber.export_old),
            ));
        }
        Ok(rows)
    }

    fn fiber_availability(&self) -> Result<Vec<Constraint>, ModelError> {
        let g = GroupId::RecoveredFiberAvailability;
        let mut rows = vec![];
        for (i, fiber) in self.sets.recovered_fibers.iter().enumerate() {
            let mut used = LinearExpr::zero();
            for p in 0..self.sets.recovered_pulps.len() {
                used.add_term(self.var(VarKey::RecoveredFiberToPulp { fiber: i, pulp: p }, g)?, 1.0);
            }
            used.add_term(self.var(VarKey::ExportNew(i), g)?, 1.0);
            used.add_term(self.var(VarKey::Residue(i), g)?, 1.0);

            let mut recovered = LinearExpr::zero();
            for t in 0..self.sets.products.len() {
                for s in 0..self.sets.sources.len() {
                    let new = self.var(VarKey::CollectionNew { product: t, source: s }, g)?;
                    recovered.add_term(new, self.recovery_yield(i, t, s, g)? * self.consumed(t, s, g)?);
                }
            }
            rows.push(Constraint::new(g, row_name(g, &[fiber]), used, Sense::Eq, recovered));
        }
        Ok(rows)
    }

    // ---- demand ----

    fn total_demand(&self) -> Result<Vec<Constraint>, ModelError> {
        let g = GroupId::TotalDemand;
        let mut rows = vec![];
        for t in 0..self.sets.products.len() {
            let product = self.product(t);
            let target = product.domestic_consumption * self.state.demand_factor(&product.name);
            rows.push(Constraint::new(
                g,
                row_name(g, &[&product.name]),
                self.level_sum(t, |_, _| 1.0, g)?,
                Sense::Eq,
                LinearExpr::from_const(target),
            ));
        }
        Ok(rows)
    }

    fn min_demand(&self) -> Result<Vec<Constraint>, ModelError> {
        let g = GroupId::MinDemand;
        let mut rows = vec![];
        for (r, t) in self.sets.demand_arcs() {
            let product = self.product(t);
            let level = format!("{}", self.sets.levels[t][r]);
            rows.push(Constraint::new(
                g,
                row_name(g, &[&level, &product.name]),
                LinearExpr::from_var(self.var(VarKey::Demand { level: r, product: t }, g)?, 1.0),
                Sense::Ge,
                LinearExpr::from_const(product.min_demand[r]),
            ));
        }
        Ok(rows)
    }

    fn mass_split(&self, g: GroupId) -> Result<Vec<Constraint>, ModelError> {
        let mut rows = vec![];
        for (r, t) in self.sets.demand_arcs() {
            let product = self.product(t);
            let demand = self.var(VarKey::Demand { level: r, product: t }, g)?;
            let (key, share) = match g {
                GroupId::NonFiberMass => (VarKey::NonFiberWeight { level: r, product: t }, product.non_fiber_fraction),
                _ => (
                    VarKey::FiberWeight { level: r, product: t },
                    1.0 - self.params.non_fiber_yield * product.non_fiber_fraction,
                ),
            };
            let level = format!("{}", self.sets.levels[t][r]);
            rows.push(Constraint::new(
                g,
                row_name(g, &[&level, &product.name]),
                LinearExpr::from_var(self.var(key, g)?, 1.0),
                Sense::Eq,
                LinearExpr::from_var(demand, share),
            ));
        }
        Ok(rows)
    }

    fn production_balance(&self, g: GroupId) -> Result<Vec<Constraint>, ModelError> {
        let mut rows = vec![];
        for (r, t) in self.sets.demand_arcs() {
            let level = self.sets.levels[t][r];
            let mut lhs = LinearExpr::zero();
            if g != GroupId::VirginBalance {
                for (p, pulp) in self.params.recovered_pulps.iter().enumerate() {
                    lhs.add_term(self.var(self.pulp_to_product(true, p, r, t), g)?, pulp.pulp_yield);
                }
            }
            if g != GroupId::RecycledBalance {
                for (q, pulp) in self.params.virgin_pulps.iter().enumerate() {
                    lhs.add_term(self.var(self.pulp_to_product(false, q, r, t), g)?, pulp.pulp_yield);
                }
            }
            let share = match g {
                GroupId::RecycledBalance => level,
                GroupId::VirginBalance => 1.0 - level,
                _ => 1.0,
            };
            let fiber_weight = self.var(VarKey::FiberWeight { level: r, product: t }, g)?;
            let level_name = format!("{level}");
            rows.push(Constraint::new(
                g,
                row_name(g, &[&level_name, &self.sets.products[t]]),
                lhs,
                Sense::Eq,
                LinearExpr::from_var(fiber_weight, share),
            ));
        }
        Ok(rows)
    }

    // ---- recycled content ----

    fn is_target(&self, t: usize) -> bool {
        self.state.recycled_targets.contains_key(&self.sets.products[t])
    }

    fn max_demand(&self) -> Result<Vec<Constraint>, ModelError> {
        let g = GroupId::MaxDemand;
        let mut rows = vec![];
        for (r, t) in self.sets.demand_arcs() {
            let product = self.product(t);
            if product.policy == RecycledContentPolicy::Pinned {
                continue;
            }
            let level = format!("{}", self.sets.levels[t][r]);
            rows.push(Constraint::new(
                g,
                row_name(g, &[&level, &product.name]),
                LinearExpr::from_var(self.var(VarKey::Demand { level: r, product: t }, g)?, 1.0),
                Sense::Le,
                LinearExpr::from_const(product.max_demand[r]),
            ));
        }
        Ok(rows)
    }

    fn recycled_pinned(&self) -> Result<Vec<Constraint>, ModelError> {
        let g = GroupId::RecycledContentPinned;
        let mut rows = vec![];
        for t in 0..self.sets.products.len() {
            let product = self.product(t);
            if product.policy != RecycledContentPolicy::Pinned {
                continue;
            }
            let anchor = product.baseline_average() * product.old_demand_total();
            rows.push(Constraint::new(
                g,
                row_name(g, &[&product.name]),
                self.level_sum(t, |_, level| level, g)?,
                Sense::Eq,
                LinearExpr::from_const(anchor),
            ));
        }
        Ok(rows)
    }

    fn recycled_ceiling(&self) -> Result<Vec<Constraint>, ModelError> {
        let g = GroupId::RecycledContentCeiling;
        let mut rows = vec![];
        for t in 0..self.sets.products.len() {
            let product = self.product(t);
            if product.policy == RecycledContentPolicy::Pinned || self.is_target(t) {
                continue;
            }
            let ceiling = product.baseline_average() * product.old_demand_total();
            rows.push(Constraint::new(
                g,
                row_name(g, &[&product.name]),
                self.level_sum(t, |_, level| level, g)?,
                Sense::Le,
                LinearExpr::from_const(ceiling),
            ));
        }
        Ok(rows)
    }

    fn recycled_target(&self) -> Result<Vec<Constraint>, ModelError> {
        let g = GroupId::RecycledContentTarget;
        let mut rows = vec![];
        for t in 0..self.sets.products.len() {
            let product = self.product(t);
            let Some(delta) = self.state.recycled_targets.get(&product.name) else { continue };
            let share = product.baseline_average() + delta / 100.0;
            // sum(r * d_r) >= share * sum(d_r)
            rows.push(Constraint::new(
                g,
                row_name(g, &[&product.name]),
                self.level_sum(t, |_, level| level - share, g)?,
                Sense::Ge,
                LinearExpr::zero(),
            ));
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sets::build_sets;
    use crate::testkit;

    fn with_rules<T>(state: &ScenarioState, f: impl FnOnce(&Rules<'_>) -> T) -> T {
        let params = testkit::two_grade();
        let sets = build_sets(&params, &testkit::products(&params)).unwrap();
        let vars = VarSpace::declare(&sets);
        let rules = Rules {
            params: &params,
            sets: &sets,
            vars: &vars,
            state,
        };
        f(&rules)
    }

    #[test]
    fn test_every_group_builds() {
        with_rules(&ScenarioState::default(), |rules| {
            for id in GroupId::ALL {
                let rows = rules.build(id).unwrap();
                assert!(rows.iter().all(|c| c.group() == id));
            }
        });
    }

    #[test]
    fn test_pinned_and_floating_split() {
        with_rules(&ScenarioState::default(), |rules| {
            let pinned = rules.build(GroupId::RecycledContentPinned).unwrap();
            let ceiling = rules.build(GroupId::RecycledContentCeiling).unwrap();
            let max = rules.build(GroupId::MaxDemand).unwrap();
            assert_eq!(pinned.len(), 1);
            assert_eq!(pinned[0].name(), "recycled_content_pinned[News]");
            assert_eq!(pinned[0].rhs(), 1.0);
            assert_eq!(ceiling.len(), 1);
            assert_eq!(ceiling[0].rhs(), 2.0);
            // only Board's three levels
            assert_eq!(max.len(), 3);
            assert!(rules.build(GroupId::RecycledContentTarget).unwrap().is_empty());
        });
    }

    #[test]
    fn test_target_moves_product_from_ceiling_to_floor() {
        let mut state = ScenarioState::default();
        state.recycled_targets.insert("Board".into(), 10.0);
        with_rules(&state, |rules| {
            assert!(rules.build(GroupId::RecycledContentCeiling).unwrap().is_empty());
            let target = rules.build(GroupId::RecycledContentTarget).unwrap();
            assert_eq!(target.len(), 1);
            assert_eq!(target[0].sense(), Sense::Ge);
            // level 0.5 coefficient: 0.5 - 0.6
            let d = rules.vars.id(VarKey::Demand { level: 1, product: 0 }).unwrap();
            assert!((target[0].expr().coefficient(d) + 0.1).abs() < 1e-12);
        });
    }

    #[test]
    fn test_inflow_uses_overlay() {
        let mut state = ScenarioState::default();
        state.yields.mixed_paper_loss = Some(10.0);
        with_rules(&state, |rules| {
            let rows = rules.build(GroupId::RecoveredPulpInflow).unwrap();
            let mix = rules.vars.id(VarKey::RecoveredFiberToPulp { fiber: 1, pulp: 0 }).unwrap();
            let occ = rules.vars.id(VarKey::RecoveredFiberToPulp { fiber: 0, pulp: 0 }).unwrap();
            assert!((rows[0].expr().coefficient(mix) - 0.72).abs() < 1e-12);
            assert!((rows[0].expr().coefficient(occ) - 0.9).abs() < 1e-12);
        });
    }

    #[test]
    fn test_missing_recipe_entry_is_build_error() {
        let mut params = testkit::two_grade();
        params.recipe_min.get_mut("MIX").unwrap().clear();
        let sets = build_sets(&params, &testkit::products(&params)).unwrap();
        let vars = VarSpace::declare(&sets);
        let state = ScenarioState::default();
        let rules = Rules {
            params: &params,
            sets: &sets,
            vars: &vars,
            state: &state,
        };
        let err = rules.build(GroupId::RecoveredRecipeMin).unwrap_err();
        match err {
            ModelError::ConstraintBuild { group, missing } => {
                assert_eq!(group, "recovered_recipe_min");
                assert!(missing.contains("recipe_min[MIX][RecPulp]"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
