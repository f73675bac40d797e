use crate::model::error::ModelError;
use crate::model::linear::{sanitize, VarId};
use crate::model::sets::IndexSets;
use crate::model::GroupId;
use std::collections::HashMap;

/// Index tuple of a decision variable. Fields are positions in [`IndexSets`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VarKey {
    RecoveredFiberToPulp { fiber: usize, pulp: usize },
    VirginFiberToPulp { fiber: usize, pulp: usize },
    RecoveredPulpProduction(usize),
    VirginPulpProduction(usize),
    RecoveredPulpToProduct { pulp: usize, level: usize, product: usize },
    VirginPulpToProduct { pulp: usize, level: usize, product: usize },
    ExportNew(usize),
    Residue(usize),
    Demand { level: usize, product: usize },
    FiberWeight { level: usize, product: usize },
    NonFiberWeight { level: usize, product: usize },
    CollectionNew { product: usize, source: usize },
    CollectionDelta { product: usize, source: usize },
}

/// All decision variables of a model, declared once at build time.
#[derive(Debug, Clone)]
pub struct VarSpace {
    keys: Vec<VarKey>,
    names: Vec<String>,
    lookup: HashMap<VarKey, VarId>,
}

impl VarSpace {
    pub(crate) fn declare(sets: &IndexSets) -> Self {
        let mut space = VarSpace {
            keys: vec![],
            names: vec![],
            lookup: HashMap::new(),
        };
        let level_name = |t: usize, r: usize| format!("{}", sets.levels[t][r]);

        for (i, f) in sets.recovered_fibers.iter().enumerate() {
            for (p, pulp) in sets.recovered_pulps.iter().enumerate() {
                space.push(VarKey::RecoveredFiberToPulp { fiber: i, pulp: p }, &["rFiber2Pulp", f, pulp]);
            }
        }
        for (j, f) in sets.virgin_fibers.iter().enumerate() {
            for (q, pulp) in sets.virgin_pulps.iter().enumerate() {
                space.push(VarKey::VirginFiberToPulp { fiber: j, pulp: q }, &["vFiber2Pulp", f, pulp]);
            }
        }
        for (p, pulp) in sets.recovered_pulps.iter().enumerate() {
            space.push(VarKey::RecoveredPulpProduction(p), &["rPulpProd", pulp]);
        }
        for (q, pulp) in sets.virgin_pulps.iter().enumerate() {
            space.push(VarKey::VirginPulpProduction(q), &["vPulpProd", pulp]);
        }
        for (p, pulp) in sets.recovered_pulps.iter().enumerate() {
            for (r, t) in sets.demand_arcs() {
                let key = VarKey::RecoveredPulpToProduct { pulp: p, level: r, product: t };
                space.push(key, &["rPulp2Prod", pulp, &level_name(t, r), &sets.products[t]]);
            }
        }
        for (q, pulp) in sets.virgin_pulps.iter().enumerate() {
            for (r, t) in sets.demand_arcs() {
                let key = VarKey::VirginPulpToProduct { pulp: q, level: r, product: t };
                space.push(key, &["vPulp2Prod", pulp, &level_name(t, r), &sets.products[t]]);
            }
        }
        for (i, f) in sets.recovered_fibers.iter().enumerate() {
            space.push(VarKey::ExportNew(i), &["rExp", f]);
            space.push(VarKey::Residue(i), &["rResidue", f]);
        }
        for (r, t) in sets.demand_arcs() {
            let lv = level_name(t, r);
            let prod = &sets.products[t];
            space.push(VarKey::Demand { level: r, product: t }, &["prodDemand", &lv, prod]);
            space.push(VarKey::FiberWeight { level: r, product: t }, &["prodFiberWeight", &lv, prod]);
            space.push(VarKey::NonFiberWeight { level: r, product: t }, &["prodNonFiberWeight", &lv, prod]);
        }
        for (t, prod) in sets.products.iter().enumerate() {
            for (s, src) in sets.sources.iter().enumerate() {
                space.push(VarKey::CollectionNew { product: t, source: s }, &["sCollectNew", prod, src]);
                space.push(VarKey::CollectionDelta { product: t, source: s }, &["sCollectDelta", prod, src]);
            }
        }
        space
    }

    fn push(&mut self, key: VarKey, parts: &[&str]) {
        let id = VarId(self.keys.len());
        let name = parts.iter().map(|p| sanitize(p)).collect::<Vec<_>>().join("__");
        self.keys.push(key);
        self.names.push(name);
        self.lookup.insert(key, id);
    }

    pub fn id(&self, key: VarKey) -> Option<VarId> {
        self.lookup.get(&key).copied()
    }

    /// Like [`VarSpace::id`], reporting a missing variable against `group`.
    pub(crate) fn get(&self, key: VarKey, group: GroupId) -> Result<VarId, ModelError> {
        self.id(key)
            .ok_or_else(|| ModelError::missing(group, format!("variable {key:?}")))
    }

    pub fn key(&self, id: VarId) -> VarKey {
        self.keys[id.0]
    }

    pub fn name(&self, id: VarId) -> &str {
        &self.names[id.0]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sets::build_sets;
    use crate::testkit;

    #[test]
    fn test_declares_only_valid_levels() {
        let params = testkit::two_grade();
        let sets = build_sets(&params, &testkit::products(&params)).unwrap();
        let vars = VarSpace::declare(&sets);
        // Board has three levels, News two
        assert!(vars.id(VarKey::Demand { level: 2, product: 0 }).is_some());
        assert!(vars.id(VarKey::Demand { level: 2, product: 1 }).is_none());
        let per_pulp = 3 + 2;
        let expected = 2 + 1 // fiber -> pulp
            + 1 + 1 // pulp production
            + 2 * per_pulp // pulp -> product
            + 2 * 2 // export, residue
            + 3 * per_pulp // demand, fiber, non-fiber
            + 2 * 2 * 2; // collection new, delta
        assert_eq!(vars.len(), expected);
    }

    #[test]
    fn test_names_are_lp_safe() {
        let params = testkit::two_grade();
        let sets = build_sets(&params, &testkit::products(&params)).unwrap();
        let vars = VarSpace::declare(&sets);
        let id = vars.id(VarKey::Demand { level: 1, product: 0 }).unwrap();
        assert_eq!(vars.name(id), "prodDemand__0_5__Board");
        assert!(vars.names().iter().all(|n| n.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')));
    }
}
