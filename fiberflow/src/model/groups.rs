use crate::model::error::ModelError;
use crate::model::linear::Constraint;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Named constraint group: one rule instantiated over its index set.
///
/// Groups are the unit of scenario mutation. Ordering follows declaration
/// order, which is also the row order handed to solvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupId {
    RecoveredPulpInflow,
    VirginPulpInflow,
    RecoveredPulpOutflow,
    VirginPulpOutflow,
    RecoveredPulpMinimum,
    VirginPulpMinimum,
    RecoveredPulpCapacity,
    VirginPulpCapacity,
    RecoveredPulpLevelUse,
    VirginPulpLevelUse,
    RecoveredRecipeMin,
    RecoveredRecipeMax,
    RecoveredRecipeExact,
    VirginRecipeExact,
    CollectionMax,
    CollectionMin,
    CollectionDelta,
    ExportCeiling,
    RecoveredFiberAvailability,
    TotalDemand,
    MinDemand,
    NonFiberMass,
    FiberMass,
    FiberBalance,
    RecycledBalance,
    VirginBalance,
    MaxDemand,
    RecycledContentPinned,
    RecycledContentCeiling,
    RecycledContentTarget,
}

impl GroupId {
    pub const ALL: [GroupId; 30] = [
        GroupId::RecoveredPulpInflow,
        GroupId::VirginPulpInflow,
        GroupId::RecoveredPulpOutflow,
        GroupId::VirginPulpOutflow,
        GroupId::RecoveredPulpMinimum,
        GroupId::VirginPulpMinimum,
        GroupId::RecoveredPulpCapacity,
        GroupId::VirginPulpCapacity,
        GroupId::RecoveredPulpLevelUse,
        GroupId::VirginPulpLevelUse,
        GroupId::RecoveredRecipeMin,
        GroupId::RecoveredRecipeMax,
        GroupId::RecoveredRecipeExact,
        GroupId::VirginRecipeExact,
        GroupId::CollectionMax,
        GroupId::CollectionMin,
        GroupId::CollectionDelta,
        GroupId::ExportCeiling,
        GroupId::RecoveredFiberAvailability,
        GroupId::TotalDemand,
        GroupId::MinDemand,
        GroupId::NonFiberMass,
        GroupId::FiberMass,
        GroupId::FiberBalance,
        GroupId::RecycledBalance,
        GroupId::VirginBalance,
        GroupId::MaxDemand,
        GroupId::RecycledContentPinned,
        GroupId::RecycledContentCeiling,
        GroupId::RecycledContentTarget,
    ];

    /// Groups that scenario operations may rewrite.
    pub const MUTABLE: [GroupId; 10] = [
        GroupId::RecoveredPulpInflow,
        GroupId::RecoveredRecipeMin,
        GroupId::RecoveredRecipeMax,
        GroupId::RecoveredRecipeExact,
        GroupId::RecoveredFiberAvailability,
        GroupId::TotalDemand,
        GroupId::MaxDemand,
        GroupId::RecycledContentPinned,
        GroupId::RecycledContentCeiling,
        GroupId::RecycledContentTarget,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            GroupId::RecoveredPulpInflow => "recovered_pulp_inflow",
            GroupId::VirginPulpInflow => "virgin_pulp_inflow",
            GroupId::RecoveredPulpOutflow => "recovered_pulp_outflow",
            GroupId::VirginPulpOutflow => "virgin_pulp_outflow",
            GroupId::RecoveredPulpMinimum => "recovered_pulp_minimum",
            GroupId::VirginPulpMinimum => "virgin_pulp_minimum",
            GroupId::RecoveredPulpCapacity => "recovered_pulp_capacity",
            GroupId::VirginPulpCapacity => "virgin_pulp_capacity",
            GroupId::RecoveredPulpLevelUse => "recovered_pulp_level_use",
            GroupId::VirginPulpLevelUse => "virgin_pulp_level_use",
            GroupId::RecoveredRecipeMin => "recovered_recipe_min",
            GroupId::RecoveredRecipeMax => "recovered_recipe_max",
            GroupId::RecoveredRecipeExact => "recovered_recipe_exact",
            GroupId::VirginRecipeExact => "virgin_recipe_exact",
            GroupId::CollectionMax => "collection_max",
            GroupId::CollectionMin => "collection_min",
            GroupId::CollectionDelta => "collection_delta",
            GroupId::ExportCeiling => "export_ceiling",
            GroupId::RecoveredFiberAvailability => "recovered_fiber_availability",
            GroupId::TotalDemand => "total_demand",
            GroupId::MinDemand => "min_demand",
            GroupId::NonFiberMass => "non_fiber_mass",
            GroupId::FiberMass => "fiber_mass",
            GroupId::FiberBalance => "fiber_balance",
            GroupId::RecycledBalance => "recycled_balance",
            GroupId::VirginBalance => "virgin_balance",
            GroupId::MaxDemand => "max_demand",
            GroupId::RecycledContentPinned => "recycled_content_pinned",
            GroupId::RecycledContentCeiling => "recycled_content_ceiling",
            GroupId::RecycledContentTarget => "recycled_content_target",
        }
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Live constraint set: exactly one version of each installed group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintGraph {
    groups: BTreeMap<GroupId, Vec<Constraint>>,
}

impl ConstraintGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn install(&mut self, id: GroupId, rows: Vec<Constraint>) {
        debug!(group = %id, rows = rows.len(), "installing constraint group");
        self.groups.insert(id, rows);
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.groups.contains_key(&id)
    }

    pub fn group(&self, id: GroupId) -> Option<&[Constraint]> {
        self.groups.get(&id).map(Vec::as_slice)
    }

    pub fn installed(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups.keys().copied()
    }

    pub(crate) fn remove(&mut self, id: GroupId) -> Result<Vec<Constraint>, ModelError> {
        self.groups.remove(&id).ok_or(ModelError::GroupNotFound(id))
    }

    /// Swap in every replacement, or none of them.
    pub(crate) fn replace_all(&mut self, replacements: Vec<(GroupId, Vec<Constraint>)>) -> Result<(), ModelError> {
        if let Some((missing, _)) = replacements.iter().find(|(id, _)| !self.contains(*id)) {
            return Err(ModelError::GroupNotFound(*missing));
        }
        for (id, rows) in replacements {
            debug!(group = %id, rows = rows.len(), "replacing constraint group");
            self.groups.insert(id, rows);
        }
        Ok(())
    }

    pub fn rows(&self) -> impl Iterator<Item = &Constraint> + '_ {
        self.groups.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
