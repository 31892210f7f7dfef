//! Attribute group reconciliation.
//!
//! For every attribute set of an entity type, a [`GroupPlan`] is brought
//! into effect in three phases:
//!
//! 1. **Capture** the foreign members of the legacy group, if one exists.
//!    Foreign members are attributes in the legacy group that the plan does
//!    not own. The capture reads membership before any write.
//! 2. **Retire** the legacy group. Its memberships go with it.
//! 3. **Ensure and repopulate** the target group: create it if needed,
//!    place every owned attribute at its declared position, then put the
//!    captured foreign attributes back at the fallback position.
//!
//! Every phase is idempotent, so an interrupted run can simply be repeated.
//! Concurrent writers to the same store between capture and repopulation
//! are not supported.

use super::error::MigrationError;
use crate::catalog::{AttributeId, AttributeStore, GroupId, SetId};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Position given to foreign attributes carried over from a legacy group.
///
/// Lower than any owned position, so carried-over attributes render first
/// and together.
pub const FOREIGN_ATTRIBUTE_POSITION: i32 = 0;

/// An attribute the plan owns, with its display position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    /// Attribute code.
    pub code: String,
    /// Position within the target group.
    pub position: i32,
}

/// Desired state of one group across all attribute sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    /// Name of the group to reconcile into.
    pub target_group: String,
    /// Sort order used when the target group is created.
    pub sort_order: i32,
    /// Owned attributes, in placement order.
    pub members: Vec<GroupMember>,
    /// Previous name of the group, retired on reconciliation.
    pub legacy_group: Option<String>,
}

impl GroupPlan {
    /// Create a plan with no members.
    pub fn new(target_group: impl Into<String>, sort_order: i32) -> Self {
        Self {
            target_group: target_group.into(),
            sort_order,
            members: Vec::new(),
            legacy_group: None,
        }
    }

    /// Add an owned attribute at `position`.
    pub fn member(mut self, code: impl Into<String>, position: i32) -> Self {
        self.members.push(GroupMember {
            code: code.into(),
            position,
        });
        self
    }

    /// Set the legacy group name to retire.
    pub fn replacing(mut self, legacy_group: impl Into<String>) -> Self {
        self.legacy_group = Some(legacy_group.into());
        self
    }

    /// The legacy group name, unless it is the target itself.
    pub fn distinct_legacy(&self) -> Option<&str> {
        self.legacy_group
            .as_deref()
            .filter(|legacy| *legacy != self.target_group)
    }

    /// Position for carried-over foreign attributes.
    ///
    /// [`FOREIGN_ATTRIBUTE_POSITION`], or one below the lowest owned
    /// position if a member was declared at or below it.
    pub fn foreign_position(&self) -> i32 {
        let lowest = self
            .members
            .iter()
            .map(|m| m.position)
            .min()
            .unwrap_or(i32::MAX);
        FOREIGN_ATTRIBUTE_POSITION.min(lowest.saturating_sub(1))
    }
}

/// Foreign members captured from a legacy group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyCapture {
    /// The legacy group.
    pub group_id: GroupId,
    /// Attributes in it that the plan does not own.
    pub foreign: BTreeSet<AttributeId>,
}

/// Result of reconciling one attribute set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetReconciliation {
    /// The attribute set.
    pub set_id: SetId,
    /// The target group.
    pub group_id: GroupId,
    /// Whether the target group had to be created.
    pub created_group: bool,
    /// Whether a legacy group was retired.
    pub retired_legacy: bool,
    /// Number of owned attributes placed.
    pub placed: usize,
    /// Foreign attributes reinserted from the legacy group.
    pub reinserted: Vec<AttributeId>,
}

/// Result of reconciling every set of an entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Per-set results, in set order.
    pub sets: Vec<SetReconciliation>,
}

impl ReconcileReport {
    /// Number of legacy groups retired.
    pub fn retired_count(&self) -> usize {
        self.sets.iter().filter(|s| s.retired_legacy).count()
    }

    /// Number of foreign attributes reinserted across all sets.
    pub fn reinserted_count(&self) -> usize {
        self.sets.iter().map(|s| s.reinserted.len()).sum()
    }
}

/// Reconciles attribute groups against a [`GroupPlan`].
pub struct GroupReconciler;

impl GroupReconciler {
    /// Reconcile `plan` in every attribute set of `entity_type`.
    ///
    /// The first failing set aborts the whole call.
    pub fn reconcile(
        store: &mut dyn AttributeStore,
        entity_type: &str,
        plan: &GroupPlan,
    ) -> Result<ReconcileReport, MigrationError> {
        let set_ids = store.list_attribute_set_ids(entity_type)?;
        if set_ids.is_empty() {
            debug!(entity_type, group = %plan.target_group, "no attribute sets to reconcile");
        }

        let mut report = ReconcileReport::default();
        for set_id in set_ids {
            report
                .sets
                .push(Self::reconcile_set(store, entity_type, set_id, plan)?);
        }

        info!(
            entity_type,
            group = %plan.target_group,
            sets = report.sets.len(),
            retired = report.retired_count(),
            reinserted = report.reinserted_count(),
            "attribute group reconciled"
        );
        Ok(report)
    }

    /// Reconcile `plan` in a single attribute set.
    pub fn reconcile_set(
        store: &mut dyn AttributeStore,
        entity_type: &str,
        set_id: SetId,
        plan: &GroupPlan,
    ) -> Result<SetReconciliation, MigrationError> {
        // Resolve owned ids first so a missing prerequisite fails before
        // anything in this set is touched.
        let owned = Self::resolve_members(&*store, entity_type, plan)?;
        let owned_ids: BTreeSet<AttributeId> = owned.iter().map(|(id, _)| *id).collect();

        let capture = match plan.distinct_legacy() {
            Some(legacy) => {
                let capture =
                    Self::capture_legacy(&*store, entity_type, set_id, legacy, &owned_ids)?;
                if capture.is_some() {
                    Self::retire_legacy(store, entity_type, set_id, legacy)?;
                }
                capture
            }
            None => None,
        };

        let (group_id, created_group) = Self::ensure_target_group(store, entity_type, set_id, plan)?;

        for (attribute_id, position) in &owned {
            store.add_attribute_to_group(entity_type, set_id, group_id, *attribute_id, *position)?;
        }

        let mut reinserted = Vec::new();
        if let Some(capture) = &capture {
            let position = plan.foreign_position();
            for attribute_id in capture.foreign.difference(&owned_ids) {
                store.add_attribute_to_group(entity_type, set_id, group_id, *attribute_id, position)?;
                reinserted.push(*attribute_id);
            }
        }

        debug!(
            entity_type,
            set_id = set_id.0,
            group_id = group_id.0,
            created_group,
            placed = owned.len(),
            reinserted = reinserted.len(),
            "attribute set reconciled"
        );

        Ok(SetReconciliation {
            set_id,
            group_id,
            created_group,
            retired_legacy: capture.is_some(),
            placed: owned.len(),
            reinserted,
        })
    }

    /// Resolve every owned code to its attribute id, keeping positions.
    pub fn resolve_members(
        store: &dyn AttributeStore,
        entity_type: &str,
        plan: &GroupPlan,
    ) -> Result<Vec<(AttributeId, i32)>, MigrationError> {
        plan.members
            .iter()
            .map(|member| {
                let attribute = store.get_attribute(entity_type, &member.code)?.ok_or_else(|| {
                    MigrationError::MissingPrerequisiteAttribute {
                        entity_type: entity_type.to_string(),
                        code: member.code.clone(),
                    }
                })?;
                Ok((attribute.id, member.position))
            })
            .collect()
    }

    /// Read the foreign members of `legacy` without modifying anything.
    ///
    /// Returns `None` when the legacy group does not exist in the set.
    pub fn capture_legacy(
        store: &dyn AttributeStore,
        entity_type: &str,
        set_id: SetId,
        legacy: &str,
        owned: &BTreeSet<AttributeId>,
    ) -> Result<Option<LegacyCapture>, MigrationError> {
        let Some(group_id) = store.get_attribute_group(entity_type, set_id, legacy)? else {
            return Ok(None);
        };

        let members = store.list_attribute_ids_in_group(entity_type, set_id, group_id)?;
        let foreign: BTreeSet<AttributeId> = members.difference(owned).copied().collect();

        debug!(
            entity_type,
            set_id = set_id.0,
            legacy,
            members = members.len(),
            foreign = foreign.len(),
            "legacy group captured"
        );
        Ok(Some(LegacyCapture { group_id, foreign }))
    }

    /// Delete the legacy group together with its memberships.
    pub fn retire_legacy(
        store: &mut dyn AttributeStore,
        entity_type: &str,
        set_id: SetId,
        legacy: &str,
    ) -> Result<(), MigrationError> {
        store.remove_attribute_group(entity_type, set_id, legacy)?;
        info!(entity_type, set_id = set_id.0, legacy, "legacy attribute group removed");
        Ok(())
    }

    /// Return the target group id, creating the group when absent.
    ///
    /// The flag is `true` when the group was created by this call.
    pub fn ensure_target_group(
        store: &mut dyn AttributeStore,
        entity_type: &str,
        set_id: SetId,
        plan: &GroupPlan,
    ) -> Result<(GroupId, bool), MigrationError> {
        if let Some(group_id) = store.get_attribute_group(entity_type, set_id, &plan.target_group)? {
            return Ok((group_id, false));
        }

        let group_id =
            store.create_attribute_group(entity_type, set_id, &plan.target_group, plan.sort_order)?;
        info!(
            entity_type,
            set_id = set_id.0,
            group = %plan.target_group,
            sort_order = plan.sort_order,
            "attribute group created"
        );
        Ok((group_id, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeSpec, CatalogState, InputWidget, ValueType};

    const PRODUCT: &str = "catalog_product";

    fn plan() -> GroupPlan {
        GroupPlan::new("Freight Shipping", 101)
            .member("freight_class", 1)
            .member("must_ship_freight", 10)
            .replacing("migration-freight-shipping")
    }

    fn attr(catalog: &mut CatalogState, code: &str) -> AttributeId {
        catalog
            .create_attribute(PRODUCT, &AttributeSpec::new(code, ValueType::Int, InputWidget::Text))
            .unwrap()
    }

    fn setup() -> (CatalogState, SetId) {
        let mut catalog = CatalogState::new();
        let set = catalog.create_attribute_set(PRODUCT, "Default").unwrap();
        attr(&mut catalog, "freight_class");
        attr(&mut catalog, "must_ship_freight");
        (catalog, set)
    }

    fn positions(catalog: &CatalogState, set: SetId, group: &str) -> Vec<(String, i32)> {
        let group = catalog.get_attribute_group(PRODUCT, set, group).unwrap().unwrap();
        catalog
            .placements(PRODUCT, set, group)
            .unwrap()
            .into_iter()
            .map(|p| (p.code, p.position))
            .collect()
    }

    #[test]
    fn test_plan_builder() {
        let plan = plan();
        assert_eq!(plan.members.len(), 2);
        assert_eq!(plan.distinct_legacy(), Some("migration-freight-shipping"));
        assert_eq!(plan.foreign_position(), FOREIGN_ATTRIBUTE_POSITION);
    }

    #[test]
    fn test_foreign_position_below_lowest_member() {
        let plan = GroupPlan::new("G", 1).member("a", -3).member("b", 4);
        assert_eq!(plan.foreign_position(), -4);
        assert_eq!(GroupPlan::new("G", 1).foreign_position(), FOREIGN_ATTRIBUTE_POSITION);
    }

    #[test]
    fn test_legacy_equal_to_target_is_ignored() {
        let plan = GroupPlan::new("Shipping", 99).replacing("Shipping");
        assert_eq!(plan.distinct_legacy(), None);
    }

    #[test]
    fn test_creates_group_and_places_members() {
        let (mut catalog, set) = setup();
        let report = GroupReconciler::reconcile(&mut catalog, PRODUCT, &plan()).unwrap();

        assert_eq!(report.sets.len(), 1);
        assert!(report.sets[0].created_group);
        assert!(!report.sets[0].retired_legacy);
        assert_eq!(report.sets[0].placed, 2);
        assert_eq!(
            positions(&catalog, set, "Freight Shipping"),
            vec![("freight_class".to_string(), 1), ("must_ship_freight".to_string(), 10)]
        );

        let groups = catalog.groups(PRODUCT, set).unwrap();
        assert_eq!(groups[0].sort_order, 101);
    }

    #[test]
    fn test_existing_group_is_reused() {
        let (mut catalog, set) = setup();
        let existing = catalog
            .create_attribute_group(PRODUCT, set, "Freight Shipping", 7)
            .unwrap();

        let report = GroupReconciler::reconcile(&mut catalog, PRODUCT, &plan()).unwrap();
        assert!(!report.sets[0].created_group);
        assert_eq!(report.sets[0].group_id, existing);
        // The sort order of an existing group is left alone.
        assert_eq!(catalog.groups(PRODUCT, set).unwrap()[0].sort_order, 7);
    }

    #[test]
    fn test_legacy_group_merged_and_removed() {
        let (mut catalog, set) = setup();
        let foreign = attr(&mut catalog, "custom_field_x");
        let own = catalog.get_attribute(PRODUCT, "freight_class").unwrap().unwrap().id;
        let legacy = catalog
            .create_attribute_group(PRODUCT, set, "migration-freight-shipping", 50)
            .unwrap();
        catalog.add_attribute_to_group(PRODUCT, set, legacy, foreign, 3).unwrap();
        catalog.add_attribute_to_group(PRODUCT, set, legacy, own, 4).unwrap();

        let report = GroupReconciler::reconcile(&mut catalog, PRODUCT, &plan()).unwrap();

        assert!(report.sets[0].retired_legacy);
        assert_eq!(report.sets[0].reinserted, vec![foreign]);
        assert!(catalog
            .get_attribute_group(PRODUCT, set, "migration-freight-shipping")
            .unwrap()
            .is_none());
        assert_eq!(
            positions(&catalog, set, "Freight Shipping"),
            vec![
                ("custom_field_x".to_string(), FOREIGN_ATTRIBUTE_POSITION),
                ("freight_class".to_string(), 1),
                ("must_ship_freight".to_string(), 10),
            ]
        );
    }

    #[test]
    fn test_capture_excludes_owned_and_reads_only() {
        let (mut catalog, set) = setup();
        let foreign = attr(&mut catalog, "custom_field_x");
        let own = catalog.get_attribute(PRODUCT, "must_ship_freight").unwrap().unwrap().id;
        let legacy = catalog.create_attribute_group(PRODUCT, set, "Old", 1).unwrap();
        catalog.add_attribute_to_group(PRODUCT, set, legacy, foreign, 1).unwrap();
        catalog.add_attribute_to_group(PRODUCT, set, legacy, own, 2).unwrap();
        let before = catalog.clone();

        let owned = BTreeSet::from([own]);
        let capture = GroupReconciler::capture_legacy(&catalog, PRODUCT, set, "Old", &owned)
            .unwrap()
            .unwrap();

        assert_eq!(capture.group_id, legacy);
        assert_eq!(capture.foreign, BTreeSet::from([foreign]));
        assert_eq!(catalog, before);
    }

    #[test]
    fn test_capture_missing_legacy() {
        let (catalog, set) = setup();
        let capture = GroupReconciler::capture_legacy(
            &catalog,
            PRODUCT,
            set,
            "migration-freight-shipping",
            &BTreeSet::new(),
        )
        .unwrap();
        assert!(capture.is_none());
    }

    #[test]
    fn test_missing_prerequisite_fails_before_mutation() {
        let mut catalog = CatalogState::new();
        let set = catalog.create_attribute_set(PRODUCT, "Default").unwrap();
        attr(&mut catalog, "freight_class");
        catalog
            .create_attribute_group(PRODUCT, set, "migration-freight-shipping", 1)
            .unwrap();
        let before = catalog.clone();

        let err = GroupReconciler::reconcile(&mut catalog, PRODUCT, &plan()).unwrap_err();
        assert!(matches!(
            err,
            MigrationError::MissingPrerequisiteAttribute { ref code, .. } if code == "must_ship_freight"
        ));
        assert_eq!(catalog, before);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let (mut catalog, set) = setup();
        let foreign = attr(&mut catalog, "custom_field_x");
        let legacy = catalog
            .create_attribute_group(PRODUCT, set, "migration-freight-shipping", 50)
            .unwrap();
        catalog.add_attribute_to_group(PRODUCT, set, legacy, foreign, 3).unwrap();

        GroupReconciler::reconcile(&mut catalog, PRODUCT, &plan()).unwrap();
        let after_first = catalog.clone();
        let second = GroupReconciler::reconcile(&mut catalog, PRODUCT, &plan()).unwrap();

        assert_eq!(catalog, after_first);
        assert!(!second.sets[0].created_group);
        assert!(!second.sets[0].retired_legacy);
        assert!(second.sets[0].reinserted.is_empty());
    }

    #[test]
    fn test_foreign_members_computed_per_set() {
        let (mut catalog, default) = setup();
        let apparel = catalog.create_attribute_set(PRODUCT, "Apparel").unwrap();
        let only_default = attr(&mut catalog, "custom_default");
        let only_apparel = attr(&mut catalog, "custom_apparel");

        let g1 = catalog
            .create_attribute_group(PRODUCT, default, "migration-freight-shipping", 1)
            .unwrap();
        catalog.add_attribute_to_group(PRODUCT, default, g1, only_default, 1).unwrap();
        let g2 = catalog
            .create_attribute_group(PRODUCT, apparel, "migration-freight-shipping", 1)
            .unwrap();
        catalog.add_attribute_to_group(PRODUCT, apparel, g2, only_apparel, 1).unwrap();

        let report = GroupReconciler::reconcile(&mut catalog, PRODUCT, &plan()).unwrap();
        assert_eq!(report.sets[0].reinserted, vec![only_default]);
        assert_eq!(report.sets[1].reinserted, vec![only_apparel]);
        assert_eq!(report.reinserted_count(), 2);
        assert_eq!(report.retired_count(), 2);
    }

    #[test]
    fn test_no_attribute_sets_is_noop() {
        let mut catalog = CatalogState::new();
        attr(&mut catalog, "freight_class");
        attr(&mut catalog, "must_ship_freight");

        let report = GroupReconciler::reconcile(&mut catalog, PRODUCT, &plan()).unwrap();
        assert!(report.sets.is_empty());
    }

    #[test]
    fn test_legacy_same_as_target_keeps_group() {
        let (mut catalog, set) = setup();
        let foreign = attr(&mut catalog, "custom_field_x");
        let group = catalog
            .create_attribute_group(PRODUCT, set, "Freight Shipping", 101)
            .unwrap();
        catalog.add_attribute_to_group(PRODUCT, set, group, foreign, 5).unwrap();

        let plan = plan().replacing("Freight Shipping");
        let report = GroupReconciler::reconcile(&mut catalog, PRODUCT, &plan).unwrap();

        assert!(!report.sets[0].retired_legacy);
        assert_eq!(report.sets[0].group_id, group);
        // Untouched foreign member keeps its own position.
        assert!(positions(&catalog, set, "Freight Shipping")
            .contains(&("custom_field_x".to_string(), 5)));
    }
}
