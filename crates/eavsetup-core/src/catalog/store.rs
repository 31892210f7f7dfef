//! The attribute store interface consumed by the migration engine.

use super::{AttributeDefinition, AttributeId, AttributeSpec, AttributeUpdate, GroupId, SetId};
use crate::error::Error;
use std::collections::BTreeSet;

/// CRUD access to attribute definitions, groups, and set membership.
///
/// Implementations are the sole source of truth; the engine keeps no
/// state of its own between calls. Adding an attribute that already sits
/// in another group of the same set moves it, so an attribute appears in
/// at most one group per set.
pub trait AttributeStore {
    /// Look up an attribute by code.
    fn get_attribute(
        &self,
        entity_type: &str,
        code: &str,
    ) -> Result<Option<AttributeDefinition>, Error>;

    /// Create a new attribute. Fails if the code already exists.
    fn create_attribute(
        &mut self,
        entity_type: &str,
        spec: &AttributeSpec,
    ) -> Result<AttributeId, Error>;

    /// Apply a partial update to an existing attribute.
    fn update_attribute(
        &mut self,
        entity_type: &str,
        code: &str,
        fields: &AttributeUpdate,
    ) -> Result<(), Error>;

    /// Resolve a group by name. Unknown names resolve to `None`.
    fn get_attribute_group(
        &self,
        entity_type: &str,
        set_id: SetId,
        name: &str,
    ) -> Result<Option<GroupId>, Error>;

    /// Create a group in a set.
    fn create_attribute_group(
        &mut self,
        entity_type: &str,
        set_id: SetId,
        name: &str,
        sort_order: i32,
    ) -> Result<GroupId, Error>;

    /// Remove a group and every membership pointing at it.
    /// Removing a group that does not exist is a no-op.
    fn remove_attribute_group(
        &mut self,
        entity_type: &str,
        set_id: SetId,
        name: &str,
    ) -> Result<(), Error>;

    /// Upsert the membership of `attribute_id` in `group_id` at `position`.
    fn add_attribute_to_group(
        &mut self,
        entity_type: &str,
        set_id: SetId,
        group_id: GroupId,
        attribute_id: AttributeId,
        position: i32,
    ) -> Result<(), Error>;

    /// List the attributes currently placed in a group.
    fn list_attribute_ids_in_group(
        &self,
        entity_type: &str,
        set_id: SetId,
        group_id: GroupId,
    ) -> Result<BTreeSet<AttributeId>, Error>;

    /// List every attribute set of an entity type, in ascending id order.
    fn list_attribute_set_ids(&self, entity_type: &str) -> Result<Vec<SetId>, Error>;
}
