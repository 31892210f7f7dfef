//! In-memory EAV catalog implementing [`AttributeStore`].
//!
//! The whole catalog is a single value so that a migration run can work on
//! a staged copy and persist it as one snapshot.

use super::{
    AttributeDefinition, AttributeId, AttributeSpec, AttributeStore, AttributeUpdate, GroupId,
    SetId,
};
use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Attribute definitions and sets of one entity type.
#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct EntityTypeState {
    /// Attribute definitions keyed by code.
    pub attributes: BTreeMap<String, AttributeDefinition>,
    /// Attribute sets keyed by set id.
    pub sets: BTreeMap<u32, AttributeSetState>,
}

/// One attribute set: its groups and attribute placements.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct AttributeSetState {
    /// Set name.
    pub name: String,
    /// Groups keyed by group id.
    pub groups: BTreeMap<u32, GroupState>,
    /// Placements keyed by attribute id. One row per attribute per set.
    pub placements: BTreeMap<u32, PlacementState>,
}

/// A group inside a set.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct GroupState {
    /// Group name, unique within the set.
    pub name: String,
    /// Display order of the group.
    pub sort_order: i32,
}

/// Where an attribute sits inside a set.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct PlacementState {
    /// Owning group id.
    pub group_id: u32,
    /// Display position within the group.
    pub position: i32,
}

/// Summary of a group for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    /// Group id.
    pub id: GroupId,
    /// Group name.
    pub name: String,
    /// Display order.
    pub sort_order: i32,
}

/// An attribute placed in a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Attribute id.
    pub attribute_id: AttributeId,
    /// Attribute code.
    pub code: String,
    /// Display position.
    pub position: i32,
}

/// The complete attribute catalog.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct CatalogState {
    /// Entity types keyed by code.
    pub entity_types: BTreeMap<String, EntityTypeState>,
    next_attribute_id: u32,
    next_set_id: u32,
    next_group_id: u32,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogState {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            entity_types: BTreeMap::new(),
            next_attribute_id: 1,
            next_set_id: 1,
            next_group_id: 1,
        }
    }

    /// Create an attribute set for an entity type.
    pub fn create_attribute_set(
        &mut self,
        entity_type: &str,
        name: impl Into<String>,
    ) -> Result<SetId, Error> {
        let name = name.into();
        let id = self.next_set_id;
        let entity = self.entity_types.entry(entity_type.to_string()).or_default();

        if entity.sets.values().any(|s| s.name == name) {
            return Err(Error::DuplicateAttributeSet {
                entity_type: entity_type.to_string(),
                name,
            });
        }

        entity.sets.insert(
            id,
            AttributeSetState {
                name,
                groups: BTreeMap::new(),
                placements: BTreeMap::new(),
            },
        );
        self.next_set_id += 1;
        Ok(SetId(id))
    }

    /// Find an attribute set by name.
    pub fn find_attribute_set(&self, entity_type: &str, name: &str) -> Option<SetId> {
        self.entity_types.get(entity_type).and_then(|e| {
            e.sets
                .iter()
                .find(|(_, s)| s.name == name)
                .map(|(id, _)| SetId(*id))
        })
    }

    /// Name of an attribute set.
    pub fn attribute_set_name(&self, entity_type: &str, set_id: SetId) -> Option<&str> {
        self.entity_types
            .get(entity_type)
            .and_then(|e| e.sets.get(&set_id.0))
            .map(|s| s.name.as_str())
    }

    /// List entity type codes.
    pub fn entity_types(&self) -> Vec<&str> {
        self.entity_types.keys().map(|s| s.as_str()).collect()
    }

    /// List attribute definitions of an entity type, ordered by code.
    pub fn attributes(&self, entity_type: &str) -> Vec<&AttributeDefinition> {
        self.entity_types
            .get(entity_type)
            .map(|e| e.attributes.values().collect())
            .unwrap_or_default()
    }

    /// Look up an attribute by id.
    pub fn attribute_by_id(
        &self,
        entity_type: &str,
        attribute_id: AttributeId,
    ) -> Option<&AttributeDefinition> {
        self.entity_types
            .get(entity_type)?
            .attributes
            .values()
            .find(|a| a.id == attribute_id)
    }

    /// List the groups of a set ordered by sort order, then id.
    pub fn groups(&self, entity_type: &str, set_id: SetId) -> Result<Vec<GroupSummary>, Error> {
        let set = self.set(entity_type, set_id)?;
        let mut groups: Vec<GroupSummary> = set
            .groups
            .iter()
            .map(|(id, g)| GroupSummary {
                id: GroupId(*id),
                name: g.name.clone(),
                sort_order: g.sort_order,
            })
            .collect();
        groups.sort_by_key(|g| (g.sort_order, g.id));
        Ok(groups)
    }

    /// List the attributes placed in a group ordered by position, then id.
    pub fn placements(
        &self,
        entity_type: &str,
        set_id: SetId,
        group_id: GroupId,
    ) -> Result<Vec<Placement>, Error> {
        let set = self.group_set(entity_type, set_id, group_id)?;
        let mut placements: Vec<Placement> = set
            .placements
            .iter()
            .filter(|(_, p)| p.group_id == group_id.0)
            .map(|(attr, p)| {
                let attribute_id = AttributeId(*attr);
                Placement {
                    attribute_id,
                    code: self
                        .attribute_by_id(entity_type, attribute_id)
                        .map(|a| a.code().to_string())
                        .unwrap_or_default(),
                    position: p.position,
                }
            })
            .collect();
        placements.sort_by_key(|p| (p.position, p.attribute_id));
        Ok(placements)
    }

    /// Serialize the catalog to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a catalog from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        // sled values carry no alignment guarantee.
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }

    fn set(&self, entity_type: &str, set_id: SetId) -> Result<&AttributeSetState, Error> {
        self.entity_types
            .get(entity_type)
            .and_then(|e| e.sets.get(&set_id.0))
            .ok_or_else(|| Error::UnknownAttributeSet {
                entity_type: entity_type.to_string(),
                set_id,
            })
    }

    fn set_mut(
        &mut self,
        entity_type: &str,
        set_id: SetId,
    ) -> Result<&mut AttributeSetState, Error> {
        self.entity_types
            .get_mut(entity_type)
            .and_then(|e| e.sets.get_mut(&set_id.0))
            .ok_or_else(|| Error::UnknownAttributeSet {
                entity_type: entity_type.to_string(),
                set_id,
            })
    }

    fn group_set(
        &self,
        entity_type: &str,
        set_id: SetId,
        group_id: GroupId,
    ) -> Result<&AttributeSetState, Error> {
        let set = self.set(entity_type, set_id)?;
        if !set.groups.contains_key(&group_id.0) {
            return Err(Error::UnknownGroup { set_id, group_id });
        }
        Ok(set)
    }
}

impl AttributeStore for CatalogState {
    fn get_attribute(
        &self,
        entity_type: &str,
        code: &str,
    ) -> Result<Option<AttributeDefinition>, Error> {
        Ok(self
            .entity_types
            .get(entity_type)
            .and_then(|e| e.attributes.get(code))
            .cloned())
    }

    fn create_attribute(
        &mut self,
        entity_type: &str,
        spec: &AttributeSpec,
    ) -> Result<AttributeId, Error> {
        let id = AttributeId(self.next_attribute_id);
        let entity = self.entity_types.entry(entity_type.to_string()).or_default();

        if entity.attributes.contains_key(&spec.code) {
            return Err(Error::DuplicateAttribute {
                entity_type: entity_type.to_string(),
                code: spec.code.clone(),
            });
        }

        entity.attributes.insert(
            spec.code.clone(),
            AttributeDefinition {
                id,
                spec: spec.clone(),
            },
        );
        self.next_attribute_id += 1;
        Ok(id)
    }

    fn update_attribute(
        &mut self,
        entity_type: &str,
        code: &str,
        fields: &AttributeUpdate,
    ) -> Result<(), Error> {
        let definition = self
            .entity_types
            .get_mut(entity_type)
            .and_then(|e| e.attributes.get_mut(code))
            .ok_or_else(|| Error::UnknownAttribute {
                entity_type: entity_type.to_string(),
                code: code.to_string(),
            })?;

        fields.apply_to(&mut definition.spec);
        Ok(())
    }

    fn get_attribute_group(
        &self,
        entity_type: &str,
        set_id: SetId,
        name: &str,
    ) -> Result<Option<GroupId>, Error> {
        let set = self.set(entity_type, set_id)?;
        Ok(set
            .groups
            .iter()
            .find(|(_, g)| g.name == name)
            .map(|(id, _)| GroupId(*id)))
    }

    fn create_attribute_group(
        &mut self,
        entity_type: &str,
        set_id: SetId,
        name: &str,
        sort_order: i32,
    ) -> Result<GroupId, Error> {
        let id = self.next_group_id;
        let set = self.set_mut(entity_type, set_id)?;

        if set.groups.values().any(|g| g.name == name) {
            return Err(Error::DuplicateGroup {
                set_id,
                name: name.to_string(),
            });
        }

        set.groups.insert(
            id,
            GroupState {
                name: name.to_string(),
                sort_order,
            },
        );
        self.next_group_id += 1;
        Ok(GroupId(id))
    }

    fn remove_attribute_group(
        &mut self,
        entity_type: &str,
        set_id: SetId,
        name: &str,
    ) -> Result<(), Error> {
        let set = self.set_mut(entity_type, set_id)?;
        let Some(group_id) = set
            .groups
            .iter()
            .find(|(_, g)| g.name == name)
            .map(|(id, _)| *id)
        else {
            return Ok(());
        };

        set.groups.remove(&group_id);
        set.placements.retain(|_, p| p.group_id != group_id);
        Ok(())
    }

    fn add_attribute_to_group(
        &mut self,
        entity_type: &str,
        set_id: SetId,
        group_id: GroupId,
        attribute_id: AttributeId,
        position: i32,
    ) -> Result<(), Error> {
        if self.attribute_by_id(entity_type, attribute_id).is_none() {
            return Err(Error::UnknownAttributeId {
                entity_type: entity_type.to_string(),
                attribute_id,
            });
        }

        let set = self.set_mut(entity_type, set_id)?;
        if !set.groups.contains_key(&group_id.0) {
            return Err(Error::UnknownGroup { set_id, group_id });
        }

        set.placements.insert(
            attribute_id.0,
            PlacementState {
                group_id: group_id.0,
                position,
            },
        );
        Ok(())
    }

    fn list_attribute_ids_in_group(
        &self,
        entity_type: &str,
        set_id: SetId,
        group_id: GroupId,
    ) -> Result<BTreeSet<AttributeId>, Error> {
        let set = self.group_set(entity_type, set_id, group_id)?;
        Ok(set
            .placements
            .iter()
            .filter(|(_, p)| p.group_id == group_id.0)
            .map(|(attr, _)| AttributeId(*attr))
            .collect())
    }

    fn list_attribute_set_ids(&self, entity_type: &str) -> Result<Vec<SetId>, Error> {
        Ok(self
            .entity_types
            .get(entity_type)
            .map(|e| e.sets.keys().map(|id| SetId(*id)).collect())
            .unwrap_or_default())
    }
}
