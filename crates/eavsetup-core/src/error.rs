//! Core error types.

use crate::catalog::{AttributeId, GroupId, SetId};
use thiserror::Error;

/// Attribute store and persistence errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The attribute set does not belong to the entity type.
    #[error("unknown attribute set {set_id} for entity type {entity_type}")]
    UnknownAttributeSet {
        /// Entity type code.
        entity_type: String,
        /// The missing set.
        set_id: SetId,
    },

    /// The group does not exist in the attribute set.
    #[error("unknown attribute group {group_id} in set {set_id}")]
    UnknownGroup {
        /// The set that was searched.
        set_id: SetId,
        /// The missing group.
        group_id: GroupId,
    },

    /// No attribute with this code exists for the entity type.
    #[error("unknown attribute {entity_type}.{code}")]
    UnknownAttribute {
        /// Entity type code.
        entity_type: String,
        /// Attribute code.
        code: String,
    },

    /// No attribute with this id exists for the entity type.
    #[error("unknown attribute id {attribute_id} for entity type {entity_type}")]
    UnknownAttributeId {
        /// Entity type code.
        entity_type: String,
        /// The missing attribute id.
        attribute_id: AttributeId,
    },

    /// An attribute with this code already exists.
    #[error("attribute {entity_type}.{code} already exists")]
    DuplicateAttribute {
        /// Entity type code.
        entity_type: String,
        /// Attribute code.
        code: String,
    },

    /// A group with this name already exists in the set.
    #[error("attribute group {name:?} already exists in set {set_id}")]
    DuplicateGroup {
        /// The set holding the group.
        set_id: SetId,
        /// Group name.
        name: String,
    },

    /// An attribute set with this name already exists.
    #[error("attribute set {name:?} already exists for entity type {entity_type}")]
    DuplicateAttributeSet {
        /// Entity type code.
        entity_type: String,
        /// Set name.
        name: String,
    },

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),
}
