//! Attribute catalog for EAV entity types.
//!
//! The catalog holds attribute definitions, attribute sets, the groups
//! within each set, and the placement of attributes into those groups.

mod attribute;
mod state;
mod store;
mod types;

pub use attribute::{AttributeDefinition, AttributeFlags, AttributeSpec, AttributeUpdate};
pub use state::{CatalogState, GroupSummary, Placement};
pub use store::AttributeStore;
pub use types::{AttributeId, GroupId, InputWidget, Scope, SetId, ValueType};
