//! eavsetup core - EAV catalog, versioned attribute migrations and storage.
//!
//! This crate provides the attribute store interface with an in-memory
//! implementation, the upgrade engine, and a sled-backed setup database.

pub mod catalog;
pub mod error;
pub mod migration;
pub mod storage;

pub use catalog::{
    AttributeDefinition, AttributeFlags, AttributeId, AttributeSpec, AttributeStore,
    AttributeUpdate, CatalogState, GroupId, InputWidget, Scope, SetId, ValueType,
};
pub use error::Error;
pub use migration::{
    AttributeInstaller, GroupPlan, GroupReconciler, MigrationError, SemVer, UpgradeContext,
    UpgradeOutcome, UpgradeSequencer, UpgradeStep, VersionGate,
};
pub use storage::{SetupDatabase, SetupTransaction, UpgradeRecord};
