//! Versioned attribute migrations.
//!
//! This module provides idempotent EAV setup with:
//! - Semantic version gating of upgrade steps
//! - Create-if-absent attribute installation and partial updates
//! - Attribute group reconciliation with legacy group retirement
//! - A single loop over typed step descriptors
//!
//! # Legacy groups
//!
//! When a group is renamed, the old group is never edited in place. Its
//! members that the new layout does not own are captured, the old group is
//! deleted, and the captured attributes are placed into the new group at
//! [`FOREIGN_ATTRIBUTE_POSITION`].
//!
//! # Example
//!
//! ```ignore
//! use eavsetup_core::migration::{shipping, UpgradeContext};
//!
//! let sequencer = shipping::sequencer()?;
//! let mut ctx = UpgradeContext::new(&mut catalog, &mut config, "2.4.6");
//! let outcome = sequencer.upgrade(&mut versions, &mut ctx)?;
//! println!("{} steps executed", outcome.executed.len());
//! ```

pub mod context;
pub mod error;
pub mod installer;
pub mod reconciler;
pub mod sequencer;
pub mod shipping;
pub mod version;

pub use context::{ConfigWriter, MemoryConfig, MemoryVersions, UpgradeContext, VersionStore};
pub use error::MigrationError;
pub use installer::{AttributeInstaller, InstallOutcome};
pub use reconciler::{
    GroupMember, GroupPlan, GroupReconciler, LegacyCapture, ReconcileReport, SetReconciliation,
    FOREIGN_ATTRIBUTE_POSITION,
};
pub use sequencer::{
    ExecutedStep, StepAction, StepProbe, UpgradeOutcome, UpgradeSequencer, UpgradeStep,
};
pub use version::{SemVer, VersionGate};
