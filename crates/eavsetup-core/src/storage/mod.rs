//! Persistence for catalog snapshots, installed versions, configuration
//! and upgrade history.

mod database;
mod history;

pub use database::{SetupDatabase, SetupTransaction, StagedVersions};
pub use history::{current_timestamp, AppliedStep, UpgradeRecord};
