//! Upgrade history records.
//!
//! One record is written per committed upgrade run, in the same sled
//! transaction as the version marker it describes.

use crate::error::Error;
use crate::migration::UpgradeOutcome;
use rkyv::{Archive, Deserialize, Serialize};

/// A step executed during a recorded upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct AppliedStep {
    /// Step version.
    pub version: String,
    /// Step description.
    pub description: String,
    /// Whether a force probe triggered the step.
    pub forced: bool,
}

/// A committed upgrade run.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct UpgradeRecord {
    /// Component name.
    pub component: String,
    /// Installed version before the run.
    pub from_version: Option<String>,
    /// Installed version after the run.
    pub to_version: String,
    /// Steps executed, in order.
    pub steps: Vec<AppliedStep>,
    /// Commit time (microseconds since epoch).
    pub applied_at: u64,
}

impl UpgradeRecord {
    /// Build a record from a finished run, stamped with the current time.
    pub fn from_outcome(outcome: &UpgradeOutcome) -> Self {
        Self {
            component: outcome.component.clone(),
            from_version: outcome.from_version.map(|v| v.to_string()),
            to_version: outcome.to_version.to_string(),
            steps: outcome
                .executed
                .iter()
                .map(|s| AppliedStep {
                    version: s.version.to_string(),
                    description: s.description.clone(),
                    forced: s.forced,
                })
                .collect(),
            applied_at: current_timestamp(),
        }
    }

    /// Serialize the record to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Get current timestamp in microseconds since epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// History key: component name, a zero separator, then a big-endian sequence.
pub(crate) fn history_key(component: &str, sequence: u64) -> Vec<u8> {
    let mut key = history_prefix(component);
    key.extend_from_slice(&sequence.to_be_bytes());
    key
}

/// Prefix shared by every history key of `component`.
pub(crate) fn history_prefix(component: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(component.len() + 1 + 8);
    key.extend_from_slice(component.as_bytes());
    key.push(0);
    key
}
