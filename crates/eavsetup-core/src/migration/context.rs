//! Collaborator interfaces handed to upgrade steps.

use super::error::MigrationError;
use super::version::SemVer;
use crate::catalog::AttributeStore;
use crate::error::Error;
use std::collections::BTreeMap;

/// Key/value configuration sink.
pub trait ConfigWriter {
    /// Store `value` under `key`, replacing any previous value.
    fn save(&mut self, key: &str, value: &str) -> Result<(), Error>;
}

/// Persisted installed-version markers, one per component.
pub trait VersionStore {
    /// Version recorded for `component`, or `None` if it was never installed.
    fn installed_version(&self, component: &str) -> Result<Option<SemVer>, MigrationError>;

    /// Record a new installed version for `component`.
    fn set_installed_version(
        &mut self,
        component: &str,
        version: SemVer,
    ) -> Result<(), MigrationError>;
}

/// Configuration values held in memory until committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryConfig {
    values: BTreeMap<String, String>,
}

impl MemoryConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Iterate over all values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigWriter for MemoryConfig {
    fn save(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Version markers held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryVersions {
    versions: BTreeMap<String, SemVer>,
}

impl MemoryVersions {
    /// Create an empty version map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over all recorded versions.
    pub fn iter(&self) -> impl Iterator<Item = (&str, SemVer)> {
        self.versions.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl VersionStore for MemoryVersions {
    fn installed_version(&self, component: &str) -> Result<Option<SemVer>, MigrationError> {
        Ok(self.versions.get(component).copied())
    }

    fn set_installed_version(
        &mut self,
        component: &str,
        version: SemVer,
    ) -> Result<(), MigrationError> {
        self.versions.insert(component.to_string(), version);
        Ok(())
    }
}

/// Everything an upgrade step may touch.
pub struct UpgradeContext<'a> {
    /// Attribute metadata store.
    pub attributes: &'a mut dyn AttributeStore,
    /// Configuration sink.
    pub config: &'a mut dyn ConfigWriter,
    /// Version of the hosting platform running the upgrade.
    pub platform_version: &'a str,
}

impl<'a> UpgradeContext<'a> {
    /// Bundle the collaborators for one run.
    pub fn new(
        attributes: &'a mut dyn AttributeStore,
        config: &'a mut dyn ConfigWriter,
        platform_version: &'a str,
    ) -> Self {
        Self {
            attributes,
            config,
            platform_version,
        }
    }
}
