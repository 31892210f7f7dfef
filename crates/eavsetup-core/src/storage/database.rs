//! Sled-backed setup database.
//!
//! Holds the catalog snapshot, installed versions, configuration values and
//! upgrade history in four trees. Upgrades work on a staged copy of all of
//! them and commit in one multi-tree transaction.

use super::history::{history_key, history_prefix, UpgradeRecord};
use crate::catalog::{CatalogState, SetId};
use crate::error::Error;
use crate::migration::{
    ConfigWriter, MemoryConfig, MemoryVersions, MigrationError, SemVer, UpgradeContext,
    UpgradeOutcome, UpgradeSequencer, VersionStore,
};
use sled::transaction::TransactionError;
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tracing::{debug, info};

/// Tree name for the catalog snapshot.
const CATALOG_TREE: &str = "eav:catalog";

/// Tree name for installed versions.
const VERSIONS_TREE: &str = "setup:versions";

/// Tree name for configuration values.
const CONFIG_TREE: &str = "setup:config";

/// Tree name for upgrade history.
const HISTORY_TREE: &str = "setup:history";

/// Key of the snapshot in the catalog tree.
const SNAPSHOT_KEY: &[u8] = b"snapshot";

/// Persistent store for catalog, versions, config and history.
pub struct SetupDatabase {
    db: Db,
    catalog_tree: Tree,
    versions_tree: Tree,
    config_tree: Tree,
    history_tree: Tree,
}

impl SetupDatabase {
    /// Open or create the setup trees in the given sled database.
    pub fn open(db: &Db) -> Result<Self, Error> {
        Ok(Self {
            db: db.clone(),
            catalog_tree: db.open_tree(CATALOG_TREE)?,
            versions_tree: db.open_tree(VERSIONS_TREE)?,
            config_tree: db.open_tree(CONFIG_TREE)?,
            history_tree: db.open_tree(HISTORY_TREE)?,
        })
    }

    /// Open or create a database at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let db = sled::Config::new().path(path.as_ref()).open()?;
        debug!(path = %path.as_ref().display(), "opened setup database");
        Self::open(&db)
    }

    /// Load the committed catalog, or an empty one on a fresh database.
    pub fn load_catalog(&self) -> Result<CatalogState, Error> {
        match self.catalog_tree.get(SNAPSHOT_KEY)? {
            Some(bytes) => CatalogState::from_bytes(&bytes),
            None => Ok(CatalogState::new()),
        }
    }

    /// Committed installed version of `component`.
    pub fn installed_version(&self, component: &str) -> Result<Option<SemVer>, MigrationError> {
        let Some(bytes) = self.versions_tree.get(component.as_bytes()).map_err(Error::from)? else {
            return Ok(None);
        };

        let text = std::str::from_utf8(&bytes).map_err(|e| MigrationError::MalformedVersion {
            input: String::from_utf8_lossy(&bytes).into_owned(),
            reason: e.to_string(),
        })?;
        SemVer::parse(text).map(Some)
    }

    /// Committed configuration value.
    pub fn config_value(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self
            .config_tree
            .get(key.as_bytes())?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    /// All committed configuration values in key order.
    pub fn config_values(&self) -> Result<Vec<(String, String)>, Error> {
        self.config_tree
            .iter()
            .map(|entry| {
                let (k, v) = entry?;
                Ok((
                    String::from_utf8_lossy(&k).into_owned(),
                    String::from_utf8_lossy(&v).into_owned(),
                ))
            })
            .collect()
    }

    /// Upgrade history of `component`, oldest first.
    pub fn history(&self, component: &str) -> Result<Vec<UpgradeRecord>, Error> {
        self.history_tree
            .scan_prefix(history_prefix(component))
            .map(|entry| {
                let (_, v) = entry?;
                UpgradeRecord::from_bytes(&v)
            })
            .collect()
    }

    /// Stage changes against a copy of the committed state.
    pub fn begin(&self) -> Result<SetupTransaction<'_>, Error> {
        Ok(SetupTransaction {
            database: self,
            catalog: self.load_catalog()?,
            config: MemoryConfig::new(),
            versions: StagedVersions {
                tree: &self.versions_tree,
                staged: MemoryVersions::new(),
            },
            history: Vec::new(),
        })
    }

    /// Run `sequencer` and commit everything it wrote.
    ///
    /// With `dry_run` the run happens against staged state that is then
    /// discarded. On error nothing is committed.
    pub fn upgrade(
        &self,
        sequencer: &UpgradeSequencer,
        platform_version: &str,
        dry_run: bool,
    ) -> Result<UpgradeOutcome, MigrationError> {
        let mut tx = self.begin()?;
        let outcome = tx.apply(sequencer, platform_version)?;

        if dry_run {
            info!(
                component = %outcome.component,
                executed = outcome.executed.len(),
                "dry run, discarding staged changes"
            );
            return Ok(outcome);
        }

        tx.commit()?;
        Ok(outcome)
    }

    /// Create an attribute set and commit it.
    pub fn create_attribute_set(&self, entity_type: &str, name: &str) -> Result<SetId, Error> {
        let mut tx = self.begin()?;
        let id = tx.catalog_mut().create_attribute_set(entity_type, name)?;
        tx.commit()?;
        info!(entity_type, name, set_id = id.0, "attribute set created");
        Ok(id)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}

/// Version markers staged on top of the committed tree.
pub struct StagedVersions<'db> {
    tree: &'db Tree,
    staged: MemoryVersions,
}

impl VersionStore for StagedVersions<'_> {
    fn installed_version(&self, component: &str) -> Result<Option<SemVer>, MigrationError> {
        if let Some(version) = self.staged.installed_version(component)? {
            return Ok(Some(version));
        }
        match self.tree.get(component.as_bytes()).map_err(Error::from)? {
            Some(bytes) => SemVer::parse(&String::from_utf8_lossy(&bytes)).map(Some),
            None => Ok(None),
        }
    }

    fn set_installed_version(
        &mut self,
        component: &str,
        version: SemVer,
    ) -> Result<(), MigrationError> {
        self.staged.set_installed_version(component, version)
    }
}

/// Staged changes against a [`SetupDatabase`].
///
/// Nothing reaches the database until [`SetupTransaction::commit`]; dropping
/// the transaction discards everything.
pub struct SetupTransaction<'db> {
    database: &'db SetupDatabase,
    catalog: CatalogState,
    config: MemoryConfig,
    versions: StagedVersions<'db>,
    history: Vec<UpgradeRecord>,
}

impl<'db> SetupTransaction<'db> {
    /// Staged catalog.
    pub fn catalog(&self) -> &CatalogState {
        &self.catalog
    }

    /// Mutable access to the staged catalog.
    pub fn catalog_mut(&mut self) -> &mut CatalogState {
        &mut self.catalog
    }

    /// Staged configuration writes.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Stage a configuration value.
    pub fn save_config(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.config.save(key, value)
    }

    /// Run `sequencer` against the staged state.
    ///
    /// A history record is staged whenever steps ran or the version moved.
    pub fn apply(
        &mut self,
        sequencer: &UpgradeSequencer,
        platform_version: &str,
    ) -> Result<UpgradeOutcome, MigrationError> {
        let mut ctx = UpgradeContext::new(&mut self.catalog, &mut self.config, platform_version);
        let outcome = sequencer.upgrade(&mut self.versions, &mut ctx)?;
        if !outcome.is_noop() {
            self.history.push(UpgradeRecord::from_outcome(&outcome));
        }
        Ok(outcome)
    }

    /// Commit every staged change atomically.
    pub fn commit(self) -> Result<(), Error> {
        let database = self.database;
        let snapshot = self.catalog.to_bytes()?;

        let mut history_rows = Vec::with_capacity(self.history.len());
        for record in &self.history {
            let key = history_key(&record.component, database.db.generate_id()?);
            history_rows.push((key, record.to_bytes()?));
        }

        let versions: Vec<(String, String)> = self
            .versions
            .staged
            .iter()
            .map(|(component, version)| (component.to_string(), version.to_string()))
            .collect();

        let result: Result<(), TransactionError<Error>> = (
            &database.catalog_tree,
            &database.versions_tree,
            &database.config_tree,
            &database.history_tree,
        )
            .transaction(|(catalog_tx, versions_tx, config_tx, history_tx)| {
                catalog_tx.insert(SNAPSHOT_KEY, snapshot.as_slice())?;
                for (component, version) in &versions {
                    versions_tx.insert(component.as_bytes(), version.as_bytes())?;
                }
                for (key, value) in self.config.iter() {
                    config_tx.insert(key.as_bytes(), value.as_bytes())?;
                }
                for (key, value) in &history_rows {
                    history_tx.insert(key.as_slice(), value.as_slice())?;
                }
                Ok(())
            });

        match result {
            Ok(()) => {
                debug!(
                    versions = versions.len(),
                    history = history_rows.len(),
                    "setup transaction committed"
                );
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeSpec, AttributeStore, InputWidget, ValueType};
    use crate::migration::UpgradeStep;

    const PRODUCT: &str = "catalog_product";

    fn temp_db() -> SetupDatabase {
        let db = sled::Config::new().temporary(true).open().unwrap();
        SetupDatabase::open(&db).unwrap()
    }

    fn add_widget(ctx: &mut UpgradeContext<'_>) -> Result<(), MigrationError> {
        ctx.attributes.create_attribute(
            PRODUCT,
            &AttributeSpec::new("widget", ValueType::Int, InputWidget::Text),
        )?;
        ctx.config.save("platform", ctx.platform_version)?;
        Ok(())
    }

    fn explode(_ctx: &mut UpgradeContext<'_>) -> Result<(), MigrationError> {
        Err(MigrationError::InvalidStepList {
            message: "boom".to_string(),
        })
    }

    fn good() -> UpgradeSequencer {
        UpgradeSequencer::new("demo", "1.0.1")
            .unwrap()
            .with_step(UpgradeStep::new("1.0.1", "add widget", add_widget).unwrap())
            .unwrap()
    }

    fn bad() -> UpgradeSequencer {
        UpgradeSequencer::new("demo", "1.0.2")
            .unwrap()
            .with_step(UpgradeStep::new("1.0.1", "add widget", add_widget).unwrap())
            .unwrap()
            .with_step(UpgradeStep::new("1.0.2", "explode", explode).unwrap())
            .unwrap()
    }

    #[test]
    fn test_fresh_database_is_empty() {
        let db = temp_db();
        assert_eq!(db.load_catalog().unwrap(), CatalogState::new());
        assert!(db.installed_version("demo").unwrap().is_none());
        assert!(db.config_values().unwrap().is_empty());
        assert!(db.history("demo").unwrap().is_empty());
    }

    #[test]
    fn test_upgrade_commits_everything() {
        let db = temp_db();
        let outcome = db.upgrade(&good(), "2.4.6", false).unwrap();
        assert_eq!(outcome.executed.len(), 1);

        assert!(db.load_catalog().unwrap().get_attribute(PRODUCT, "widget").unwrap().is_some());
        assert_eq!(db.installed_version("demo").unwrap(), Some(SemVer::new(1, 0, 1)));
        assert_eq!(db.config_value("platform").unwrap().as_deref(), Some("2.4.6"));

        let history = db.history("demo").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_version, None);
        assert_eq!(history[0].to_version, "1.0.1");
    }

    #[test]
    fn test_failed_upgrade_rolls_back() {
        let db = temp_db();
        let err = db.upgrade(&bad(), "2.4.6", false).unwrap_err();
        assert!(matches!(err, MigrationError::StepFailed { .. }));

        assert!(db.load_catalog().unwrap().get_attribute(PRODUCT, "widget").unwrap().is_none());
        assert!(db.installed_version("demo").unwrap().is_none());
        assert!(db.config_value("platform").unwrap().is_none());
        assert!(db.history("demo").unwrap().is_empty());
    }

    #[test]
    fn test_dry_run_discards_changes() {
        let db = temp_db();
        let outcome = db.upgrade(&good(), "2.4.6", true).unwrap();
        assert_eq!(outcome.executed.len(), 1);

        assert_eq!(db.load_catalog().unwrap(), CatalogState::new());
        assert!(db.installed_version("demo").unwrap().is_none());
    }

    #[test]
    fn test_second_upgrade_is_noop() {
        let db = temp_db();
        db.upgrade(&good(), "2.4.6", false).unwrap();
        let catalog = db.load_catalog().unwrap();

        let outcome = db.upgrade(&good(), "2.4.7", false).unwrap();
        assert!(outcome.is_noop());
        assert_eq!(db.load_catalog().unwrap(), catalog);
        assert_eq!(db.config_value("platform").unwrap().as_deref(), Some("2.4.6"));
        assert_eq!(db.history("demo").unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_stored_version() {
        let db = temp_db();
        db.versions_tree.insert("demo", "1.x").unwrap();

        assert!(matches!(
            db.installed_version("demo"),
            Err(MigrationError::MalformedVersion { .. })
        ));
        // The run aborts before any step.
        assert!(db.upgrade(&good(), "2.4.6", false).is_err());
        assert_eq!(db.load_catalog().unwrap(), CatalogState::new());
    }

    #[test]
    fn test_create_attribute_set_persists() {
        let db = temp_db();
        let set = db.create_attribute_set(PRODUCT, "Default").unwrap();
        assert_eq!(db.load_catalog().unwrap().find_attribute_set(PRODUCT, "Default"), Some(set));
        assert!(db.create_attribute_set(PRODUCT, "Default").is_err());
    }

    #[test]
    fn test_transaction_drop_is_rollback() {
        let db = temp_db();
        {
            let mut tx = db.begin().unwrap();
            tx.catalog_mut().create_attribute_set(PRODUCT, "Default").unwrap();
            tx.save_config("k", "v").unwrap();
            assert_eq!(tx.config().get("k"), Some("v"));
        }
        assert_eq!(db.load_catalog().unwrap(), CatalogState::new());
        assert!(db.config_value("k").unwrap().is_none());
    }

    #[test]
    fn test_reopen_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = SetupDatabase::open_path(dir.path()).unwrap();
            db.create_attribute_set(PRODUCT, "Default").unwrap();
            db.upgrade(&good(), "2.4.6", false).unwrap();
            db.flush().unwrap();
        }

        let db = SetupDatabase::open_path(dir.path()).unwrap();
        let catalog = db.load_catalog().unwrap();
        assert!(catalog.find_attribute_set(PRODUCT, "Default").is_some());
        assert!(catalog.get_attribute(PRODUCT, "widget").unwrap().is_some());
        assert_eq!(db.installed_version("demo").unwrap(), Some(SemVer::new(1, 0, 1)));
    }
}
