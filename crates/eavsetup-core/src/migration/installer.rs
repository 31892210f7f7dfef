//! Attribute definition installer.
//!
//! Creates declared attributes when absent and applies partial updates to
//! existing ones. Both operations are idempotent.

use super::error::MigrationError;
use crate::catalog::{AttributeSpec, AttributeStore, AttributeUpdate};
use tracing::{debug, info};

/// Result of an install or update call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The attribute did not exist and was created.
    Created,
    /// The attribute existed and some fields were changed.
    Updated,
    /// Nothing had to be written.
    Unchanged,
}

/// Installs attribute definitions into an [`AttributeStore`].
pub struct AttributeInstaller;

impl AttributeInstaller {
    /// Create the attribute described by `spec` unless its code already exists.
    ///
    /// An existing definition is left exactly as it is.
    pub fn ensure_attribute(
        store: &mut dyn AttributeStore,
        entity_type: &str,
        spec: &AttributeSpec,
    ) -> Result<InstallOutcome, MigrationError> {
        if store.get_attribute(entity_type, &spec.code)?.is_some() {
            debug!(entity_type, code = %spec.code, "attribute already installed");
            return Ok(InstallOutcome::Unchanged);
        }

        let id = store.create_attribute(entity_type, spec)?;
        info!(entity_type, code = %spec.code, attribute_id = id.0, "attribute created");
        Ok(InstallOutcome::Created)
    }

    /// Install several attributes of one entity type, in order.
    pub fn ensure_attributes<'s>(
        store: &mut dyn AttributeStore,
        entity_type: &str,
        specs: impl IntoIterator<Item = &'s AttributeSpec>,
    ) -> Result<usize, MigrationError> {
        let mut created = 0;
        for spec in specs {
            if Self::ensure_attribute(store, entity_type, spec)? == InstallOutcome::Created {
                created += 1;
            }
        }
        Ok(created)
    }

    /// Apply only the fields carried by `fields` to an existing attribute.
    pub fn update_attribute(
        store: &mut dyn AttributeStore,
        entity_type: &str,
        code: &str,
        fields: &AttributeUpdate,
    ) -> Result<InstallOutcome, MigrationError> {
        let existing = store.get_attribute(entity_type, code)?.ok_or_else(|| {
            MigrationError::MissingPrerequisiteAttribute {
                entity_type: entity_type.to_string(),
                code: code.to_string(),
            }
        })?;

        if !fields.changes(&existing.spec) {
            debug!(entity_type, code, "attribute already up to date");
            return Ok(InstallOutcome::Unchanged);
        }

        store.update_attribute(entity_type, code, fields)?;
        info!(entity_type, code, "attribute updated");
        Ok(InstallOutcome::Updated)
    }
}
