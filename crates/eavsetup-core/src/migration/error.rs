//! Migration-specific error types.

use super::version::SemVer;
use thiserror::Error;

/// Migration errors.
///
/// Every variant is fatal for the current run: nothing is retried, the
/// staged changes are discarded and the installed version is left as is.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A version string could not be parsed.
    #[error("malformed version {input:?}: {reason}")]
    MalformedVersion {
        /// The offending input.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The attribute store rejected a read or write.
    #[error("store write failure: {0}")]
    StoreWriteFailure(#[from] crate::error::Error),

    /// A step referenced an attribute that no earlier step created.
    #[error("missing prerequisite attribute {entity_type}.{code}")]
    MissingPrerequisiteAttribute {
        /// Entity type code.
        entity_type: String,
        /// Attribute code.
        code: String,
    },

    /// The installed version is newer than the code being run.
    #[error("installed version {installed} of {component} is newer than code version {code_version}")]
    VersionRegression {
        /// Component name.
        component: String,
        /// Version recorded in the store.
        installed: SemVer,
        /// Version of the step list.
        code_version: SemVer,
    },

    /// The step list itself is inconsistent.
    #[error("invalid step list: {message}")]
    InvalidStepList {
        /// Description of the problem.
        message: String,
    },

    /// A step failed; the run was rolled back.
    #[error("step {version} ({description}) failed: {source}")]
    StepFailed {
        /// Version of the failed step.
        version: SemVer,
        /// Step description.
        description: String,
        /// The originating error.
        #[source]
        source: Box<MigrationError>,
    },
}

impl MigrationError {
    /// The originating error, looking through step wrappers.
    pub fn root_cause(&self) -> &MigrationError {
        match self {
            MigrationError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
