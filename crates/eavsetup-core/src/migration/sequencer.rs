//! Version-gated upgrade step sequencing.
//!
//! A component declares its upgrade history as an ordered list of
//! [`UpgradeStep`] descriptors. One loop walks them in ascending version
//! order and runs every step the [`VersionGate`] lets through.

use super::context::{UpgradeContext, VersionStore};
use super::error::MigrationError;
use super::version::{SemVer, VersionGate};
use crate::catalog::AttributeStore;
use std::fmt;
use tracing::{debug, info, warn};

/// Body of an upgrade step.
pub type StepAction = fn(&mut UpgradeContext<'_>) -> Result<(), MigrationError>;

/// Read-only probe that can force a step regardless of the installed version.
pub type StepProbe = fn(&dyn AttributeStore) -> Result<bool, MigrationError>;

/// One versioned upgrade step.
#[derive(Clone)]
pub struct UpgradeStep {
    /// Version introduced by the step.
    pub version: SemVer,
    /// Human readable summary.
    pub description: String,
    action: StepAction,
    force_when: Option<StepProbe>,
}

impl UpgradeStep {
    /// Create a step from a version string.
    pub fn new(
        version: &str,
        description: impl Into<String>,
        action: StepAction,
    ) -> Result<Self, MigrationError> {
        Ok(Self {
            version: SemVer::parse(version)?,
            description: description.into(),
            action,
            force_when: None,
        })
    }

    /// Run the step whenever `probe` reports `true`, even if already applied.
    pub fn force_when(mut self, probe: StepProbe) -> Self {
        self.force_when = Some(probe);
        self
    }

    /// Check if the step carries a force probe.
    pub fn is_forceable(&self) -> bool {
        self.force_when.is_some()
    }
}

impl fmt::Debug for UpgradeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradeStep")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("forceable", &self.is_forceable())
            .finish()
    }
}

/// A step that ran during an upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStep {
    /// Step version.
    pub version: SemVer,
    /// Step description.
    pub description: String,
    /// Whether the step ran only because its probe forced it.
    pub forced: bool,
}

/// Result of a successful upgrade run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOutcome {
    /// Component name.
    pub component: String,
    /// Installed version before the run, `None` if never installed.
    pub from_version: Option<SemVer>,
    /// Installed version after the run.
    pub to_version: SemVer,
    /// Steps that ran, in order.
    pub executed: Vec<ExecutedStep>,
    /// Number of steps the gate skipped.
    pub skipped: usize,
}

impl UpgradeOutcome {
    /// Check if the run changed nothing.
    pub fn is_noop(&self) -> bool {
        self.executed.is_empty() && self.from_version == Some(self.to_version)
    }
}

/// Ordered, version-gated list of upgrade steps for one component.
#[derive(Debug, Clone)]
pub struct UpgradeSequencer {
    component: String,
    code_version: SemVer,
    steps: Vec<UpgradeStep>,
}

impl UpgradeSequencer {
    /// Create an empty sequencer for `component` at `code_version`.
    pub fn new(component: impl Into<String>, code_version: &str) -> Result<Self, MigrationError> {
        Ok(Self {
            component: component.into(),
            code_version: SemVer::parse(code_version)?,
            steps: Vec::new(),
        })
    }

    /// Component name.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Version the component is at once every step has run.
    pub fn code_version(&self) -> SemVer {
        self.code_version
    }

    /// All steps in ascending version order.
    pub fn steps(&self) -> &[UpgradeStep] {
        &self.steps
    }

    /// Add a step, keeping the list sorted by version.
    ///
    /// Fails if the version is already taken or lies beyond the code version.
    pub fn with_step(mut self, step: UpgradeStep) -> Result<Self, MigrationError> {
        if step.version > self.code_version {
            return Err(MigrationError::InvalidStepList {
                message: format!(
                    "step {} is newer than {} code version {}",
                    step.version, self.component, self.code_version
                ),
            });
        }

        match self.steps.binary_search_by(|s| s.version.cmp(&step.version)) {
            Ok(_) => Err(MigrationError::InvalidStepList {
                message: format!("duplicate step version {}", step.version),
            }),
            Err(idx) => {
                self.steps.insert(idx, step);
                Ok(self)
            }
        }
    }

    /// Steps the version gate lets through for `installed`.
    ///
    /// Force probes are not evaluated here.
    pub fn pending_steps(&self, installed: SemVer) -> impl Iterator<Item = &UpgradeStep> {
        self.steps
            .iter()
            .filter(move |s| VersionGate::should_run(&installed, &s.version))
    }

    /// Run every pending step against `ctx`.
    ///
    /// The caller owns the transaction: on error, everything written through
    /// `ctx` must be discarded.
    pub fn run(
        &self,
        installed: Option<SemVer>,
        ctx: &mut UpgradeContext<'_>,
    ) -> Result<UpgradeOutcome, MigrationError> {
        let current = installed.unwrap_or(SemVer::ZERO);
        if current > self.code_version {
            return Err(MigrationError::VersionRegression {
                component: self.component.clone(),
                installed: current,
                code_version: self.code_version,
            });
        }

        info!(
            component = %self.component,
            installed = %current,
            target = %self.code_version,
            "starting upgrade"
        );

        let mut executed = Vec::new();
        let mut skipped = 0;

        for step in &self.steps {
            let gated = VersionGate::should_run(&current, &step.version);
            let forced = !gated && self.probe(step, ctx)?;

            if !gated && !forced {
                debug!(version = %step.version, step = %step.description, "step already applied");
                skipped += 1;
                continue;
            }

            if forced {
                warn!(version = %step.version, step = %step.description, "re-running step forced by probe");
            } else {
                info!(version = %step.version, step = %step.description, "running step");
            }

            (step.action)(ctx).map_err(|e| MigrationError::StepFailed {
                version: step.version,
                description: step.description.clone(),
                source: Box::new(e),
            })?;

            executed.push(ExecutedStep {
                version: step.version,
                description: step.description.clone(),
                forced,
            });
        }

        info!(
            component = %self.component,
            executed = executed.len(),
            skipped,
            version = %self.code_version,
            "upgrade complete"
        );

        Ok(UpgradeOutcome {
            component: self.component.clone(),
            from_version: installed,
            to_version: self.code_version,
            executed,
            skipped,
        })
    }

    /// Run pending steps and advance the installed version in `versions`.
    pub fn upgrade(
        &self,
        versions: &mut dyn VersionStore,
        ctx: &mut UpgradeContext<'_>,
    ) -> Result<UpgradeOutcome, MigrationError> {
        let installed = versions.installed_version(&self.component)?;
        let outcome = self.run(installed, ctx)?;
        if installed != Some(outcome.to_version) {
            versions.set_installed_version(&self.component, outcome.to_version)?;
        }
        Ok(outcome)
    }

    fn probe(&self, step: &UpgradeStep, ctx: &UpgradeContext<'_>) -> Result<bool, MigrationError> {
        match step.force_when {
            Some(probe) => probe(&*ctx.attributes).map_err(|e| MigrationError::StepFailed {
                version: step.version,
                description: step.description.clone(),
                source: Box::new(e),
            }),
            None => Ok(false),
        }
    }
}
