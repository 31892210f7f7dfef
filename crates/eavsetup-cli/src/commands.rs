//! Command execution.

use crate::config::{Command, SetupConfig};
use crate::error::Error;
use crate::formatter::{format_outcome, format_status, HistoryRow, StatusReport};
use eavsetup_core::migration::shipping;
use eavsetup_core::{SemVer, SetupDatabase, UpgradeSequencer};

/// Components this binary knows how to upgrade.
pub const COMPONENTS: &[&str] = &[shipping::COMPONENT];

/// Look up the step list of a component.
pub fn sequencer_for(component: &str) -> Result<UpgradeSequencer, Error> {
    match component {
        shipping::COMPONENT => Ok(shipping::sequencer()?),
        other => Err(Error::Config(format!(
            "unknown component '{}', expected one of: {}",
            other,
            COMPONENTS.join(", ")
        ))),
    }
}

/// Run a command and return its printable output.
pub fn execute(config: &SetupConfig, command: Command) -> Result<String, Error> {
    let database = SetupDatabase::open_path(&config.data_path)?;
    tracing::debug!(data_path = %config.data_path.display(), "setup database opened");

    let output = match command {
        Command::Upgrade {
            component,
            platform_version,
            ..
        } => {
            let sequencer = sequencer_for(&component)?;
            let outcome = database.upgrade(&sequencer, &platform_version, config.dry_run)?;
            format_outcome(&outcome, config.dry_run)
        }
        Command::Status { component, .. } => {
            let report = status(&database, &component)?;
            format_status(&report, config.format)?
        }
        Command::CreateSet { entity_type, name } => {
            let id = database.create_attribute_set(&entity_type, &name)?;
            format!("created attribute set '{}' {} for {}", name, id, entity_type)
        }
    };

    database.flush()?;
    Ok(output)
}

/// Build the status report of a component.
pub fn status(database: &SetupDatabase, component: &str) -> Result<StatusReport, Error> {
    let sequencer = sequencer_for(component)?;
    let installed = database.installed_version(component)?;

    let pending = sequencer
        .pending_steps(installed.unwrap_or(SemVer::ZERO))
        .map(|step| format!("{} {}", step.version, step.description))
        .collect();

    let history = database
        .history(component)?
        .into_iter()
        .map(|record| HistoryRow {
            from_version: record.from_version,
            to_version: record.to_version,
            steps: record.steps.len(),
            applied_at: record.applied_at,
        })
        .collect();

    Ok(StatusReport {
        component: component.to_string(),
        installed_version: installed.map(|v| v.to_string()),
        code_version: sequencer.code_version().to_string(),
        pending,
        history,
        config: database.config_values()?,
    })
}
