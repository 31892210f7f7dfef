//! Output formatters for command reports.

use crate::error::Error;
use clap::ValueEnum;
use comfy_table::{Cell, Table};
use eavsetup_core::UpgradeOutcome;
use serde::Serialize;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// One committed upgrade in a status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    /// Version before the run.
    pub from_version: Option<String>,
    /// Version after the run.
    pub to_version: String,
    /// Number of steps executed.
    pub steps: usize,
    /// Commit time (microseconds since epoch).
    pub applied_at: u64,
}

/// Status of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Component name.
    pub component: String,
    /// Committed installed version.
    pub installed_version: Option<String>,
    /// Version of the step list shipped with this binary.
    pub code_version: String,
    /// Steps that would run on the next upgrade, as `version description`.
    pub pending: Vec<String>,
    /// Committed upgrades, oldest first.
    pub history: Vec<HistoryRow>,
    /// Committed configuration values.
    pub config: Vec<(String, String)>,
}

/// Render a status report.
pub fn format_status(report: &StatusReport, format: OutputFormat) -> Result<String, Error> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Table => {
            let mut summary = Table::new();
            summary.set_header(vec!["Component", "Installed", "Code", "Pending"]);
            summary.add_row(vec![
                Cell::new(&report.component),
                Cell::new(report.installed_version.as_deref().unwrap_or("-")),
                Cell::new(&report.code_version),
                Cell::new(report.pending.len()),
            ]);

            let mut output = summary.to_string();

            if !report.pending.is_empty() {
                let mut pending = Table::new();
                pending.set_header(vec!["Pending step"]);
                for step in &report.pending {
                    pending.add_row(vec![step]);
                }
                output.push_str("\n\n");
                output.push_str(&pending.to_string());
            }

            if !report.history.is_empty() {
                let mut history = Table::new();
                history.set_header(vec!["From", "To", "Steps", "Applied at"]);
                for row in &report.history {
                    history.add_row(vec![
                        Cell::new(row.from_version.as_deref().unwrap_or("-")),
                        Cell::new(&row.to_version),
                        Cell::new(row.steps),
                        Cell::new(row.applied_at),
                    ]);
                }
                output.push_str("\n\n");
                output.push_str(&history.to_string());
            }

            if !report.config.is_empty() {
                let mut config = Table::new();
                config.set_header(vec!["Config key", "Value"]);
                for (key, value) in &report.config {
                    config.add_row(vec![key, value]);
                }
                output.push_str("\n\n");
                output.push_str(&config.to_string());
            }

            Ok(output)
        }
    }
}

/// Render the result of an upgrade run.
pub fn format_outcome(outcome: &UpgradeOutcome, dry_run: bool) -> String {
    let from = outcome
        .from_version
        .map(|v| v.to_string())
        .unwrap_or_else(|| "none".to_string());

    if outcome.is_noop() {
        return format!("{} is up to date at {}", outcome.component, outcome.to_version);
    }

    let mut table = Table::new();
    table.set_header(vec!["Version", "Step", "Forced"]);
    for step in &outcome.executed {
        table.add_row(vec![
            Cell::new(step.version),
            Cell::new(&step.description),
            Cell::new(if step.forced { "yes" } else { "" }),
        ]);
    }

    let verb = if dry_run { "would upgrade" } else { "upgraded" };
    format!(
        "{}\n\n{} {} {} -> {} ({} executed, {} skipped)",
        table,
        verb,
        outcome.component,
        from,
        outcome.to_version,
        outcome.executed.len(),
        outcome.skipped
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use eavsetup_core::migration::ExecutedStep;
    use eavsetup_core::SemVer;

    fn report() -> StatusReport {
        StatusReport {
            component: "shipping".to_string(),
            installed_version: Some("1.0.7".to_string()),
            code_version: "1.1.21".to_string(),
            pending: vec!["1.0.12 install freight attributes".to_string()],
            history: vec![HistoryRow {
                from_version: None,
                to_version: "1.0.7".to_string(),
                steps: 4,
                applied_at: 1_700_000_000_000_000,
            }],
            config: vec![(
                "carriers/shipper/platform_version".to_string(),
                "2.4.6".to_string(),
            )],
        }
    }

    #[test]
    fn test_status_table() {
        let output = format_status(&report(), OutputFormat::Table).unwrap();
        assert!(output.contains("shipping"));
        assert!(output.contains("1.1.21"));
        assert!(output.contains("install freight attributes"));
        assert!(output.contains("carriers/shipper/platform_version"));
    }

    #[test]
    fn test_status_json() {
        let output = format_status(&report(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["installed_version"], "1.0.7");
        assert_eq!(value["pending"].as_array().unwrap().len(), 1);
        assert_eq!(value["history"][0]["steps"], 4);
    }

    #[test]
    fn test_outcome_summary() {
        let outcome = UpgradeOutcome {
            component: "shipping".to_string(),
            from_version: None,
            to_version: SemVer::new(1, 1, 21),
            executed: vec![ExecutedStep {
                version: SemVer::new(1, 0, 1),
                description: "install product attributes".to_string(),
                forced: false,
            }],
            skipped: 0,
        };

        let output = format_outcome(&outcome, true);
        assert!(output.contains("would upgrade shipping none -> 1.1.21"));
        assert!(output.contains("install product attributes"));
    }

    #[test]
    fn test_noop_outcome() {
        let outcome = UpgradeOutcome {
            component: "shipping".to_string(),
            from_version: Some(SemVer::new(1, 1, 21)),
            to_version: SemVer::new(1, 1, 21),
            executed: Vec::new(),
            skipped: 9,
        };
        assert_eq!(format_outcome(&outcome, false), "shipping is up to date at 1.1.21");
    }

    #[test]
    fn test_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
