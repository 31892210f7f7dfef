//! CLI configuration.

use crate::formatter::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default database directory.
pub const DEFAULT_DATA_PATH: &str = "./data";

/// Default component to upgrade.
pub const DEFAULT_COMPONENT: &str = "shipping";

/// Resolved settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupConfig {
    /// Path to the setup database directory.
    pub data_path: PathBuf,

    /// Run upgrades against staged state and discard it.
    pub dry_run: bool,

    /// Output format for reports.
    pub format: OutputFormat,
}

impl SetupConfig {
    /// Create a configuration for the given data path.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            dry_run: false,
            format: OutputFormat::Table,
        }
    }

    /// Enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_PATH)
    }
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "eavsetup")]
#[command(version, about = "Versioned EAV attribute setup", long_about = None)]
pub struct Args {
    /// Path to the setup database directory.
    #[arg(short, long, default_value = DEFAULT_DATA_PATH, global = true)]
    pub data_path: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run pending upgrade steps of a component.
    Upgrade {
        /// Component to upgrade.
        #[arg(long, default_value = DEFAULT_COMPONENT)]
        component: String,

        /// Version of the hosting platform, recorded in configuration.
        #[arg(long)]
        platform_version: String,

        /// Execute against staged state without committing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show installed version, pending steps and history of a component.
    Status {
        /// Component to inspect.
        #[arg(long, default_value = DEFAULT_COMPONENT)]
        component: String,

        /// Output format.
        #[arg(long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Create an attribute set for an entity type.
    CreateSet {
        /// Entity type code.
        #[arg(long)]
        entity_type: String,

        /// Attribute set name.
        #[arg(long)]
        name: String,
    },
}

impl Args {
    /// Split arguments into configuration and the command to run.
    pub fn into_config(self) -> (SetupConfig, Command) {
        let mut config = SetupConfig::new(self.data_path);
        match &self.command {
            Command::Upgrade { dry_run, .. } => config = config.with_dry_run(*dry_run),
            Command::Status { format, .. } => config = config.with_format(*format),
            Command::CreateSet { .. } => {}
        }
        (config, self.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SetupConfig::default();
        assert_eq!(config.data_path, PathBuf::from("./data"));
        assert!(!config.dry_run);
        assert_eq!(config.format, OutputFormat::Table);
    }

    #[test]
    fn test_config_builder() {
        let config = SetupConfig::new("/var/lib/eavsetup")
            .with_dry_run(true)
            .with_format(OutputFormat::Json);
        assert_eq!(config.data_path, PathBuf::from("/var/lib/eavsetup"));
        assert!(config.dry_run);
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_upgrade() {
        let args = Args::try_parse_from([
            "eavsetup",
            "--data-path",
            "/tmp/setup",
            "upgrade",
            "--platform-version",
            "2.4.6",
            "--dry-run",
        ])
        .unwrap();
        let (config, command) = args.into_config();

        assert_eq!(config.data_path, PathBuf::from("/tmp/setup"));
        assert!(config.dry_run);
        assert_eq!(
            command,
            Command::Upgrade {
                component: DEFAULT_COMPONENT.to_string(),
                platform_version: "2.4.6".to_string(),
                dry_run: true,
            }
        );
    }

    #[test]
    fn test_parse_status_json() {
        let args =
            Args::try_parse_from(["eavsetup", "status", "--format", "json", "-d", "/srv/data"])
                .unwrap();
        let (config, _) = args.into_config();
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.data_path, PathBuf::from("/srv/data"));
    }

    #[test]
    fn test_upgrade_requires_platform_version() {
        assert!(Args::try_parse_from(["eavsetup", "upgrade"]).is_err());
    }

    #[test]
    fn test_parse_create_set() {
        let args = Args::try_parse_from([
            "eavsetup",
            "create-set",
            "--entity-type",
            "catalog_product",
            "--name",
            "Default",
        ])
        .unwrap();
        let (config, command) = args.into_config();
        assert_eq!(config, SetupConfig::default());
        assert!(matches!(command, Command::CreateSet { ref name, .. } if name == "Default"));
    }
}
