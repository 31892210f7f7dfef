//! eavsetup - run versioned EAV attribute upgrades from the command line.

mod commands;
mod config;
mod error;
mod formatter;

use clap::Parser;
use config::Args;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eavsetup=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let (config, command) = args.into_config();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_path = %config.data_path.display(),
        dry_run = config.dry_run,
        "configuration loaded"
    );

    match commands::execute(&config, command) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
