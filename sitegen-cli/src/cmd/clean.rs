use anyhow::{Context, Result};
use clap::Command;
use std::path::PathBuf;

use crate::config::CliConfig;

pub fn make_subcommand() -> Command {
    Command::new("clean").about("Remove the output directory and log files")
}

pub fn execute(config: &CliConfig) -> Result<()> {
    tracing::info!("Cleaning build artifacts...");

    let output_dir = config.output_dir();
    if output_dir.exists() {
        std::fs::remove_dir_all(&output_dir)
            .with_context(|| format!("Failed to remove {}", output_dir.display()))?;
        tracing::info!("Removed {}", output_dir.display());
    }

    for log in root_logs(config)? {
        std::fs::remove_file(&log)
            .with_context(|| format!("Failed to remove {}", log.display()))?;
        tracing::info!("Removed {}", log.display());
    }

    Ok(())
}

fn root_logs(config: &CliConfig) -> Result<Vec<PathBuf>> {
    let root = config.root();
    let mut logs: Vec<PathBuf> = std::fs::read_dir(&root)
        .with_context(|| format!("Failed to read {}", root.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "log"))
        .collect();
    logs.sort();
    Ok(logs)
}
