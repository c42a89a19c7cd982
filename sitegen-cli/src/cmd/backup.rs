use anyhow::{Context, Result};
use clap::Command;
use sitegen_core::backup::create_backup;

use crate::config::CliConfig;

pub fn make_subcommand() -> Command {
    Command::new("backup").about("Snapshot content, templates, static files and config")
}

pub fn execute(config: &CliConfig) -> Result<()> {
    if !config.backup.enabled {
        tracing::info!("Backup disabled in config");
        return Ok(());
    }

    tracing::info!("Creating backup...");
    let path = create_backup(
        &config.root(),
        &config.backup_items(),
        &config.backup_dir(),
        config.backup.keep_last,
    )
    .context("Backup failed")?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    tracing::info!("Backup created: {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitegen_core::backup::list_backups;
    use tempfile::TempDir;

    fn config_in(dir: &std::path::Path) -> CliConfig {
        std::fs::create_dir_all(dir.join("content/pages")).unwrap();
        std::fs::write(dir.join("content/pages/home.md"), "# Hi").unwrap();
        std::fs::write(dir.join("site.config.yaml"), "site: {}").unwrap();
        CliConfig {
            config_file: dir.join("site.config.yaml"),
            ..Default::default()
        }
    }

    #[test]
    fn test_backup_copies_sources() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());

        execute(&config).unwrap();

        let backups = list_backups(&dir.path().join("backups")).unwrap();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].join("content/pages/home.md").is_file());
        assert!(backups[0].join("site.config.yaml").is_file());
        assert!(!backups[0].join("templates").exists());
    }

    #[test]
    fn test_disabled_backup_does_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.backup.enabled = false;

        execute(&config).unwrap();
        assert!(!dir.path().join("backups").exists());
    }
}
