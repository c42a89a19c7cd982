use anyhow::{Context, Result};
use clap::Command;

use crate::config::CliConfig;

const PRE_COMMIT: &str = r#"#!/bin/sh
# Generated by `site init-hooks`

echo "Running pre-commit checks..."

if ! site validate; then
    echo "Validation failed. Commit aborted."
    exit 1
fi

site cleanup

echo "Pre-commit checks passed"
exit 0
"#;

pub fn make_subcommand() -> Command {
    Command::new("init-hooks").about("Install a git pre-commit hook")
}

pub fn execute(config: &CliConfig) -> Result<()> {
    tracing::info!("Setting up git hooks...");

    let git_dir = config.resolve(".git");
    if !git_dir.exists() {
        tracing::warn!("Not a git repository");
        return Ok(());
    }

    let hooks_dir = git_dir.join("hooks");
    std::fs::create_dir_all(&hooks_dir)
        .with_context(|| format!("Failed to create {}", hooks_dir.display()))?;

    let hook = hooks_dir.join("pre-commit");
    std::fs::write(&hook, PRE_COMMIT)
        .with_context(|| format!("Failed to write {}", hook.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("Failed to make {} executable", hook.display()))?;
    }

    tracing::info!("Git hooks installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_pre_commit_hook() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let config = CliConfig {
            config_file: dir.path().join("site.config.yaml"),
            ..Default::default()
        };

        execute(&config).unwrap();

        let hook = dir.path().join(".git/hooks/pre-commit");
        let body = std::fs::read_to_string(&hook).unwrap();
        assert!(body.starts_with("#!/bin/sh"));
        let validate = body.find("site validate").unwrap();
        assert!(validate < body.find("site cleanup").unwrap());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&hook).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_outside_git_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let config = CliConfig {
            config_file: dir.path().join("site.config.yaml"),
            ..Default::default()
        };
        execute(&config).unwrap();
        assert!(!dir.path().join(".git").exists());
    }
}
