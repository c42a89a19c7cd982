//! Thin wrappers around the project's external helper scripts.

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::Path;

use crate::config::CliConfig;

pub fn make_analyze_subcommand() -> Command {
    Command::new("analyze").about("Run visual analysis")
}

pub fn make_optimize_subcommand() -> Command {
    Command::new("optimize").about("Optimize images")
}

pub fn make_cleanup_subcommand() -> Command {
    Command::new("cleanup").about("Clean up the project").arg(
        Arg::new("aggressive")
            .long("aggressive")
            .help("Remove more aggressively")
            .action(ArgAction::SetTrue),
    )
}

pub fn execute_analyze(config: &CliConfig) -> Result<()> {
    tracing::info!("Running visual analysis...");
    report("Analysis", run_tool(&config.root(), &config.tools.analyze));
    Ok(())
}

pub fn execute_optimize(config: &CliConfig) -> Result<()> {
    tracing::info!("Optimizing images...");
    report("Image optimization", run_tool(&config.root(), &config.tools.optimize));
    Ok(())
}

pub fn execute_cleanup(args: &ArgMatches, config: &CliConfig) -> Result<()> {
    tracing::info!("Cleaning up project...");
    let mut command = config.tools.cleanup.clone();
    if args.get_flag("aggressive") {
        command.push("--aggressive".to_string());
    }
    report("Cleanup", run_tool(&config.root(), &command));
    Ok(())
}

fn report(what: &str, outcome: Result<()>) {
    match outcome {
        Ok(()) => tracing::info!("{} complete", what),
        Err(e) => tracing::error!("{} failed: {e:#}", what),
    }
}

/// Run `command` in `root`, failing on a non-zero exit.
fn run_tool(root: &Path, command: &[String]) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        anyhow::bail!("No command configured");
    };

    tracing::debug!("Running {} {}", program, args.join(" "));
    let status = std::process::Command::new(program)
        .args(args)
        .current_dir(root)
        .status()
        .map_err(|e| anyhow::anyhow!("Could not run {}: {}", program, e))?;

    if !status.success() {
        anyhow::bail!("{} exited with {}", program, status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_command_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(run_tool(dir.path(), &[]).is_err());
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(run_tool(dir.path(), &cmd(&["definitely-not-a-real-tool-xyz"])).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_in_project_root_with_aggressive_flag() {
        let dir = TempDir::new().unwrap();
        let mut config = CliConfig {
            config_file: dir.path().join("site.config.yaml"),
            ..Default::default()
        };
        config.tools.cleanup = cmd(&["sh", "-c", "echo \"$0\" > cleanup.out"]);

        let args = make_cleanup_subcommand()
            .try_get_matches_from(["cleanup", "--aggressive"])
            .unwrap();
        execute_cleanup(&args, &config).unwrap();

        let out = std::fs::read_to_string(dir.path().join("cleanup.out")).unwrap();
        assert_eq!(out.trim(), "--aggressive");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_tool_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = CliConfig {
            config_file: dir.path().join("site.config.yaml"),
            ..Default::default()
        };
        config.tools.analyze = cmd(&["sh", "-c", "exit 3"]);

        assert!(run_tool(dir.path(), &config.tools.analyze).is_err());
        assert!(execute_analyze(&config).is_ok());
    }
}
