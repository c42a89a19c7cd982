pub mod backup;
pub mod build;
pub mod clean;
pub mod hooks;
pub mod serve;
pub mod status;
pub mod tools;
pub mod validate;

use anyhow::Result;
use clap::{ArgMatches, Command};

use crate::config::CliConfig;

pub fn subcommands() -> Vec<Command> {
    vec![
        build::make_subcommand(),
        validate::make_subcommand(),
        serve::make_serve_subcommand(),
        serve::make_dev_subcommand(),
        clean::make_subcommand(),
        backup::make_subcommand(),
        tools::make_analyze_subcommand(),
        tools::make_optimize_subcommand(),
        tools::make_cleanup_subcommand(),
        status::make_subcommand(),
        hooks::make_subcommand(),
    ]
}

/// Run a subcommand. `Ok(false)` means it completed but reported failure.
pub async fn run(name: &str, args: &ArgMatches, config: &CliConfig) -> Result<bool> {
    match name {
        "serve" => serve::execute_serve(config).await.map(|_| true),
        "dev" => serve::execute_dev(config).await.map(|_| true),
        _ => {
            let name = name.to_string();
            let args = args.clone();
            let config = config.clone();
            tokio::task::spawn_blocking(move || run_blocking(&name, &args, &config)).await?
        }
    }
}

fn run_blocking(name: &str, args: &ArgMatches, config: &CliConfig) -> Result<bool> {
    match name {
        "build" => build::execute(args, config),
        "validate" => validate::execute(config),
        "clean" => clean::execute(config).map(|_| true),
        "backup" => backup::execute(config).map(|_| true),
        "analyze" => tools::execute_analyze(config).map(|_| true),
        "optimize" => tools::execute_optimize(config).map(|_| true),
        "cleanup" => tools::execute_cleanup(args, config).map(|_| true),
        "status" => status::execute(config).map(|_| true),
        "init-hooks" => hooks::execute(config).map(|_| true),
        other => anyhow::bail!("Unknown command: {other}"),
    }
}
