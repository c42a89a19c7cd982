mod cmd;
mod config;

use clap::{Arg, ArgAction, Command, value_parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;

use crate::config::{CliConfig, DEFAULT_CONFIG_FILE};

fn cli() -> Command {
    Command::new("site")
        .about("Build, check and serve the site")
        .version(env!("CARGO_PKG_VERSION"))
        .after_help("Examples:\n  site build\n  site build --no-clean --validate\n  site dev")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_CONFIG_FILE)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommands(cmd::subcommands())
}

fn init_logging(level: &str, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        match level.to_uppercase().as_str() {
            "DEBUG" => "debug",
            "WARNING" | "WARN" => "warn",
            "ERROR" | "CRITICAL" => "error",
            _ => "info",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(ChronoLocal::new("%H:%M:%S".to_string()))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();

    let Some((name, args)) = matches.subcommand() else {
        let _ = cli().print_help();
        return ExitCode::SUCCESS;
    };

    let config = match CliConfig::load(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging.level, matches.get_flag("verbose"));

    let outcome = tokio::select! {
        outcome = cmd::run(name, args, &config) => outcome,
        _ = tokio::signal::ctrl_c() => {
            if matches!(name, "serve" | "dev") {
                tracing::info!("Server stopped");
                return ExitCode::SUCCESS;
            }
            eprintln!("\nOperation cancelled");
            // Blocking work may still be running; don't wait for it
            std::process::exit(1);
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
