use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use sitegen_core::metrics::append_build_metrics;
use sitegen_core::{
    MarkupValidator, NoopValidator, SiteBuilder, StructureValidator, ValidationReport, Validator,
};
use std::path::Path;

use crate::cmd::{backup, validate};
use crate::config::CliConfig;

pub fn make_subcommand() -> Command {
    Command::new("build")
        .about("Build the site")
        .arg(
            Arg::new("no-clean")
                .long("no-clean")
                .help("Do not clean the output directory first")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("validate")
                .long("validate")
                .help("Validate the generated output after building")
                .action(ArgAction::SetTrue),
        )
}

/// What happens around the core build
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub clean: bool,
    pub backup: bool,
    pub validate_project: bool,
    pub validate_output: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            clean: true,
            backup: true,
            validate_project: true,
            validate_output: false,
        }
    }
}

pub fn execute(args: &ArgMatches, config: &CliConfig) -> Result<bool> {
    let options = BuildOptions {
        clean: !args.get_flag("no-clean"),
        validate_output: args.get_flag("validate"),
        ..Default::default()
    };
    run_build(config, &options)
}

pub fn run_build(config: &CliConfig, options: &BuildOptions) -> Result<bool> {
    tracing::info!("Building site...");

    if options.backup && config.backup.auto_backup_before_build {
        backup::execute(config)?;
    }

    if options.validate_project && !validate::validate_project(config)? {
        tracing::error!("Build aborted due to validation errors");
        return Ok(false);
    }

    let site_config = config.site_config()?;
    let report = SiteBuilder::new(&site_config)
        .clean(options.clean)
        .build()
        .context("Build failed")?;

    tracing::info!(
        "Built {} pages in {:.2}s",
        report.pages.len(),
        report.elapsed.as_secs_f64()
    );

    let output_dir = site_config.output_dir();
    if config.performance.track_build_time {
        let log = config.resolve(&config.performance.metrics_file);
        if let Err(e) = append_build_metrics(&log, report.elapsed, &output_dir) {
            tracing::warn!("Could not record build metrics in {}: {}", log.display(), e);
        }
    }

    if options.validate_output && !validate_output(config, &output_dir) {
        return Ok(false);
    }

    tracing::info!("Success! Your site is ready.");
    Ok(true)
}

/// Validators for the output tree, picked from configuration
pub fn output_validators(config: &CliConfig) -> Vec<Box<dyn Validator>> {
    let markup: Box<dyn Validator> = if config.validation.markup {
        Box::new(MarkupValidator)
    } else {
        Box::new(NoopValidator)
    };

    vec![
        Box::new(StructureValidator {
            critical_files: config.validation.critical_files.clone(),
        }),
        markup,
    ]
}

fn validate_output(config: &CliConfig, output_dir: &Path) -> bool {
    tracing::info!("Validating output...");

    let report = ValidationReport::run(&output_validators(config), output_dir);
    println!("{}", report.summary());

    let report_path = config.resolve(&config.validation.report);
    if let Err(e) = report.save(&report_path) {
        tracing::warn!("Could not save validation report: {}", e);
    }

    if !report.passed() {
        tracing::error!("Validation failed with {} errors", report.error_count());
        return false;
    }

    tracing::info!("Validation passed!");
    true
}
