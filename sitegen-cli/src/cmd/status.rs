use anyhow::Result;
use chrono::{DateTime, Local};
use clap::Command;
use sitegen_core::backup::list_backups;
use std::fmt;
use std::path::Path;

use crate::config::CliConfig;

pub fn make_subcommand() -> Command {
    Command::new("status").about("Show project status")
}

pub fn execute(config: &CliConfig) -> Result<()> {
    println!("{}", ProjectStatus::collect(config)?);
    Ok(())
}

#[derive(Debug)]
struct LastBuild {
    modified: DateTime<Local>,
    size: u64,
}

#[derive(Debug)]
struct ProjectStatus {
    name: String,
    version: String,
    root_py: usize,
    root_md: usize,
    tools: usize,
    reports: usize,
    last_build: Option<LastBuild>,
    backups: Option<usize>,
}

impl ProjectStatus {
    fn collect(config: &CliConfig) -> Result<Self> {
        let root = config.root();

        let last_build = std::fs::metadata(config.output_dir().join("index.html"))
            .ok()
            .and_then(|meta| {
                Some(LastBuild {
                    modified: meta.modified().ok()?.into(),
                    size: meta.len(),
                })
            });

        let backup_dir = config.backup_dir();
        let backups = if backup_dir.exists() {
            Some(list_backups(&backup_dir)?.len())
        } else {
            None
        };

        Ok(Self {
            name: config.project.name.clone(),
            version: config.project.version.clone(),
            root_py: count_files(&root, "py"),
            root_md: count_files(&root, "md"),
            tools: count_files(&root.join("tools"), "py"),
            reports: count_files(&root.join("reports"), "md"),
            last_build,
            backups,
        })
    }
}

/// Files in `dir` (not recursive) with the given extension; 0 if `dir` is missing.
fn count_files(dir: &Path, extension: &str) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == extension))
        .count()
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}\nPROJECT STATUS\n{rule}")?;
        writeln!(f, "\n{} v{}", self.name, self.version)?;

        writeln!(f, "\nFiles:")?;
        writeln!(f, "  Root: {} .py, {} .md", self.root_py, self.root_md)?;
        writeln!(f, "  Tools: {}", self.tools)?;
        writeln!(f, "  Reports: {}", self.reports)?;

        if let Some(build) = &self.last_build {
            writeln!(f, "\nLast Build:")?;
            writeln!(f, "  Date: {}", build.modified.format("%Y-%m-%d %H:%M:%S"))?;
            writeln!(f, "  Size: {} bytes", group_thousands(build.size))?;
        }

        if let Some(backups) = self.backups {
            writeln!(f, "\nBackups: {backups}")?;
        }

        write!(f, "\n{rule}")
    }
}
