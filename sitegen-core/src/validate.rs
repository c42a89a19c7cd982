//! Post-build checks on the generated output tree.
//!
//! Which validators run is decided once at startup. A disabled check is a
//! [`NoopValidator`]; a validator that fails internally is reported as
//! unavailable and never fails the build. Only reported errors do.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<img\b[^>]*>").unwrap());
static ALT_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\balt\s*=").unwrap());

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Output directory not found: {0}")]
    MissingOutput(PathBuf),
    #[error("Error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error writing report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Findings for one file (or for the output tree as a whole).
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct FileReport {
    pub file: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl FileReport {
    fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }

    fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

pub trait Validator {
    fn name(&self) -> &str;
    fn validate(&self, output_dir: &Path) -> Result<Vec<FileReport>, ValidationError>;
}

/// Passes everything. Used when validation is switched off.
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn name(&self) -> &str {
        "noop"
    }

    fn validate(&self, _output_dir: &Path) -> Result<Vec<FileReport>, ValidationError> {
        Ok(Vec::new())
    }
}

/// Checks that the build produced pages and the files a deploy depends on.
pub struct StructureValidator {
    pub critical_files: Vec<String>,
}

impl Default for StructureValidator {
    fn default() -> Self {
        Self {
            critical_files: vec!["index.html".to_string(), "styles.css".to_string()],
        }
    }
}

impl Validator for StructureValidator {
    fn name(&self) -> &str {
        "structure"
    }

    fn validate(&self, output_dir: &Path) -> Result<Vec<FileReport>, ValidationError> {
        if !output_dir.is_dir() {
            return Err(ValidationError::MissingOutput(output_dir.to_path_buf()));
        }

        let mut report = FileReport::new(output_dir.display().to_string());
        let html_count = std::fs::read_dir(output_dir)
            .map_err(|source| ValidationError::Io {
                path: output_dir.to_path_buf(),
                source,
            })?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "html"))
            .count();

        if html_count == 0 {
            report.errors.push("No HTML files generated".to_string());
        }
        for file in &self.critical_files {
            if !output_dir.join(file).exists() {
                report.errors.push(format!("Missing critical file: {file}"));
            }
        }

        Ok(if report.is_clean() { Vec::new() } else { vec![report] })
    }
}

/// Lightweight structural checks for generated HTML and copied CSS.
pub struct MarkupValidator;

impl Validator for MarkupValidator {
    fn name(&self) -> &str {
        "markup"
    }

    fn validate(&self, output_dir: &Path) -> Result<Vec<FileReport>, ValidationError> {
        if !output_dir.is_dir() {
            return Err(ValidationError::MissingOutput(output_dir.to_path_buf()));
        }

        let mut reports = Vec::new();
        for entry in WalkDir::new(output_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let checker: fn(&str, &mut FileReport) = match path.extension().and_then(|e| e.to_str()) {
                Some("html") => check_html,
                Some("css") => check_css,
                _ => continue,
            };

            let source = std::fs::read_to_string(path).map_err(|source| ValidationError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let name = path
                .strip_prefix(output_dir)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();
            let mut report = FileReport::new(name);
            checker(&source, &mut report);
            if !report.is_clean() {
                reports.push(report);
            }
        }

        Ok(reports)
    }
}

fn check_html(source: &str, report: &mut FileReport) {
    let lower = source.to_lowercase();

    if !lower.trim_start().starts_with("<!doctype html") {
        report.warnings.push("Missing <!DOCTYPE html>".to_string());
    }
    for tag in ["html", "body"] {
        if count_open(&lower, tag) == 0 {
            report.errors.push(format!("Missing <{tag}> element"));
        }
    }
    for tag in ["html", "head", "body"] {
        let open = count_open(&lower, tag);
        let close = lower.matches(&format!("</{tag}>")).count();
        if open != close {
            report
                .errors
                .push(format!("Unbalanced <{tag}>: {open} opened, {close} closed"));
        }
    }
    if !lower.contains("<title") {
        report.warnings.push("Missing <title>".to_string());
    }

    let missing_alt = IMG_TAG
        .find_iter(source)
        .filter(|m| !ALT_ATTR.is_match(m.as_str()))
        .count();
    if missing_alt > 0 {
        report
            .warnings
            .push(format!("{missing_alt} <img> without alt text"));
    }
}

/// Count `<tag>` and `<tag ...>` openings, ignoring longer names like `<header>`.
fn count_open(lower: &str, tag: &str) -> usize {
    let needle = format!("<{tag}");
    lower
        .match_indices(&needle)
        .filter(|(i, _)| {
            lower[i + needle.len()..]
                .chars()
                .next()
                .is_some_and(|c| c == '>' || c.is_whitespace())
        })
        .count()
}

fn check_css(source: &str, report: &mut FileReport) {
    let mut depth: i64 = 0;
    let mut in_comment = false;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match (in_comment, c) {
            (false, '/') if chars.peek() == Some(&'*') => {
                chars.next();
                in_comment = true;
            }
            (true, '*') if chars.peek() == Some(&'/') => {
                chars.next();
                in_comment = false;
            }
            (false, '{') => depth += 1,
            (false, '}') => {
                depth -= 1;
                if depth < 0 {
                    break;
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        report.errors.push("Unbalanced braces".to_string());
    }
}

/// Combined results of every validator that ran.
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub results: Vec<FileReport>,
    /// Validators that could not run.
    pub unavailable: Vec<String>,
}

impl ValidationReport {
    /// Run each validator in turn, recording internal failures instead of
    /// propagating them.
    pub fn run(validators: &[Box<dyn Validator>], output_dir: &Path) -> Self {
        let mut report = Self::default();
        for validator in validators {
            match validator.validate(output_dir) {
                Ok(results) => report.results.extend(results),
                Err(e) => {
                    tracing::warn!("Validation unavailable ({}): {}", validator.name(), e);
                    report.unavailable.push(validator.name().to_string());
                }
            }
        }
        report
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().map(|r| r.errors.len()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.results.iter().map(|r| r.warnings.len()).sum()
    }

    pub fn passed(&self) -> bool {
        self.error_count() == 0
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            out.push_str(&format!("{}\n", result.file));
            for error in &result.errors {
                out.push_str(&format!("  error: {error}\n"));
            }
            for warning in &result.warnings {
                out.push_str(&format!("  warning: {warning}\n"));
            }
        }
        out.push_str(&format!(
            "{} errors, {} warnings",
            self.error_count(),
            self.warning_count()
        ));
        out
    }

    pub fn save(&self, path: &Path) -> Result<(), ValidationError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ValidationError::Report {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ValidationError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
