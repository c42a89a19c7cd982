use anyhow::Result;
use clap::Command;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::config::CliConfig;

// Group 1 is whatever sits directly in front of `images/` up to a delimiter
static IMAGE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"([^\s"'()\[\]<>=]*)images/([A-Za-z0-9_\-./]+\.(?i:png|jpe?g|gif|svg|webp|avif|ico))"#,
    )
    .unwrap()
});
// Prefixes that still point into the local images dir: "", "/", "./", "../../"
static LOCAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:\.{0,2}/)*$").unwrap());

pub fn make_subcommand() -> Command {
    Command::new("validate").about("Check content files and image references")
}

pub fn execute(config: &CliConfig) -> Result<bool> {
    validate_project(config)
}

/// Check the site sources before a build. Errors are logged; returns whether
/// the project passed.
pub fn validate_project(config: &CliConfig) -> Result<bool> {
    tracing::info!("Validating project...");

    let mut errors = Vec::new();
    if config.validation.check_yaml {
        errors.extend(check_yaml_files(&config.content_dir()));
    }
    if config.validation.check_images {
        errors.extend(check_image_refs(
            &config.content_dir(),
            &config.resolve(&config.build.static_dir).join("images"),
        ));
    }

    if !errors.is_empty() {
        tracing::error!("Validation failed with {} errors", errors.len());
        for error in &errors {
            tracing::error!("  - {}", error);
        }
        return Ok(false);
    }

    tracing::info!("Validation passed");
    Ok(true)
}

fn content_files<'a>(
    content_dir: &Path,
    extensions: &'a [&'a str],
) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(content_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(move |p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Every `*.yaml` under the content dir must parse.
fn check_yaml_files(content_dir: &Path) -> Vec<String> {
    if !content_dir.exists() {
        return vec!["Content directory not found".to_string()];
    }

    let mut errors = Vec::new();
    for path in content_files(content_dir, &["yaml"]) {
        let result = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|s| {
                serde_yaml::from_str::<serde_yaml::Value>(&s)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            errors.push(format!("Invalid YAML in {}: {}", file_name(&path), e));
        }
    }
    errors
}

/// Local `images/...` references in pages and data files must exist under
/// `images_dir`. URLs and other directories ending in `images` are ignored.
fn check_image_refs(content_dir: &Path, images_dir: &Path) -> Vec<String> {
    let mut errors = Vec::new();
    for path in content_files(content_dir, &["md", "yaml"]) {
        let Ok(source) = std::fs::read_to_string(&path) else {
            continue;
        };

        let mut seen = Vec::new();
        for cap in IMAGE_REF.captures_iter(&source) {
            let is_local = cap
                .get(1)
                .is_some_and(|prefix| LOCAL_PREFIX.is_match(prefix.as_str()));
            let Some(rel) = cap.get(2).map(|m| m.as_str()) else {
                continue;
            };
            if !is_local || seen.contains(&rel) {
                continue;
            }
            seen.push(rel);
            if !images_dir.join(rel).is_file() {
                errors.push(format!("Missing image in {}: images/{}", file_name(&path), rel));
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn config_in(dir: &Path) -> CliConfig {
        CliConfig {
            config_file: dir.join("site.config.yaml"),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_content_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            check_yaml_files(&dir.path().join("content")),
            vec!["Content directory not found".to_string()]
        );
        assert!(!validate_project(&config_in(dir.path())).unwrap());
    }

    #[test]
    fn test_invalid_yaml_is_reported_by_name() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "content/data/ok.yaml", "items: [1, 2]\n");
        write(dir.path(), "content/data/nested/bad.yaml", "items: [1, 2\n");

        let errors = check_yaml_files(&dir.path().join("content"));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Invalid YAML in bad.yaml: "));
    }

    #[test]
    fn test_image_refs_resolve_against_static_images() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "static/images/hero.png", "png");
        write(
            dir.path(),
            "content/pages/home.md",
            "![Hero](images/hero.png) ![Gone](/images/gone.JPG) ![Hero](images/hero.png)",
        );
        write(dir.path(), "content/data/team.yaml", "team:\n  - photo: images/team/ana.webp\n");

        let errors = check_image_refs(
            &dir.path().join("content"),
            &dir.path().join("static/images"),
        );
        assert_eq!(
            errors,
            vec![
                "Missing image in team.yaml: images/team/ana.webp".to_string(),
                "Missing image in home.md: images/gone.JPG".to_string(),
            ]
        );
    }

    #[test]
    fn test_remote_and_foreign_image_paths_are_ignored() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "content/pages/home.md",
            "![x](https://cdn.shopify.com/s/files/images/serum.png)\n\
             <img src=\"//cdn.example.com/images/a.png\">\n\
             ![y](myimages/x.png) ![z](assets/images/z.png)\n\
             ![w](../images/w.png)\n",
        );

        let errors = check_image_refs(
            &dir.path().join("content"),
            &dir.path().join("static/images"),
        );
        assert_eq!(errors, vec!["Missing image in home.md: images/w.png".to_string()]);
    }

    #[test]
    fn test_checks_can_be_switched_off() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "content/data/bad.yaml", "a: [");
        write(dir.path(), "content/pages/home.md", "![x](images/none.png)");

        let mut config = config_in(dir.path());
        assert!(!validate_project(&config).unwrap());

        config.validation.check_yaml = false;
        config.validation.check_images = false;
        assert!(validate_project(&config).unwrap());
    }
}
