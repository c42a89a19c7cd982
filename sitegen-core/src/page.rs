use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::markdown;

const FRONTMATTER_MARKER: &str = "---";
const HOME_PAGE: &str = "home.md";

pub type Frontmatter = Map<String, Value>;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Page not found: {0}")]
    NotFound(PathBuf),
    #[error("Error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid frontmatter in {path}: {source}")]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid frontmatter in {path}: {source}")]
    Conversion {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid frontmatter in {path}: expected a mapping")]
    NotAMapping { path: PathBuf },
}

/// A Markdown source page after parsing.
#[derive(Debug, Clone)]
pub struct Page {
    pub source: PathBuf,
    pub frontmatter: Frontmatter,
    /// Rendered HTML body.
    pub content: String,
}

impl Page {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, PageError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PageError::NotFound(path.to_path_buf())
            } else {
                PageError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        Self::parse(path, &raw)
    }

    pub fn parse<P: AsRef<Path>>(path: P, raw: &str) -> Result<Self, PageError> {
        let path = path.as_ref();
        let (frontmatter, body) = split_frontmatter(raw);

        let frontmatter = match frontmatter {
            Some(yaml) => parse_frontmatter(path, yaml)?,
            None => Frontmatter::new(),
        };

        Ok(Self {
            source: path.to_path_buf(),
            frontmatter,
            content: markdown::to_html(body),
        })
    }

    /// Template selected by the `layout` key, `default` when absent.
    pub fn layout(&self) -> &str {
        self.frontmatter
            .get("layout")
            .and_then(Value::as_str)
            .unwrap_or("default")
    }

    pub fn output_name(&self) -> String {
        output_file_name(&self.source)
    }
}

/// Split raw page text into an optional YAML block and the Markdown body.
///
/// The text must start with `---` and contain a second `---`; otherwise the
/// whole input is body.
pub fn split_frontmatter(raw: &str) -> (Option<&str>, &str) {
    if !raw.starts_with(FRONTMATTER_MARKER) {
        return (None, raw);
    }

    let mut parts = raw.splitn(3, FRONTMATTER_MARKER);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(yaml), Some(body)) => (Some(yaml), body.trim()),
        _ => (None, raw),
    }
}

fn parse_frontmatter(path: &Path, yaml: &str) -> Result<Frontmatter, PageError> {
    let yaml_err = |source| PageError::Frontmatter {
        path: path.to_path_buf(),
        source,
    };
    let mut parsed: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(yaml_err)?;
    parsed.apply_merge().map_err(yaml_err)?;

    match serde_json::to_value(parsed).map_err(|source| PageError::Conversion {
        path: path.to_path_buf(),
        source,
    })? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Frontmatter::new()),
        _ => Err(PageError::NotAMapping {
            path: path.to_path_buf(),
        }),
    }
}

/// `home.md` becomes `index.html`, every other `name.md` becomes `name.html`.
pub fn output_file_name<P: AsRef<Path>>(source: P) -> String {
    let source = source.as_ref();
    if source.file_name().is_some_and(|name| name == HOME_PAGE) {
        return "index.html".to_string();
    }

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{stem}.html")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_file_names() {
        assert_eq!(output_file_name("content/pages/home.md"), "index.html");
        assert_eq!(output_file_name("about.md"), "about.html");
        assert_eq!(output_file_name("pages/index.md"), "index.html");
        assert_eq!(output_file_name("Home.md"), "Home.html");
        assert_eq!(output_file_name("home-care.md"), "home-care.html");
    }

    #[test]
    fn test_frontmatter_merge_keys() {
        let raw = "---\ncta: &cta\n  label: Book\nhero:\n  <<: *cta\n  title: Glow\n---\nBody";
        let page = Page::parse("home.md", raw).unwrap();
        assert_eq!(page.frontmatter["hero"], json!({ "label": "Book", "title": "Glow" }));
    }

    #[test]
    fn test_frontmatter_round_trips() {
        let raw = "---\nlayout: landing\ntitle: Welcome\nhero:\n  cta: [Book, Call]\n---\n\n# Hello\n";
        let page = Page::parse("home.md", raw).unwrap();

        assert_eq!(
            Value::Object(page.frontmatter.clone()),
            json!({ "layout": "landing", "title": "Welcome", "hero": { "cta": ["Book", "Call"] } })
        );
        assert_eq!(page.layout(), "landing");
        assert_eq!(page.content, "<h1 id=\"hello\">Hello</h1>\n");
    }

    #[test]
    fn test_no_frontmatter_keeps_whole_body() {
        let raw = "Intro paragraph\n\n---\n\nAfter the rule\n";
        let page = Page::parse("about.md", raw).unwrap();

        assert!(page.frontmatter.is_empty());
        assert_eq!(page.layout(), "default");
        assert_eq!(page.content, markdown::to_html(raw));
    }

    #[test]
    fn test_single_marker_is_all_body() {
        let raw = "---\ntitle: never closed\n";
        let (frontmatter, body) = split_frontmatter(raw);
        assert!(frontmatter.is_none());
        assert_eq!(body, raw);
    }

    #[test]
    fn test_body_keeps_later_markers() {
        let raw = "---\ntitle: x\n---\nabove\n\n---\n\nbelow\n";
        let (frontmatter, body) = split_frontmatter(raw);
        assert_eq!(frontmatter, Some("\ntitle: x\n"));
        assert_eq!(body, "above\n\n---\n\nbelow");
    }

    #[test]
    fn test_empty_frontmatter_block() {
        let page = Page::parse("x.md", "---\n---\nbody").unwrap();
        assert!(page.frontmatter.is_empty());
    }

    #[test]
    fn test_malformed_frontmatter_is_fatal() {
        let err = Page::parse("broken.md", "---\ntitle: [oops\n---\nbody").unwrap_err();
        assert!(matches!(err, PageError::Frontmatter { .. }));
        assert!(err.to_string().contains("broken.md"));
    }

    #[test]
    fn test_scalar_frontmatter_rejected() {
        let err = Page::parse("odd.md", "---\njust a string\n---\nbody").unwrap_err();
        assert!(matches!(err, PageError::NotAMapping { .. }));
    }

    #[test]
    fn test_read_missing_page() {
        let err = Page::read("/no/such/page.md").unwrap_err();
        assert!(matches!(err, PageError::NotFound(_)));
    }
}
