use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tera::{Context, Tera};
use thiserror::Error;
use walkdir::WalkDir;

// Whitespace before a block or comment tag that opens a line
static LEADING_BLOCK_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]+(\{[%#])").unwrap());
// A whole block or comment tag followed by a newline
static BLOCK_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(\{%.*?%\}|\{#.*?#\})\r?\n").unwrap());
// `{{ content }}` holds HTML we rendered ourselves
static CONTENT_EXPR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(-?)\s*content\s*(-?)\}\}").unwrap());

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template directory not found: {0}")]
    MissingDir(PathBuf),
    #[error("Error reading template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Template error: {0}")]
    Tera(#[from] tera::Error),
    #[error("Error rendering {template}: {source}")]
    Render {
        template: String,
        #[source]
        source: tera::Error,
    },
}

pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Load every file under `template_dir`, named by its path relative to
    /// the directory (`default.html`, `partials/nav.html`).
    pub fn new<P: AsRef<Path>>(template_dir: P) -> Result<Self, TemplateError> {
        let template_dir = template_dir.as_ref();
        if !template_dir.is_dir() {
            return Err(TemplateError::MissingDir(template_dir.to_path_buf()));
        }

        let mut sources = Vec::new();
        for entry in WalkDir::new(template_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(template_dir) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            sources.push((name, prepare_source(&source)));
        }

        Self::from_sources(sources)
    }

    /// Build from already prepared `(name, source)` pairs.
    pub fn from_sources<N, S>(sources: Vec<(N, S)>) -> Result<Self, TemplateError>
    where
        N: AsRef<str>,
        S: AsRef<str>,
    {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html", ".htm", ".xml"]);
        tera.add_raw_templates(sources)?;
        Ok(Self { tera })
    }

    pub fn has_layout(&self, layout: &str) -> bool {
        let name = layout_template(layout);
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render the `<layout>.html` template with an external context
    pub fn render(&self, layout: &str, context: &Context) -> Result<String, TemplateError> {
        let template = layout_template(layout);
        self.tera
            .render(&template, context)
            .map_err(|source| TemplateError::Render { template, source })
    }

    /// Render a layout and write it to `output_path`, replacing any existing file
    pub fn render_to_file(
        &self,
        layout: &str,
        context: &Context,
        output_path: &Path,
    ) -> Result<(), TemplateError> {
        let rendered = self.render(layout, context)?;

        let io_err = |source| TemplateError::Io {
            path: output_path.to_path_buf(),
            source,
        };
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(output_path, rendered).map_err(io_err)?;
        Ok(())
    }
}

fn layout_template(layout: &str) -> String {
    format!("{layout}.html")
}

/// Apply block-tag whitespace trimming and mark `content` as safe.
pub fn prepare_source(source: &str) -> String {
    let stripped = LEADING_BLOCK_WS.replace_all(source, "$1");
    let trimmed = BLOCK_NEWLINE.replace_all(&stripped, "${1}");
    CONTENT_EXPR
        .replace_all(&trimmed, "{{$1 content | safe $2}}")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn renderer(templates: &[(&str, &str)]) -> TemplateRenderer {
        let sources = templates
            .iter()
            .map(|(name, src)| (name.to_string(), prepare_source(src)))
            .collect();
        TemplateRenderer::from_sources(sources).unwrap()
    }

    #[test]
    fn test_block_whitespace_trimmed() {
        let src = "<ul>\n    {% for x in items %}\n  <li>{{ x }}</li>\n    {% endfor %}\n</ul>\n";
        assert_eq!(
            prepare_source(src),
            "<ul>\n{% for x in items %}  <li>{{ x }}</li>\n{% endfor %}</ul>\n"
        );
    }

    #[test]
    fn test_comment_tags_trimmed_like_blocks() {
        let src = "<p>\n  {# hero copy #}\n  Hi\n</p>\n";
        assert_eq!(prepare_source(src), "<p>\n{# hero copy #}  Hi\n</p>\n");
    }

    #[test]
    fn test_percent_brace_outside_tags_untouched() {
        let src = "<style>\n.bar{width:100%}\n.baz{}\n</style>\n";
        assert_eq!(prepare_source(src), src);
    }

    #[test]
    fn test_content_is_marked_safe() {
        assert_eq!(prepare_source("{{ content }}"), "{{ content | safe }}");
        assert_eq!(prepare_source("{{- content -}}"), "{{- content | safe -}}");
        assert_eq!(prepare_source("{{ page.content }}"), "{{ page.content }}");
    }

    #[test]
    fn test_body_unescaped_data_escaped() {
        let r = renderer(&[("default.html", "{{ content }}|{{ quote }}")]);
        let mut ctx = Context::new();
        ctx.insert("content", "<h1>Hi</h1>");
        ctx.insert("quote", "<script>alert(1)</script>");

        let html = r.render("default", &ctx).unwrap();
        assert_eq!(
            html,
            "<h1>Hi</h1>|&lt;script&gt;alert(1)&lt;&#x2F;script&gt;"
        );
    }

    #[test]
    fn test_missing_layout_surfaces_engine_error() {
        let r = renderer(&[("default.html", "{{ content }}")]);
        assert!(r.has_layout("default"));
        assert!(!r.has_layout("landing"));

        let err = r.render("landing", &Context::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Render { ref template, .. } if template == "landing.html"));
    }

    #[test]
    fn test_undefined_variable_rejected() {
        let r = renderer(&[("default.html", "{{ nope }}")]);
        assert!(r.render("default", &Context::new()).is_err());
    }

    #[test]
    fn test_loads_nested_templates_from_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("partials")).unwrap();
        std::fs::write(dir.path().join("partials").join("nav.html"), "<nav>{{ title }}</nav>").unwrap();
        std::fs::write(
            dir.path().join("default.html"),
            "{% include \"partials/nav.html\" %}\n<main>{{ content }}</main>",
        )
        .unwrap();

        let r = TemplateRenderer::new(dir.path()).unwrap();
        let mut ctx = Context::new();
        ctx.insert("title", "Home");
        ctx.insert("content", "<p>x</p>");
        assert_eq!(
            r.render("default", &ctx).unwrap(),
            "<nav>Home</nav><main><p>x</p></main>"
        );
    }

    #[test]
    fn test_missing_dir() {
        let err = TemplateRenderer::new("/no/templates/here").err().unwrap();
        assert!(matches!(err, TemplateError::MissingDir(_)));
    }
}
