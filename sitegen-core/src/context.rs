use chrono::{DateTime, Datelike, Local};
use tera::Context;

use crate::config::SiteConfig;
use crate::data::DataCatalog;
use crate::page::Page;

/// Template variables every page gets; data files may not reuse these names.
pub const RESERVED_KEYS: &[&str] = &[
    "site",
    "features",
    "page",
    "content",
    "build_time",
    "current_year",
    "section",
];

/// Assemble the template context for one page.
///
/// Data catalog entries are spread at the top level next to the built-in
/// variables. [`DataCatalog::load`] refuses reserved names, so nothing here
/// can be shadowed.
pub fn page_context(
    config: &SiteConfig,
    data: &DataCatalog,
    page: &Page,
    build_time: &DateTime<Local>,
) -> Context {
    let mut context = Context::new();

    context.insert("site", &config.site);
    context.insert("features", &config.features);
    context.insert("page", &page.frontmatter);
    context.insert("section", &page.frontmatter);
    context.insert("content", &page.content);
    context.insert(
        "build_time",
        &build_time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
    );
    context.insert("current_year", &build_time.year());

    for (key, value) in data.iter() {
        context.insert(key.as_str(), value);
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_context_exposes_everything() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("testimonials.yaml"),
            "testimonials:\n  - name: A\n    text: Great\n",
        )
        .unwrap();
        let data = DataCatalog::load(dir.path()).unwrap();

        let config: SiteConfig =
            serde_yaml::from_str("site:\n  name: Aura\nfeatures:\n  shop: false\n").unwrap();
        let page = Page::parse("home.md", "---\nhero: Glow\n---\nHello").unwrap();
        let when = Local.with_ymd_and_hms(2025, 10, 14, 22, 2, 15).unwrap();

        let ctx = page_context(&config, &data, &page, &when).into_json();

        assert_eq!(ctx["site"], json!({ "name": "Aura" }));
        assert_eq!(ctx["features"], json!({ "shop": false }));
        assert_eq!(ctx["page"], json!({ "hero": "Glow" }));
        assert_eq!(ctx["section"], ctx["page"]);
        assert_eq!(ctx["content"], json!("<p>Hello</p>\n"));
        assert_eq!(ctx["build_time"], json!("2025-10-14T22:02:15.000000"));
        assert_eq!(ctx["current_year"], json!(2025));
        assert_eq!(ctx["testimonials"], json!([{ "name": "A", "text": "Great" }]));
    }
}
