use std::collections::HashSet;
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const HIGHLIGHT_THEME: &str = "base16-ocean.dark";

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_DEFINITION_LIST
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
}

/// Convert a Markdown body to HTML.
///
/// Fenced code blocks are syntax highlighted and every heading gets an `id`
/// so it can be linked from a table of contents.
pub fn to_html(markdown: &str) -> String {
    let events: Vec<Event> = Parser::new_ext(markdown, options()).collect();
    let events = highlight_code_blocks(events);
    let events = anchor_headings(events);

    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, events.into_iter());
    out
}

fn highlight_code_blocks(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut processed = Vec::with_capacity(events.len());
    let mut iter = events.into_iter();

    while let Some(event) = iter.next() {
        let lang = match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang))) => lang,
            other => {
                processed.push(other);
                continue;
            }
        };

        // Collect all text events until the end of the code block
        let mut code = String::new();
        for inner in iter.by_ref() {
            match inner {
                Event::End(TagEnd::CodeBlock) => break,
                Event::Text(text) => code.push_str(&text),
                _ => {}
            }
        }

        processed.push(Event::Html(highlight(&code, &lang).into()));
    }

    processed
}

fn highlight(code: &str, info: &str) -> String {
    // Info strings like "rust,ignore" or "python title=x" name the language first
    let token = info
        .split(|c: char| c == ',' || c.is_whitespace())
        .next()
        .unwrap_or_default();

    let syntax = if token.is_empty() {
        None
    } else {
        SYNTAX_SET.find_syntax_by_token(token).or_else(|| match token {
            "toml" => SYNTAX_SET.find_syntax_by_name("YAML"),
            _ => None,
        })
    };

    let body = syntax
        .and_then(|syntax| {
            let theme = &THEME_SET.themes[HIGHLIGHT_THEME];
            highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme).ok()
        })
        .unwrap_or_else(|| format!("<pre><code>{}</code></pre>\n", html_escape::encode_text(code)));

    format!("<div class=\"codehilite\">{body}</div>\n")
}

fn anchor_headings(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut processed = Vec::with_capacity(events.len());
    let mut used = HashSet::new();
    let mut iter = events.into_iter();

    while let Some(event) = iter.next() {
        let (level, id, classes, attrs) = match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => (level, id, classes, attrs),
            other => {
                processed.push(other);
                continue;
            }
        };

        let mut text = String::new();
        let mut inner = Vec::new();
        for e in iter.by_ref() {
            let done = matches!(e, Event::End(TagEnd::Heading(_)));
            if let Event::Text(t) | Event::Code(t) = &e {
                text.push_str(t);
            }
            inner.push(e);
            if done {
                break;
            }
        }

        let id = match id {
            Some(explicit) => {
                used.insert(explicit.to_string());
                explicit
            }
            None => CowStr::from(unique_id(slugify(&text), &mut used)),
        };

        processed.push(Event::Start(Tag::Heading {
            level,
            id: Some(id),
            classes,
            attrs,
        }));
        processed.extend(inner);
    }

    processed
}

/// Slug for a heading anchor. Accented letters are transliterated first
/// (`é` becomes `e`); then ASCII word characters, whitespace and hyphens
/// survive, the rest is dropped, and whitespace/hyphen runs become one `-`.
pub fn slugify(text: &str) -> String {
    let kept: String = deunicode::deunicode(text)
        .chars()
        .filter(|c| c.is_ascii() && (c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace()))
        .collect();

    let mut slug = String::with_capacity(kept.len());
    let mut in_separator = false;
    for c in kept.trim().to_lowercase().chars() {
        if c == '-' || c.is_whitespace() {
            if !in_separator {
                slug.push('-');
                in_separator = true;
            }
        } else {
            slug.push(c);
            in_separator = false;
        }
    }
    slug
}

/// Make `id` unique among `used` by appending or bumping a `_N` suffix.
fn unique_id(mut id: String, used: &mut HashSet<String>) -> String {
    while id.is_empty() || used.contains(&id) {
        id = match id.rsplit_once('_') {
            Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
                let next = n.parse::<u64>().map(|n| n + 1).unwrap_or(1);
                format!("{base}_{next}")
            }
            _ => format!("{id}_1"),
        };
    }
    used.insert(id.clone());
    id
}
