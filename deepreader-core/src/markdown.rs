//! Markdown to HTML conversion for report bundles.
//!
//! GFM extensions are enabled and soft line breaks render as `<br />`.
//! Fenced code blocks with a known language are highlighted with syntect
//! using CSS classes, so any syntect/Prism-style stylesheet applies.
//! Raw HTML in the source is escaped unless explicitly allowed.

use std::sync::OnceLock;

use pulldown_cmark_escape::escape_html;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::config::RenderConfig;

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAXES: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

/// Render Markdown to an HTML fragment.
pub fn render_html(markdown: &str, config: &RenderConfig) -> String {
    let mut events: Vec<Event> = Vec::new();
    let mut code: Option<(Option<String>, String)> = None;

    for event in Parser::new_ext(markdown, options()) {
        if let Some((_, buf)) = code.as_mut() {
            match event {
                Event::Text(text) => {
                    buf.push_str(&text);
                    continue;
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, buf)) = code.take() {
                        events.push(Event::Html(CowStr::from(code_block_html(
                            lang.as_deref(),
                            &buf,
                            config.highlight_code,
                        ))));
                    }
                    continue;
                }
                _ => continue,
            }
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string)
                        .filter(|l| !l.is_empty()),
                    CodeBlockKind::Indented => None,
                };
                code = Some((lang, String::new()));
            }
            Event::SoftBreak => events.push(Event::HardBreak),
            Event::Html(raw) | Event::InlineHtml(raw) if !config.allow_raw_html => {
                events.push(Event::Text(raw));
            }
            other => events.push(other),
        }
    }

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

/// Wrap a full HTML document around a rendered fragment.
pub fn html_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape(title),
        body
    )
}

fn code_block_html(lang: Option<&str>, code: &str, highlight: bool) -> String {
    let class = lang
        .map(|l| format!(" class=\"language-{}\"", escape(l)))
        .unwrap_or_default();

    let body = match lang {
        Some(lang) if highlight => highlight_code(lang, code).unwrap_or_else(|| escape(code)),
        _ => escape(code),
    };

    format!("<pre><code{}>{}</code></pre>\n", class, body)
}

/// Highlight `code` as `lang`, or `None` when the language is unknown.
fn highlight_code(lang: &str, code: &str) -> Option<String> {
    let syntaxes = syntax_set();
    let syntax = syntaxes
        .find_syntax_by_token(lang)
        .or_else(|| syntaxes.find_syntax_by_extension(lang))?;

    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, syntaxes, ClassStyle::Spaced);
    for line in LinesWithEndings::from(code) {
        if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
            tracing::debug!(lang, error = %e, "Highlighting failed, falling back to plain code");
            return None;
        }
    }
    Some(generator.finalize())
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String cannot fail.
    let _ = escape_html(&mut out, text);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RenderConfig {
        RenderConfig::default()
    }

    #[test]
    fn test_headings_and_emphasis() {
        let html = render_html("# A\n\n_brief_\n\np1", &config());
        assert!(html.contains("<h1>A</h1>"));
        assert!(html.contains("<em>brief</em>"));
        assert!(html.contains("<p>p1</p>"));
    }

    #[test]
    fn test_soft_breaks_become_line_breaks() {
        let html = render_html("line one\nline two", &config());
        assert!(html.contains("line one<br />"), "{html}");
    }

    #[test]
    fn test_raw_html_is_escaped_by_default() {
        let html = render_html("hello <script>alert(1)</script>\n\n<div>x</div>", &config());
        assert!(!html.contains("<script>"), "{html}");
        assert!(html.contains("&lt;script&gt;"), "{html}");
        assert!(!html.contains("<div>"), "{html}");
    }

    #[test]
    fn test_raw_html_passes_when_allowed() {
        let config = RenderConfig {
            allow_raw_html: true,
            ..RenderConfig::default()
        };
        let html = render_html("<div class=\"note\">x</div>", &config);
        assert!(html.contains("<div class=\"note\">x</div>"), "{html}");
    }

    #[test]
    fn test_code_block_is_highlighted() {
        let html = render_html("```rust\nfn main() {}\n```\n", &config());
        assert!(html.contains("<pre><code class=\"language-rust\">"), "{html}");
        assert!(html.contains("<span class=\""), "{html}");
        assert!(html.contains("main"));
    }

    #[test]
    fn test_code_block_unknown_language_is_escaped() {
        let html = render_html("```nosuchlang\na < b\n```\n", &config());
        assert!(html.contains("class=\"language-nosuchlang\""), "{html}");
        assert!(html.contains("a &lt; b"), "{html}");
    }

    #[test]
    fn test_code_block_without_highlighting() {
        let config = RenderConfig {
            highlight_code: false,
            ..RenderConfig::default()
        };
        let html = render_html("```rust\nlet x = 1;\n```\n", &config);
        assert!(html.contains("<pre><code class=\"language-rust\">let x = 1;\n</code></pre>"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("\"a\" & <b>"), "&quot;a&quot; &amp; &lt;b&gt;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_html_document_escapes_title() {
        let doc = html_document("A & B", "<p>x</p>\n");
        assert!(doc.contains("<title>A &amp; B</title>"));
        assert!(doc.contains("<p>x</p>"));
    }
}
