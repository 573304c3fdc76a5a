//! Markdown rendering for CMS content
//!
//! Blog posts, pages and tool sections are stored as Markdown and rendered to
//! HTML on every write. Fenced code blocks with a known language are
//! highlighted with syntect; everything else goes through pulldown-cmark.
//!
//! ```
//! use paperdesk::services::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new();
//! let html = renderer.render("## Merge PDFs\n\nDrop **two or more** files.");
//! assert!(html.contains("<h2>"));
//! assert!(html.contains("<strong>"));
//! ```

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use std::sync::Arc;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

const DEFAULT_THEME: &str = "InspiredGitHub";

/// Thread-safe Markdown renderer. Syntax and theme sets are loaded once and
/// shared between clones.
#[derive(Clone)]
pub struct MarkdownRenderer {
    syntax_set: Arc<SyntaxSet>,
    theme_set: Arc<ThemeSet>,
    theme_name: String,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::with_theme(DEFAULT_THEME)
    }

    /// Unknown theme names fall back to the default theme
    pub fn with_theme(theme_name: &str) -> Self {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let theme_set = ThemeSet::load_defaults();

        let theme_name = if theme_set.themes.contains_key(theme_name) {
            theme_name.to_string()
        } else {
            DEFAULT_THEME.to_string()
        };

        Self {
            syntax_set: Arc::new(syntax_set),
            theme_set: Arc::new(theme_set),
            theme_name,
        }
    }

    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        options
    }

    /// Render Markdown to HTML. Raw HTML in the source is escaped.
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Self::options());
        let events = self.process_events(parser);

        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Plain-text summary of at most `max_chars` characters, cut on a word
    /// boundary with a trailing ellipsis when truncated.
    pub fn excerpt(markdown: &str, max_chars: usize) -> String {
        let mut text = String::new();
        let mut in_code_block = false;

        for event in Parser::new_ext(markdown, Self::options()) {
            match event {
                Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
                Event::End(TagEnd::CodeBlock) => in_code_block = false,
                Event::Text(t) | Event::Code(t) if !in_code_block => {
                    text.push_str(&t);
                }
                Event::SoftBreak | Event::HardBreak => text.push(' '),
                Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Heading(_)) | Event::End(TagEnd::Item) => {
                    text.push(' ')
                }
                _ => {}
            }
        }

        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= max_chars {
            return collapsed;
        }

        let cut: String = collapsed.chars().take(max_chars).collect();
        let trimmed = match cut.rfind(' ') {
            Some(pos) if pos > 0 => &cut[..pos],
            _ => cut.as_str(),
        };
        format!("{}…", trimmed.trim_end_matches(|c: char| c.is_ascii_punctuation()))
    }

    fn process_events<'a>(&self, parser: Parser<'a>) -> Vec<Event<'a>> {
        let mut events = Vec::new();
        let mut in_code_block = false;
        let mut code_lang: Option<String> = None;
        let mut code_content = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_content.clear();
                    code_lang = match kind {
                        CodeBlockKind::Fenced(lang) => {
                            // Info strings like "rust,ignore" carry extra attributes
                            let lang = lang.split([',', ' ']).next().unwrap_or("").trim().to_string();
                            (!lang.is_empty()).then_some(lang)
                        }
                        CodeBlockKind::Indented => None,
                    };
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    let block = match code_lang.take() {
                        Some(lang) => self.highlight_code(&code_content, &lang),
                        None => plain_code_block(&code_content, None),
                    };
                    events.push(Event::Html(block.into()));
                }
                Event::Text(text) if in_code_block => code_content.push_str(&text),
                Event::Html(raw) | Event::InlineHtml(raw) => {
                    events.push(Event::Text(raw));
                }
                _ => events.push(event),
            }
        }

        events
    }

    fn highlight_code(&self, code: &str, lang: &str) -> String {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang));

        let (Some(syntax), Some(theme)) = (syntax, self.theme_set.themes.get(&self.theme_name)) else {
            return plain_code_block(code, Some(lang));
        };

        highlighted_html_for_string(code, &self.syntax_set, syntax, theme)
            .unwrap_or_else(|_| plain_code_block(code, Some(lang)))
    }
}

fn plain_code_block(code: &str, lang: Option<&str>) -> String {
    match lang {
        Some(lang) => format!(
            "<pre><code class=\"language-{}\">{}</code></pre>",
            html_escape(lang),
            html_escape(code)
        ),
        None => format!("<pre><code>{}</code></pre>", html_escape(code)),
    }
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
