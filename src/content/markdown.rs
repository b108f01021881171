//! Markdown rendering with syntax highlighting

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::collections::{HashMap, HashSet};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use super::render::{Render, RenderError};

/// Theme used for every fenced code block
pub const HIGHLIGHT_THEME: &str = "base16-ocean.dark";

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme: Option<Theme>,
}

impl MarkdownRenderer {
    /// Create a new markdown renderer
    pub fn new() -> Self {
        let mut theme_set = ThemeSet::load_defaults();
        let theme = theme_set.themes.remove(HIGHLIGHT_THEME);
        if theme.is_none() {
            tracing::warn!(
                "Highlight theme {} not bundled, code blocks will be plain",
                HIGHLIGHT_THEME
            );
        }

        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
        }
    }

    /// Render markdown to HTML
    pub fn render_markdown(&self, markdown: &str) -> String {
        // Front-matter is already stripped, so no YAML metadata blocks here
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_SMART_PUNCTUATION
            | Options::ENABLE_HEADING_ATTRIBUTES
            | Options::ENABLE_GFM;
        let parser = Parser::new_ext(markdown, options);

        let mut events: Vec<Event> = Vec::new();
        let mut anchors = Anchors::default();

        // Code block state: Some(lang) while inside a block
        let mut code_block: Option<Option<String>> = None;
        let mut code_block_content = String::new();

        // Heading state: buffered events while inside a heading
        let mut heading: Option<(Tag, Vec<Event>)> = None;

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(lang) => {
                            let lang = lang.split_whitespace().next().unwrap_or("").to_string();
                            (!lang.is_empty()).then_some(lang)
                        }
                        CodeBlockKind::Indented => None,
                    };
                    code_block = Some(lang);
                    code_block_content.clear();
                }
                Event::End(TagEnd::CodeBlock) => {
                    let lang = code_block.take().flatten();
                    let highlighted = self.highlight_code(&code_block_content, lang.as_deref());
                    events.push(Event::Html(CowStr::from(highlighted)));
                }
                Event::Text(text) if code_block.is_some() => {
                    code_block_content.push_str(&text);
                }
                Event::Start(tag @ Tag::Heading { .. }) => {
                    heading = Some((tag, Vec::new()));
                }
                Event::End(TagEnd::Heading(level)) => {
                    if let Some((tag, inner)) = heading.take() {
                        events.push(Event::Start(anchors.assign(tag, &inner)));
                        events.extend(inner);
                    }
                    events.push(Event::End(TagEnd::Heading(level)));
                }
                event => match heading.as_mut() {
                    Some((_, inner)) => inner.push(event),
                    None => events.push(event),
                },
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Highlight a code block
    fn highlight_code(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.unwrap_or("text");

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let highlighted = self
            .theme
            .as_ref()
            .and_then(|theme| highlighted_html_for_string(code, &self.syntax_set, syntax, theme).ok());

        match highlighted {
            Some(highlighted) => format!(
                r#"<figure class="highlight {}">{}</figure>"#,
                html_escape(lang),
                highlighted
            ),
            None => format!(
                r#"<pre><code class="language-{}">{}</code></pre>"#,
                html_escape(lang),
                html_escape(code)
            ),
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Render for MarkdownRenderer {
    fn render(&self, body: &str) -> Result<String, RenderError> {
        Ok(self.render_markdown(body))
    }
}

/// Assigns unique `id`s to headings that have none.
///
/// Explicit ids are kept as written and reserved, so a generated id never
/// repeats one of them.
#[derive(Default)]
struct Anchors {
    taken: HashSet<String>,
    next_suffix: HashMap<String, usize>,
}

impl Anchors {
    fn assign<'a>(&mut self, tag: Tag<'a>, inner: &[Event<'a>]) -> Tag<'a> {
        match tag {
            Tag::Heading {
                level,
                id: None,
                classes,
                attrs,
            } => {
                let text: String = inner
                    .iter()
                    .filter_map(|e| match e {
                        Event::Text(t) | Event::Code(t) => Some(t.as_ref()),
                        _ => None,
                    })
                    .collect();
                let id = self.unique(slug::slugify(&text));
                Tag::Heading {
                    level,
                    id: Some(CowStr::from(id)),
                    classes,
                    attrs,
                }
            }
            Tag::Heading {
                level,
                id: Some(id),
                classes,
                attrs,
            } => {
                self.taken.insert(id.to_string());
                Tag::Heading {
                    level,
                    id: Some(id),
                    classes,
                    attrs,
                }
            }
            other => other,
        }
    }

    fn unique(&mut self, base: String) -> String {
        let base = if base.is_empty() {
            "section".to_string()
        } else {
            base
        };

        let mut suffix = self.next_suffix.get(&base).copied().unwrap_or(0);
        let mut id = base.clone();
        if suffix > 0 {
            id = format!("{}-{}", base, suffix);
        }
        while self.taken.contains(&id) {
            suffix += 1;
            id = format!("{}-{}", base, suffix);
        }

        self.next_suffix.insert(base, suffix + 1);
        self.taken.insert(id.clone());
        id
    }
}

/// Simple HTML escaping
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
