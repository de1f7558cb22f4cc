//! Renders document bodies for previews: HTML via `pulldown-cmark`, plus a
//! plain-text excerpt and reading statistics.

use pulldown_cmark::{html, Event, Options, Parser, Tag};
use serde::Serialize;

/// Marks the end of a document's summary.
pub const FOLD_TAG: &str = "<!-- more -->";

/// The excerpt length (in characters) used when a body has no fold.
pub const EXCERPT_LENGTH: usize = 160;

pub const WORDS_PER_MINUTE: usize = 200;

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Converts Markdown to HTML.
pub fn to_html(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options()));
    out
}

/// Returns the text content of `markdown` with markup and raw HTML removed
/// and whitespace collapsed.
pub fn plain_text(markdown: &str) -> String {
    let mut text = String::with_capacity(markdown.len());
    for event in Parser::new_ext(markdown, options()) {
        match event {
            Event::Text(s) | Event::Code(s) => text.push_str(&s),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(tag) if is_block(&tag) => text.push(' '),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A rendered document body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub html: String,

    /// The text before [`FOLD_TAG`], or the start of the text when there is
    /// no fold.
    pub excerpt: String,

    /// Whether the body has a [`FOLD_TAG`].
    pub folded: bool,
    pub word_count: usize,

    /// At least one.
    pub reading_minutes: usize,
}

impl Preview {
    pub fn new(markdown: &str) -> Preview {
        let text = plain_text(markdown);
        let word_count = text.split_whitespace().count();
        let (excerpt, folded) = match markdown.find(FOLD_TAG) {
            Some(i) => (plain_text(&markdown[..i]), true),
            None => (truncate(&text, EXCERPT_LENGTH), false),
        };
        Preview {
            html: to_html(markdown),
            excerpt,
            folded,
            word_count,
            reading_minutes: std::cmp::max(
                1,
                (word_count + WORDS_PER_MINUTE - 1) / WORDS_PER_MINUTE,
            ),
        }
    }
}

fn is_block(tag: &Tag) -> bool {
    matches!(
        tag,
        Tag::Paragraph
            | Tag::Heading(_)
            | Tag::BlockQuote
            | Tag::CodeBlock(_)
            | Tag::Item
            | Tag::TableCell
            | Tag::FootnoteDefinition(_)
    )
}

// Cuts `text` to at most `max` characters, backing up to a word boundary.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_owned(),
        Some((end, _)) => {
            let head = &text[..end];
            let head = match head.rfind(' ') {
                Some(space) if space > 0 => &head[..space],
                _ => head,
            };
            format!("{}…", head.trim_end())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_html() {
        let html = to_html("# Title\n\n~~gone~~ \"quoted\"\n\n- [x] done\n");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("“quoted”"));
        assert!(html.contains("checkbox"));
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(
            plain_text("# Title\n\nSome *emphasis* and `code`.\n<div>raw</div>\n"),
            "Title Some emphasis and code."
        );
    }

    #[test]
    fn test_preview_with_fold() {
        let preview = Preview::new("Intro **text**.\n\n<!-- more -->\n\nThe rest.\n");
        assert!(preview.folded);
        assert_eq!(preview.excerpt, "Intro text.");
        assert_eq!(preview.word_count, 4);
        assert_eq!(preview.reading_minutes, 1);
    }

    #[test]
    fn test_preview_without_fold() {
        let body = "word ".repeat(450);
        let preview = Preview::new(&body);
        assert!(!preview.folded);
        assert_eq!(preview.word_count, 450);
        assert_eq!(preview.reading_minutes, 3);
        assert!(preview.excerpt.ends_with("word…"));
        assert!(preview.excerpt.chars().count() <= EXCERPT_LENGTH + 1);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("one two three", 9), "one two…");
        assert_eq!(truncate("abcdefghij", 4), "abcd…");
    }
}
