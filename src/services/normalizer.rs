//! Markup-to-text cleanup for entry bodies.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{NormalizedEntry, Published, RawEntry};

/// Marker appended to truncated text
pub const ELLIPSIS: &str = "...";

static HIDDEN_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>|<!--.*?-->")
        .expect("hidden block pattern")
});
static BLOCK_BREAKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(?:p|div|h[1-6]|li|blockquote|tr|pre)\s*>")
        .expect("block break pattern")
});
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag pattern"));
static PARAGRAPH_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("paragraph pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Strip markup, decode entities and collapse whitespace.
///
/// Paragraph structure survives as single blank lines; every other run of
/// whitespace becomes one space.
pub fn normalize(raw: &str) -> String {
    let text = HIDDEN_BLOCKS.replace_all(raw, "");
    let text = BLOCK_BREAKS.replace_all(&text, "\n\n");
    let text = TAGS.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text);

    PARAGRAPH_SPLIT
        .split(&text)
        .map(|paragraph| WHITESPACE.replace_all(paragraph.trim(), " ").into_owned())
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Cut `text` to `max_chars` characters, appending [`ELLIPSIS`] when cut.
pub fn truncate(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((byte_end, _)) => Cow::Owned(format!("{}{}", &text[..byte_end], ELLIPSIS)),
    }
}

/// Clean an entry's body and parse its date. Returns `None` for entries without a link.
pub fn normalize_entry(raw: RawEntry) -> Option<NormalizedEntry> {
    let link = raw
        .link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())?
        .to_string();

    Some(NormalizedEntry {
        clean_content: normalize(raw.body()),
        published: Published::parse(raw.published.as_deref()),
        title: raw
            .title
            .map(|t| normalize(&t))
            .filter(|t| !t.is_empty()),
        link,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tags_and_decodes_entities() {
        let raw = "<p>Tom &amp; Jerry&#39;s <b>big</b>&nbsp;day</p>";
        assert_eq!(normalize(raw), "Tom & Jerry's big day");
    }

    #[test]
    fn test_collapses_whitespace_and_keeps_paragraphs() {
        let raw = "<p>First   line\n  continues</p>\n\n\n<p>Second</p><br/>Third";
        assert_eq!(normalize(raw), "First line continues\n\nSecond\n\nThird");
    }

    #[test]
    fn test_drops_scripts_styles_and_comments() {
        let raw = "<style>p{color:red}</style>Visible<script>alert(1)</script><!-- hidden -->";
        assert_eq!(normalize(raw), "Visible");
    }

    #[test]
    fn test_empty_input_normalizes_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  <p> </p> "), "");
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exact", 5), "exact");
        assert!(matches!(truncate("short", 10), Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncate_length_and_prefix() {
        let text = "ĉiuj homoj estas egalaj ".repeat(50);
        for max in [0, 1, 7, 100, 800] {
            let cut = truncate(&text, max);
            assert_eq!(cut.chars().count(), max + ELLIPSIS.len());
            let kept = cut.strip_suffix(ELLIPSIS).unwrap();
            assert!(text.starts_with(kept));
        }
    }

    #[test]
    fn test_normalize_entry_requires_link() {
        let raw = RawEntry::default();
        assert!(normalize_entry(raw).is_none());

        let raw = RawEntry {
            link: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(normalize_entry(raw).is_none());
    }

    #[test]
    fn test_normalize_entry_cleans_fields() {
        let raw = RawEntry::new(" A &amp; B ", " https://example.com/a ")
            .with_summary(Some("<p>Hello</p>".to_string()))
            .with_published(Some("not a date".to_string()));

        let entry = normalize_entry(raw).unwrap();
        assert_eq!(entry.title.as_deref(), Some("A & B"));
        assert_eq!(entry.link, "https://example.com/a");
        assert_eq!(entry.clean_content, "Hello");
        assert_eq!(entry.published, Published::Unparsable("not a date".to_string()));
    }
}
