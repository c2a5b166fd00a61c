//! Text cleanup for upstream feed content.
//!
//! Feed descriptions arrive as HTML inside CDATA; stored records carry
//! plain text with bounded length.

use once_cell::sync::OnceCell;
use regex::Regex;

fn tag_regex() -> &'static Regex {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("static tag pattern"))
}

fn whitespace_regex() -> &'static Regex {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    RE_WS.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"))
}

/// Strip markup and collapse whitespace: decode HTML entities, drop
/// tags, squeeze runs of whitespace to single spaces, trim.
pub fn strip_markup(input: &str) -> String {
    let decoded = html_escape::decode_html_entities(input);
    let without_tags = tag_regex().replace_all(&decoded, "");
    whitespace_regex()
        .replace_all(&without_tags, " ")
        .trim()
        .to_string()
}

/// Truncate to at most `max` characters, counting chars, not bytes.
pub fn truncate_chars(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    input.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS};

    #[test]
    fn strips_tags_and_decodes_entities() {
        let html = "<p>Critical flaw &amp; patch <a href=\"x\">available</a></p>";
        assert_eq!(strip_markup(html), "Critical flaw & patch available");
    }

    #[test]
    fn collapses_whitespace_across_tag_boundaries() {
        let html = "<div>first</div>\n\n  <div>  second </div>";
        assert_eq!(strip_markup(html), "first second");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "é".repeat(600);
        let truncated = truncate_chars(&s, DESCRIPTION_MAX_CHARS);
        assert_eq!(truncated.chars().count(), DESCRIPTION_MAX_CHARS);
    }

    #[test]
    fn short_input_is_untouched() {
        assert_eq!(truncate_chars("short", TITLE_MAX_CHARS), "short");
    }
}
