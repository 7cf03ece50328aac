//! Tab display names.
//!
//! Names are derived from the leading words of a tab's first note and are
//! bounded to [`MAX_TAB_NAME_LENGTH`] characters.

use regex::Regex;
use std::sync::OnceLock;

/// Number of leading words used for a derived name.
pub const TAB_NAME_WORDS: usize = 4;

/// Maximum display length of a tab name, in characters.
pub const MAX_TAB_NAME_LENGTH: usize = 30;

const ELLIPSIS: &str = "...";

fn tag_pattern() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"))
}

/// Strip markup from note content, keeping the visible text.
pub fn plain_text(markup: &str) -> String {
    let text = tag_pattern().replace_all(markup, " ");
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Derive a display name from the leading words of `markup`.
///
/// Returns `None` when the content has no visible words.
pub fn derive_name(markup: &str) -> Option<String> {
    let text = plain_text(markup);
    let words: Vec<&str> = text.split_whitespace().take(TAB_NAME_WORDS).collect();
    if words.is_empty() {
        return None;
    }
    Some(truncate_name(&words.join(" ")))
}

/// Bound a name to [`MAX_TAB_NAME_LENGTH`] characters.
///
/// Applying this to an already-bounded name returns it unchanged.
pub fn truncate_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.chars().count() <= MAX_TAB_NAME_LENGTH {
        return trimmed.to_string();
    }
    let keep = MAX_TAB_NAME_LENGTH - ELLIPSIS.len();
    let mut out: String = trimmed.chars().take(keep).collect();
    out.truncate(out.trim_end().len());
    out.push_str(ELLIPSIS);
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_strips_tags_and_entities() {
        assert_eq!(
            plain_text("<b>Tom</b>&nbsp;&amp;&nbsp;Jerry").split_whitespace().collect::<Vec<_>>(),
            vec!["Tom", "&", "Jerry"]
        );
    }

    #[test]
    fn test_derive_name_takes_leading_words() {
        let name = derive_name("<div>Buy milk and eggs tomorrow morning</div>").unwrap();
        assert_eq!(name, "Buy milk and eggs");
    }

    #[test]
    fn test_derive_name_splits_on_block_tags() {
        let name = derive_name("<div>Groceries</div><div>milk</div>").unwrap();
        assert_eq!(name, "Groceries milk");
    }

    #[test]
    fn test_derive_name_empty_content() {
        assert!(derive_name("").is_none());
        assert!(derive_name("<div><br></div>").is_none());
        assert!(derive_name("&nbsp;").is_none());
    }

    #[test]
    fn test_truncate_name_bounds_length() {
        let long = "Supercalifragilisticexpialidocious antidisestablishment";
        let name = truncate_name(long);
        assert_eq!(name.chars().count(), MAX_TAB_NAME_LENGTH);
        assert!(name.ends_with("..."));
    }

    #[test]
    fn test_truncate_name_is_idempotent() {
        let once = truncate_name("Ærlig talt, dette er en veldig lang overskrift på norsk");
        assert_eq!(truncate_name(&once), once);
    }

    #[test]
    fn test_truncate_name_multibyte_safe() {
        let name = truncate_name(&"ø".repeat(50));
        assert_eq!(name.chars().count(), MAX_TAB_NAME_LENGTH);
    }
}
