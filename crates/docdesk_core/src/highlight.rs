//! crates/docdesk_core/src/highlight.rs
//!
//! Marks occurrences of the committed search term inside OCR text.

use regex::RegexBuilder;

/// A run of OCR text, either plain or matching the keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Plain(String),
    Match(String),
}

/// Splits `text` around case-insensitive, literal occurrences of `keyword`.
/// A blank keyword yields the whole text as one plain fragment.
pub fn highlight(text: &str, keyword: &str) -> Vec<Fragment> {
    if text.is_empty() {
        return Vec::new();
    }
    if keyword.trim().is_empty() {
        return vec![Fragment::Plain(text.to_string())];
    }

    let Ok(pattern) = RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()
    else {
        return vec![Fragment::Plain(text.to_string())];
    };

    let mut fragments = Vec::new();
    let mut last = 0;
    for found in pattern.find_iter(text) {
        if found.start() > last {
            fragments.push(Fragment::Plain(text[last..found.start()].to_string()));
        }
        fragments.push(Fragment::Match(found.as_str().to_string()));
        last = found.end();
    }
    if last < text.len() {
        fragments.push(Fragment::Plain(text[last..].to_string()));
    }
    fragments
}
