//! Text normalisation shared by every extractor.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAG: Regex = Regex::new(r"<[^>]*?>").unwrap();
    static ref LEADING_COLON: Regex = Regex::new(r"^[:\s]+").unwrap();
    static ref LEADING_COLON_OR_DASH: Regex = Regex::new(r"^[:\-\s]+").unwrap();
}

/// Entities decoded by [`strip_html`], applied in this order.
const ENTITIES: [(&str, &str); 5] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
];

/// Collapse every run of whitespace (newlines and nbsp included) to one space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove tag markup, decode the small entity set, then normalise whitespace.
pub fn strip_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let mut text = TAG.replace_all(html, "").into_owned();
    for (entity, replacement) in ENTITIES {
        text = text.replace(entity, replacement);
    }
    normalize_whitespace(&text)
}

/// Drop a leading `:` and surrounding whitespace, e.g. after a speaker label.
pub fn strip_leading_colon(text: &str) -> String {
    LEADING_COLON.replace(text, "").into_owned()
}

/// Drop leading `:`/`-` separators and whitespace, e.g. after a vocabulary word.
pub fn strip_leading_separator(text: &str) -> String {
    LEADING_COLON_OR_DASH.replace(text, "").into_owned()
}
