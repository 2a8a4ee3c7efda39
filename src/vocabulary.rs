//! Word/definition pairs from the vocabulary section.

use lazy_static::lazy_static;
use scraper::{Html, Selector};

use crate::dom::{find_by_text, is_tag, next_element, text_of, text_without, TextMatch};
use crate::model::VocabularyItem;
use crate::text::{normalize_whitespace, strip_leading_separator};

lazy_static! {
    static ref HEADING: Selector = Selector::parse("h3").unwrap();
    static ref BOLD: Selector = Selector::parse("strong, b").unwrap();
}

/// Walk the paragraphs after the vocabulary heading up to the next `h3`.
///
/// A paragraph with a bold child is a pair: the bold text is the word, the rest
/// of the paragraph is the definition. A paragraph without bold text but with
/// visible text ends the section early; blank placeholders are skipped.
pub fn extract_vocabulary(document: &Html, heading: TextMatch) -> Vec<VocabularyItem> {
    let Some(header) = find_by_text(document, &HEADING, heading) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut cursor = next_element(header);
    while let Some(el) = cursor {
        if is_tag(el, "h3") {
            break;
        }
        if is_tag(el, "p") {
            let words: Vec<_> = el.select(&BOLD).collect();
            if words.is_empty() {
                if !text_of(el).trim().is_empty() {
                    break;
                }
            } else {
                let word = normalize_whitespace(&words.into_iter().map(text_of).collect::<String>());
                let definition = strip_leading_separator(&normalize_whitespace(&text_without(
                    el,
                    &["strong", "b"],
                )));
                items.extend(VocabularyItem::new(word, definition));
            }
        }
        cursor = next_element(el);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADING_TEXT: TextMatch = TextMatch::Contains("Vocabulary");

    fn pairs(html: &str) -> Vec<(String, String)> {
        let doc = Html::parse_document(html);
        extract_vocabulary(&doc, HEADING_TEXT)
            .into_iter()
            .map(|item| (item.word, item.definition))
            .collect()
    }

    #[test]
    fn bold_word_with_colon_definition() {
        let html = r#"<h3>Vocabulary</h3><p><strong>Run</strong>: to move fast</p>"#;
        assert_eq!(pairs(html), [("Run".to_string(), "to move fast".to_string())]);
    }

    #[test]
    fn definition_after_line_break_or_dash() {
        let html = r#"
            <h3>Vocabulary</h3>
            <p><strong>night owl</strong><br>someone who likes to stay up late</p>
            <p>&nbsp;</p>
            <p><b>lark</b> - an early riser</p>
            <h3>TRANSCRIPT</h3>
            <p><strong>after</strong>: not vocabulary</p>
        "#;
        assert_eq!(
            pairs(html),
            [
                ("night owl".to_string(), "someone who likes to stay up late".to_string()),
                ("lark".to_string(), "an early riser".to_string()),
            ]
        );
    }

    #[test]
    fn plain_paragraph_ends_section() {
        let html = r#"
            <h3>Vocabulary</h3>
            <p><strong>one</strong>: first</p>
            <p>Take our quiz to test yourself.</p>
            <p><strong>two</strong>: second</p>
        "#;
        assert_eq!(pairs(html), [("one".to_string(), "first".to_string())]);
    }

    #[test]
    fn partial_pairs_are_discarded() {
        let html = r#"
            <h3>Vocabulary</h3>
            <p><strong>lonely word</strong></p>
            <p><strong> </strong>orphan definition</p>
            <p><strong>kept</strong>: yes</p>
        "#;
        assert_eq!(pairs(html), [("kept".to_string(), "yes".to_string())]);
    }

    #[test]
    fn missing_heading_gives_nothing() {
        assert!(pairs("<p><strong>Run</strong>: to move fast</p>").is_empty());
    }
}
