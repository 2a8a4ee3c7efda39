//! Document traversal helpers on top of the `scraper` crate.
//!
//! The extractors only need a handful of operations beyond selector queries:
//! walking element siblings, reading a paragraph's inline children in order,
//! and reading text with some subtrees left out.

use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::text::normalize_whitespace;

/// How a heading or label text is matched after whitespace normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    Exact(&'static str),
    Contains(&'static str),
    StartsWith(&'static str),
}

impl TextMatch {
    pub fn matches(&self, text: &str) -> bool {
        match *self {
            TextMatch::Exact(needle) => text == needle,
            TextMatch::Contains(needle) => text.contains(needle),
            TextMatch::StartsWith(needle) => text.starts_with(needle),
        }
    }
}

/// One child node of a paragraph, in document order.
#[derive(Debug, Clone, Copy)]
pub enum Inline<'a> {
    Text(&'a str),
    Break,
    Element(ElementRef<'a>),
}

impl Inline<'_> {
    /// Whitespace-only text nodes are skipped by the adjacency rules.
    pub fn is_blank(&self) -> bool {
        matches!(self, Inline::Text(text) if text.trim().is_empty())
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, Inline::Element(el) if is_bold(el.value()))
    }
}

/// `<strong>` and `<b>` both mark speaker labels and vocabulary words.
pub fn is_bold(element: &Element) -> bool {
    matches!(element.name(), "strong" | "b")
}

pub fn is_tag(el: ElementRef<'_>, name: &str) -> bool {
    el.value().name() == name
}

/// Concatenated text of the element and its descendants.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Whitespace-normalised text of the element.
pub fn clean_text_of(el: ElementRef<'_>) -> String {
    normalize_whitespace(&text_of(el))
}

/// Text of the element with every descendant subtree rooted at a tag in `skip` removed.
pub fn text_without(el: ElementRef<'_>, skip: &[&str]) -> String {
    let mut out = String::new();
    collect_text(el, skip, &mut out);
    out
}

fn collect_text(el: ElementRef<'_>, skip: &[&str], out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) if !skip.contains(&element.name()) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, skip, out);
                }
            }
            _ => {}
        }
    }
}

/// The element's text and element children in order; comments are dropped.
pub fn inline_nodes(el: ElementRef<'_>) -> Vec<Inline<'_>> {
    el.children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(Inline::Text(&**text)),
            Node::Element(element) if element.name() == "br" => Some(Inline::Break),
            Node::Element(_) => ElementRef::wrap(child).map(Inline::Element),
            _ => None,
        })
        .collect()
}

/// The next sibling that is an element, skipping text and comments.
pub fn next_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

/// Nearest ancestor-or-self with the given tag name.
pub fn closest<'a>(el: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    if is_tag(el, name) {
        return Some(el);
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| is_tag(*ancestor, name))
}

/// First element matching `selector` whose normalised text satisfies `pattern`.
pub fn find_by_text<'a>(
    document: &'a Html,
    selector: &Selector,
    pattern: TextMatch,
) -> Option<ElementRef<'a>> {
    document
        .select(selector)
        .find(|el| pattern.matches(&clean_text_of(*el)))
}

/// Whether the element is, or contains, an `h3` whose text satisfies `pattern`.
pub fn is_heading_matching(el: ElementRef<'_>, pattern: TextMatch) -> bool {
    let is_heading = el
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|node| is_tag(node, "h3"));
    is_heading && pattern.matches(&clean_text_of(el))
}

/// Content of `<meta name="description">`, if present and non-empty.
pub fn meta_description(document: &Html) -> Option<String> {
    lazy_static::lazy_static! {
        static ref META: Selector = Selector::parse(r#"meta[name="description"]"#).unwrap();
    }
    document
        .select(&META)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(normalize_whitespace)
        .filter(|content| !content.is_empty())
}

/// Resolve an href against the site base. Root-relative and plain relative
/// paths become absolute; protocol-relative URLs take the base scheme.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        let selector = Selector::parse(css).unwrap();
        doc.select(&selector).next().unwrap()
    }

    #[test]
    fn text_without_removes_bold_subtrees() {
        let doc = Html::parse_fragment("<p><strong>Neil</strong>: Hello <i>there</i></p>");
        let p = first(&doc, "p");
        assert_eq!(text_without(p, &["strong", "b"]), ": Hello there");
    }

    #[test]
    fn inline_nodes_keep_order_and_breaks() {
        let doc = Html::parse_fragment("<p>a<br><b>X</b><!-- c --> z</p>");
        let p = first(&doc, "p");
        let nodes = inline_nodes(p);
        assert_eq!(nodes.len(), 4);
        assert!(matches!(nodes[0], Inline::Text("a")));
        assert!(matches!(nodes[1], Inline::Break));
        assert!(nodes[2].is_bold());
        assert!(matches!(nodes[3], Inline::Text(" z")));
    }

    #[test]
    fn next_element_skips_text() {
        let doc = Html::parse_fragment("<div><h3>A</h3>\n text \n<p>B</p></div>");
        let h3 = first(&doc, "h3");
        let next = next_element(h3).unwrap();
        assert!(is_tag(next, "p"));
        assert_eq!(clean_text_of(next), "B");
    }

    #[test]
    fn closest_includes_self() {
        let doc = Html::parse_fragment("<p><span><b>T</b></span></p>");
        let b = first(&doc, "b");
        assert!(is_tag(closest(b, "p").unwrap(), "p"));
        let p = first(&doc, "p");
        assert_eq!(closest(p, "p").unwrap().id(), p.id());
    }

    #[test]
    fn resolves_relative_urls() {
        let base = Url::parse("https://www.bbc.co.uk").unwrap();
        assert_eq!(
            resolve_url(&base, "/learningenglish/ep-1").as_deref(),
            Some("https://www.bbc.co.uk/learningenglish/ep-1")
        );
        assert_eq!(
            resolve_url(&base, "//www.riddle.com/embed/a").as_deref(),
            Some("https://www.riddle.com/embed/a")
        );
        assert_eq!(
            resolve_url(&base, "https://example.com/x").as_deref(),
            Some("https://example.com/x")
        );
        assert_eq!(resolve_url(&base, "  "), None);
    }

    #[test]
    fn text_match_modes() {
        assert!(TextMatch::Exact("Transcript").matches("Transcript"));
        assert!(!TextMatch::Exact("Transcript").matches("Transcripts"));
        assert!(TextMatch::Contains("Vocabulary").matches("Key Vocabulary"));
        assert!(TextMatch::StartsWith("Next").matches("Next episode"));
    }
}
