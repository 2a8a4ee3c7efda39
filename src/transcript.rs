//! Speaker segmentation of transcript sections.
//!
//! Transcripts are plain paragraphs after a marker heading. Speaker names are
//! bold inline elements, but which bold elements count as names depends on the
//! page template, see [`SpeakerRule`]. Text with no name of its own continues
//! the most recent speaker; text before any speaker is dropped.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};

use crate::dom::{
    clean_text_of, closest, find_by_text, inline_nodes, is_heading_matching, is_tag,
    next_element, text_of, text_without, Inline, TextMatch,
};
use crate::model::ScriptLine;
use crate::text::{normalize_whitespace, strip_leading_colon};

lazy_static! {
    static ref PARAGRAPH: Selector = Selector::parse("p").unwrap();
    static ref HEADING: Selector = Selector::parse("h3").unwrap();
    static ref BOLD: Selector = Selector::parse("strong, b").unwrap();
}

const BOLD_TAGS: [&str; 2] = ["strong", "b"];

/// A paragraph right after the anchor containing this is an editorial note.
const NOTE_MARKER: &str = "Note:";

/// Where the transcript section begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptAnchor {
    /// A bold label with matching text; its enclosing paragraph is the anchor.
    BoldLabel(TextMatch),
    /// A paragraph with matching text, or failing that an `h3`.
    Paragraph(TextMatch),
    /// An `h3` with matching text.
    Heading(TextMatch),
}

/// Which element ends the transcript section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionEnd {
    /// Any `h3`.
    AnyHeading,
    /// An `h3`, or an element wrapping one, whose text matches.
    Heading(TextMatch),
}

/// Which bold inline elements are speaker labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerRule {
    /// A bold child is a label only when a line break follows it and a line break
    /// (or the start of the paragraph) precedes it. Blank text is ignored when
    /// looking at neighbours. A paragraph may hold several speakers.
    BetweenBreaks,
    /// The first bold element of a paragraph is always the label; the rest of the
    /// paragraph, with bold text removed, is the line.
    FirstBold,
    /// A bold child is a label when it is the first child of the paragraph or a
    /// line break directly follows it. A paragraph may hold several speakers.
    LeadingOrBeforeBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptLayout {
    pub anchor: TranscriptAnchor,
    pub end: SectionEnd,
    pub rule: SpeakerRule,
}

/// Segment the transcript into speaker lines. A page without the anchor yields
/// no lines.
pub fn segment(document: &Html, layout: &TranscriptLayout) -> Vec<ScriptLine> {
    let Some(anchor) = find_anchor(document, layout.anchor) else {
        return Vec::new();
    };

    let mut cursor = next_element(anchor);
    if let Some(note) = cursor.filter(|el| text_of(*el).contains(NOTE_MARKER)) {
        cursor = next_element(note);
    }

    let mut segmenter = Segmenter::new(layout.rule);
    while let Some(el) = cursor {
        if ends_section(el, layout.end) {
            break;
        }
        if is_tag(el, "p") {
            segmenter.paragraph(el);
        }
        cursor = next_element(el);
    }
    segmenter.lines
}

fn find_anchor(document: &Html, anchor: TranscriptAnchor) -> Option<ElementRef<'_>> {
    match anchor {
        TranscriptAnchor::BoldLabel(pattern) => {
            let label = find_by_text(document, &BOLD, pattern)?;
            closest(label, "p")
        }
        TranscriptAnchor::Paragraph(pattern) => find_by_text(document, &PARAGRAPH, pattern)
            .or_else(|| find_by_text(document, &HEADING, pattern)),
        TranscriptAnchor::Heading(pattern) => find_by_text(document, &HEADING, pattern),
    }
}

fn ends_section(el: ElementRef<'_>, end: SectionEnd) -> bool {
    match end {
        SectionEnd::AnyHeading => is_tag(el, "h3"),
        SectionEnd::Heading(pattern) => is_heading_matching(el, pattern),
    }
}

struct Segmenter {
    rule: SpeakerRule,
    speaker: Option<String>,
    lines: Vec<ScriptLine>,
}

impl Segmenter {
    fn new(rule: SpeakerRule) -> Self {
        Self {
            rule,
            speaker: None,
            lines: Vec::new(),
        }
    }

    fn paragraph(&mut self, p: ElementRef<'_>) {
        match self.rule {
            SpeakerRule::FirstBold => self.first_bold_paragraph(p),
            SpeakerRule::BetweenBreaks | SpeakerRule::LeadingOrBeforeBreak => {
                self.inline_paragraph(p)
            }
        }
    }

    fn first_bold_paragraph(&mut self, p: ElementRef<'_>) {
        let label = p
            .select(&BOLD)
            .next()
            .map(clean_text_of)
            .filter(|label| !label.is_empty());

        if let Some(label) = label {
            self.speaker = Some(label);
        }
        let rest = normalize_whitespace(&text_without(p, &BOLD_TAGS));
        self.push(&rest);
    }

    fn inline_paragraph(&mut self, p: ElementRef<'_>) {
        let nodes = inline_nodes(p);
        let mut buffer = String::new();
        let mut labelled = false;

        for (i, node) in nodes.iter().enumerate() {
            if let Some(label) = self.label_at(&nodes, i) {
                // Text ahead of a paragraph's first label belongs to nobody.
                if labelled {
                    self.push(&buffer);
                }
                buffer.clear();
                labelled = true;
                self.speaker = Some(label);
                continue;
            }
            match node {
                Inline::Text(text) => buffer.push_str(text),
                Inline::Element(el) => buffer.push_str(&text_of(*el)),
                Inline::Break => {}
            }
            buffer.push(' ');
        }
        self.push(&buffer);
    }

    /// The label text if the node at `i` is a speaker label under this rule.
    fn label_at(&self, nodes: &[Inline<'_>], i: usize) -> Option<String> {
        let Inline::Element(el) = nodes[i] else {
            return None;
        };
        if !nodes[i].is_bold() {
            return None;
        }

        let qualifies = match self.rule {
            SpeakerRule::BetweenBreaks => {
                let prev = nodes[..i].iter().rev().find(|n| !n.is_blank());
                let next = nodes[i + 1..].iter().find(|n| !n.is_blank());
                matches!(prev, None | Some(Inline::Break)) && matches!(next, Some(Inline::Break))
            }
            SpeakerRule::LeadingOrBeforeBreak => {
                i == 0 || matches!(nodes.get(i + 1), Some(Inline::Break))
            }
            SpeakerRule::FirstBold => false,
        };

        if !qualifies {
            return None;
        }
        let label = clean_text_of(el);
        (!label.is_empty()).then_some(label)
    }

    /// Attribute `text` to the current speaker, if there is one.
    fn push(&mut self, text: &str) {
        let Some(speaker) = &self.speaker else {
            return;
        };
        let mut text = normalize_whitespace(text);
        if self.rule != SpeakerRule::BetweenBreaks {
            text = strip_leading_colon(&text);
        }
        if text.is_empty() {
            return;
        }
        self.lines.push(ScriptLine {
            speaker: speaker.clone(),
            text,
        });
    }
}
