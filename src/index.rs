//! Listing-page extraction.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::dom::{resolve_url, text_of};
use crate::model::EpisodeSummary;
use crate::text::normalize_whitespace;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },
}

/// CSS selectors describing one listing layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSelectors {
    /// One match per episode entry.
    pub list: String,
    /// Anchor inside an entry; its `href` is the episode URL.
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for IndexSelectors {
    /// The featured entry first, then the reverse-chronological list.
    fn default() -> Self {
        Self {
            list: ".widget-bbcle-coursecontentlist-featured, .widget-progress-enabled li".into(),
            url: "a".into(),
            title: "h2".into(),
            date: Some(".details h3".into()),
            description: Some("p".into()),
        }
    }
}

struct CompiledSelectors {
    list: Selector,
    url: Selector,
    title: Selector,
    date: Option<Selector>,
    description: Option<Selector>,
}

fn compile(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|err| ExtractError::Selector {
        selector: css.to_string(),
        reason: err.to_string(),
    })
}

impl IndexSelectors {
    fn compile(&self) -> Result<CompiledSelectors, ExtractError> {
        Ok(CompiledSelectors {
            list: compile(&self.list)?,
            url: compile(&self.url)?,
            title: compile(&self.title)?,
            date: self.date.as_deref().map(compile).transpose()?,
            description: self.description.as_deref().map(compile).transpose()?,
        })
    }
}

/// Normalised text of every match of `selector` inside `scope`, concatenated.
fn scoped_text(scope: ElementRef<'_>, selector: &Selector) -> String {
    let joined: String = scope.select(selector).map(text_of).collect();
    normalize_whitespace(&joined)
}

/// Extract episode summaries in document order, which the site keeps newest first.
///
/// Entries without an `href` are skipped. No de-duplication happens here, so
/// the featured episode may also appear again in the list.
pub fn extract_index(
    document: &Html,
    selectors: &IndexSelectors,
    base_url: &Url,
) -> Result<Vec<EpisodeSummary>, ExtractError> {
    let compiled = selectors.compile()?;

    let episodes = document
        .select(&compiled.list)
        .filter_map(|entry| {
            let href = entry
                .select(&compiled.url)
                .next()
                .and_then(|anchor| anchor.value().attr("href"))?;
            let url = resolve_url(base_url, href)?;

            Some(EpisodeSummary {
                title: scoped_text(entry, &compiled.title),
                url,
                date: compiled.date.as_ref().map(|s| scoped_text(entry, s)),
                description: compiled.description.as_ref().map(|s| scoped_text(entry, s)),
            })
        })
        .collect();

    Ok(episodes)
}
