//! Episode page extraction, one layout profile per programme family.

use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::QuizConfig;
use crate::dom::{
    clean_text_of, find_by_text, is_tag, meta_description, next_element, resolve_url, text_of,
    TextMatch,
};
use crate::fetcher::{parse, FetchError, Fetcher};
use crate::index::{extract_index, ExtractError};
use crate::model::{
    parse_episode_date, split_date, EpisodeDetail, EpisodeSummary, ExtractorFamily, ProgramConfig,
};
use crate::quiz::scrape_quiz;
use crate::text::normalize_whitespace;
use crate::transcript::{segment, SectionEnd, SpeakerRule, TranscriptAnchor, TranscriptLayout};
use crate::vocabulary::extract_vocabulary;

lazy_static! {
    static ref TITLE: Selector = Selector::parse(".widget.widget-heading h3").unwrap();
    static ref SUBHEADER: Selector =
        Selector::parse(".widget.widget-bbcle-featuresubheader h3").unwrap();
    static ref HEADING: Selector = Selector::parse("h3").unwrap();
    static ref ANCHOR: Selector = Selector::parse("a[href]").unwrap();
    static ref AUDIO: Selector = Selector::parse(r#"a[href$=".mp3"]"#).unwrap();
}

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("invalid URL {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// What a programme source can do: list its episodes and read one of them.
#[async_trait]
pub trait EpisodeSource: Send + Sync {
    /// Summaries in listing order, newest first.
    async fn scrape_index(&self) -> Result<Vec<EpisodeSummary>, ScrapeError>;

    async fn scrape_episode(&self, url: &str) -> Result<EpisodeDetail, ScrapeError>;
}

/// Layout differences between programme families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyProfile {
    /// Also drop title headings that merely contain the programme name.
    pub title_excludes_containing: bool,
    /// Prefer the first paragraph of the "Introduction" section over the meta description.
    pub description_from_introduction: bool,
    pub transcript: TranscriptLayout,
    /// Heading of the vocabulary section, if the family has one.
    pub vocabulary: Option<TextMatch>,
    pub discovers_quiz: bool,
}

impl FamilyProfile {
    pub fn for_family(family: ExtractorFamily) -> Self {
        match family {
            ExtractorFamily::SixMinuteEnglish => Self {
                title_excludes_containing: false,
                description_from_introduction: false,
                transcript: TranscriptLayout {
                    anchor: TranscriptAnchor::BoldLabel(TextMatch::Contains("TRANSCRIPT")),
                    end: SectionEnd::AnyHeading,
                    rule: SpeakerRule::BetweenBreaks,
                },
                vocabulary: Some(TextMatch::Contains("Vocabulary")),
                discovers_quiz: true,
            },
            ExtractorFamily::TheEnglishWeSpeak => Self {
                title_excludes_containing: false,
                description_from_introduction: false,
                transcript: TranscriptLayout {
                    anchor: TranscriptAnchor::Paragraph(TextMatch::Exact("Transcript")),
                    end: SectionEnd::Heading(TextMatch::StartsWith("Next")),
                    rule: SpeakerRule::FirstBold,
                },
                vocabulary: None,
                discovers_quiz: false,
            },
            ExtractorFamily::RealEasyEnglish => Self {
                title_excludes_containing: true,
                description_from_introduction: true,
                transcript: TranscriptLayout {
                    anchor: TranscriptAnchor::Heading(TextMatch::Exact("Transcript")),
                    end: SectionEnd::AnyHeading,
                    rule: SpeakerRule::LeadingOrBeforeBreak,
                },
                vocabulary: Some(TextMatch::Exact("Vocabulary")),
                discovers_quiz: false,
            },
        }
    }
}

/// Extract everything on an episode page that needs no further fetching.
/// `quiz_content` is left unset; the quiz lives behind `quiz_url`.
pub fn extract_detail(
    document: &Html,
    url: &str,
    program_title: &str,
    profile: &FamilyProfile,
    base_url: &Url,
) -> EpisodeDetail {
    let date = extract_date(document);
    let description = profile
        .description_from_introduction
        .then(|| introduction(document))
        .flatten()
        .or_else(|| meta_description(document));

    EpisodeDetail {
        title: extract_title(document, program_title, profile.title_excludes_containing),
        description,
        published_on: date.as_deref().and_then(parse_episode_date),
        date,
        url: url.to_string(),
        audio_url: document
            .select(&AUDIO)
            .find_map(|a| a.value().attr("href"))
            .and_then(|href| resolve_url(base_url, href)),
        script: segment(document, &profile.transcript),
        vocabulary: profile
            .vocabulary
            .map(|heading| extract_vocabulary(document, heading))
            .unwrap_or_default(),
        quiz_url: if profile.discovers_quiz {
            quiz_link(document).and_then(|href| resolve_url(base_url, &href))
        } else {
            None
        },
        quiz_content: None,
    }
}

/// The first heading that is not the programme's own name, else the last heading.
fn extract_title(document: &Html, program_title: &str, excludes_containing: bool) -> String {
    let headings: Vec<String> = document
        .select(&TITLE)
        .map(clean_text_of)
        .filter(|heading| !heading.is_empty())
        .collect();

    let is_program_name = |heading: &str| {
        heading == program_title || (excludes_containing && heading.contains(program_title))
    };

    headings
        .iter()
        .find(|heading| !is_program_name(heading))
        .or_else(|| headings.last())
        .cloned()
        .unwrap_or_default()
}

fn extract_date(document: &Html) -> Option<String> {
    let raw: String = document.select(&SUBHEADER).map(text_of).collect();
    split_date(&normalize_whitespace(&raw))
}

/// First non-empty paragraph of the "Introduction" section.
fn introduction(document: &Html) -> Option<String> {
    let header = find_by_text(document, &HEADING, TextMatch::Exact("Introduction"))?;
    let mut cursor = next_element(header);
    while let Some(el) = cursor {
        if is_tag(el, "h3") {
            break;
        }
        if is_tag(el, "p") {
            let text = clean_text_of(el);
            if !text.is_empty() {
                return Some(text);
            }
        }
        cursor = next_element(el);
    }
    None
}

/// A link inside a "Try our ..." heading, else any link mentioning "interactive quiz".
fn quiz_link(document: &Html) -> Option<String> {
    let in_heading = document
        .select(&HEADING)
        .filter(|h3| text_of(*h3).contains("Try our"))
        .find_map(|h3| h3.select(&ANCHOR).next())
        .and_then(|a| a.value().attr("href"));

    in_heading
        .or_else(|| {
            document
                .select(&ANCHOR)
                .find(|a| text_of(*a).contains("interactive quiz"))
                .and_then(|a| a.value().attr("href"))
        })
        .map(str::to_string)
}

/// Scrapes one configured programme through a [`Fetcher`].
pub struct ProgramScraper {
    program: ProgramConfig,
    profile: FamilyProfile,
    base_url: Url,
    fetcher: Arc<dyn Fetcher>,
    quiz: QuizConfig,
}

impl ProgramScraper {
    pub fn new(
        program: ProgramConfig,
        base_url: &str,
        fetcher: Arc<dyn Fetcher>,
        quiz: QuizConfig,
    ) -> Result<Self, ScrapeError> {
        let base_url = Url::parse(base_url).map_err(|source| ScrapeError::Url {
            url: base_url.to_string(),
            source,
        })?;
        Ok(Self {
            profile: FamilyProfile::for_family(program.family),
            program,
            base_url,
            fetcher,
            quiz,
        })
    }

    pub fn program(&self) -> &ProgramConfig {
        &self.program
    }

    pub fn index_url(&self) -> Result<String, ScrapeError> {
        self.base_url
            .join(&self.program.url_path)
            .map(String::from)
            .map_err(|source| ScrapeError::Url {
                url: self.program.url_path.clone(),
                source,
            })
    }

    /// Parse a listing page already in hand.
    pub fn index_from_html(&self, html: &str) -> Result<Vec<EpisodeSummary>, ExtractError> {
        let document = parse(html);
        extract_index(&document, &self.program.index_selectors(), &self.base_url)
    }

    /// Parse an episode page already in hand, without following the quiz link.
    pub fn detail_from_html(&self, html: &str, url: &str) -> EpisodeDetail {
        let document = parse(html);
        extract_detail(&document, url, &self.program.title, &self.profile, &self.base_url)
    }
}

#[async_trait]
impl EpisodeSource for ProgramScraper {
    #[instrument(level = "info", skip(self), fields(program = %self.program.id))]
    async fn scrape_index(&self) -> Result<Vec<EpisodeSummary>, ScrapeError> {
        let url = self.index_url()?;
        info!(%url, "Scraping index");
        let html = self.fetcher.fetch(&url).await?;
        let episodes = self.index_from_html(&html)?;
        debug!(count = episodes.len(), "Indexed episodes");
        Ok(episodes)
    }

    #[instrument(level = "info", skip(self), fields(program = %self.program.id))]
    async fn scrape_episode(&self, url: &str) -> Result<EpisodeDetail, ScrapeError> {
        let html = self.fetcher.fetch(url).await?;
        let mut detail = self.detail_from_html(&html, url);

        if let Some(quiz_url) = detail.quiz_url.clone() {
            info!(%quiz_url, "Fetching quiz content");
            detail.quiz_content = Some(scrape_quiz(self.fetcher.as_ref(), &quiz_url, &self.quiz).await);
        }
        Ok(detail)
    }
}
