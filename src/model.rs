//! Episode, transcript, vocabulary and quiz records.
//!
//! Field names serialise in camelCase so stored documents match what the
//! mobile client reads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::index::IndexSelectors;

/// One entry of a programme's listing page. Lives only for one orchestration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub title: String,
    /// Always absolute.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Everything extracted from one episode page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeDetail {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Raw date text as shown on the page, e.g. `18 Dec 2025`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// `date` parsed, when it has the usual `%d %b %Y` shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_on: Option<NaiveDate>,
    pub url: String,
    #[serde(default, alias = "mp3Url", skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub script: Vec<ScriptLine>,
    #[serde(default)]
    pub vocabulary: Vec<VocabularyItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_content: Option<Vec<QuizQuestion>>,
}

impl EpisodeDetail {
    /// Storage key: `{program_id}-{slug}`. Stable across re-scrapes of the same page.
    pub fn storage_id(&self, program_id: &str) -> String {
        format!("{}-{}", program_id, slug_from_url(&self.url))
    }
}

/// Trailing path segment of a URL; falls back to the current timestamp when empty.
pub fn slug_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.trim_end_matches('/').rsplit('/').next() {
        Some(slug) if !slug.is_empty() => slug.to_string(),
        _ => Utc::now().timestamp_millis().to_string(),
    }
}

/// `"Episode 251218 / 18 Dec 2025"` → `"18 Dec 2025"`. Text without a `/` is kept whole.
pub fn split_date(raw: &str) -> Option<String> {
    let date = match raw.split('/').nth(1) {
        Some(date) => date.trim(),
        None => raw.trim(),
    };
    (!date.is_empty()).then(|| date.to_string())
}

/// Parse the human date used on episode pages, e.g. `18 Dec 2025`. Older dumps
/// carry RFC 3339 timestamps instead.
pub fn parse_episode_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    ["%d %b %Y", "%d %B %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|timestamp| timestamp.date_naive())
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLine {
    pub speaker: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyItem {
    pub word: String,
    pub definition: String,
}

impl VocabularyItem {
    /// `None` unless both the word and its definition are non-empty.
    pub fn new(word: String, definition: String) -> Option<Self> {
        if word.is_empty() || definition.is_empty() {
            return None;
        }
        Some(Self { word, definition })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub label: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<QuizOption>,
    /// Index of the correct option, or -1 when none is flagged.
    pub answer_index: i32,
}

impl QuizQuestion {
    /// Builds a question whose answer is the last option flagged correct.
    /// Returns `None` for an empty question text or an empty option list.
    pub fn new(question: String, options: Vec<QuizOption>) -> Option<Self> {
        if question.is_empty() || options.is_empty() {
            return None;
        }
        let answer_index = options
            .iter()
            .rposition(|option| option.is_correct)
            .map_or(-1, |index| index as i32);
        Some(Self {
            question,
            options,
            answer_index,
        })
    }
}

/// Which page layout family a programme's episodes use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractorFamily {
    SixMinuteEnglish,
    TheEnglishWeSpeak,
    RealEasyEnglish,
}

/// Static description of one programme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub id: String,
    pub title: String,
    /// Index page path, relative to the source base URL.
    pub url_path: String,
    pub family: ExtractorFamily,
    /// Overrides the default listing selectors.
    #[serde(default)]
    pub index: Option<IndexSelectors>,
}

impl ProgramConfig {
    pub fn new(id: &str, title: &str, url_path: &str, family: ExtractorFamily) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            url_path: url_path.to_string(),
            family,
            index: None,
        }
    }

    pub fn index_selectors(&self) -> IndexSelectors {
        self.index.clone().unwrap_or_default()
    }
}
