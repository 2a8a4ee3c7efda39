//! Quiz recovery from the embedded third-party quiz widget.
//!
//! The quiz page embeds an iframe. The iframe document assigns the widget's view
//! state to a global as a JavaScript object literal (unquoted keys, trailing
//! commas), which is read with a JSON5 parser rather than evaluated.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::Selector;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::config::QuizConfig;
use crate::fetcher::{parse, FetchError, Fetcher};
use crate::model::{QuizOption, QuizQuestion};
use crate::text::strip_html;

lazy_static! {
    static ref IFRAME: Selector = Selector::parse("iframe[src]").unwrap();
}

const QUESTION_TEMPLATE: &str = "quiz-question";

#[derive(Error, Debug)]
pub enum QuizError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("malformed view-state payload: {0}")]
    Payload(#[from] json5::Error),
    #[error("invalid view-state variable pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Fetch the quiz behind `quiz_url`. Never fails: a missing widget, a missing
/// payload, a fetch error or a malformed payload all give an empty list.
#[instrument(level = "info", skip(fetcher, settings))]
pub async fn scrape_quiz(
    fetcher: &dyn Fetcher,
    quiz_url: &str,
    settings: &QuizConfig,
) -> Vec<QuizQuestion> {
    match try_scrape_quiz(fetcher, quiz_url, settings).await {
        Ok(questions) => {
            debug!(count = questions.len(), "Parsed quiz questions");
            questions
        }
        Err(QuizError::Fetch(e)) => {
            error!(error = %e, "Quiz fetch failed");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, "Quiz payload unreadable");
            Vec::new()
        }
    }
}

async fn try_scrape_quiz(
    fetcher: &dyn Fetcher,
    quiz_url: &str,
    settings: &QuizConfig,
) -> Result<Vec<QuizQuestion>, QuizError> {
    let page = fetcher.fetch(quiz_url).await?;
    let Some(frame_url) = find_frame_url(&page, quiz_url, &settings.host) else {
        warn!(host = %settings.host, "Quiz iframe not found");
        return Ok(Vec::new());
    };

    let frame = fetcher.fetch(&frame_url).await?;
    let Some(literal) = extract_view_state(&frame, &settings.view_variable)? else {
        warn!(%frame_url, "Quiz view-state not found");
        return Ok(Vec::new());
    };

    parse_view_state(&literal)
}

/// Absolute URL of the first iframe pointing at `host`.
fn find_frame_url(page: &str, page_url: &str, host: &str) -> Option<String> {
    let document = parse(page);
    let src = document
        .select(&IFRAME)
        .filter_map(|frame| frame.value().attr("src"))
        .find(|src| src.contains(host))?
        .trim();

    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    Url::parse(page_url)
        .and_then(|base| base.join(src))
        .map(String::from)
        .ok()
}

/// The object literal assigned to `variable` right before a closing `</script>`.
pub fn extract_view_state(markup: &str, variable: &str) -> Result<Option<String>, regex::Error> {
    let pattern = format!(
        r"{}\s*=\s*(\{{[\s\S]*?\}})\s*;?\s*</script>",
        regex::escape(variable)
    );
    let re = Regex::new(&pattern)?;
    Ok(re
        .captures(markup)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string()))
}

/// Read a view-state literal and flatten its question pages.
pub fn parse_view_state(literal: &str) -> Result<Vec<QuizQuestion>, QuizError> {
    let view: Value = json5::from_str(literal)?;
    Ok(questions_from_view(&view))
}

/// Walk `data.data.pageGroups[].pages[]`, keeping quiz-question pages that have options.
pub fn questions_from_view(view: &Value) -> Vec<QuizQuestion> {
    let Some(groups) = view.pointer("/data/data/pageGroups").and_then(Value::as_array) else {
        return Vec::new();
    };

    groups
        .iter()
        .filter_map(|group| group.get("pages").and_then(Value::as_array))
        .flatten()
        .filter(|page| page.get("templateId").and_then(Value::as_str) == Some(QUESTION_TEMPLATE))
        .filter_map(|page| {
            let options = page
                .get("allAnswers")
                .and_then(Value::as_array)
                .map(|answers| answers.iter().map(option_from_answer).collect())
                .unwrap_or_default();
            QuizQuestion::new(html_field(page, "title"), options)
        })
        .collect()
}

/// Only a literal boolean `true` marks an answer correct.
fn option_from_answer(answer: &Value) -> QuizOption {
    QuizOption {
        label: html_field(answer, "label"),
        is_correct: answer.get("isMultiCorrect") == Some(&Value::Bool(true)),
    }
}

fn html_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(strip_html)
        .unwrap_or_default()
}
