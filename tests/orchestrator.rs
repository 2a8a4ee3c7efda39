use std::sync::Arc;

use bbcast::model::{ExtractorFamily, ProgramConfig};
use bbcast::trigger::{run_manual, TriggerRequest};
use bbcast::{Config, Fetcher, Orchestrator, RunOptions, StaticFetcher, Storage};
use tempfile::TempDir;

const SIX_INDEX: &str = "https://www.bbc.co.uk/learningenglish/english/features/6-minute-english";
const SIX_EP: &str =
    "https://www.bbc.co.uk/learningenglish/english/features/6-minute-english_2025/ep-251218";
const QUIZ: &str = "https://www.bbc.co.uk/learningenglish/english/quizzes/ep-251218";
const WIDGET: &str = "https://www.riddle.com/embed/a/251218";
const REE_INDEX: &str = "https://www.bbc.co.uk/learningenglish/english/features/real-easy-english";
const REE_EP: &str =
    "https://www.bbc.co.uk/learningenglish/english/features/real-easy-english/ep-260102";

const SIX_LISTING: &str = r#"
    <div class="widget-bbcle-coursecontentlist-featured">
      <a href="/learningenglish/english/features/6-minute-english_2025/ep-251218"><h2>Are you a night owl?</h2></a>
      <div class="details"><h3>Episode 251218 / 18 Dec 2025</h3></div>
    </div>
    <ul class="widget-progress-enabled">
      <li><a><h2>Broken entry</h2></a></li>
    </ul>
"#;

const SIX_PAGE: &str = r#"
    <html><head><meta name="description" content="Do you work best at night?"></head><body>
    <div class="widget widget-heading"><h3>6 Minute English</h3></div>
    <div class="widget widget-heading"><h3>Are you a night owl?</h3></div>
    <div class="widget widget-bbcle-featuresubheader"><h3>Episode 251218 / 18 Dec 2025</h3></div>
    <div class="widget widget-richtext">
      <a href="https://downloads.bbc.co.uk/learningenglish/ep-251218.mp3">Download</a>
      <h3>Try our <a href="/learningenglish/english/quizzes/ep-251218">quiz</a></h3>
      <h3>Vocabulary</h3>
      <p><strong>night owl</strong><br>someone who stays up late</p>
      <h3>TRANSCRIPT</h3>
      <p><strong>TRANSCRIPT</strong></p>
      <p><strong>Neil</strong><br>Hello.<br><strong>Beth</strong><br>Hi Neil.</p>
    </div>
    </body></html>
"#;

const QUIZ_PAGE: &str = r#"<iframe src="//www.riddle.com/embed/a/251218"></iframe>"#;

const WIDGET_PAGE: &str = r#"<html><script>
    window.riddle_view = {
        data: { data: { pageGroups: [ { pages: [
            { templateId: "quiz-question", title: "<p>A night owl...</p>",
              allAnswers: [ { label: "sleeps early", isMultiCorrect: false },
                            { label: "stays up late", isMultiCorrect: true }, ] },
        ] } ] } },
    };
</script></html>"#;

const REE_LISTING: &str = r#"
    <ul class="widget-progress-enabled">
      <li><a href="/learningenglish/english/features/real-easy-english/ep-260102"><h2>Food</h2></a></li>
    </ul>
"#;

const REE_PAGE: &str = r#"
    <div class="widget widget-heading"><h3>Real Easy English</h3><h3>Talking about food</h3></div>
    <div class="widget widget-bbcle-featuresubheader"><h3>Episode 260102 / 2 Jan 2026</h3></div>
    <h3>Introduction</h3>
    <p>Phil and Georgie talk about food.</p>
    <h3>Transcript</h3>
    <p><strong>Phil</strong><br>I love spicy food.</p>
"#;

fn config() -> Config {
    Config {
        programs: vec![
            ProgramConfig::new(
                "6-minute-english",
                "6 Minute English",
                "/learningenglish/english/features/6-minute-english",
                ExtractorFamily::SixMinuteEnglish,
            ),
            ProgramConfig::new(
                "real-easy-english",
                "Real Easy English",
                "/learningenglish/english/features/real-easy-english",
                ExtractorFamily::RealEasyEnglish,
            ),
        ],
        ..Config::default()
    }
}

fn site() -> Arc<dyn Fetcher> {
    Arc::new(
        StaticFetcher::new()
            .with_page(SIX_INDEX, SIX_LISTING)
            .with_page(SIX_EP, SIX_PAGE)
            .with_page(QUIZ, QUIZ_PAGE)
            .with_page(WIDGET, WIDGET_PAGE)
            .with_page(REE_INDEX, REE_LISTING)
            .with_page(REE_EP, REE_PAGE),
    )
}

#[tokio::test]
async fn scrapes_every_program_then_detects_no_change() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(dir.path().join("db")).unwrap();
    let config = config();
    let orchestrator = Orchestrator::new(&config, &storage, site());

    let report = orchestrator.run(RunOptions::default()).await.unwrap();
    assert_eq!(
        report.saved,
        ["6-minute-english-ep-251218", "real-easy-english-ep-260102"]
    );

    let six = storage.last_episode("6-minute-english").unwrap().unwrap();
    assert_eq!(six.detail.title, "Are you a night owl?");
    assert_eq!(six.detail.date.as_deref(), Some("18 Dec 2025"));
    assert_eq!(six.detail.vocabulary[0].definition, "someone who stays up late");
    let speakers: Vec<&str> = six
        .detail
        .script
        .iter()
        .map(|line| line.speaker.as_str())
        .collect();
    assert_eq!(speakers, ["Neil", "Beth"]);
    let quiz = six.detail.quiz_content.as_ref().unwrap();
    assert_eq!(quiz.len(), 1);
    assert_eq!(quiz[0].question, "A night owl...");
    assert_eq!(quiz[0].answer_index, 1);

    let easy = storage.last_episode("real-easy-english").unwrap().unwrap();
    assert_eq!(easy.detail.title, "Talking about food");
    assert_eq!(
        easy.detail.description.as_deref(),
        Some("Phil and Georgie talk about food.")
    );
    assert_eq!(easy.detail.script[0].text, "I love spicy food.");

    let again = orchestrator.run(RunOptions::default()).await.unwrap();
    assert!(again.saved.is_empty());
    assert_eq!(again.up_to_date, ["6-minute-english", "real-easy-english"]);
    assert_eq!(storage.count_episodes(), 2);
}

#[tokio::test]
async fn manual_trigger_forces_a_rescrape() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(dir.path().join("db")).unwrap();
    let config = config();
    let orchestrator = Orchestrator::new(&config, &storage, site());
    orchestrator.run(RunOptions::default()).await.unwrap();

    let response = run_manual(&orchestrator, TriggerRequest::from_query("force=true")).await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.body,
        "Scraping completed successfully. (Force: true, MaxEpisodes: 1)"
    );
    assert_eq!(storage.count_episodes(), 2);
    storage.close().unwrap();
}
