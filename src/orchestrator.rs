//! Change detection and the per-programme scraping pass.
//!
//! Programmes and their episodes are processed strictly in sequence. Listing
//! pages are assumed newest first: on a normal run, reaching an episode that is
//! already the newest stored one ends that programme's pass.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::detail::{EpisodeSource, ProgramScraper, ScrapeError};
use crate::fetcher::Fetcher;
use crate::model::ProgramConfig;
use crate::storage::{Storage, StorageError};

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("cannot scrape program {program}: {source}")]
    Setup {
        program: String,
        #[source]
        source: ScrapeError,
    },
}

/// Operator knobs for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Re-scrape even when the newest episode is already stored.
    pub force: bool,
    /// How many of the newest listed episodes to consider.
    pub max_episodes: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            force: false,
            max_episodes: 1,
        }
    }
}

impl RunOptions {
    /// Only a plain run compares against the stored newest episode.
    fn checks_latest(&self) -> bool {
        !self.force && self.max_episodes == 1
    }
}

/// What happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Storage ids written, in processing order.
    pub saved: Vec<String>,
    /// Programmes whose newest episode was already stored.
    pub up_to_date: Vec<String>,
    /// Programmes whose index could not be fetched.
    pub failed_programs: Vec<String>,
    /// Episodes whose page could not be scraped.
    pub failed_episodes: Vec<String>,
}

/// Drives every configured programme through index, change check, detail and save.
pub struct Orchestrator<'a> {
    config: &'a Config,
    storage: &'a Storage,
    fetcher: Arc<dyn Fetcher>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config, storage: &'a Storage, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            storage,
            fetcher,
        }
    }

    /// The scraper for one configured programme.
    pub fn scraper(&self, program: &ProgramConfig) -> Result<ProgramScraper, OrchestratorError> {
        ProgramScraper::new(
            program.clone(),
            &self.config.source.base_url,
            Arc::clone(&self.fetcher),
            self.config.quiz.clone(),
        )
        .map_err(|source| OrchestratorError::Setup {
            program: program.id.clone(),
            source,
        })
    }

    /// Run all programmes. A storage failure aborts the remaining programmes.
    #[instrument(level = "info", skip(self))]
    pub async fn run(&self, options: RunOptions) -> Result<RunReport, OrchestratorError> {
        let mut report = RunReport::default();
        for program in &self.config.programs {
            let scraper = self.scraper(program)?;
            self.run_program(program, &scraper, options, &mut report)
                .await?;
        }
        info!(
            saved = report.saved.len(),
            failed_episodes = report.failed_episodes.len(),
            failed_programs = report.failed_programs.len(),
            "Run finished"
        );
        Ok(report)
    }

    /// One programme's pass against any episode source.
    #[instrument(level = "info", skip_all, fields(program = %program.id))]
    pub async fn run_program(
        &self,
        program: &ProgramConfig,
        source: &dyn EpisodeSource,
        options: RunOptions,
        report: &mut RunReport,
    ) -> Result<(), OrchestratorError> {
        info!(title = %program.title, "Processing program");
        self.storage
            .save_program(program, &self.config.source.base_url)?;

        let episodes = match source.scrape_index().await {
            Ok(episodes) => episodes,
            Err(e) => {
                error!(error = %e, "Index scrape failed, skipping program");
                report.failed_programs.push(program.id.clone());
                return Ok(());
            }
        };
        if episodes.is_empty() {
            info!("No episodes found");
            return Ok(());
        }

        let latest_url = if options.checks_latest() {
            self.storage
                .last_episode(&program.id)?
                .map(|stored| stored.detail.url)
        } else {
            None
        };

        let candidates: Vec<_> = episodes.into_iter().take(options.max_episodes).collect();
        info!(count = candidates.len(), "Processing episodes");

        for summary in candidates {
            info!(title = %summary.title, url = %summary.url, "Checking episode");
            if latest_url.as_deref() == Some(summary.url.as_str()) {
                info!("Latest episode already stored");
                report.up_to_date.push(program.id.clone());
                break;
            }

            match source.scrape_episode(&summary.url).await {
                Ok(detail) => {
                    let id = self.storage.save_episode(&program.id, &detail)?;
                    report.saved.push(id);
                }
                Err(e) => {
                    error!(url = %summary.url, error = %e, "Episode scrape failed");
                    report.failed_episodes.push(summary.url);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::StaticFetcher;
    use crate::model::ExtractorFamily;
    use tempfile::TempDir;

    const INDEX: &str = "https://www.bbc.co.uk/learningenglish/english/features/the-english-we-speak";
    const EP1: &str = "https://www.bbc.co.uk/learningenglish/english/features/the-english-we-speak/ep-251215";
    const EP2: &str = "https://www.bbc.co.uk/learningenglish/english/features/the-english-we-speak/ep-251208";

    fn listing() -> String {
        format!(
            r#"<div class="widget-bbcle-coursecontentlist-featured"><a href="{}"><h2>Bite the bullet</h2></a></div>
            <ul class="widget-progress-enabled"><li><a href="{}"><h2>Spill the beans</h2></a></li></ul>"#,
            "/learningenglish/english/features/the-english-we-speak/ep-251215",
            "/learningenglish/english/features/the-english-we-speak/ep-251208",
        )
    }

    fn episode_page(title: &str) -> String {
        format!(
            r#"<div class="widget widget-heading"><h3>The English We Speak</h3><h3>{}</h3></div>
            <div class="widget widget-bbcle-featuresubheader"><h3>Episode 251215 / 15 Dec 2025</h3></div>
            <p>Transcript</p><p><strong>Feifei</strong> Hello.</p><h3>Next</h3>"#,
            title
        )
    }

    fn config() -> Config {
        Config {
            programs: vec![ProgramConfig::new(
                "the-english-we-speak",
                "The English We Speak",
                "/learningenglish/english/features/the-english-we-speak",
                ExtractorFamily::TheEnglishWeSpeak,
            )],
            ..Config::default()
        }
    }

    fn fetcher() -> Arc<dyn Fetcher> {
        Arc::new(
            StaticFetcher::new()
                .with_page(INDEX, &listing())
                .with_page(EP1, &episode_page("Bite the bullet"))
                .with_page(EP2, &episode_page("Spill the beans")),
        )
    }

    fn open() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("db")).unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn unchanged_newest_episode_writes_nothing() {
        let (_dir, storage) = open();
        let config = config();
        let orchestrator = Orchestrator::new(&config, &storage, fetcher());

        let first = orchestrator.run(RunOptions::default()).await.unwrap();
        assert_eq!(first.saved, ["the-english-we-speak-ep-251215"]);
        let stamp = storage
            .get_episode("the-english-we-speak-ep-251215")
            .unwrap()
            .unwrap()
            .updated_at;

        let second = orchestrator.run(RunOptions::default()).await.unwrap();
        assert!(second.saved.is_empty());
        assert_eq!(second.up_to_date, ["the-english-we-speak"]);
        let unchanged = storage
            .get_episode("the-english-we-speak-ep-251215")
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.updated_at, stamp);
    }

    #[tokio::test]
    async fn force_rescrapes_the_newest_episode() {
        let (_dir, storage) = open();
        let config = config();
        let orchestrator = Orchestrator::new(&config, &storage, fetcher());
        orchestrator.run(RunOptions::default()).await.unwrap();

        let forced = orchestrator
            .run(RunOptions {
                force: true,
                max_episodes: 1,
            })
            .await
            .unwrap();
        assert_eq!(forced.saved.len(), 1);
        assert_eq!(storage.count_episodes(), 1);
    }

    #[tokio::test]
    async fn several_episodes_skip_the_latest_check() {
        let (_dir, storage) = open();
        let config = config();
        let orchestrator = Orchestrator::new(&config, &storage, fetcher());
        orchestrator.run(RunOptions::default()).await.unwrap();

        let report = orchestrator
            .run(RunOptions {
                force: false,
                max_episodes: 5,
            })
            .await
            .unwrap();
        assert_eq!(report.saved.len(), 2);
        assert!(report.up_to_date.is_empty());
        assert_eq!(storage.count_episodes(), 2);
    }

    #[tokio::test]
    async fn failed_episode_does_not_stop_the_run() {
        let (_dir, storage) = open();
        let config = config();
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            StaticFetcher::new()
                .with_page(INDEX, &listing())
                .with_page(EP2, &episode_page("Spill the beans")),
        );
        let orchestrator = Orchestrator::new(&config, &storage, fetcher);

        let report = orchestrator
            .run(RunOptions {
                force: false,
                max_episodes: 2,
            })
            .await
            .unwrap();
        assert_eq!(report.failed_episodes, [EP1]);
        assert_eq!(report.saved, ["the-english-we-speak-ep-251208"]);
    }

    #[tokio::test]
    async fn missing_index_skips_program_but_saves_metadata() {
        let (_dir, storage) = open();
        let config = config();
        let orchestrator = Orchestrator::new(&config, &storage, Arc::new(StaticFetcher::new()));

        let report = orchestrator.run(RunOptions::default()).await.unwrap();
        assert_eq!(report.failed_programs, ["the-english-we-speak"]);
        assert!(storage.get_program("the-english-we-speak").unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_index_is_not_an_error() {
        let (_dir, storage) = open();
        let config = config();
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(StaticFetcher::new().with_page(INDEX, "<p>Nothing yet</p>"));
        let orchestrator = Orchestrator::new(&config, &storage, fetcher);

        let report = orchestrator.run(RunOptions::default()).await.unwrap();
        assert_eq!(report, RunReport::default());
    }
}
