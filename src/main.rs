//! bbcast CLI - BBC Learning English episode scraper
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bbcast::trigger::{self, TriggerRequest};
use bbcast::{
    Config, EpisodeSource, Fetcher, HttpFetcher, Orchestrator, ProgramScraper, StaticFetcher,
    Storage,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "bbcast")]
#[command(author, version, about = "Scrape BBC Learning English episodes", long_about = None)]
struct Cli {
    /// Config file (default: ./bbcast.toml, then ~/.config/bbcast/bbcast.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every configured programme once
    Run {
        /// Re-scrape even if the newest episode is already stored
        #[arg(long)]
        force: bool,
        /// How many of the newest episodes to consider per programme
        #[arg(long, default_value_t = 1)]
        episodes: usize,
    },
    /// Run every day at the configured time
    Schedule,
    /// Import a JSON array of pre-scraped episodes
    Import {
        /// File written by `bbcast dump`
        path: PathBuf,
        /// Programme the episodes belong to
        #[arg(long)]
        program: String,
    },
    /// List stored episodes, newest first
    List {
        program: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Print the summaries on a programme's listing page
    Index { program: String },
    /// Print one extracted episode as JSON
    Episode {
        program: String,
        url: String,
        /// Read the page from a saved HTML file instead of fetching it
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Scrape the newest episodes of a programme into a JSON file
    Dump {
        program: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
        #[arg(long, default_value = "result.json")]
        out: PathBuf,
    },
    /// Generate shell completions
    Completions { shell: Shell },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run { force, episodes } => {
            let storage = Storage::open(&config.storage.path)?;
            let orchestrator = Orchestrator::new(&config, &storage, http_fetcher(&config)?);
            let request = TriggerRequest {
                force,
                max_episodes: episodes,
            };
            let response = trigger::run_manual(&orchestrator, request).await;
            storage.close()?;

            if !response.is_success() {
                anyhow::bail!(response.body);
            }
            println!("✅ {}", response.body.green());
        }
        Commands::Schedule => {
            let storage = Storage::open(&config.storage.path)?;
            let orchestrator = Orchestrator::new(&config, &storage, http_fetcher(&config)?);
            println!(
                "⏰ Running daily at {:02}:{:02} (UTC{:+})",
                config.schedule.hour, config.schedule.minute, config.schedule.utc_offset_hours
            );
            trigger::run_daily(&orchestrator, &config.schedule).await?;
        }
        Commands::Import { path, program } => {
            config.program(&program)?;
            let storage = Storage::open(&config.storage.path)?;
            let report = storage
                .import_file(&path, &program)
                .with_context(|| format!("importing {}", path.display()))?;
            storage.close()?;

            println!(
                "📥 Imported {} episodes in {} batches ({} skipped)",
                report.imported.to_string().green(),
                report.batches,
                report.skipped
            );
        }
        Commands::List {
            program,
            limit,
            offset,
        } => {
            let storage = Storage::open(&config.storage.path)?;
            let episodes = storage.episodes_for_program(&program, limit, offset)?;
            storage.close()?;

            if episodes.is_empty() {
                println!("No stored episodes for {}.", program);
            } else {
                println!("Stored episodes for {}:\n", program.bold());
                for stored in episodes {
                    let date = stored.detail.date.as_deref().unwrap_or("undated");
                    println!("🎧 {} ({})", stored.detail.title.bold(), date.dimmed());
                    println!("   {}", stored.detail.url);
                    println!(
                        "   {} lines, {} words, {} quiz questions\n",
                        stored.detail.script.len(),
                        stored.detail.vocabulary.len(),
                        stored.detail.quiz_content.as_ref().map_or(0, Vec::len)
                    );
                }
            }
        }
        Commands::Index { program } => {
            let scraper = program_scraper(&config, &program, http_fetcher(&config)?)?;
            let episodes = scraper.scrape_index().await?;

            println!("Found {} episodes:\n", episodes.len());
            for summary in episodes {
                println!("📄 {}", summary.title.bold());
                if let Some(date) = &summary.date {
                    println!("   {}", date.dimmed());
                }
                println!("   {}\n", summary.url);
            }
        }
        Commands::Episode { program, url, html } => {
            let fetcher: Arc<dyn Fetcher> = match html {
                Some(path) => {
                    let page = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    Arc::new(StaticFetcher::new().with_page(&url, &page))
                }
                None => http_fetcher(&config)?,
            };
            let scraper = program_scraper(&config, &program, fetcher)?;
            let detail = scraper.scrape_episode(&url).await?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }
        Commands::Dump {
            program,
            limit,
            out,
        } => {
            let scraper = program_scraper(&config, &program, http_fetcher(&config)?)?;
            let episodes = scraper.scrape_index().await?;

            let mut records = Vec::new();
            for summary in episodes.into_iter().take(limit) {
                println!("Scraping {}", summary.url);
                match scraper.scrape_episode(&summary.url).await {
                    Ok(detail) => records.push(serde_json::to_value(&detail)?),
                    Err(e) => {
                        eprintln!("{} {}: {}", "Failed".red(), summary.url, e);
                        records.push(json!({ "error": e.to_string(), "summary": summary }));
                    }
                }
            }

            std::fs::write(&out, serde_json::to_string_pretty(&records)?)
                .with_context(|| format!("writing {}", out.display()))?;
            println!("💾 Wrote {} records to {}", records.len(), out.display());
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "bbcast", &mut io::stdout());
        }
    }

    Ok(())
}

fn http_fetcher(config: &Config) -> anyhow::Result<Arc<dyn Fetcher>> {
    let fetcher = HttpFetcher::with_settings(config.http.timeout(), &config.http.user_agent)?;
    Ok(Arc::new(fetcher))
}

fn program_scraper(
    config: &Config,
    program: &str,
    fetcher: Arc<dyn Fetcher>,
) -> anyhow::Result<ProgramScraper> {
    let program = config.program(program)?.clone();
    Ok(ProgramScraper::new(
        program,
        &config.source.base_url,
        fetcher,
        config.quiz.clone(),
    )?)
}
