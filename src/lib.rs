//! # bbcast
//!
//! Scrapes BBC Learning English programme pages into structured episodes for
//! a listening-practice app.
//!
//! ## Features
//!
//! - **Per-programme layouts**: one extraction profile per page family, chosen from config
//! - **Transcripts and vocabulary**: speaker-attributed lines and word/definition pairs
//! - **Quizzes**: recovered from the embedded quiz widget's view state
//! - **Change detection**: a normal run stops at the newest episode already stored

pub mod config;
pub mod detail;
pub mod dom;
pub mod fetcher;
pub mod index;
pub mod model;
pub mod orchestrator;
pub mod quiz;
pub mod storage;
pub mod text;
pub mod transcript;
pub mod trigger;
pub mod vocabulary;

pub use config::Config;
pub use detail::{EpisodeSource, ProgramScraper};
pub use fetcher::{Fetcher, HttpFetcher, StaticFetcher};
pub use model::{EpisodeDetail, EpisodeSummary};
pub use orchestrator::{Orchestrator, RunOptions, RunReport};
pub use storage::Storage;
