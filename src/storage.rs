//! Sled-based document store for programmes and episodes.
//!
//! Documents are JSON objects in two trees, `programs` and `episodes`. Writes
//! merge into the existing document: fields present in the new document
//! overwrite, everything else is kept.

use std::cmp::Ordering;
use std::path::Path;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{
    parse_episode_date, slug_from_url, split_date, EpisodeDetail, ExtractorFamily, ProgramConfig,
};

lazy_static! {
    static ref EPISODE_NUMBER: Regex = Regex::new(r"Episode (\d+)").unwrap();
}

const PROGRAMS: &str = "programs";
const EPISODES: &str = "episodes";

/// Writes per import batch.
pub const IMPORT_BATCH_SIZE: usize = 400;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    DbError(#[from] sled::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("failed to read import file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("import file must hold a JSON array of episodes")]
    NotAnArray,
}

/// A programme document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProgram {
    pub id: String,
    pub title: String,
    pub url_path: String,
    pub base_url: String,
    pub family: ExtractorFamily,
    pub updated_at: DateTime<Utc>,
}

/// An episode document: the extracted detail plus bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEpisode {
    pub id: String,
    pub program_id: String,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub detail: EpisodeDetail,
}

/// Outcome of a historical import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub batches: usize,
}

/// Explicitly opened store; flush with [`Storage::close`] at shutdown.
pub struct Storage {
    db: sled::Db,
    programs: sled::Tree,
    episodes: sled::Tree,
}

impl Storage {
    /// Open or create storage at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let programs = db.open_tree(PROGRAMS)?;
        let episodes = db.open_tree(EPISODES)?;
        Ok(Self {
            db,
            programs,
            episodes,
        })
    }

    /// Upsert a programme's static metadata.
    pub fn save_program(&self, program: &ProgramConfig, base_url: &str) -> Result<(), StorageError> {
        let stored = StoredProgram {
            id: program.id.clone(),
            title: program.title.clone(),
            url_path: program.url_path.clone(),
            base_url: base_url.to_string(),
            family: program.family,
            updated_at: Utc::now(),
        };
        merge_into(&self.programs, &program.id, serde_json::to_value(&stored)?)?;
        debug!(program = %program.id, "Saved program");
        Ok(())
    }

    pub fn get_program(&self, id: &str) -> Result<Option<StoredProgram>, StorageError> {
        match self.programs.get(id.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Upsert an episode under `{program_id}-{slug}` and return that id.
    pub fn save_episode(
        &self,
        program_id: &str,
        detail: &EpisodeDetail,
    ) -> Result<String, StorageError> {
        let id = detail.storage_id(program_id);
        let stored = StoredEpisode {
            id: id.clone(),
            program_id: program_id.to_string(),
            updated_at: Utc::now(),
            detail: detail.clone(),
        };
        merge_into(&self.episodes, &id, serde_json::to_value(&stored)?)?;
        info!(episode = %id, "Saved episode");
        Ok(id)
    }

    pub fn get_episode(&self, id: &str) -> Result<Option<StoredEpisode>, StorageError> {
        match self.episodes.get(id.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// A programme's episodes, newest first, paginated.
    ///
    /// Ordered by `published_on` descending with undated episodes last; ties
    /// fall back to the raw date text, then the id.
    pub fn episodes_for_program(
        &self,
        program_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredEpisode>, StorageError> {
        let mut episodes = Vec::new();
        for item in self.episodes.iter() {
            let (key, value) = item?;
            match serde_json::from_slice::<StoredEpisode>(&value) {
                Ok(episode) if episode.program_id == program_id => episodes.push(episode),
                Ok(_) => {}
                Err(e) => warn!(
                    key = %String::from_utf8_lossy(&key),
                    error = %e,
                    "Skipping undecodable episode"
                ),
            }
        }
        episodes.sort_by(newest_first);
        Ok(episodes.into_iter().skip(offset).take(limit).collect())
    }

    /// The most recently published stored episode of a programme.
    pub fn last_episode(&self, program_id: &str) -> Result<Option<StoredEpisode>, StorageError> {
        Ok(self
            .episodes_for_program(program_id, 1, 0)?
            .into_iter()
            .next())
    }

    /// Number of stored episodes across all programmes
    pub fn count_episodes(&self) -> usize {
        self.episodes.len()
    }

    /// Read a JSON array dumped by `bbcast dump` and import it.
    pub fn import_file<P: AsRef<Path>>(
        &self,
        path: P,
        program_id: &str,
    ) -> Result<ImportReport, StorageError> {
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content)? {
            Value::Array(records) => self.import_episodes(&records, program_id),
            _ => Err(StorageError::NotAnArray),
        }
    }

    /// Batch-write pre-scraped episodes, replacing any document with the same id.
    ///
    /// The id is the number of an `Episode <digits>` date, else the trailing URL
    /// segment. Records without a URL, or that do not read back as an episode,
    /// are skipped.
    pub fn import_episodes(
        &self,
        records: &[Value],
        program_id: &str,
    ) -> Result<ImportReport, StorageError> {
        let mut report = ImportReport::default();
        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            match import_document(record, program_id) {
                Some(entry) => prepared.push(entry),
                None => {
                    warn!("Skipping import record that is not a usable episode");
                    report.skipped += 1;
                }
            }
        }

        for chunk in prepared.chunks(IMPORT_BATCH_SIZE) {
            let mut batch = sled::Batch::default();
            for (id, document) in chunk {
                batch.insert(id.as_bytes(), serde_json::to_vec(document)?);
            }
            self.episodes.apply_batch(batch)?;
            report.batches += 1;
            report.imported += chunk.len();
            info!(count = chunk.len(), "Committed import batch");
        }
        self.db.flush()?;
        Ok(report)
    }

    /// Flush pending writes and release the database.
    pub fn close(self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

/// Merge the non-null fields of `update` over the document stored under `key`.
fn merge_into(tree: &sled::Tree, key: &str, update: Value) -> Result<(), StorageError> {
    let mut document = match tree.get(key.as_bytes())? {
        Some(data) => match serde_json::from_slice(&data)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        },
        None => Map::new(),
    };
    if let Value::Object(fields) = update {
        for (field, value) in fields {
            if !value.is_null() {
                document.insert(field, value);
            }
        }
    }
    tree.insert(key.as_bytes(), serde_json::to_vec(&document)?)?;
    tree.flush()?;
    Ok(())
}

fn newest_first(a: &StoredEpisode, b: &StoredEpisode) -> Ordering {
    // None sorts below Some, so reversing puts undated episodes last.
    b.detail
        .published_on
        .cmp(&a.detail.published_on)
        .then_with(|| b.detail.date.cmp(&a.detail.date))
        .then_with(|| a.id.cmp(&b.id))
}

fn import_id(raw_date: Option<&str>, url: &str) -> String {
    raw_date
        .and_then(|date| EPISODE_NUMBER.captures(date))
        .and_then(|caps| caps.get(1))
        .map(|number| number.as_str().to_string())
        .unwrap_or_else(|| slug_from_url(url))
}

/// Normalise one dumped record into an episode document, or `None` if it has
/// no URL or a field of the wrong shape.
fn import_document(record: &Value, program_id: &str) -> Option<(String, Value)> {
    let fields = record.as_object()?;
    let url = fields
        .get("url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())?;
    let raw_date = fields.get("date").and_then(Value::as_str);
    let id = import_id(raw_date, url);

    let mut document = fields.clone();
    if let Some(mp3) = document.remove("mp3Url") {
        document.entry("audioUrl").or_insert(mp3);
    }
    if fields.get("title").and_then(Value::as_str).unwrap_or("").is_empty() {
        document.insert("title".into(), Value::from("No Title"));
    }
    if let Some(date) = raw_date.and_then(split_date) {
        if let Some(published_on) = parse_episode_date(&date) {
            document.insert("publishedOn".into(), serde_json::to_value(published_on).ok()?);
        }
        document.insert("date".into(), Value::from(date));
    }
    document.insert("id".into(), Value::from(id.clone()));
    document.insert("programId".into(), Value::from(program_id));
    document.insert("updatedAt".into(), serde_json::to_value(Utc::now()).ok()?);

    let document = Value::Object(document);
    serde_json::from_value::<StoredEpisode>(document.clone()).ok()?;
    Some((id, document))
}
