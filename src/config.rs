//! Configuration loading and management for bbcast.
//!
//! Loads settings from `bbcast.toml` with an environment variable override for the
//! source site. Without a config file the built-in programme list is used.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetcher::{REQUEST_TIMEOUT, USER_AGENT};
use crate::model::{ExtractorFamily, ProgramConfig};

const CONFIG_FILE: &str = "bbcast.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("unknown program: {0}")]
    UnknownProgram(String),
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

/// Source site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Site root that index paths and relative links resolve against
    pub base_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.bbc.co.uk".to_string(),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: REQUEST_TIMEOUT.as_secs(),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Storage paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base path for the sled database
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data"),
        }
    }
}

/// Embedded quiz widget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    /// Substring identifying the widget iframe's `src`
    pub host: String,
    /// Global the widget assigns its view state to
    pub view_variable: String,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            host: "riddle.com".to_string(),
            view_variable: "window.riddle_view".to_string(),
        }
    }
}

/// Daily run time, in a fixed UTC offset
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub hour: u32,
    pub minute: u32,
    pub utc_offset_hours: i32,
}

impl Default for ScheduleConfig {
    /// 10:00 in Japan Standard Time
    fn default() -> Self {
        Self {
            hour: 10,
            minute: 0,
            utc_offset_hours: 9,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub quiz: QuizConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default = "default_programs")]
    pub programs: Vec<ProgramConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            quiz: QuizConfig::default(),
            schedule: ScheduleConfig::default(),
            programs: default_programs(),
        }
    }
}

/// The three programmes whose layouts are known.
pub fn default_programs() -> Vec<ProgramConfig> {
    vec![
        ProgramConfig::new(
            "6-minute-english",
            "6 Minute English",
            "/learningenglish/english/features/6-minute-english",
            ExtractorFamily::SixMinuteEnglish,
        ),
        ProgramConfig::new(
            "the-english-we-speak",
            "The English We Speak",
            "/learningenglish/english/features/the-english-we-speak",
            ExtractorFamily::TheEnglishWeSpeak,
        ),
        ProgramConfig::new(
            "real-easy-english",
            "Real Easy English",
            "/learningenglish/english/features/real-easy-english",
            ExtractorFamily::RealEasyEnglish,
        ),
    ]
}

impl Config {
    /// Load configuration from the default location (bbcast.toml in cwd or home),
    /// falling back to defaults when neither exists
    pub fn load() -> Result<Self, ConfigError> {
        let config = match Self::find_config_file() {
            Some(path) => Self::read_file(&path)?,
            None => Config::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::read_file(path)?.with_env_overrides())
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(base_url) = std::env::var("BBC_BASE_URL") {
            self.source.base_url = base_url;
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ScheduleConfig {
            hour,
            minute,
            utc_offset_hours,
        } = self.schedule;
        if hour > 23 || minute > 59 || !(-12..=14).contains(&utc_offset_hours) {
            return Err(ConfigError::InvalidSchedule(format!(
                "{:02}:{:02} UTC{:+}",
                hour, minute, utc_offset_hours
            )));
        }
        Ok(())
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from(CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        // Check home directory
        dirs::home_dir()
            .map(|home| home.join(".config").join("bbcast").join(CONFIG_FILE))
            .filter(|path| path.exists())
    }

    /// Look up a configured programme by id
    pub fn program(&self, id: &str) -> Result<&ProgramConfig, ConfigError> {
        self.programs
            .iter()
            .find(|program| program.id == id)
            .ok_or_else(|| ConfigError::UnknownProgram(id.to_string()))
    }
}
