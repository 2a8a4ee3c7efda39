//! Entry points that start a run: on demand, or once a day at a fixed time.

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, TimeZone, Utc};
use tracing::{error, info};
use url::form_urlencoded;

use crate::config::{ConfigError, ScheduleConfig};
use crate::orchestrator::{Orchestrator, RunOptions};

/// Parameters of an on-demand run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerRequest {
    pub force: bool,
    pub max_episodes: usize,
}

impl Default for TriggerRequest {
    fn default() -> Self {
        let options = RunOptions::default();
        Self {
            force: options.force,
            max_episodes: options.max_episodes,
        }
    }
}

impl TriggerRequest {
    /// Read `force` and `episodes` from a URL query string.
    ///
    /// Only the literal `force=true` forces. An `episodes` value that is not a
    /// non-negative integer counts as 1.
    pub fn from_query(query: &str) -> Self {
        let mut request = Self::default();
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "force" => request.force = value == "true",
                "episodes" => request.max_episodes = value.trim().parse().unwrap_or(1),
                _ => {}
            }
        }
        request
    }

    pub fn options(&self) -> RunOptions {
        RunOptions {
            force: self.force,
            max_episodes: self.max_episodes,
        }
    }
}

/// Plain-text reply to an on-demand run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerResponse {
    pub status: u16,
    pub body: String,
}

impl TriggerResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Run once for a manual request and report the outcome as 200 or 500.
pub async fn run_manual(orchestrator: &Orchestrator<'_>, request: TriggerRequest) -> TriggerResponse {
    info!(
        force = request.force,
        max_episodes = request.max_episodes,
        "Manual run triggered"
    );
    match orchestrator.run(request.options()).await {
        Ok(_) => TriggerResponse {
            status: 200,
            body: format!(
                "Scraping completed successfully. (Force: {}, MaxEpisodes: {})",
                request.force, request.max_episodes
            ),
        },
        Err(e) => {
            error!(error = %e, "Scraping failed");
            TriggerResponse {
                status: 500,
                body: "Scraping failed.".to_string(),
            }
        }
    }
}

/// The first scheduled time strictly after `now`.
pub fn next_run_after(
    now: DateTime<Utc>,
    schedule: &ScheduleConfig,
) -> Result<DateTime<Utc>, ConfigError> {
    let invalid = || {
        ConfigError::InvalidSchedule(format!(
            "{:02}:{:02} UTC{:+}",
            schedule.hour, schedule.minute, schedule.utc_offset_hours
        ))
    };
    let offset = FixedOffset::east_opt(schedule.utc_offset_hours * 3600).ok_or_else(invalid)?;
    let at = NaiveTime::from_hms_opt(schedule.hour, schedule.minute, 0).ok_or_else(invalid)?;

    let local_now = now.with_timezone(&offset);
    let today = offset
        .from_local_datetime(&local_now.date_naive().and_time(at))
        .single()
        .ok_or_else(invalid)?;
    let next = if today > local_now {
        today
    } else {
        today + TimeDelta::days(1)
    };
    Ok(next.with_timezone(&Utc))
}

/// Sleep until each scheduled time and run with default options. Outcomes are only logged.
pub async fn run_daily(
    orchestrator: &Orchestrator<'_>,
    schedule: &ScheduleConfig,
) -> Result<(), ConfigError> {
    loop {
        let now = Utc::now();
        let next = next_run_after(now, schedule)?;
        info!(next = %next, "Waiting for scheduled run");
        tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

        info!("Starting scheduled scraper");
        match orchestrator.run(RunOptions::default()).await {
            Ok(report) => info!(saved = report.saved.len(), "Scheduled scraper finished"),
            Err(e) => error!(error = %e, "Scheduled scraper failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fetcher::StaticFetcher;
    use crate::storage::Storage;
    use std::sync::Arc;

    fn utc(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn parses_manual_query() {
        assert_eq!(TriggerRequest::from_query(""), TriggerRequest::default());
        assert_eq!(
            TriggerRequest::from_query("?force=true&episodes=5"),
            TriggerRequest {
                force: true,
                max_episodes: 5
            }
        );
        let lenient = TriggerRequest::from_query("force=TRUE&episodes=many");
        assert!(!lenient.force);
        assert_eq!(lenient.max_episodes, 1);
        assert_eq!(TriggerRequest::from_query("episodes=-2").max_episodes, 1);
    }

    #[test]
    fn next_run_is_later_today_or_tomorrow() {
        let schedule = ScheduleConfig::default();
        // 09:30 in Tokyo
        assert_eq!(
            next_run_after(utc("2025-12-18T00:30:00Z"), &schedule).unwrap(),
            utc("2025-12-18T01:00:00Z")
        );
        // exactly 10:00 in Tokyo
        assert_eq!(
            next_run_after(utc("2025-12-18T01:00:00Z"), &schedule).unwrap(),
            utc("2025-12-19T01:00:00Z")
        );
        // 05:00 on the 19th in Tokyo, still the 18th in UTC
        assert_eq!(
            next_run_after(utc("2025-12-18T20:00:00Z"), &schedule).unwrap(),
            utc("2025-12-19T01:00:00Z")
        );
    }

    #[test]
    fn out_of_range_schedule_is_rejected() {
        let schedule = ScheduleConfig {
            hour: 25,
            minute: 0,
            utc_offset_hours: 0,
        };
        assert!(matches!(
            next_run_after(Utc::now(), &schedule),
            Err(ConfigError::InvalidSchedule(_))
        ));
    }

    #[tokio::test]
    async fn manual_run_reports_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path().join("db")).unwrap();

        let config = Config {
            programs: Vec::new(),
            ..Config::default()
        };
        let orchestrator = Orchestrator::new(&config, &storage, Arc::new(StaticFetcher::new()));
        let ok = run_manual(&orchestrator, TriggerRequest::from_query("force=true&episodes=3")).await;
        assert!(ok.is_success());
        assert_eq!(
            ok.body,
            "Scraping completed successfully. (Force: true, MaxEpisodes: 3)"
        );

        let mut broken = Config::default();
        broken.source.base_url = "not a url".to_string();
        let orchestrator = Orchestrator::new(&broken, &storage, Arc::new(StaticFetcher::new()));
        let failed = run_manual(&orchestrator, TriggerRequest::default()).await;
        assert_eq!(failed.status, 500);
        assert_eq!(failed.body, "Scraping failed.");
    }
}
