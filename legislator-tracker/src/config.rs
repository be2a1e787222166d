use std::time::Duration;

use interfaces::WatchRest;

use crate::types::{FetchConfig, Result, TrackerError};

pub const DEFAULT_SCHEDULE_MINUTES: u64 = 30;
pub const MAX_SCHEDULE_MINUTES: u64 = 7 * 24 * 60;
pub const DEFAULT_EXPECTED_UPDATE_PERIOD_DAYS: u32 = 2;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub api_key: String,
    pub legislator_bioguide_id: String,
    pub expected_update_period_in_days: Option<u32>,
    pub schedule_minutes: u64,
    pub fetch: FetchConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            legislator_bioguide_id: String::new(),
            expected_update_period_in_days: Some(DEFAULT_EXPECTED_UPDATE_PERIOD_DAYS),
            schedule_minutes: DEFAULT_SCHEDULE_MINUTES,
            fetch: FetchConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Reports every missing option at once rather than stopping at the first.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.api_key.trim().is_empty() {
            problems.push("api_key is required.".to_string());
        }
        if self.legislator_bioguide_id.trim().is_empty() {
            problems.push("legislator_bioguide_id is required.".to_string());
        }
        if !matches!(self.expected_update_period_in_days, Some(days) if days > 0) {
            problems.push("expected_update_period_in_days is required.".to_string());
        }
        if !(1..=MAX_SCHEDULE_MINUTES).contains(&self.schedule_minutes) {
            problems.push(format!("schedule_minutes must be between 1 and {MAX_SCHEDULE_MINUTES}."));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(TrackerError::Config(problems))
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_minutes.saturating_mul(60))
    }

    pub fn expected_update_period(&self) -> chrono::Duration {
        chrono::Duration::days(
            self.expected_update_period_in_days
                .unwrap_or(DEFAULT_EXPECTED_UPDATE_PERIOD_DAYS) as i64,
        )
    }

    pub fn watch(&self) -> WatchRest {
        WatchRest {
            wait_at_least_ms: u64::try_from(self.poll_interval().as_millis()).unwrap_or(u64::MAX),
        }
    }
}
