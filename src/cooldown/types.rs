//! Cooldown types

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Instrument + purpose pair being rate limited
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CooldownKey {
    pub instrument: String,
    pub purpose: String,
}

impl CooldownKey {
    pub fn new(instrument: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            purpose: purpose.into(),
        }
    }
}

impl std::fmt::Display for CooldownKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.instrument, self.purpose)
    }
}

/// Why an entry was or was not allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryReason {
    FirstEntry,
    DailyReset,
    CooldownActive,
    DailyLimitReached,
    Ok,
}

impl EntryReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryReason::FirstEntry => "first_entry",
            EntryReason::DailyReset => "daily_reset",
            EntryReason::CooldownActive => "cooldown_active",
            EntryReason::DailyLimitReached => "daily_limit_reached",
            EntryReason::Ok => "ok",
        }
    }
}

impl std::fmt::Display for EntryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an entry check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDecision {
    pub allowed: bool,
    pub reason: EntryReason,
    /// Actions recorded today before this check
    pub daily_count: u32,
    pub max_daily: u32,
    /// Seconds until the cooldown lapses, when it is active
    pub remaining_secs: Option<i64>,
}

/// Recorded action history for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub key: CooldownKey,
    pub last_action_at: DateTime<Utc>,
    pub daily_count: u32,
    pub last_reset_date: NaiveDate,
}

/// Cache-wide summary
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CooldownStats {
    pub entries: usize,
    /// daily count → number of keys
    pub by_daily_count: BTreeMap<u32, usize>,
    pub active_last_hour: usize,
}

/// A previously taken action, as replayed from persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAction {
    pub key: CooldownKey,
    pub at: DateTime<Utc>,
}

/// Source of today's already-taken actions
#[async_trait]
pub trait ActionHistory: Send + Sync {
    async fn actions_on(&self, date: NaiveDate) -> anyhow::Result<Vec<RecordedAction>>;
}
