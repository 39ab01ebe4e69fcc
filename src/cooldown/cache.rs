//! Per instrument+purpose action rate limiting

use super::clock::Clock;
use super::types::{
    ActionHistory, CooldownEntry, CooldownKey, CooldownStats, EntryDecision, EntryReason,
    RecordedAction,
};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;

/// Cooldown and daily-limit bookkeeping keyed by [`CooldownKey`]
pub struct CooldownCache {
    clock: Arc<dyn Clock>,
    entries: HashMap<CooldownKey, CooldownEntry>,
}

impl CooldownCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: HashMap::new(),
        }
    }

    /// Check whether an action may be taken now
    ///
    /// A local-day rollover resets the daily counter before the cooldown is
    /// checked.
    pub fn can_enter(
        &mut self,
        key: &CooldownKey,
        cooldown_minutes: u64,
        max_daily: u32,
    ) -> EntryDecision {
        let now = self.clock.now();
        let today = self.clock.today();

        let Some(entry) = self.entries.get_mut(key) else {
            return EntryDecision {
                allowed: true,
                reason: EntryReason::FirstEntry,
                daily_count: 0,
                max_daily,
                remaining_secs: None,
            };
        };

        let rolled_over = entry.last_reset_date != today;
        if rolled_over {
            entry.daily_count = 0;
            entry.last_reset_date = today;
        }

        let cooldown = i64::try_from(cooldown_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .unwrap_or(Duration::MAX);
        let elapsed = now - entry.last_action_at;
        let decision = |allowed, reason, remaining_secs| EntryDecision {
            allowed,
            reason,
            daily_count: entry.daily_count,
            max_daily,
            remaining_secs,
        };

        if elapsed < cooldown {
            return decision(
                false,
                EntryReason::CooldownActive,
                Some(cooldown.checked_sub(&elapsed).map_or(i64::MAX, |d| d.num_seconds())),
            );
        }
        if entry.daily_count >= max_daily {
            return decision(false, EntryReason::DailyLimitReached, None);
        }
        if rolled_over {
            decision(true, EntryReason::DailyReset, None)
        } else {
            decision(true, EntryReason::Ok, None)
        }
    }

    /// Record an action taken now
    pub fn update_entry(&mut self, key: &CooldownKey) {
        let now = self.clock.now();
        let today = self.clock.today();
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| CooldownEntry {
                key: key.clone(),
                last_action_at: now,
                daily_count: 0,
                last_reset_date: today,
            });

        if entry.last_reset_date != today {
            entry.daily_count = 0;
            entry.last_reset_date = today;
        }
        entry.daily_count += 1;
        entry.last_action_at = now;

        tracing::debug!(key = %key, daily_count = entry.daily_count, "Cooldown entry updated");
    }

    pub fn status(&self, key: &CooldownKey) -> Option<&CooldownEntry> {
        self.entries.get(key)
    }

    pub fn reset(&mut self, key: &CooldownKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn reset_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn statistics(&self) -> CooldownStats {
        let now = self.clock.now();
        let today = self.clock.today();
        let mut stats = CooldownStats {
            entries: self.entries.len(),
            ..Default::default()
        };
        for entry in self.entries.values() {
            let count = if entry.last_reset_date == today {
                entry.daily_count
            } else {
                0
            };
            *stats.by_daily_count.entry(count).or_default() += 1;
            if now - entry.last_action_at < Duration::hours(1) {
                stats.active_last_hour += 1;
            }
        }
        stats
    }

    /// Rebuild from today's recorded actions
    ///
    /// On failure the cache starts empty and entries are allowed again.
    pub async fn restore(&mut self, history: &dyn ActionHistory) -> usize {
        match history.actions_on(self.clock.today()).await {
            Ok(actions) => self.replay(actions),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Cooldown history unavailable, starting empty; repeat actions may be allowed"
                );
                self.entries.clear();
                0
            }
        }
    }

    /// Replace all entries with the given actions, keeping only today's
    pub fn replay(&mut self, actions: impl IntoIterator<Item = RecordedAction>) -> usize {
        let today = self.clock.today();
        self.entries.clear();

        let mut restored = 0;
        for action in actions {
            if self.clock.local_date(action.at) != today {
                continue;
            }
            let entry = self
                .entries
                .entry(action.key.clone())
                .or_insert_with(|| CooldownEntry {
                    key: action.key.clone(),
                    last_action_at: action.at,
                    daily_count: 0,
                    last_reset_date: today,
                });
            entry.daily_count += 1;
            entry.last_action_at = entry.last_action_at.max(action.at);
            restored += 1;
        }

        tracing::info!(restored, keys = self.entries.len(), "Cooldown cache restored");
        restored
    }
}
