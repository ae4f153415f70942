//! Session state tracked by the nudge selector.
//!
//! The state is owned by exactly one [`NudgeSelector`](crate::NudgeSelector)
//! and only mutated through its tracking methods. Triggers and repeat keys
//! read it through the accessors below.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tier a fresh session starts in.
pub const DEFAULT_TIER: &str = "sovereign";

/// Per-process session signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Random identifier used to correlate log lines.
    pub session_id: Uuid,
    pub message_count: u64,
    pub session_start: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
    /// Active processing mode; opaque to the engine.
    pub current_tier: String,
    pub tier_change_count: u32,
}

impl SessionState {
    /// Fresh session starting at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            message_count: 0,
            session_start: now,
            last_interaction: now,
            current_tier: DEFAULT_TIER.to_string(),
            tier_change_count: 0,
        }
    }

    /// Time since the last interaction, never negative.
    pub fn idle_duration(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_interaction).max(Duration::zero())
    }

    /// Time since the session started, never negative.
    pub fn session_duration(&self, now: DateTime<Utc>) -> Duration {
        (now - self.session_start).max(Duration::zero())
    }

    pub fn idle_minutes(&self, now: DateTime<Utc>) -> i64 {
        self.idle_duration(now).num_minutes()
    }

    pub fn session_minutes(&self, now: DateTime<Utc>) -> i64 {
        self.session_duration(now).num_minutes()
    }

    pub(crate) fn record_message(&mut self, now: DateTime<Utc>) {
        self.message_count = self.message_count.saturating_add(1);
        self.touch(now);
    }

    pub(crate) fn record_tier_change(&mut self, tier: &str, now: DateTime<Utc>) {
        self.current_tier = tier.to_string();
        self.tier_change_count = self.tier_change_count.saturating_add(1);
        self.touch(now);
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        // Out-of-order timestamps must not move the idle clock backwards.
        if now > self.last_interaction {
            self.last_interaction = now;
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}
