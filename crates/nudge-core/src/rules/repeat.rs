//! Dynamic identities for rules that may fire more than once.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TriggerError;
use crate::session::SessionState;

pub type KeyFn =
    dyn Fn(&str, &SessionState, DateTime<Utc>) -> Result<String, TriggerError> + Send + Sync;

/// Closure-backed repeat key.
#[derive(Clone)]
pub struct KeyFunction {
    name: String,
    func: Arc<KeyFn>,
}

impl KeyFunction {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str, &SessionState, DateTime<Utc>) -> Result<String, TriggerError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for KeyFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFunction").field("name", &self.name).finish()
    }
}

impl PartialEq for KeyFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.func, &other.func)
    }
}

/// How a repeatable rule derives its per-occurrence identity.
///
/// Two states that map to different identities are independent occurrences:
/// dismissing or showing one never blocks the other.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepeatKey {
    /// `{id}-{idle_minutes / minutes}`
    IdleBucket { minutes: u32 },

    /// `{id}-{session_minutes / minutes}`
    SessionBucket { minutes: u32 },

    /// `{id}-{message_count / every}`
    MessageBucket { every: u64 },

    /// `{id}-{current_tier}`
    Tier,

    #[serde(skip)]
    Function(KeyFunction),
}

impl RepeatKey {
    pub fn function<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str, &SessionState, DateTime<Utc>) -> Result<String, TriggerError>
            + Send
            + Sync
            + 'static,
    {
        RepeatKey::Function(KeyFunction::new(name, func))
    }

    /// Identity of the current occurrence of rule `rule_id`.
    pub fn identity(
        &self,
        rule_id: &str,
        state: &SessionState,
        now: DateTime<Utc>,
    ) -> Result<String, TriggerError> {
        match self {
            RepeatKey::IdleBucket { minutes } => {
                let bucket = bucket(state.idle_minutes(now), *minutes, "minutes")?;
                Ok(format!("{rule_id}-{bucket}"))
            }
            RepeatKey::SessionBucket { minutes } => {
                let bucket = bucket(state.session_minutes(now), *minutes, "minutes")?;
                Ok(format!("{rule_id}-{bucket}"))
            }
            RepeatKey::MessageBucket { every } => {
                if *every == 0 {
                    return Err(TriggerError::ZeroBucket { field: "every" });
                }
                Ok(format!("{rule_id}-{}", state.message_count / every))
            }
            RepeatKey::Tier => Ok(format!("{rule_id}-{}", state.current_tier)),
            RepeatKey::Function(key) => (key.func)(rule_id, state, now),
        }
    }
}

fn bucket(value: i64, size: u32, field: &'static str) -> Result<i64, TriggerError> {
    if size == 0 {
        return Err(TriggerError::ZeroBucket { field });
    }
    Ok(value.div_euclid(i64::from(size)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-05T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn idle_buckets_advance_every_five_minutes() {
        let state = SessionState::new(t0());
        let key = RepeatKey::IdleBucket { minutes: 5 };

        let at = |mins| key.identity("idle-reminder", &state, t0() + Duration::minutes(mins));
        assert_eq!(at(4).unwrap(), "idle-reminder-0");
        assert_eq!(at(5).unwrap(), "idle-reminder-1");
        assert_eq!(at(9).unwrap(), "idle-reminder-1");
        assert_eq!(at(10).unwrap(), "idle-reminder-2");
    }

    #[test]
    fn session_and_message_buckets() {
        let mut state = SessionState::new(t0());
        state.message_count = 25;
        let session = RepeatKey::SessionBucket { minutes: 45 };
        assert_eq!(
            session.identity("break", &state, t0() + Duration::minutes(95)).unwrap(),
            "break-2"
        );
        let messages = RepeatKey::MessageBucket { every: 10 };
        assert_eq!(messages.identity("streak", &state, t0()).unwrap(), "streak-2");
    }

    #[test]
    fn tier_key_uses_current_tier() {
        let mut state = SessionState::new(t0());
        state.record_tier_change("frontier", t0());
        assert_eq!(
            RepeatKey::Tier.identity("tier-tip", &state, t0()).unwrap(),
            "tier-tip-frontier"
        );
    }

    #[test]
    fn zero_sized_buckets_fail() {
        let state = SessionState::new(t0());
        assert!(RepeatKey::IdleBucket { minutes: 0 }.identity("x", &state, t0()).is_err());
        assert!(RepeatKey::MessageBucket { every: 0 }.identity("x", &state, t0()).is_err());
    }

    #[test]
    fn function_key_receives_rule_id() {
        let state = SessionState::new(t0());
        let key = RepeatKey::function("by-count", |id, state, _| {
            Ok(format!("{id}/{}", state.message_count))
        });
        assert_eq!(key.identity("custom", &state, t0()).unwrap(), "custom/0");
    }

    #[test]
    fn repeat_key_toml_shape() {
        let key: RepeatKey = toml::from_str(r#"type = "idle_bucket"
minutes = 5"#).unwrap();
        assert_eq!(key, RepeatKey::IdleBucket { minutes: 5 });
    }
}
