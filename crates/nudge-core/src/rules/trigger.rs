//! Trigger definitions for nudge rules.
//!
//! A trigger is a side-effect-free predicate over the current
//! [`SessionState`]. Triggers are plain data so a catalog can be loaded from
//! TOML; in-process hosts can additionally plug in closures through
//! [`Trigger::Predicate`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TriggerError;
use crate::session::SessionState;

/// Signature of an in-process trigger predicate.
pub type PredicateFn =
    dyn Fn(&SessionState, DateTime<Utc>) -> Result<bool, TriggerError> + Send + Sync;

/// Named closure predicate. Compared by name and pointer identity.
#[derive(Clone)]
pub struct Predicate {
    name: String,
    func: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&SessionState, DateTime<Utc>) -> Result<bool, TriggerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn call(&self, state: &SessionState, now: DateTime<Utc>) -> Result<bool, TriggerError> {
        (self.func)(state, now)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.func, &other.func)
    }
}

/// Condition that makes a rule eligible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Always,

    Never,

    MessageCountEquals {
        count: u64,
    },

    MessageCountAtLeast {
        count: u64,
    },

    MessageCountAtMost {
        count: u64,
    },

    /// Fires on every non-zero multiple of `every`.
    MessageCountEvery {
        every: u64,
    },

    /// No interaction for at least `minutes` whole minutes.
    IdleAtLeast {
        minutes: u32,
    },

    SessionAtLeast {
        minutes: u32,
    },

    /// The first `window` minutes of every `every`-minute session bucket,
    /// starting with the first full bucket.
    SessionWindow {
        every: u32,
        window: u32,
    },

    TierIs {
        tier: String,
    },

    TierIsNot {
        tier: String,
    },

    TierChangesAtLeast {
        count: u32,
    },

    /// All nested triggers hold. Empty list holds.
    All {
        of: Vec<Trigger>,
    },

    /// At least one nested trigger holds. Empty list does not.
    Any {
        of: Vec<Trigger>,
    },

    Not {
        trigger: Box<Trigger>,
    },

    #[serde(skip)]
    Predicate(Predicate),
}

impl Trigger {
    pub fn predicate<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&SessionState, DateTime<Utc>) -> Result<bool, TriggerError> + Send + Sync + 'static,
    {
        Trigger::Predicate(Predicate::new(name, func))
    }

    pub fn all(of: Vec<Trigger>) -> Self {
        Trigger::All { of }
    }

    pub fn any(of: Vec<Trigger>) -> Self {
        Trigger::Any { of }
    }

    pub fn negate(trigger: Trigger) -> Self {
        Trigger::Not {
            trigger: Box::new(trigger),
        }
    }

    /// Evaluate against `state` as of `now`.
    ///
    /// Composite triggers short-circuit; an error in any evaluated branch
    /// fails the whole trigger.
    pub fn evaluate(&self, state: &SessionState, now: DateTime<Utc>) -> Result<bool, TriggerError> {
        let hit = match self {
            Trigger::Always => true,
            Trigger::Never => false,
            Trigger::MessageCountEquals { count } => state.message_count == *count,
            Trigger::MessageCountAtLeast { count } => state.message_count >= *count,
            Trigger::MessageCountAtMost { count } => state.message_count <= *count,
            Trigger::MessageCountEvery { every } => {
                if *every == 0 {
                    return Err(TriggerError::ZeroBucket { field: "every" });
                }
                state.message_count > 0 && state.message_count % every == 0
            }
            Trigger::IdleAtLeast { minutes } => state.idle_minutes(now) >= i64::from(*minutes),
            Trigger::SessionAtLeast { minutes } => {
                state.session_minutes(now) >= i64::from(*minutes)
            }
            Trigger::SessionWindow { every, window } => {
                if *every == 0 {
                    return Err(TriggerError::ZeroBucket { field: "every" });
                }
                let minutes = state.session_minutes(now);
                let every = i64::from(*every);
                minutes >= every && minutes % every < i64::from(*window)
            }
            Trigger::TierIs { tier } => state.current_tier == *tier,
            Trigger::TierIsNot { tier } => state.current_tier != *tier,
            Trigger::TierChangesAtLeast { count } => state.tier_change_count >= *count,
            Trigger::All { of } => {
                for trigger in of {
                    if !trigger.evaluate(state, now)? {
                        return Ok(false);
                    }
                }
                true
            }
            Trigger::Any { of } => {
                for trigger in of {
                    if trigger.evaluate(state, now)? {
                        return Ok(true);
                    }
                }
                false
            }
            Trigger::Not { trigger } => !trigger.evaluate(state, now)?,
            Trigger::Predicate(predicate) => predicate.call(state, now)?,
        };
        Ok(hit)
    }

    /// Whether this trigger (or any nested one) is an in-process closure.
    pub fn has_predicate(&self) -> bool {
        match self {
            Trigger::Predicate(_) => true,
            Trigger::All { of } | Trigger::Any { of } => of.iter().any(Trigger::has_predicate),
            Trigger::Not { trigger } => trigger.has_predicate(),
            _ => false,
        }
    }
}
