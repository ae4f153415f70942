//! Nudge rule definition.
//!
//! A rule pairs a trigger with display content and a display policy
//! (priority, delay, once, repeat key).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NudgeButton, RepeatKey, Trigger};
use crate::error::TriggerError;
use crate::session::SessionState;

/// Display payload handed to the render target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NudgeContent {
    #[serde(default)]
    pub icon: String,
    pub title: String,
    pub message: String,
    /// Buttons in display order.
    #[serde(default)]
    pub actions: Vec<NudgeButton>,
}

impl NudgeContent {
    pub fn new(icon: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            icon: icon.into(),
            title: title.into(),
            message: message.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_button(mut self, button: NudgeButton) -> Self {
        self.actions.push(button);
        self
    }
}

/// A catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NudgeRule {
    /// Unique key within the catalog
    pub id: String,

    pub trigger: Trigger,

    pub content: NudgeContent,

    /// Higher wins when several rules trigger on the same tick
    #[serde(default)]
    pub priority: i32,

    /// Wait between selection and surfacing
    #[serde(default)]
    pub delay_ms: u64,

    /// Permanently dismiss after the first surfacing
    #[serde(default)]
    pub once: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_key: Option<RepeatKey>,
}

impl NudgeRule {
    pub fn new(id: impl Into<String>, trigger: Trigger, content: NudgeContent) -> Self {
        Self {
            id: id.into(),
            trigger,
            content,
            priority: 0,
            delay_ms: 0,
            once: false,
            repeat_key: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn with_repeat_key(mut self, key: RepeatKey) -> Self {
        self.repeat_key = Some(key);
        self
    }

    /// Effective identity for the current occurrence: the repeat key value
    /// when present, the static id otherwise.
    pub fn identity(&self, state: &SessionState, now: DateTime<Utc>) -> Result<String, TriggerError> {
        match &self.repeat_key {
            Some(key) => key.identity(&self.id, state, now),
            None => Ok(self.id.clone()),
        }
    }

    /// Whether the rule can be written to a TOML catalog.
    pub fn is_serializable(&self) -> bool {
        !self.trigger.has_predicate() && !matches!(self.repeat_key, Some(RepeatKey::Function(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{ActionKind, NudgeAction};
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-05T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn identity_defaults_to_static_id() {
        let rule = NudgeRule::new("welcome", Trigger::Always, NudgeContent::default());
        let state = SessionState::new(t0());
        assert_eq!(rule.identity(&state, t0()).unwrap(), "welcome");
    }

    #[test]
    fn identity_uses_repeat_key() {
        let rule = NudgeRule::new("idle-reminder", Trigger::Always, NudgeContent::default())
            .with_repeat_key(RepeatKey::IdleBucket { minutes: 5 });
        let state = SessionState::new(t0());
        assert_eq!(
            rule.identity(&state, t0() + Duration::minutes(10)).unwrap(),
            "idle-reminder-2"
        );
    }

    #[test]
    fn rule_toml_defaults() {
        let toml = r#"
            id = "tip"
            trigger = { type = "always" }

            [content]
            title = "Tip"
            message = "Try the tools dock"

            [[content.actions]]
            label = "Open"
            action = { kind = "open_tool", parameter = "tools-dock" }
        "#;
        let rule: NudgeRule = toml::from_str(toml).unwrap();
        assert_eq!(rule.priority, 0);
        assert_eq!(rule.delay_ms, 0);
        assert!(!rule.once);
        assert!(rule.repeat_key.is_none());
        assert_eq!(rule.content.icon, "");
        assert_eq!(
            rule.content.actions[0].action,
            NudgeAction::with_param(ActionKind::OpenTool, "tools-dock")
        );
    }

    #[test]
    fn closure_rules_are_not_serializable() {
        let rule = NudgeRule::new(
            "custom",
            Trigger::all(vec![Trigger::predicate("p", |_, _| Ok(true))]),
            NudgeContent::default(),
        );
        assert!(!rule.is_serializable());
        let plain = NudgeRule::new("plain", Trigger::Always, NudgeContent::default());
        assert!(plain.is_serializable());
    }
}
