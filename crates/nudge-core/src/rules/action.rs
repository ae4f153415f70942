//! Action descriptors attached to nudge buttons.
//!
//! The selector never executes an action itself. `Dismiss` is handled
//! internally, everything else is handed to an
//! [`ActionDispatcher`](crate::ActionDispatcher).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of action a nudge button requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Dismiss,
    /// Parameter: tier name.
    SwitchTier,
    /// Parameter: tool/widget identifier.
    OpenTool,
    /// Parameter: URL.
    OpenUrl,
    /// Parameter: prompt text to prefill.
    SendPrompt,
    /// Anything the engine does not recognize.
    #[serde(other)]
    Unknown,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Dismiss => "dismiss",
            ActionKind::SwitchTier => "switch_tier",
            ActionKind::OpenTool => "open_tool",
            ActionKind::OpenUrl => "open_url",
            ActionKind::SendPrompt => "send_prompt",
            ActionKind::Unknown => "unknown",
        }
    }

    /// Parse a host-supplied kind string; unrecognized strings map to `Unknown`.
    pub fn parse(kind: &str) -> Self {
        match kind {
            "dismiss" => ActionKind::Dismiss,
            "switch_tier" => ActionKind::SwitchTier,
            "open_tool" => ActionKind::OpenTool,
            "open_url" => ActionKind::OpenUrl,
            "send_prompt" => ActionKind::SendPrompt,
            _ => ActionKind::Unknown,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured `(kind, parameter)` descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NudgeAction {
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl NudgeAction {
    pub fn new(kind: ActionKind, parameter: Option<String>) -> Self {
        Self { kind, parameter }
    }

    pub fn dismiss() -> Self {
        Self::new(ActionKind::Dismiss, None)
    }

    pub fn with_param(kind: ActionKind, parameter: impl Into<String>) -> Self {
        Self::new(kind, Some(parameter.into()))
    }
}

/// A labelled button shown with a nudge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NudgeButton {
    pub label: String,
    pub action: NudgeAction,
}

impl NudgeButton {
    pub fn new(label: impl Into<String>, action: NudgeAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}
