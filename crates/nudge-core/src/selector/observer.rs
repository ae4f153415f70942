//! Outbound collaborators of the selector and the values passed to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::{ActionKind, NudgeAction, NudgeContent};

/// A rule chosen on a tick, waiting out its `delay_ms` before surfacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub rule_id: String,
    /// Static id, or the repeat key value for repeatable rules.
    pub identity: String,
    pub priority: i32,
    pub delay_ms: u64,
    pub once: bool,
    pub content: NudgeContent,
    pub selected_at: DateTime<Utc>,
}

/// A nudge handed to the render target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfacedNudge {
    pub rule_id: String,
    pub identity: String,
    pub content: NudgeContent,
    pub surfaced_at: DateTime<Utc>,
}

/// How a surfaced nudge ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    /// The user closed it.
    Dismissed,
    /// The user picked an action; the nudge is dismissed as a side effect.
    Acted {
        kind: ActionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parameter: Option<String>,
    },
}

impl Resolution {
    pub fn acted(action: &NudgeAction) -> Self {
        Resolution::Acted {
            kind: action.kind,
            parameter: action.parameter.clone(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Dismissed => "dismissed",
            Resolution::Acted { .. } => "acted",
        }
    }
}

/// Render-target callbacks.
///
/// Called while the selector is borrowed mutably; implementations must not
/// call back into the selector.
pub trait NudgeObserver: Send + Sync {
    /// Invoked exactly once per surfaced occurrence.
    fn on_surfaced(&self, nudge: &SurfacedNudge);

    /// Invoked when a nudge identity is dismissed or acted upon.
    fn on_resolved(&self, identity: &str, resolution: &Resolution);
}

/// Executes non-dismiss actions on behalf of the host.
pub trait ActionDispatcher: Send + Sync {
    fn dispatch(&self, identity: &str, action: &NudgeAction);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl NudgeObserver for NoopObserver {
    fn on_surfaced(&self, _nudge: &SurfacedNudge) {}

    fn on_resolved(&self, _identity: &str, _resolution: &Resolution) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_serializes_with_outcome_tag() {
        let acted = Resolution::acted(&NudgeAction::with_param(ActionKind::SwitchTier, "budget"));
        let json = serde_json::to_value(&acted).unwrap();
        assert_eq!(json["outcome"], "acted");
        assert_eq!(json["kind"], "switch_tier");
        assert_eq!(json["parameter"], "budget");

        let json = serde_json::to_value(Resolution::Dismissed).unwrap();
        assert_eq!(json, serde_json::json!({ "outcome": "dismissed" }));
    }

    #[test]
    fn labels() {
        assert_eq!(Resolution::Dismissed.label(), "dismissed");
        assert_eq!(
            Resolution::acted(&NudgeAction::dismiss()).label(),
            "acted"
        );
    }
}
