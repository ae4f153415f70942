//! Nudge selection engine.
//!
//! The selector owns the session state, the dismissal record and the
//! shown-this-process set. It does not run timers itself: the caller (or
//! [`NudgeRunner`](crate::NudgeRunner)) calls [`NudgeSelector::check_nudges`]
//! periodically and [`NudgeSelector::surface`] once a selection's delay has
//! elapsed.
//!
//! ## Evaluation
//!
//! ```text
//! rules (catalog order)
//!   -> skip statically dismissed ids
//!   -> evaluate trigger (errors/panics = not triggered)
//!   -> stable sort by priority desc
//!   -> head only
//!   -> identity = repeat key or id
//!   -> skip if shown / dismissed / pending
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut selector = NudgeSelector::new(Catalog::builtin(), MemoryStore::new());
//! selector.track_message();
//! if let Some(selection) = selector.check_nudges() {
//!     // wait selection.delay_ms, then:
//!     selector.surface(&selection);
//! }
//! ```

mod observer;

pub use observer::{
    ActionDispatcher, NoopObserver, NudgeObserver, Resolution, Selection, SurfacedNudge,
};

use std::any::Any;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::TriggerError;
use crate::rules::{ActionKind, NudgeAction, NudgeRule};
use crate::session::SessionState;
use crate::storage::DismissalStore;

/// Rule evaluation and prioritization over one session.
pub struct NudgeSelector {
    catalog: Catalog,
    state: SessionState,
    /// Durable: persisted after every mutation.
    dismissed: BTreeSet<String>,
    /// Identities surfaced in this process.
    shown: HashSet<String>,
    /// Identities selected but not yet surfaced.
    pending: HashSet<String>,
    store: Arc<dyn DismissalStore>,
    observer: Arc<dyn NudgeObserver>,
    dispatcher: Option<Arc<dyn ActionDispatcher>>,
}

impl NudgeSelector {
    /// Create a selector and load the dismissal record from `store`.
    pub fn new(catalog: Catalog, store: impl DismissalStore + 'static) -> Self {
        Self::with_store(catalog, Arc::new(store), Utc::now())
    }

    /// Like [`NudgeSelector::new`] with an explicit session start and a
    /// shared store handle.
    pub fn with_store(catalog: Catalog, store: Arc<dyn DismissalStore>, now: DateTime<Utc>) -> Self {
        let dismissed = match store.load() {
            Ok(dismissed) => dismissed,
            Err(e) => {
                warn!(error = %e, "Failed to load dismissed nudges; starting with an empty record");
                BTreeSet::new()
            }
        };
        let state = SessionState::new(now);
        debug!(
            session_id = %state.session_id,
            rules = catalog.len(),
            dismissed = dismissed.len(),
            "Nudge selector created"
        );

        Self {
            catalog,
            state,
            dismissed,
            shown: HashSet::new(),
            pending: HashSet::new(),
            store,
            observer: Arc::new(NoopObserver),
            dispatcher: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn NudgeObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn dismissed(&self) -> &BTreeSet<String> {
        &self.dismissed
    }

    pub fn shown(&self) -> &HashSet<String> {
        &self.shown
    }

    pub fn is_dismissed(&self, identity: &str) -> bool {
        self.dismissed.contains(identity)
    }

    pub fn is_pending(&self, identity: &str) -> bool {
        self.pending.contains(identity)
    }

    // ── Inbound signals ──────────────────────────────────────────────

    pub fn track_message(&mut self) {
        self.track_message_at(Utc::now());
    }

    pub fn track_message_at(&mut self, now: DateTime<Utc>) {
        self.state.record_message(now);
        debug!(message_count = self.state.message_count, "Message tracked");
    }

    pub fn track_tier_change(&mut self, tier: &str) {
        self.track_tier_change_at(tier, Utc::now());
    }

    pub fn track_tier_change_at(&mut self, tier: &str, now: DateTime<Utc>) {
        self.state.record_tier_change(tier, now);
        debug!(
            tier,
            tier_change_count = self.state.tier_change_count,
            "Tier change tracked"
        );
    }

    pub fn track_interaction(&mut self) {
        self.track_interaction_at(Utc::now());
    }

    pub fn track_interaction_at(&mut self, now: DateTime<Utc>) {
        self.state.touch(now);
    }

    // ── Evaluation ───────────────────────────────────────────────────

    pub fn check_nudges(&mut self) -> Option<Selection> {
        self.check_nudges_at(Utc::now())
    }

    /// Run one evaluation pass and pick at most one rule.
    ///
    /// The returned selection is marked pending; hand it to
    /// [`NudgeSelector::surface`] after `delay_ms`.
    pub fn check_nudges_at(&mut self, now: DateTime<Utc>) -> Option<Selection> {
        let mut candidates: Vec<&NudgeRule> = Vec::new();
        for rule in self.catalog.iter() {
            if self.dismissed.contains(&rule.id) {
                continue;
            }
            match guarded(|| rule.trigger.evaluate(&self.state, now)) {
                Ok(true) => candidates.push(rule),
                Ok(false) => {}
                Err(e) => {
                    warn!(rule_id = %rule.id, error = %e, "Nudge trigger failed; treating as not triggered");
                }
            }
        }

        // Stable: equal priorities keep catalog order.
        candidates.sort_by_key(|rule| Reverse(rule.priority));
        let rule = *candidates.first()?;

        let identity = match guarded(|| rule.identity(&self.state, now)) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(rule_id = %rule.id, error = %e, "Nudge repeat key failed; skipping this tick");
                return None;
            }
        };

        if self.shown.contains(&identity)
            || self.dismissed.contains(&identity)
            || self.pending.contains(&identity)
        {
            debug!(rule_id = %rule.id, identity = %identity, "Top nudge already handled");
            return None;
        }

        let selection = Selection {
            rule_id: rule.id.clone(),
            identity,
            priority: rule.priority,
            delay_ms: rule.delay_ms,
            once: rule.once,
            content: rule.content.clone(),
            selected_at: now,
        };
        debug!(
            rule_id = %selection.rule_id,
            identity = %selection.identity,
            priority = selection.priority,
            candidates = candidates.len(),
            "Nudge selected"
        );
        self.pending.insert(selection.identity.clone());
        Some(selection)
    }

    pub fn surface(&mut self, selection: &Selection) -> Option<SurfacedNudge> {
        self.surface_at(selection, Utc::now())
    }

    /// Surface a selection made earlier by `check_nudges`.
    ///
    /// Returns `None` if this identity was already surfaced in this process.
    pub fn surface_at(&mut self, selection: &Selection, now: DateTime<Utc>) -> Option<SurfacedNudge> {
        self.pending.remove(&selection.identity);
        if !self.shown.insert(selection.identity.clone()) {
            debug!(identity = %selection.identity, "Nudge already surfaced");
            return None;
        }

        // Persist before the observer runs so the record is durable the
        // moment the nudge becomes visible.
        if selection.once && self.dismissed.insert(selection.rule_id.clone()) {
            self.persist();
        }

        let nudge = SurfacedNudge {
            rule_id: selection.rule_id.clone(),
            identity: selection.identity.clone(),
            content: selection.content.clone(),
            surfaced_at: now,
        };
        info!(rule_id = %nudge.rule_id, identity = %nudge.identity, "Nudge surfaced");
        self.observer.on_surfaced(&nudge);
        Some(nudge)
    }

    /// Evaluate and surface immediately, ignoring `delay_ms`.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> Option<SurfacedNudge> {
        let selection = self.check_nudges_at(now)?;
        self.surface_at(&selection, now)
    }

    // ── Resolution ───────────────────────────────────────────────────

    /// Permanently dismiss `identity` (a static id or a repeat key value).
    pub fn dismiss(&mut self, identity: &str) {
        self.resolve(identity, Resolution::Dismissed);
    }

    /// Handle a user action on a surfaced nudge.
    ///
    /// Every action ends the nudge: non-dismiss actions are dispatched and
    /// then recorded as a dismissal with an `Acted` resolution.
    pub fn handle_action(&mut self, identity: &str, action: &NudgeAction) -> Resolution {
        let resolution = match action.kind {
            ActionKind::Dismiss => Resolution::Dismissed,
            ActionKind::Unknown => {
                debug!(identity, parameter = ?action.parameter, "Unrecognized nudge action");
                Resolution::acted(action)
            }
            kind => {
                match &self.dispatcher {
                    Some(dispatcher) => dispatcher.dispatch(identity, action),
                    None => debug!(identity, kind = %kind, "No action dispatcher registered"),
                }
                Resolution::acted(action)
            }
        };
        self.resolve(identity, resolution.clone());
        resolution
    }

    fn resolve(&mut self, identity: &str, resolution: Resolution) {
        if self.dismissed.insert(identity.to_string()) {
            self.persist();
        }
        info!(identity, outcome = resolution.label(), "Nudge resolved");
        self.observer.on_resolved(identity, &resolution);
    }

    // ── Reset ────────────────────────────────────────────────────────

    pub fn reset(&mut self) {
        self.reset_at(Utc::now());
    }

    /// Clear all session state, the in-memory sets and the persisted record.
    pub fn reset_at(&mut self, now: DateTime<Utc>) {
        let session_id = self.state.session_id;
        self.state = SessionState::new(now);
        self.state.session_id = session_id;
        self.dismissed.clear();
        self.shown.clear();
        self.pending.clear();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted dismissed nudges");
        }
        info!(session_id = %session_id, "Nudge selector reset");
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.dismissed) {
            warn!(error = %e, dismissed = self.dismissed.len(), "Failed to persist dismissed nudges");
        }
    }
}

impl std::fmt::Debug for NudgeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NudgeSelector")
            .field("state", &self.state)
            .field("rules", &self.catalog.len())
            .field("dismissed", &self.dismissed)
            .field("shown", &self.shown)
            .field("pending", &self.pending)
            .finish()
    }
}

/// Run rule code, turning a panic into a `TriggerError`.
fn guarded<T>(f: impl FnOnce() -> Result<T, TriggerError>) -> Result<T, TriggerError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(TriggerError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{NudgeContent, RepeatKey, Trigger};
    use crate::storage::MemoryStore;
    use chrono::Duration;
    use std::sync::Mutex;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-05T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn rule(id: &str, priority: i32, trigger: Trigger) -> NudgeRule {
        NudgeRule::new(id, trigger, NudgeContent::new("", id, "")).with_priority(priority)
    }

    fn selector(rules: Vec<NudgeRule>, store: MemoryStore) -> NudgeSelector {
        NudgeSelector::with_store(Catalog::new(rules).unwrap(), Arc::new(store), t0())
    }

    #[derive(Default)]
    struct Recorder {
        surfaced: Mutex<Vec<String>>,
        resolved: Mutex<Vec<(String, Resolution)>>,
        dispatched: Mutex<Vec<(String, NudgeAction)>>,
    }

    impl NudgeObserver for Recorder {
        fn on_surfaced(&self, nudge: &SurfacedNudge) {
            self.surfaced.lock().unwrap().push(nudge.identity.clone());
        }

        fn on_resolved(&self, identity: &str, resolution: &Resolution) {
            self.resolved
                .lock()
                .unwrap()
                .push((identity.to_string(), resolution.clone()));
        }
    }

    impl ActionDispatcher for Recorder {
        fn dispatch(&self, identity: &str, action: &NudgeAction) {
            self.dispatched
                .lock()
                .unwrap()
                .push((identity.to_string(), action.clone()));
        }
    }

    #[test]
    fn higher_priority_wins() {
        let mut s = selector(
            vec![
                rule("A", 10, Trigger::MessageCountEquals { count: 0 }),
                rule("B", 90, Trigger::MessageCountEquals { count: 0 }),
            ],
            MemoryStore::new(),
        );
        let selection = s.check_nudges_at(t0()).unwrap();
        assert_eq!(selection.rule_id, "B");
    }

    #[test]
    fn ties_keep_catalog_order() {
        let mut s = selector(
            vec![
                rule("first", 5, Trigger::Always),
                rule("second", 5, Trigger::Always),
            ],
            MemoryStore::new(),
        );
        assert_eq!(s.check_nudges_at(t0()).unwrap().rule_id, "first");
    }

    #[test]
    fn nothing_triggered_selects_nothing() {
        let mut s = selector(vec![rule("never", 1, Trigger::Never)], MemoryStore::new());
        assert!(s.check_nudges_at(t0()).is_none());
    }

    #[test]
    fn pending_selection_is_not_reselected() {
        let mut s = selector(vec![rule("a", 1, Trigger::Always)], MemoryStore::new());
        let selection = s.check_nudges_at(t0()).unwrap();
        assert!(s.is_pending("a"));
        assert!(s.check_nudges_at(t0()).is_none());

        s.surface_at(&selection, t0()).unwrap();
        assert!(!s.is_pending("a"));
        assert!(s.check_nudges_at(t0()).is_none(), "shown identity must not reappear");
    }

    #[test]
    fn surfacing_twice_notifies_once() {
        let recorder = Arc::new(Recorder::default());
        let mut s = selector(vec![rule("a", 1, Trigger::Always)], MemoryStore::new())
            .with_observer(recorder.clone());
        let selection = s.check_nudges_at(t0()).unwrap();
        assert!(s.surface_at(&selection, t0()).is_some());
        assert!(s.surface_at(&selection, t0()).is_none());
        assert_eq!(*recorder.surfaced.lock().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn once_rule_is_persisted_on_surface() {
        let store = MemoryStore::new();
        let mut s = selector(
            vec![rule("welcome", 1, Trigger::Always).once().with_delay_ms(2_000)],
            store.clone(),
        );
        let selection = s.check_nudges_at(t0()).unwrap();
        assert!(!store.snapshot().contains("welcome"));

        s.surface_at(&selection, t0() + Duration::seconds(2));
        assert!(s.is_dismissed("welcome"));
        assert!(store.snapshot().contains("welcome"));
    }

    #[test]
    fn non_once_rule_is_not_persisted_on_surface() {
        let store = MemoryStore::new();
        let mut s = selector(vec![rule("tip", 1, Trigger::Always)], store.clone());
        s.tick_at(t0()).unwrap();
        assert!(!s.is_dismissed("tip"));
        assert!(!store.is_persisted());
    }

    #[test]
    fn dismissed_static_id_is_skipped_and_lower_rule_wins() {
        let mut s = selector(
            vec![
                rule("low", 1, Trigger::Always),
                rule("high", 9, Trigger::Always),
            ],
            MemoryStore::with_ids(["high"]),
        );
        assert_eq!(s.tick_at(t0()).unwrap().rule_id, "low");
    }

    #[test]
    fn throwing_and_panicking_triggers_are_isolated() {
        let mut s = selector(
            vec![
                rule(
                    "broken",
                    100,
                    Trigger::predicate("err", |_, _| Err(TriggerError::Predicate("boom".into()))),
                ),
                rule(
                    "panicky",
                    99,
                    Trigger::predicate("panic", |_, _| panic!("predicate exploded")),
                ),
                rule("healthy", 1, Trigger::Always),
            ],
            MemoryStore::new(),
        );
        assert_eq!(s.tick_at(t0()).unwrap().rule_id, "healthy");
    }

    #[test]
    fn failing_repeat_key_skips_tick() {
        let mut s = selector(
            vec![rule("keyed", 1, Trigger::Always).with_repeat_key(RepeatKey::function(
                "bad",
                |_, _, _| Err(TriggerError::Predicate("no key".into())),
            ))],
            MemoryStore::new(),
        );
        assert!(s.check_nudges_at(t0()).is_none());
    }

    #[test]
    fn dynamic_identities_fire_independently() {
        let mut s = selector(
            vec![rule("idle-reminder", 1, Trigger::IdleAtLeast { minutes: 5 })
                .with_repeat_key(RepeatKey::IdleBucket { minutes: 5 })],
            MemoryStore::new(),
        );
        assert!(s.tick_at(t0() + Duration::minutes(1)).is_none());
        assert_eq!(
            s.tick_at(t0() + Duration::minutes(5)).unwrap().identity,
            "idle-reminder-1"
        );
        assert!(s.tick_at(t0() + Duration::minutes(7)).is_none());
        assert_eq!(
            s.tick_at(t0() + Duration::minutes(10)).unwrap().identity,
            "idle-reminder-2"
        );
    }

    #[test]
    fn dismissing_dynamic_identity_blocks_only_that_occurrence() {
        let mut s = selector(
            vec![rule("streak", 1, Trigger::Always)
                .with_repeat_key(RepeatKey::MessageBucket { every: 2 })],
            MemoryStore::new(),
        );
        s.dismiss("streak-0");
        assert!(s.check_nudges_at(t0()).is_none());

        s.track_message_at(t0());
        s.track_message_at(t0());
        assert_eq!(s.tick_at(t0()).unwrap().identity, "streak-1");
    }

    #[test]
    fn dismiss_persists_and_notifies() {
        let recorder = Arc::new(Recorder::default());
        let store = MemoryStore::new();
        let mut s = selector(vec![rule("a", 1, Trigger::Always)], store.clone())
            .with_observer(recorder.clone());

        s.dismiss("a");
        assert!(store.snapshot().contains("a"));
        assert_eq!(
            *recorder.resolved.lock().unwrap(),
            vec![("a".to_string(), Resolution::Dismissed)]
        );
        assert!(s.check_nudges_at(t0()).is_none());
    }

    #[test]
    fn actions_dispatch_then_dismiss() {
        let recorder = Arc::new(Recorder::default());
        let mut s = selector(vec![rule("tier-tip", 1, Trigger::Always)], MemoryStore::new())
            .with_observer(recorder.clone())
            .with_dispatcher(recorder.clone());

        let action = NudgeAction::with_param(ActionKind::SwitchTier, "budget");
        let resolution = s.handle_action("tier-tip", &action);

        assert_eq!(
            resolution,
            Resolution::Acted {
                kind: ActionKind::SwitchTier,
                parameter: Some("budget".into())
            }
        );
        assert_eq!(
            *recorder.dispatched.lock().unwrap(),
            vec![("tier-tip".to_string(), action)]
        );
        assert!(s.is_dismissed("tier-tip"));
        assert_eq!(recorder.resolved.lock().unwrap().len(), 1);
    }

    #[test]
    fn dismiss_action_is_not_dispatched() {
        let recorder = Arc::new(Recorder::default());
        let mut s = selector(vec![rule("a", 1, Trigger::Always)], MemoryStore::new())
            .with_dispatcher(recorder.clone());
        assert_eq!(s.handle_action("a", &NudgeAction::dismiss()), Resolution::Dismissed);
        assert!(recorder.dispatched.lock().unwrap().is_empty());
        assert!(s.is_dismissed("a"));
    }

    #[test]
    fn unknown_action_only_dismisses() {
        let recorder = Arc::new(Recorder::default());
        let mut s = selector(vec![rule("a", 1, Trigger::Always)], MemoryStore::new())
            .with_dispatcher(recorder.clone());
        let action = NudgeAction::new(ActionKind::Unknown, Some("x".into()));
        let resolution = s.handle_action("a", &action);
        assert_eq!(resolution.label(), "acted");
        assert!(recorder.dispatched.lock().unwrap().is_empty());
        assert!(s.is_dismissed("a"));
    }

    #[test]
    fn corrupt_record_loads_as_empty() {
        let store = MemoryStore::with_ids(["a"]);
        store.set_fail_reads(true);
        let mut s = selector(vec![rule("a", 1, Trigger::Always)], store);
        assert!(s.dismissed().is_empty());
        assert_eq!(s.tick_at(t0()).unwrap().rule_id, "a");
    }

    #[test]
    fn save_failure_keeps_memory_authoritative() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let mut s = selector(vec![rule("a", 1, Trigger::Always)], store.clone());
        s.dismiss("a");
        assert!(s.is_dismissed("a"));
        assert!(s.check_nudges_at(t0()).is_none());

        store.set_fail_writes(false);
        s.dismiss("b");
        assert_eq!(store.snapshot().len(), 2, "next save reconciles the record");
    }

    #[test]
    fn reset_clears_everything() {
        let store = MemoryStore::new();
        let mut s = selector(vec![rule("a", 1, Trigger::Always).once()], store.clone());
        s.track_message_at(t0());
        s.track_tier_change_at("frontier", t0());
        s.tick_at(t0()).unwrap();
        assert!(store.is_persisted());

        let session_id = s.state().session_id;
        s.reset_at(t0() + Duration::minutes(1));
        assert_eq!(s.state().message_count, 0);
        assert_eq!(s.state().tier_change_count, 0);
        assert_eq!(s.state().current_tier, crate::session::DEFAULT_TIER);
        assert_eq!(s.state().session_id, session_id);
        assert!(s.dismissed().is_empty());
        assert!(s.shown().is_empty());
        assert!(!store.is_persisted());
        assert_eq!(s.tick_at(t0() + Duration::minutes(1)).unwrap().rule_id, "a");
    }

    #[test]
    fn panic_message_extracts_strings() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
