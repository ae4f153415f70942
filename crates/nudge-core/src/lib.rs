//! # Nudge Core Library
//!
//! Decides which small, dismissible suggestion ("nudge") a chat client
//! should show, and when. The host feeds in activity signals (messages,
//! tier changes, generic interactions); the engine evaluates a declarative
//! rule catalog on a periodic tick and surfaces at most one nudge per tick.
//!
//! ## Architecture
//!
//! - **Rules**: plain-data triggers, content and display policy
//! - **Catalog**: ordered, validated rule table (built-in or TOML)
//! - **Selector**: single-session evaluate/prioritize/dedupe engine. Like a
//!   wall-clock state machine, it does not own threads
//! - **Runner**: tokio driver calling the selector on an interval
//! - **Storage**: durable dismissal record and TOML configuration
//!
//! ## Key Components
//!
//! - [`NudgeSelector`]: selection engine
//! - [`NudgeRunner`]: periodic driver
//! - [`Catalog`]: rule table
//! - [`DismissalStore`]: persistence collaborator
//! - [`NudgeConfig`]: application configuration

pub mod catalog;
pub mod error;
pub mod rules;
pub mod runner;
pub mod selector;
pub mod session;
pub mod storage;

pub use catalog::Catalog;
pub use error::{ConfigError, CoreError, StoreError, TriggerError, ValidationError};
pub use rules::{
    ActionKind, NudgeAction, NudgeButton, NudgeContent, NudgeRule, RepeatKey, Trigger,
};
pub use runner::{lock_selector, NudgeRunner, RunnerState, SharedSelector};
pub use selector::{
    ActionDispatcher, NoopObserver, NudgeObserver, NudgeSelector, Resolution, Selection,
    SurfacedNudge,
};
pub use session::SessionState;
pub use storage::{DismissalStore, JsonFileStore, MemoryStore, NudgeConfig};
