//! Nudge rule model.
//!
//! Rules are plain data: a trigger, display content, and a display policy.
//! The selection algorithm never branches on individual rules.

pub mod action;
pub mod repeat;
pub mod rule;
pub mod trigger;

pub use action::{ActionKind, NudgeAction, NudgeButton};
pub use repeat::{KeyFunction, RepeatKey};
pub use rule::{NudgeContent, NudgeRule};
pub use trigger::{Predicate, Trigger};
