//! Entry triggers and the signal composer.
//!
//! Triggers never see position or protection state; the composer is the
//! only place where gate, triggers and the protection permit meet.

pub mod composer;
pub mod triggers;

pub use composer::{compose, confirmation_tag, EntrySignal};
pub use triggers::{OversoldMemory, TriggerEvaluator, TriggerSet};
