//! Entry decision: gate state × trigger count × protection permit.

use serde::Serialize;

use super::triggers::TriggerSet;
use crate::gate::GateState;

/// Per-tick entry decision. Stateless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySignal {
    pub fire: bool,
    pub trigger_count: usize,
    pub tag: String,
}

/// Attribution tag for a trigger count ("confirm_2", "confirm_3", ...).
pub fn confirmation_tag(trigger_count: usize) -> String {
    format!("confirm_{trigger_count}")
}

/// Fire only when the gate is open, enough triggers agree and no cooldown
/// blocks the instrument.
pub fn compose(
    gate: GateState,
    triggers: &TriggerSet,
    min_trigger_count: usize,
    entry_permitted: bool,
) -> EntrySignal {
    let trigger_count = triggers.count();
    EntrySignal {
        fire: gate == GateState::Open && trigger_count >= min_trigger_count && entry_permitted,
        trigger_count,
        tag: confirmation_tag(trigger_count),
    }
}
