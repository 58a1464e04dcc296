//! Position management: open position record, exit state machine and the
//! ratchet invariant.
//!
//! **Key Design Principles:**
//! 1. The exit machine emits actions, never fills; the engine turns them into
//!    execution requests
//! 2. **Ratchet invariant**: stops may tighten, never loosen (even if ATR expands)
//! 3. Remaining size only shrinks and is exactly 0 after a full close

pub mod exit_machine;
pub mod position;
pub mod ratchet;

pub use exit_machine::{ExitAction, ExitMachine, ExitOutcome, ExitTick};
pub use position::{ClosedTrade, ExitPhase, Position, PositionSummary};
pub use ratchet::StopRatchet;
