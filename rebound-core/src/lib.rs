//! Rebound Core: a long-only decision engine for buying capitulation
//! rebounds on crypto spot markets.
//!
//! On every closed candle the engine:
//! - Computes indicators over trailing windows (main and reference timeframe)
//! - Opens or closes the market gate from reference-timeframe regime detectors
//! - Counts independent entry triggers on the main timeframe
//! - Fires an entry when the gate is open, enough triggers agree, and no
//!   circuit breaker is active; the stake is scaled to current volatility
//! - Walks each open position through a staged exit state machine
//!
//! The engine never places orders. It emits [`domain::ExecutionRequest`]s
//! and a [`engine::TickDiagnostics`] record per tick.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod gate;
pub mod indicators;
pub mod position_management;
pub mod protection;
pub mod signals;
pub mod sizers;

pub use config::StrategyConfig;
pub use engine::{Engine, InstrumentEngine, TickInput, TickOutcome};
pub use error::{ConfigError, EngineError};
