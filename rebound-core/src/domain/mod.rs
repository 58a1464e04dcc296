//! Domain types for the rebound engine

pub mod candle;
pub mod ids;
pub mod request;

pub use candle::{first_out_of_order, Candle};
pub use ids::{ConfigHash, InstrumentId, PositionId};
pub use request::{ExecutionRequest, ExitReason};
