//! Ratchet invariant enforcement
//!
//! **Core Rule:** the stop of a long position may rise, never fall, even if
//! ATR expands after a favorable move.

/// Monotonic stop level for a long position.
#[derive(Debug, Clone, PartialEq)]
pub struct StopRatchet {
    level: f64,
}

impl StopRatchet {
    pub fn with_initial_level(initial_level: f64) -> Self {
        Self {
            level: initial_level,
        }
    }

    /// Apply a proposed level and return the ratcheted one.
    ///
    /// A NaN proposal (e.g. ATR unavailable) leaves the stop unchanged.
    ///
    /// # Example
    /// ```
    /// use rebound_core::position_management::StopRatchet;
    ///
    /// let mut stop = StopRatchet::with_initial_level(95.0);
    /// assert_eq!(stop.apply(100.0), 100.0);
    /// assert_eq!(stop.apply(90.0), 100.0);
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        if proposed > self.level {
            self.level = proposed;
        }
        self.level
    }

    pub fn level(&self) -> f64 {
        self.level
    }
}
