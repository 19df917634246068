//! # Command and telemetry messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Velocity command sent to the base.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq)]
pub struct VelCmd {
    /// Demanded longitudinal speed
    ///
    /// Units: meters/second
    pub linear_ms: f64,

    /// Demanded rate of turn
    ///
    /// Units: radians/second
    pub angular_rads: f64,
}

/// Cost diagnostics reported by the trajectory optimizer.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq)]
pub struct CostTm {
    /// Total value of the objective
    pub total: f64,

    /// Cross track error contribution
    pub cte: f64,

    /// Heading error contribution
    pub etheta: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VelCmd {
    /// A command to bring the base to a full stop.
    pub fn stop() -> Self {
        Self::default()
    }

    pub fn is_stop(&self) -> bool {
        self.linear_ms == 0.0 && self.angular_rads == 0.0
    }
}
