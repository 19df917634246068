//! # Trajectory optimizer interface
//!
//! The control cycle treats the optimizer as an injected capability with a single `solve`
//! operation. Given the predicted state and the local curve it returns the angular rate and
//! acceleration to apply now, along with the cost breakdown of the solution.
//!
//! [`ShootingOptimizer`] is a small solver bundled with the executable so it can run closed loop
//! on its own. Any other solver can be plugged in by implementing [`Optimizer`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod shooting;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use shooting::ShootingOptimizer;

use comms_if::msg::CostTm;

use crate::traj_ctrl::{MpcParams, MpcState};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A trajectory optimizer.
pub trait Optimizer: Send {
    /// Solve the optimal control problem for the given input.
    fn solve(&mut self, input: &OptimizerInput<'_>) -> Result<OptimizerOutput, OptimizerError>;

    /// Forget any state carried between solves, called when the tracked path changes or tracking
    /// stops.
    fn reset(&mut self) {}
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Input to one optimizer solve.
#[derive(Debug, Clone)]
pub struct OptimizerInput<'a> {
    /// Predicted state, `[x, y, heading, speed, cte, etheta]`
    pub state: MpcState,

    /// Local curve coefficients, lowest power first
    pub coeffs: &'a [f64],

    /// Tuning weights and bounds
    pub tuning: &'a MpcParams,

    /// Reference speed, taken from the active path
    pub ref_vel_ms: f64,

    /// Step length of the prediction horizon
    pub dt_s: f64,
}

/// Result of one optimizer solve.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct OptimizerOutput {
    /// First angular rate demand of the solution
    pub angvel_rads: f64,

    /// First acceleration demand of the solution
    pub accel_ms2: f64,

    /// Cost of the solution
    pub costs: CostTm,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum OptimizerError {
    #[error("Optimizer input is not finite")]
    InvalidInput,

    #[error("Optimizer produced a non-finite solution")]
    NonFiniteSolution,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl OptimizerOutput {
    /// True if every field of the output is finite.
    pub fn is_finite(&self) -> bool {
        self.angvel_rads.is_finite()
            && self.accel_ms2.is_finite()
            && self.costs.total.is_finite()
            && self.costs.cte.is_finite()
            && self.costs.etheta.is_finite()
    }
}
