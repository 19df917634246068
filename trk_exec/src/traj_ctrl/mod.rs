//! # Trajectory control module
//!
//! Trajectory control keeps the robot on the active reference path. Every control tick:
//!
//! 1. The progress index, the closest path point to the robot, is advanced along the path. The
//!    search is bounded to a window of points ahead of the current index and never goes back.
//! 2. The remaining path is expressed in the robot frame, with X along the robot's heading, and a
//!    polynomial is fitted to it. The cross track error is the value of the polynomial at the
//!    robot and the heading error the angle of its slope.
//! 3. The optimizer state is built from these errors and the current speed, optionally projected
//!    forward by one control period to compensate for the delay before a new command acts.
//! 4. The optimizer computes angular rate and acceleration demands, the acceleration is integrated
//!    into a speed which is clamped to the allowed range.
//!
//! Fitting or optimizer faults hold the previous command, too many in a row command a stop.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod curve;
pub mod governor;
pub mod params;
pub mod path;
pub mod predict;
pub mod state;
pub mod tracker;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use curve::*;
pub use governor::*;
pub use params::*;
pub use path::*;
pub use predict::*;
pub use state::*;
pub use tracker::*;
