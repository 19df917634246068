//! # Path tracker library
//!
//! Closed loop control core of the MPC path tracker. Given localisation updates and a reference
//! path with a target speed, trajectory control produces a velocity command at a fixed rate which
//! steers the robot along the path.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod data_store;
pub mod frame;
pub mod loc;
pub mod node;
pub mod optimizer;
pub mod params;
pub mod path_store;
pub mod sim;
pub mod traj_ctrl;
