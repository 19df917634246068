//! # Localisation module
//!
//! Holds the most recent localisation estimate of the robot. Estimates are never merged, each
//! odometry update overwrites the previous one wholesale.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use comms_if::msg::{Odometry, Pose2};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Body rates of the robot.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    /// Units: meters/second
    pub linear_ms: f64,

    /// Units: radians/second
    pub angular_rads: f64,
}

/// The last localisation estimate received.
#[derive(Debug, Clone, PartialEq)]
pub struct LocEstimate {
    /// Frame the pose is expressed in
    pub frame_id: String,

    /// Time at which the estimate was valid
    pub stamp: DateTime<Utc>,

    pub pose: Pose2,

    pub velocity: Velocity,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl From<&Odometry> for LocEstimate {
    fn from(odom: &Odometry) -> Self {
        Self {
            frame_id: odom.header.frame_id.clone(),
            stamp: odom.header.stamp,
            pose: odom.pose,
            velocity: Velocity {
                linear_ms: odom.linear_ms,
                angular_rads: odom.angular_rads,
            },
        }
    }
}
