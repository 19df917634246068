//! # Localisation messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::Header;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A planar pose: position on the XY plane and heading about Z.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq)]
pub struct Pose2 {
    /// Position along the frame's X axis
    ///
    /// Units: meters
    pub x_m: f64,

    /// Position along the frame's Y axis
    ///
    /// Units: meters
    pub y_m: f64,

    /// Angle to the positive X axis, right hand rule about Z
    ///
    /// Units: radians
    pub heading_rad: f64,
}

/// An odometry update from the localisation system.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Odometry {
    /// Frame and time of the estimate
    pub header: Header,

    /// Pose of the robot body in `header.frame_id`
    pub pose: Pose2,

    /// Longitudinal speed of the body
    ///
    /// Units: meters/second
    pub linear_ms: f64,

    /// Rate of turn of the body
    ///
    /// Units: radians/second
    pub angular_rads: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pose2 {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            x_m,
            y_m,
            heading_rad,
        }
    }

    /// Euclidean distance between the positions of two poses.
    pub fn dist_to(&self, other: &Pose2) -> f64 {
        (self.x_m - other.x_m).hypot(self.y_m - other.y_m)
    }
}
