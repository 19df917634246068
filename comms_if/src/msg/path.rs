//! # Path messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{Header, Pose2};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A reference path along with the speed at which it should be followed.
///
/// Every new `PathSpeed` fully replaces the previous one, there are no incremental edits.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PathSpeed {
    /// Frame the poses are declared in and the time they were produced
    pub header: Header,

    /// Ordered poses making up the path
    pub poses: Vec<Pose2>,

    /// Target speed along the path
    ///
    /// Units: meters/second
    pub speed_ms: f64,
}

/// The reference sub-path actually being tracked, expressed in the common (odometry) frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RefPath {
    pub header: Header,

    /// Sequence number of the path instance this reference was cut from
    pub path_seq: u64,

    pub poses: Vec<Pose2>,
}
