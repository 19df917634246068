//! # Active path
//!
//! A reference path which has been accepted for tracking. Paths are immutable once accepted, a
//! new path replaces the active one wholesale.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::msg::{Header, Pose2, RefPath};
use serde::Serialize;

use super::tracker::find_closest;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A path instance being tracked.
#[derive(Debug, Clone, Serialize)]
pub struct ActivePath {
    /// Sequence number of this path instance, unique within the executable's lifetime
    pub path_seq: u64,

    /// Frame in which the points are expressed
    pub frame_id: String,

    /// Path points in the common frame
    pub points: Vec<Pose2>,

    /// Target speed along the path
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// The last point of the path
    pub goal: Pose2,

    /// Index of the closest point to the robot when the path was accepted
    pub start_index: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ActivePath {
    /// Build a new path instance, scanning for the closest point to `position` from the start of
    /// the path.
    ///
    /// Returns `None` if there are no points.
    pub fn new(
        path_seq: u64,
        frame_id: &str,
        points: Vec<Pose2>,
        speed_ms: f64,
        position: &Pose2,
        window: usize,
    ) -> Option<Self> {
        let goal = *points.last()?;
        let start_index = find_closest(&points, position, 0, window);

        Some(Self {
            path_seq,
            frame_id: frame_id.into(),
            points,
            speed_ms,
            goal,
            start_index,
        })
    }

    /// The remaining part of the path from `index` to the end.
    pub fn remaining(&self, index: usize) -> &[Pose2] {
        &self.points[index.min(self.points.len())..]
    }

    /// Build the reference message, the part of the path from the start index to the goal.
    pub fn reference(&self) -> RefPath {
        RefPath {
            header: Header::now(&self.frame_id),
            path_seq: self.path_seq,
            poses: self.remaining(self.start_index).to_vec(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_path() {
        let points: Vec<Pose2> = (0..10).map(|i| Pose2::new(i as f64, 1.0, 0.0)).collect();

        let path = ActivePath::new(4, "odom", points, 0.3, &Pose2::new(3.2, 0.0, 0.0), 50).unwrap();
        assert_eq!(path.start_index, 3);
        assert_eq!(path.goal, Pose2::new(9.0, 1.0, 0.0));

        let reference = path.reference();
        assert_eq!(reference.path_seq, 4);
        assert_eq!(reference.header.frame_id, "odom");
        assert_eq!(reference.poses.len(), 7);
        assert_eq!(reference.poses[0], Pose2::new(3.0, 1.0, 0.0));

        assert!(path.remaining(20).is_empty());
        assert!(ActivePath::new(5, "odom", vec![], 0.3, &Pose2::default(), 50).is_none());
    }
}
