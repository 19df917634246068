//! # Waypoint tracker
//!
//! Tracks the robot's progress along the active path as an index into the path's points. The
//! index only ever moves forward while the same path instance is being followed, and is reset
//! whenever a new path instance becomes active.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::msg::Pose2;
use log::trace;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Progress tracker for a single path instance at a time.
#[derive(Debug, Clone)]
pub struct WaypointTracker {
    /// Number of points searched ahead of the current index
    window: usize,

    /// Sequence number of the path instance the index refers to
    path_seq: Option<u64>,

    /// Index of the last known closest point
    index: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WaypointTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            path_seq: None,
            index: 0,
        }
    }

    /// The current progress index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Make sure the tracker refers to the given path instance.
    ///
    /// If the instance differs from the one currently tracked the index is reset to the start
    /// index computed when the path was accepted.
    pub fn sync(&mut self, path_seq: u64, start_index: usize) {
        if self.path_seq != Some(path_seq) {
            trace!(
                "Tracking new path instance {} from index {}",
                path_seq,
                start_index
            );
            self.path_seq = Some(path_seq);
            self.index = start_index;
        }
    }

    /// Move the index forward to the closest point to `position` within the look-ahead window.
    pub fn advance(&mut self, points: &[Pose2], position: &Pose2) -> usize {
        let closest = find_closest(points, position, self.index, self.window);

        // `find_closest` never goes backwards, but the index is kept inside the path
        self.index = closest.max(self.index).min(points.len().saturating_sub(1));

        self.index
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the index of the point closest to `position`.
///
/// Only the points in `prior_index .. prior_index + window` are considered, so the result is never
/// less than `prior_index`. If no point is in that range `prior_index` is returned.
pub fn find_closest(points: &[Pose2], position: &Pose2, prior_index: usize, window: usize) -> usize {
    let end = prior_index.saturating_add(window).min(points.len());

    let mut min_dist_m = std::f64::INFINITY;
    let mut min_idx = prior_index;

    for (i, point) in points.iter().enumerate().take(end).skip(prior_index) {
        let dist_m = point.dist_to(position);

        if dist_m < min_dist_m {
            min_dist_m = dist_m;
            min_idx = i;
        }
    }

    min_idx
}

/// Count the consecutive path headings which differ by more than `threshold_rad`.
///
/// The differences are not wrapped, so a jump across the +/- pi boundary is counted. This is a
/// diagnostic only, no correction is made to the path.
pub fn count_heading_jumps(points: &[Pose2], threshold_rad: f64) -> usize {
    points
        .windows(2)
        .filter(|w| (w[1].heading_rad - w[0].heading_rad).abs() > threshold_rad)
        .count()
}
