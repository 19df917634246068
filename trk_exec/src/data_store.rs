//! # Data Store
//!
//! State shared between the localisation, path, and control tick handlers. The store is kept
//! behind a single lock by the node, handlers hold that lock only for short updates and the
//! control tick works from a snapshot.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    loc::LocEstimate,
    traj_ctrl::{self, ActivePath, TrackingState},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Debug, Default)]
pub struct DataStore {
    // Localisation
    /// Latest localisation estimate
    pub loc: Option<LocEstimate>,

    // Path
    /// The path currently tracked. Replaced wholesale when a new path is accepted.
    pub path: Option<Arc<ActivePath>>,

    /// Sequence number given to the last accepted path
    pub last_path_seq: u64,

    /// Path updates are not processed before this instant
    pub path_backoff_until: Option<Instant>,

    // Tracking flags
    /// A path update has been received and its goal not yet reached
    pub goal_received: bool,

    /// The goal of the active path has been reached
    pub goal_reached: bool,

    /// The active path has been successfully computed
    pub path_computed: bool,

    // Monitoring counters
    /// Number of path updates rejected because a transform was unavailable
    pub num_tf_failures: u64,

    /// Number of heading jumps seen in received paths
    pub num_heading_jumps: u64,

    /// Number of consecutive control tick overruns
    pub num_consec_cycle_overruns: u64,

    /// Number of ticks skipped because the previous tick was still running
    pub num_skipped_ticks: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Store a new localisation estimate, checking whether it places the robot at the goal.
    ///
    /// Returns true if the goal was reached by this update.
    pub fn update_loc(&mut self, loc: LocEstimate, goal_radius_m: f64) -> bool {
        let mut reached = false;

        if self.goal_received {
            if let Some(ref path) = self.path {
                let dist_m = path.goal.dist_to(&loc.pose);

                if dist_m < goal_radius_m {
                    info!(
                        "Goal of path {} reached, {:.3} m from the goal",
                        path.path_seq, dist_m
                    );
                    self.goal_received = false;
                    self.goal_reached = true;
                    self.path_computed = false;
                    reached = true;
                }
            }
        }

        self.loc = Some(loc);

        reached
    }

    /// Mark that a path update has been received, before it is processed.
    pub fn begin_path_update(&mut self) {
        self.goal_received = true;
        self.goal_reached = false;
    }

    /// Make the given path the active one.
    pub fn accept_path(&mut self, path: ActivePath) {
        self.last_path_seq = path.path_seq;
        self.path = Some(Arc::new(path));
        self.goal_received = true;
        self.goal_reached = false;
        self.path_computed = true;
        self.path_backoff_until = None;
    }

    /// The sequence number the next accepted path will have.
    pub fn next_path_seq(&self) -> u64 {
        self.last_path_seq + 1
    }

    pub fn tracking_state(&self) -> TrackingState {
        TrackingState::from_flags(self.goal_received, self.goal_reached, self.path_computed)
    }

    /// Capture the inputs of a control tick.
    pub fn snapshot(&self) -> traj_ctrl::InputData {
        traj_ctrl::InputData {
            tracking: self.tracking_state(),
            loc: self.loc.clone(),
            path: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::Velocity;
    use chrono::Utc;
    use comms_if::msg::Pose2;

    fn loc(x_m: f64) -> LocEstimate {
        LocEstimate {
            frame_id: "odom".into(),
            stamp: Utc::now(),
            pose: Pose2::new(x_m, 0.0, 0.0),
            velocity: Velocity::default(),
        }
    }

    fn path(seq: u64) -> ActivePath {
        let points = (0..5).map(|i| Pose2::new(i as f64, 0.0, 0.0)).collect();
        ActivePath::new(seq, "odom", points, 0.5, &Pose2::default(), 50).unwrap()
    }

    #[test]
    fn test_goal_reached_transition() {
        let mut ds = DataStore::default();
        assert_eq!(ds.tracking_state(), TrackingState::Idle);

        ds.begin_path_update();
        assert_eq!(ds.tracking_state(), TrackingState::Idle);

        ds.accept_path(path(ds.next_path_seq()));
        assert_eq!(ds.last_path_seq, 1);
        assert_eq!(ds.tracking_state(), TrackingState::Tracking);

        // Outside the radius
        assert!(!ds.update_loc(loc(3.0), 0.5));
        assert_eq!(ds.tracking_state(), TrackingState::Tracking);

        // Inside the radius
        assert!(ds.update_loc(loc(3.6), 0.5));
        assert_eq!(ds.tracking_state(), TrackingState::GoalReached);
        assert!(!ds.goal_received && ds.goal_reached && !ds.path_computed);

        // Only transitions once
        assert!(!ds.update_loc(loc(4.0), 0.5));
        assert_eq!(ds.tracking_state(), TrackingState::GoalReached);

        // A new path update resumes tracking
        ds.begin_path_update();
        ds.accept_path(path(ds.next_path_seq()));
        assert_eq!(ds.tracking_state(), TrackingState::Tracking);

        let snap = ds.snapshot();
        assert_eq!(snap.tracking, TrackingState::Tracking);
        assert_eq!(snap.path.map(|p| p.path_seq), Some(2));
        assert_eq!(snap.loc.map(|l| l.pose.x_m), Some(4.0));
    }

    #[test]
    fn test_no_goal_without_path() {
        let mut ds = DataStore::default();

        ds.begin_path_update();
        assert!(!ds.update_loc(loc(0.0), 0.5));
        assert!(ds.goal_received);
        assert_eq!(ds.tracking_state(), TrackingState::Idle);
    }
}
