//! # Frame transformation module
//!
//! Two transformations are needed to get a path into a form the curve fitter can use:
//!
//! 1. Path poses arrive in whatever frame the planner declared them in. They are converted into
//!    the common (odometry) frame through a [`FrameService`], the equivalent of a transform tree
//!    lookup. Lookups can fail if the transform is unknown or too old.
//! 2. Every control tick the poses in the common frame are rotated into the robot-local frame,
//!    with X pointing along the robot's heading, by [`to_local`]. This is stateless.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use comms_if::msg::Pose2;
use log::trace;
use parking_lot::{Condvar, Mutex};
use serde::Deserialize;

use util::{maths::wrap_pi, time::duration_to_seconds};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum depth of the frame tree walked during a lookup. Guards against cycles.
const MAX_TREE_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A service able to express poses given in one frame in another frame.
pub trait FrameService: Send + Sync {
    /// Transform `pose`, expressed in `from_frame`, into `to_frame` at the time `stamp`.
    fn transform_pose(
        &self,
        pose: &Pose2,
        from_frame: &str,
        to_frame: &str,
        stamp: DateTime<Utc>,
    ) -> Result<Pose2, TfError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A rigid planar transform.
///
/// Maps a point in the child frame into the parent frame: `p_parent = R(yaw) * p_child + t`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Deserialize)]
pub struct Transform2 {
    pub x_m: f64,
    pub y_m: f64,
    pub yaw_rad: f64,
}

/// A named static transform as it appears in the parameter file.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticTransform {
    pub parent: String,
    pub child: String,

    #[serde(flatten)]
    pub transform: Transform2,
}

/// Buffer of the latest known transform between each child frame and its parent.
///
/// Lookups chain transforms through the tree, so any two connected frames can be related.
pub struct TfBuffer {
    links: Mutex<HashMap<String, Link>>,

    /// Notified whenever a link is updated, used to wait for a missing transform
    updated: Condvar,

    /// Age above which a dynamic link is rejected
    max_age_s: f64,

    /// Longest a lookup may block waiting for a transform to become available
    lookup_timeout: Duration,
}

#[derive(Debug, Clone)]
struct Link {
    parent: String,
    transform: Transform2,

    /// `None` for static links, which never expire
    stamp: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors that can occur while looking up a transform.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TfError {
    #[error("No transform is known between {from_frame} and {to_frame}")]
    Unavailable { from_frame: String, to_frame: String },

    #[error("Transform from {child} to {parent} is {age_s:.3} s old, which exceeds the limit")]
    Expired {
        child: String,
        parent: String,
        age_s: f64,
    },

    #[error("Frame tree is deeper than {0} levels, is there a cycle?")]
    TreeTooDeep(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Transform2 {
    pub fn new(x_m: f64, y_m: f64, yaw_rad: f64) -> Self {
        Self { x_m, y_m, yaw_rad }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    /// Apply the transform to a pose in the child frame.
    pub fn apply(&self, pose: &Pose2) -> Pose2 {
        let (s, c) = self.yaw_rad.sin_cos();

        Pose2 {
            x_m: c * pose.x_m - s * pose.y_m + self.x_m,
            y_m: s * pose.x_m + c * pose.y_m + self.y_m,
            heading_rad: wrap_pi(pose.heading_rad + self.yaw_rad),
        }
    }

    /// Compose two transforms, `self * other`, i.e. apply `other` first.
    pub fn compose(&self, other: &Transform2) -> Transform2 {
        let p = self.apply(&Pose2::new(other.x_m, other.y_m, other.yaw_rad));

        Transform2::new(p.x_m, p.y_m, p.heading_rad)
    }

    pub fn inverse(&self) -> Transform2 {
        let (s, c) = self.yaw_rad.sin_cos();

        Transform2 {
            x_m: -(c * self.x_m + s * self.y_m),
            y_m: s * self.x_m - c * self.y_m,
            yaw_rad: -self.yaw_rad,
        }
    }
}

impl TfBuffer {
    /// Create an empty buffer.
    pub fn new(max_age_s: f64, lookup_timeout: Duration) -> Self {
        Self {
            links: Mutex::new(HashMap::new()),
            updated: Condvar::new(),
            max_age_s,
            lookup_timeout,
        }
    }

    /// Set a transform which never expires.
    pub fn set_static_transform(&self, parent: &str, child: &str, transform: Transform2) {
        self.insert(child, Link {
            parent: parent.into(),
            transform,
            stamp: None,
        });
    }

    /// Set the latest transform between `parent` and `child`, valid at `stamp`.
    pub fn set_transform(
        &self,
        parent: &str,
        child: &str,
        transform: Transform2,
        stamp: DateTime<Utc>,
    ) {
        self.insert(child, Link {
            parent: parent.into(),
            transform,
            stamp: Some(stamp),
        });
    }

    /// Find the transform which maps poses in `from_frame` into `to_frame`.
    ///
    /// If the frames are not connected the lookup blocks for up to the buffer's lookup timeout
    /// waiting for the missing transform to be set.
    pub fn lookup(
        &self,
        from_frame: &str,
        to_frame: &str,
        stamp: DateTime<Utc>,
    ) -> Result<Transform2, TfError> {
        let deadline = Instant::now() + self.lookup_timeout;
        let mut links = self.links.lock();

        loop {
            match Self::resolve(&links, from_frame, to_frame, stamp, self.max_age_s) {
                Err(TfError::Unavailable { .. }) if Instant::now() < deadline => {
                    trace!(
                        "Waiting for transform between {} and {}",
                        from_frame,
                        to_frame
                    );
                    // Woken on every link update, the deadline is re-checked above
                    self.updated.wait_until(&mut links, deadline);
                }
                r => return r,
            }
        }
    }

    fn insert(&self, child: &str, link: Link) {
        self.links.lock().insert(child.into(), link);
        self.updated.notify_all();
    }

    /// Walk both frames up to their common ancestor and chain the transforms.
    fn resolve(
        links: &HashMap<String, Link>,
        from_frame: &str,
        to_frame: &str,
        stamp: DateTime<Utc>,
        max_age_s: f64,
    ) -> Result<Transform2, TfError> {
        if from_frame == to_frame {
            return Ok(Transform2::identity());
        }

        // Transforms from `from_frame` into each of its ancestors
        let from_chain = Self::ancestors(links, from_frame, stamp, max_age_s)?;

        // Walk up from `to_frame` until one of the ancestors of `from_frame` is found
        let mut frame = to_frame.to_string();
        let mut to_in_frame = Transform2::identity();

        for _ in 0..MAX_TREE_DEPTH {
            if let Some((_, from_in_frame)) = from_chain.iter().find(|(f, _)| *f == frame) {
                return Ok(to_in_frame.inverse().compose(from_in_frame));
            }

            let link = match links.get(&frame) {
                Some(l) => l,
                None => {
                    return Err(TfError::Unavailable {
                        from_frame: from_frame.into(),
                        to_frame: to_frame.into(),
                    })
                }
            };

            Self::check_age(&frame, link, stamp, max_age_s)?;
            to_in_frame = link.transform.compose(&to_in_frame);
            frame = link.parent.clone();
        }

        Err(TfError::TreeTooDeep(MAX_TREE_DEPTH))
    }

    fn ancestors(
        links: &HashMap<String, Link>,
        frame: &str,
        stamp: DateTime<Utc>,
        max_age_s: f64,
    ) -> Result<Vec<(String, Transform2)>, TfError> {
        let mut chain = vec![(frame.to_string(), Transform2::identity())];

        for _ in 0..MAX_TREE_DEPTH {
            let (current, in_current) = match chain.last() {
                Some(c) => c.clone(),
                None => break,
            };

            match links.get(&current) {
                Some(link) => {
                    Self::check_age(&current, link, stamp, max_age_s)?;
                    chain.push((link.parent.clone(), link.transform.compose(&in_current)));
                }
                None => return Ok(chain),
            }
        }

        Err(TfError::TreeTooDeep(MAX_TREE_DEPTH))
    }

    fn check_age(
        child: &str,
        link: &Link,
        stamp: DateTime<Utc>,
        max_age_s: f64,
    ) -> Result<(), TfError> {
        if let Some(link_stamp) = link.stamp {
            let age_s = duration_to_seconds(stamp - link_stamp).unwrap_or(std::f64::INFINITY);

            if age_s > max_age_s {
                return Err(TfError::Expired {
                    child: child.into(),
                    parent: link.parent.clone(),
                    age_s,
                });
            }
        }

        Ok(())
    }
}

impl FrameService for TfBuffer {
    fn transform_pose(
        &self,
        pose: &Pose2,
        from_frame: &str,
        to_frame: &str,
        stamp: DateTime<Utc>,
    ) -> Result<Pose2, TfError> {
        Ok(self.lookup(from_frame, to_frame, stamp)?.apply(pose))
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Express the positions of `poses` in the robot-local frame of `robot`.
///
/// The local X axis points along the robot's heading and the origin is the robot's position.
/// Returns the local X and Y coordinates as separate vectors, ready for curve fitting.
pub fn to_local(poses: &[Pose2], robot: &Pose2) -> (Vec<f64>, Vec<f64>) {
    let (sin_t, cos_t) = robot.heading_rad.sin_cos();

    poses
        .iter()
        .map(|p| {
            let dx = p.x_m - robot.x_m;
            let dy = p.y_m - robot.y_m;

            (dx * cos_t + dy * sin_t, dy * cos_t - dx * sin_t)
        })
        .unzip()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;
    use std::sync::Arc;
    use std::thread;

    fn assert_pose_eq(a: &Pose2, b: &Pose2) {
        assert!((a.x_m - b.x_m).abs() < 1e-9, "{:?} != {:?}", a, b);
        assert!((a.y_m - b.y_m).abs() < 1e-9, "{:?} != {:?}", a, b);
        assert!(
            wrap_pi(a.heading_rad - b.heading_rad).abs() < 1e-9,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn test_to_local() {
        let robot = Pose2::new(1.0, 1.0, FRAC_PI_2);
        let poses = vec![Pose2::new(1.0, 2.0, 0.0), Pose2::new(0.0, 1.0, 0.0)];

        let (xs, ys) = to_local(&poses, &robot);

        // Straight ahead of the robot
        assert!((xs[0] - 1.0).abs() < 1e-12);
        assert!(ys[0].abs() < 1e-12);

        // To the robot's left
        assert!(xs[1].abs() < 1e-12);
        assert!((ys[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_transform_inverse() {
        let t = Transform2::new(2.0, -1.0, 0.7);
        let p = Pose2::new(0.3, 0.4, 0.1);

        assert_pose_eq(&t.inverse().apply(&t.apply(&p)), &p);
        assert_pose_eq(&t.compose(&t.inverse()).apply(&p), &p);
    }

    #[test]
    fn test_chained_lookup() {
        let buf = TfBuffer::new(1.0, Duration::from_millis(0));
        let now = Utc::now();

        buf.set_static_transform("map", "odom", Transform2::new(10.0, 0.0, FRAC_PI_2));
        buf.set_transform("odom", "base_link", Transform2::new(1.0, 0.0, 0.0), now);

        // A point at the odom origin is at (10, 0) in the map
        let p = buf
            .transform_pose(&Pose2::default(), "odom", "map", now)
            .unwrap();
        assert_pose_eq(&p, &Pose2::new(10.0, 0.0, FRAC_PI_2));

        // The map origin seen from odom
        let p = buf
            .transform_pose(&Pose2::default(), "map", "odom", now)
            .unwrap();
        assert_pose_eq(&p, &Pose2::new(0.0, 10.0, -FRAC_PI_2));

        // Between siblings through the common ancestor
        let p = buf
            .transform_pose(&Pose2::default(), "base_link", "map", now)
            .unwrap();
        assert_pose_eq(&p, &Pose2::new(10.0, 1.0, FRAC_PI_2));

        assert_eq!(
            buf.lookup("odom", "odom", now).unwrap(),
            Transform2::identity()
        );
    }

    #[test]
    fn test_lookup_failures() {
        let buf = TfBuffer::new(0.5, Duration::from_millis(10));
        let now = Utc::now();

        assert!(matches!(
            buf.lookup("map", "odom", now),
            Err(TfError::Unavailable { .. })
        ));

        buf.set_transform(
            "odom",
            "base_link",
            Transform2::identity(),
            now - chrono::Duration::seconds(2),
        );
        assert!(matches!(
            buf.lookup("base_link", "odom", now),
            Err(TfError::Expired { .. })
        ));
    }

    #[test]
    fn test_lookup_waits_for_transform() {
        let buf = Arc::new(TfBuffer::new(1.0, Duration::from_secs(5)));
        let now = Utc::now();

        let setter = {
            let buf = buf.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                buf.set_static_transform("map", "odom", Transform2::new(1.0, 2.0, 0.0));
            })
        };

        let t = buf.lookup("map", "odom", now).unwrap();
        assert_eq!(t, Transform2::new(1.0, 2.0, 0.0).inverse());

        setter.join().unwrap();
    }
}
