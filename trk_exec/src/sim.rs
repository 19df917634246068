//! # Simulated robot
//!
//! A unicycle model driven directly by the velocity command, used to run the tracker closed loop
//! without a real base.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use comms_if::msg::{Header, Odometry, PathSpeed, Pose2, VelCmd};
use std::f64::consts::PI;

use util::maths::wrap_pi;

use crate::{frame::Transform2, params::SimParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimRobot {
    /// Pose in the odometry frame
    pub pose: Pose2,

    /// Command currently applied
    pub cmd: VelCmd,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimRobot {
    pub fn new(pose: Pose2) -> Self {
        Self {
            pose,
            cmd: VelCmd::stop(),
        }
    }

    /// Apply a new command from now on.
    pub fn set_cmd(&mut self, cmd: VelCmd) {
        self.cmd = cmd;
    }

    /// Advance the simulation by `dt_s` seconds.
    ///
    /// Integrates the unicycle model exactly for a constant command, i.e. along an arc.
    pub fn step(&mut self, dt_s: f64) {
        let v = self.cmd.linear_ms;
        let w = self.cmd.angular_rads;
        let th = self.pose.heading_rad;

        if w.abs() < 1e-9 {
            self.pose.x_m += v * th.cos() * dt_s;
            self.pose.y_m += v * th.sin() * dt_s;
        } else {
            let r = v / w;
            self.pose.x_m += r * ((th + w * dt_s).sin() - th.sin());
            self.pose.y_m += r * (th.cos() - (th + w * dt_s).cos());
        }

        self.pose.heading_rad = wrap_pi(th + w * dt_s);
    }

    /// Odometry message for the current state.
    pub fn odometry(&self, frame_id: &str) -> Odometry {
        Odometry {
            header: Header::now(frame_id),
            pose: self.pose,
            linear_ms: self.cmd.linear_ms,
            angular_rads: self.cmd.angular_rads,
        }
    }

    /// Transform of the robot body in the odometry frame, with its timestamp.
    pub fn body_transform(&self) -> (Transform2, DateTime<Utc>) {
        (
            Transform2::new(self.pose.x_m, self.pose.y_m, self.pose.heading_rad),
            Utc::now(),
        )
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the demonstration path: one period of a sine wave along the X axis of its frame.
///
/// Point headings follow the tangent of the wave.
pub fn demo_path(params: &SimParams) -> PathSpeed {
    let num_points = (params.demo_path_length_m / params.demo_path_spacing_m).floor() as usize + 1;
    let k = 2.0 * PI / params.demo_path_length_m;

    let poses = (0..num_points)
        .map(|i| {
            let x = i as f64 * params.demo_path_spacing_m;
            let y = params.demo_path_amplitude_m * (k * x).sin();
            let heading = (params.demo_path_amplitude_m * k * (k * x).cos()).atan();

            Pose2::new(x, y, heading)
        })
        .collect();

    PathSpeed {
        header: Header::now(params.demo_path_frame.as_str()),
        poses,
        speed_ms: params.demo_path_speed_ms,
    }
}
