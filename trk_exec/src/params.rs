//! # Tracker Executable Parameters
//!
//! This module provides parameters for the tracker executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use util::logger::{parse_level, LevelFilter};

use crate::frame::StaticTransform;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
pub struct TrkExecParams {
    /// Minimum level of log messages, `"info"`, `"debug"` or `"trace"`
    pub log_level: String,

    /// Level overrides for individual log targets, for instance `"trk_lib::traj_ctrl" = "debug"`
    #[serde(default)]
    pub module_log_levels: BTreeMap<String, String>,

    /// Common frame in which paths are tracked
    pub odom_frame: String,

    /// Frame of the robot body
    pub car_frame: String,

    /// Time for which path updates are ignored after a transform failure
    pub tf_backoff_s: f64,

    /// Longest a transform lookup may wait for a missing transform
    pub tf_lookup_timeout_s: f64,

    /// Age above which a dynamic transform is no longer used
    pub tf_max_age_s: f64,

    /// Transforms which never change, for instance between a map and the odometry frame
    #[serde(default)]
    pub static_transforms: Vec<StaticTransform>,

    /// Capacity of the inbound localisation queue
    pub loc_queue_len: usize,

    /// Capacity of the inbound path queue
    pub path_queue_len: usize,

    /// Capacity of the outbound command and telemetry queue
    pub out_queue_len: usize,

    /// Directory containing `path1.json`, `path2.json`, ... to replay, relative to the software
    /// root. If not set a demonstration path is generated.
    #[serde(default)]
    pub paths_dir: Option<String>,

    /// Simulated robot
    pub sim: SimParams,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SimParams {
    /// Period of the simulation loop
    pub period_s: f64,

    /// Longest the simulation may run for
    pub max_duration_s: f64,

    /// Initial pose of the robot in the odometry frame
    pub start_x_m: f64,
    pub start_y_m: f64,
    pub start_heading_rad: f64,

    /// Frame in which the demonstration path is declared
    pub demo_path_frame: String,

    /// Length of the demonstration path
    pub demo_path_length_m: f64,

    /// Spacing between the demonstration path's points
    pub demo_path_spacing_m: f64,

    /// Amplitude of the demonstration path's lateral wave
    pub demo_path_amplitude_m: f64,

    /// Target speed of the demonstration path
    pub demo_path_speed_ms: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TrkExecParamsError {
    #[error("Unknown log level \"{0}\"")]
    UnknownLogLevel(String),

    #[error("Parameter {0} must be positive and finite")]
    NotPositive(&'static str),

    #[error("Parameter {0} must be non-negative and finite")]
    Negative(&'static str),

    #[error("Queue {0} must have a capacity of at least one")]
    EmptyQueue(&'static str),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrkExecParams {
    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), TrkExecParamsError> {
        self.log_levels()?;

        let non_negative = [
            ("tf_backoff_s", self.tf_backoff_s),
            ("tf_lookup_timeout_s", self.tf_lookup_timeout_s),
        ];
        for (name, value) in non_negative.iter() {
            if !(value.is_finite() && *value >= 0.0) {
                return Err(TrkExecParamsError::Negative(*name));
            }
        }

        let positive = [
            ("tf_max_age_s", self.tf_max_age_s),
            ("sim.period_s", self.sim.period_s),
            ("sim.max_duration_s", self.sim.max_duration_s),
            ("sim.demo_path_length_m", self.sim.demo_path_length_m),
            ("sim.demo_path_spacing_m", self.sim.demo_path_spacing_m),
        ];
        for (name, value) in positive.iter() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(TrkExecParamsError::NotPositive(*name));
            }
        }

        let queues = [
            ("loc_queue_len", self.loc_queue_len),
            ("path_queue_len", self.path_queue_len),
            ("out_queue_len", self.out_queue_len),
        ];
        for (name, len) in queues.iter() {
            if *len == 0 {
                return Err(TrkExecParamsError::EmptyQueue(*name));
            }
        }

        Ok(())
    }

    /// Parse the minimum log level and the per-target overrides.
    pub fn log_levels(
        &self,
    ) -> Result<(LevelFilter, Vec<(String, LevelFilter)>), TrkExecParamsError> {
        let parse = |name: &String| {
            parse_level(name).ok_or_else(|| TrkExecParamsError::UnknownLogLevel(name.clone()))
        };

        let min_level = parse(&self.log_level)?;
        let module_levels = self
            .module_log_levels
            .iter()
            .map(|(target, level)| Ok((target.clone(), parse(level)?)))
            .collect::<Result<Vec<_>, TrkExecParamsError>>()?;

        Ok((min_level, module_levels))
    }

    pub fn tf_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.tf_backoff_s)
    }

    pub fn tf_lookup_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.tf_lookup_timeout_s)
    }
}
