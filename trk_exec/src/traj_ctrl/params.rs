//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Frequency at which the control cycle runs. The control period `dt` is the inverse of this
    /// and is also used as the delay compensation interval.
    pub controller_freq_hz: f64,

    /// If true the optimizer state is projected forward by one control period using the
    /// previously issued command.
    pub delay_mode: bool,

    /// If false a zero command is always published and cost telemetry is disabled.
    pub pub_twist_cmd: bool,

    /// Log the internals of each control tick at debug level.
    pub debug_info: bool,

    /// Maximum speed demand, the minimum is always zero as the robot never reverses.
    pub max_speed_ms: f64,

    /// Distance to the final path point below which the goal is considered reached.
    pub goal_radius_m: f64,

    /// Degree of the polynomial fitted to the local path.
    pub curve_degree: usize,

    /// Number of points ahead of the current progress index searched for the closest point.
    pub lookahead_window: usize,

    /// Number of consecutive faulty ticks after which a full stop is commanded instead of
    /// holding the previous command.
    pub max_consec_faults: u32,

    /// Where the current speed fed to the optimizer comes from.
    pub speed_source: SpeedSource,

    /// Consecutive path headings differing by more than this are reported when a path is
    /// received. This is a diagnostic only.
    pub heading_jump_threshold_rad: f64,

    /// Tuning forwarded to the optimizer
    pub mpc: MpcParams,
}

/// Optimizer tuning parameters.
#[derive(Deserialize, Debug, Clone)]
pub struct MpcParams {
    /// Number of steps in the prediction horizon
    pub mpc_steps: usize,

    /// Reference cross track error
    pub ref_cte_m: f64,

    /// Reference heading error
    pub ref_etheta_rad: f64,

    /// Cross track error weight
    pub w_cte: f64,

    /// Heading error weight
    pub w_etheta: f64,

    /// Speed tracking weight
    pub w_vel: f64,

    /// Angular rate weight
    pub w_angvel: f64,

    /// Angular rate change weight
    pub w_angvel_d: f64,

    /// Acceleration weight
    pub w_accel: f64,

    /// Acceleration change weight
    pub w_accel_d: f64,

    /// Bound on the angular rate demand
    pub max_angvel_rads: f64,

    /// Bound on the acceleration demand
    pub max_throttle_ms2: f64,

    /// Bound applied to the unconstrained state variables
    pub bound_value: f64,

    /// Maximum number of iterations the bundled solver may take per tick
    pub max_iters: usize,

    /// Relative cost change below which the bundled solver is considered converged
    pub tolerance: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Source of the current speed estimate.
#[derive(Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpeedSource {
    /// The speed issued on the previous tick
    Command,

    /// The linear velocity reported by localisation
    Odometry,
}

/// Invalid parameter values, detected once when trajectory control is initialised.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ParamsError {
    #[error("Controller frequency must be positive and finite, got {0}")]
    InvalidFrequency(f64),

    #[error("Maximum speed must be non-negative and finite, got {0}")]
    InvalidMaxSpeed(f64),

    #[error("Goal radius must be positive and finite, got {0}")]
    InvalidGoalRadius(f64),

    #[error("Curve degree must be at least 1")]
    InvalidCurveDegree,

    #[error("The look-ahead window must contain at least one point")]
    InvalidLookaheadWindow,

    #[error("The consecutive fault limit must be at least 1")]
    InvalidFaultLimit,

    #[error("The prediction horizon must have at least 2 steps, got {0}")]
    InvalidHorizon(usize),

    #[error("Optimizer parameter {0} must be non-negative and finite")]
    InvalidTuning(&'static str),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// The control period in seconds.
    pub fn dt_s(&self) -> f64 {
        1.0 / self.controller_freq_hz
    }

    /// Check the parameters are internally consistent.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.controller_freq_hz.is_finite() && self.controller_freq_hz > 0.0) {
            return Err(ParamsError::InvalidFrequency(self.controller_freq_hz));
        }
        if !(self.max_speed_ms.is_finite() && self.max_speed_ms >= 0.0) {
            return Err(ParamsError::InvalidMaxSpeed(self.max_speed_ms));
        }
        if !(self.goal_radius_m.is_finite() && self.goal_radius_m > 0.0) {
            return Err(ParamsError::InvalidGoalRadius(self.goal_radius_m));
        }
        if self.curve_degree < 1 {
            return Err(ParamsError::InvalidCurveDegree);
        }
        if self.lookahead_window < 1 {
            return Err(ParamsError::InvalidLookaheadWindow);
        }
        if self.max_consec_faults < 1 {
            return Err(ParamsError::InvalidFaultLimit);
        }

        self.mpc.validate()
    }
}

impl MpcParams {
    fn validate(&self) -> Result<(), ParamsError> {
        if self.mpc_steps < 2 {
            return Err(ParamsError::InvalidHorizon(self.mpc_steps));
        }

        let non_negative = [
            ("w_cte", self.w_cte),
            ("w_etheta", self.w_etheta),
            ("w_vel", self.w_vel),
            ("w_angvel", self.w_angvel),
            ("w_angvel_d", self.w_angvel_d),
            ("w_accel", self.w_accel),
            ("w_accel_d", self.w_accel_d),
            ("max_angvel_rads", self.max_angvel_rads),
            ("max_throttle_ms2", self.max_throttle_ms2),
            ("bound_value", self.bound_value),
            ("tolerance", self.tolerance),
        ];

        for (name, value) in non_negative.iter() {
            if !(value.is_finite() && *value >= 0.0) {
                return Err(ParamsError::InvalidTuning(*name));
            }
        }

        if !(self.ref_cte_m.is_finite() && self.ref_etheta_rad.is_finite()) {
            return Err(ParamsError::InvalidTuning("ref_cte_m/ref_etheta_rad"));
        }

        Ok(())
    }
}

impl Default for MpcParams {
    fn default() -> Self {
        Self {
            mpc_steps: 20,
            ref_cte_m: 0.0,
            ref_etheta_rad: 0.0,
            w_cte: 5000.0,
            w_etheta: 5000.0,
            w_vel: 1.0,
            w_angvel: 100.0,
            w_angvel_d: 10.0,
            w_accel: 50.0,
            w_accel_d: 10.0,
            max_angvel_rads: 3.0,
            max_throttle_ms2: 1.0,
            bound_value: 1.0e3,
            max_iters: 100,
            tolerance: 1e-6,
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            controller_freq_hz: 10.0,
            delay_mode: true,
            pub_twist_cmd: true,
            debug_info: true,
            max_speed_ms: 0.5,
            goal_radius_m: 0.5,
            curve_degree: 3,
            lookahead_window: 50,
            max_consec_faults: 3,
            speed_source: SpeedSource::Command,
            heading_jump_threshold_rad: 5.0,
            mpc: MpcParams::default(),
        }
    }
}
