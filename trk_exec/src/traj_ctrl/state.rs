//! Trajectory control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;

// Internal
use super::*;
use crate::{
    frame::to_local,
    loc::LocEstimate,
    optimizer::{Optimizer, OptimizerInput},
};
use comms_if::msg::{CostTm, VelCmd};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory control, the per-tick control cycle.
pub struct TrajCtrl {
    params: Params,

    optimizer: Box<dyn Optimizer>,

    tracker: WaypointTracker,

    /// Sequence number of the path instance the optimizer was last run on
    active_seq: Option<u64>,

    /// Sequence number of the last path instance for which goal reached was notified
    notified_seq: Option<u64>,

    /// Command issued on the previous tick, before any publication override
    issued: VelCmd,

    /// Raw optimizer output behind `issued`, used for delay compensation
    prev: PrevCommand,

    /// Costs of the last successful solve
    last_costs: CostTm,

    consec_faults: u32,
    total_faults: u64,

    report: StatusReport,
    goal_reached: Option<u64>,
}

/// Input data to trajectory control, a snapshot of the shared state taken at the start of the
/// tick.
#[derive(Debug, Clone)]
pub struct InputData {
    pub tracking: TrackingState,

    /// Latest localisation estimate, if any has been received
    pub loc: Option<LocEstimate>,

    /// The active path, if any has been accepted
    pub path: Option<Arc<ActivePath>>,
}

/// Output of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputData {
    /// The command to publish
    pub cmd: VelCmd,

    /// Cost telemetry to publish, `None` if publication is disabled
    pub costs: Option<CostTm>,

    /// Sequence number of the path instance whose goal was just reached. Only set on the first
    /// tick after the goal is reached.
    pub goal_reached: Option<u64>,
}

/// The status report containing monitoring quantities and fault flags.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    pub tracking: TrackingState,

    /// Path instance being tracked
    pub path_seq: Option<u64>,

    /// Current progress index into the active path
    pub progress_index: usize,

    /// Cross track error to the local curve
    pub cte_m: f64,

    /// Heading error to the local curve
    pub etheta_rad: f64,

    /// True if the optimizer was invoked this tick
    pub optimizer_called: bool,

    /// The fault raised this tick, if any
    pub fault: Option<TrajCtrlFault>,

    /// If true the consecutive fault limit has been reached and a stop was commanded
    pub fault_stop: bool,

    pub consec_faults: u32,
    pub total_faults: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Tracking state, derived from the tracking flags in the data store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum TrackingState {
    /// No goal to track
    Idle,

    /// Goal received, path computed and goal not yet reached
    Tracking,

    /// Within the goal radius of the final path point
    GoalReached,
}

/// Recoverable faults. On a fault the previous command is held, unless the consecutive fault
/// limit is reached in which case a stop is commanded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum TrajCtrlFault {
    /// The local curve could not be fitted
    DegenerateFit,

    /// The optimizer failed or produced an invalid output
    OptimizerFailure,
}

/// Potential errors that can occur during processing of the module.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Invalid trajectory control parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    /// Attempted to control trajectory when the pose is not known.
    #[error("No localisation has been received")]
    NoPose,

    /// Attempted to control trajectory without a path.
    #[error("No path has been accepted")]
    NoPath,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TrackingState {
    fn default() -> Self {
        TrackingState::Idle
    }
}

impl TrackingState {
    /// Derive the tracking state from the data store flags.
    pub fn from_flags(goal_received: bool, goal_reached: bool, path_computed: bool) -> Self {
        if goal_received && !goal_reached && path_computed {
            TrackingState::Tracking
        } else if goal_reached {
            TrackingState::GoalReached
        } else {
            TrackingState::Idle
        }
    }
}

impl State for TrajCtrl {
    type InitData = (Params, Box<dyn Optimizer>);
    type InitError = TrajCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    /// Initialise the TrajCtrl module.
    ///
    /// Expected init data is the parameters, which are validated here, and the optimizer to use.
    fn init(init_data: Self::InitData) -> Result<Self, Self::InitError> {
        let (params, optimizer) = init_data;

        params.validate()?;

        Ok(Self {
            tracker: WaypointTracker::new(params.lookahead_window),
            params,
            optimizer,
            active_seq: None,
            notified_seq: None,
            issued: VelCmd::stop(),
            prev: PrevCommand::default(),
            last_costs: CostTm::default(),
            consec_faults: 0,
            total_faults: 0,
            report: StatusReport::default(),
            goal_reached: None,
        })
    }

    /// Process trajectory control.
    ///
    /// When tracking, processing involves:
    ///  1. Advancing the progress index along the active path
    ///  2. Fitting the local curve to the remaining path in the robot frame
    ///  3. Predicting the optimizer state
    ///  4. Solving for the new demands and governing them into a command
    ///
    /// Otherwise a stop is commanded.
    fn proc(
        &mut self,
        input: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Setup cycle data
        self.report = StatusReport {
            tracking: input.tracking,
            ..Default::default()
        };
        self.goal_reached = None;

        // Mode execution
        let result = match input.tracking {
            TrackingState::Idle => self.mode_idle(),
            TrackingState::Tracking => self.mode_tracking(input),
            TrackingState::GoalReached => self.mode_goal_reached(input),
        };

        self.report.consec_faults = self.consec_faults;
        self.report.total_faults = self.total_faults;

        if let Err(e) = result {
            self.stop();
            return Err(e);
        }

        let output = if self.params.pub_twist_cmd {
            OutputData {
                cmd: self.issued,
                costs: Some(self.last_costs),
                goal_reached: self.goal_reached,
            }
        } else {
            OutputData {
                cmd: VelCmd::stop(),
                costs: None,
                goal_reached: self.goal_reached,
            }
        };

        Ok((output, self.report))
    }
}

impl TrajCtrl {
    /// Mode idle.
    ///
    /// No goal is being tracked, a stop is commanded.
    fn mode_idle(&mut self) -> Result<(), TrajCtrlError> {
        self.stop();
        self.consec_faults = 0;

        Ok(())
    }

    /// Mode goal reached.
    ///
    /// The robot is within the goal radius. A stop is commanded and the first tick in this mode
    /// for each path instance emits the goal reached notification.
    fn mode_goal_reached(&mut self, input: &InputData) -> Result<(), TrajCtrlError> {
        self.stop();
        self.consec_faults = 0;

        if let Some(ref path) = input.path {
            self.report.path_seq = Some(path.path_seq);

            if self.notified_seq != Some(path.path_seq) {
                info!("Goal of path {} reached", path.path_seq);
                self.notified_seq = Some(path.path_seq);
                self.goal_reached = Some(path.path_seq);
            }
        }

        Ok(())
    }

    /// Mode tracking.
    ///
    /// In this mode the optimizer is run to compute the command which keeps the robot on the
    /// active path.
    fn mode_tracking(&mut self, input: &InputData) -> Result<(), TrajCtrlError> {
        // Validate path and pose
        let path = match input.path {
            Some(ref p) => p,
            None => return Err(TrajCtrlError::NoPath),
        };
        let loc = match input.loc {
            Some(ref l) => l,
            None => return Err(TrajCtrlError::NoPose),
        };

        // ---- PROGRESS ----

        if self.active_seq != Some(path.path_seq) {
            self.optimizer.reset();
            self.consec_faults = 0;
            self.active_seq = Some(path.path_seq);
        }

        self.tracker.sync(path.path_seq, path.start_index);
        let index = self.tracker.advance(&path.points, &loc.pose);

        self.report.path_seq = Some(path.path_seq);
        self.report.progress_index = index;

        // ---- LOCAL CURVE ----

        let (xs, ys) = to_local(path.remaining(index), &loc.pose);

        let curve = match LocalCurve::fit(&xs, &ys, self.params.curve_degree) {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not fit local curve: {}", e);
                self.fault(TrajCtrlFault::DegenerateFit);
                return Ok(());
            }
        };

        let cte_m = curve.cross_track_error();
        let etheta_rad = curve.heading_error();

        self.report.cte_m = cte_m;
        self.report.etheta_rad = etheta_rad;

        // ---- OPTIMIZATION ----

        let dt_s = self.params.dt_s();
        let speed_ms = match self.params.speed_source {
            SpeedSource::Command => self.issued.linear_ms,
            SpeedSource::Odometry => loc.velocity.linear_ms,
        };

        let state = predict_state(
            self.params.delay_mode,
            speed_ms,
            cte_m,
            etheta_rad,
            &self.prev,
            dt_s,
        );

        self.report.optimizer_called = true;

        let out = match self.optimizer.solve(&OptimizerInput {
            state,
            coeffs: &curve.coeffs,
            tuning: &self.params.mpc,
            ref_vel_ms: path.speed_ms,
            dt_s,
        }) {
            Ok(o) if o.is_finite() => o,
            Ok(o) => {
                warn!("Optimizer output is not finite: {:?}", o);
                self.fault(TrajCtrlFault::OptimizerFailure);
                return Ok(());
            }
            Err(e) => {
                warn!("Optimizer failed: {}", e);
                self.fault(TrajCtrlFault::OptimizerFailure);
                return Ok(());
            }
        };

        // ---- COMMAND ----

        self.issued = govern(
            speed_ms,
            out.accel_ms2,
            out.angvel_rads,
            dt_s,
            self.params.max_speed_ms,
        );
        self.prev = PrevCommand {
            angvel_rads: out.angvel_rads,
            accel_ms2: out.accel_ms2,
        };
        self.last_costs = out.costs;
        self.consec_faults = 0;

        if self.params.debug_info {
            debug!(
                "theta: {:.4}, v: {:.4}, coeffs: {:?}, w: {:.4}, throttle: {:.4}, speed: {:.4}",
                loc.pose.heading_rad,
                speed_ms,
                curve.coeffs,
                out.angvel_rads,
                out.accel_ms2,
                self.issued.linear_ms
            );
        }

        Ok(())
    }

    /// Record a fault, holding the previous command or stopping if the limit is reached.
    fn fault(&mut self, fault: TrajCtrlFault) {
        self.consec_faults += 1;
        self.total_faults += 1;
        self.report.fault = Some(fault);

        if self.consec_faults >= self.params.max_consec_faults {
            warn!(
                "{} consecutive faults, commanding a stop",
                self.consec_faults
            );
            self.stop();
            self.report.fault_stop = true;
        }
    }

    /// Command a full stop.
    fn stop(&mut self) {
        self.issued = VelCmd::stop();
        self.prev = PrevCommand::default();
        self.optimizer.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::Velocity;
    use crate::optimizer::{OptimizerError, OptimizerOutput};
    use chrono::Utc;
    use comms_if::msg::Pose2;
    use parking_lot::Mutex;

    /// Optimizer returning a scripted result and counting its calls.
    struct FakeOptimizer {
        script: Arc<Mutex<Script>>,
    }

    struct Script {
        next: Result<OptimizerOutput, OptimizerError>,
        calls: usize,

        /// State and curve coefficients of every solve
        inputs: Vec<([f64; 6], Vec<f64>)>,
    }

    impl Optimizer for FakeOptimizer {
        fn solve(
            &mut self,
            input: &OptimizerInput<'_>,
        ) -> Result<OptimizerOutput, OptimizerError> {
            let mut script = self.script.lock();
            script.calls += 1;
            script.inputs.push((input.state, input.coeffs.to_vec()));
            script.next.clone()
        }
    }

    fn output(angvel_rads: f64, accel_ms2: f64) -> OptimizerOutput {
        OptimizerOutput {
            angvel_rads,
            accel_ms2,
            costs: CostTm {
                total: 3.0,
                cte: 1.0,
                etheta: 2.0,
            },
        }
    }

    fn traj_ctrl(params: Params) -> (TrajCtrl, Arc<Mutex<Script>>) {
        let script = Arc::new(Mutex::new(Script {
            next: Ok(output(0.2, 1.0)),
            calls: 0,
            inputs: Vec::new(),
        }));
        let opt = FakeOptimizer {
            script: script.clone(),
        };

        (TrajCtrl::init((params, Box::new(opt))).unwrap(), script)
    }

    fn loc(x_m: f64, y_m: f64) -> Option<LocEstimate> {
        Some(LocEstimate {
            frame_id: "odom".into(),
            stamp: Utc::now(),
            pose: Pose2::new(x_m, y_m, 0.0),
            velocity: Velocity::default(),
        })
    }

    fn path(seq: u64, num: usize) -> Option<Arc<ActivePath>> {
        let points = (0..num).map(|i| Pose2::new(i as f64 * 0.5, 0.2, 0.0)).collect();

        ActivePath::new(seq, "odom", points, 0.5, &Pose2::default(), 50).map(Arc::new)
    }

    fn tracking(seq: u64, num: usize) -> InputData {
        InputData {
            tracking: TrackingState::Tracking,
            loc: loc(0.0, 0.0),
            path: path(seq, num),
        }
    }

    #[test]
    fn test_tracking_state_from_flags() {
        assert_eq!(
            TrackingState::from_flags(true, false, true),
            TrackingState::Tracking
        );
        assert_eq!(
            TrackingState::from_flags(true, false, false),
            TrackingState::Idle
        );
        assert_eq!(
            TrackingState::from_flags(false, true, false),
            TrackingState::GoalReached
        );
        assert_eq!(
            TrackingState::from_flags(false, false, false),
            TrackingState::Idle
        );
    }

    #[test]
    fn test_tracking_command() {
        let (mut tc, script) = traj_ctrl(Params::default());

        let (out, report) = tc.proc(&tracking(1, 10)).unwrap();

        assert_eq!(script.lock().calls, 1);
        assert!(report.optimizer_called);
        assert!(report.fault.is_none());
        assert!((report.cte_m - 0.2).abs() < 1e-9);
        assert!((out.cmd.linear_ms - 0.1).abs() < 1e-12);
        assert_eq!(out.cmd.angular_rads, 0.2);
        assert_eq!(out.costs, Some(output(0.2, 1.0).costs));
        assert_eq!(out.goal_reached, None);

        // Speed accumulates from the issued command
        let (out, _) = tc.proc(&tracking(1, 10)).unwrap();
        assert!((out.cmd.linear_ms - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_speed_clamped() {
        let (mut tc, script) = traj_ctrl(Params::default());

        script.lock().next = Ok(output(0.0, 1e6));
        let (out, _) = tc.proc(&tracking(1, 10)).unwrap();
        assert_eq!(out.cmd.linear_ms, 0.5);

        script.lock().next = Ok(output(0.0, -1e6));
        let (out, _) = tc.proc(&tracking(1, 10)).unwrap();
        assert_eq!(out.cmd.linear_ms, 0.0);
    }

    #[test]
    fn test_goal_reached_once() {
        let (mut tc, script) = traj_ctrl(Params::default());

        tc.proc(&tracking(1, 10)).unwrap();
        assert_eq!(script.lock().calls, 1);

        let input = InputData {
            tracking: TrackingState::GoalReached,
            loc: loc(4.5, 0.2),
            path: path(1, 10),
        };

        let (out, report) = tc.proc(&input).unwrap();
        assert!(out.cmd.is_stop());
        assert_eq!(out.goal_reached, Some(1));
        assert!(!report.optimizer_called);

        for _ in 0..5 {
            let (out, _) = tc.proc(&input).unwrap();
            assert!(out.cmd.is_stop());
            assert_eq!(out.goal_reached, None);
        }

        assert_eq!(script.lock().calls, 1);

        // A new path instance resumes tracking and can be notified again
        tc.proc(&tracking(2, 10)).unwrap();
        assert_eq!(script.lock().calls, 2);

        let input = InputData {
            path: path(2, 10),
            ..input
        };
        let (out, _) = tc.proc(&input).unwrap();
        assert_eq!(out.goal_reached, Some(2));
    }

    #[test]
    fn test_degenerate_fit_holds_command() {
        let (mut tc, script) = traj_ctrl(Params::default());

        let (first, _) = tc.proc(&tracking(1, 10)).unwrap();
        assert!(!first.cmd.is_stop());

        // Two points cannot be fitted with a cubic
        let (out, report) = tc.proc(&tracking(2, 2)).unwrap();

        assert_eq!(report.fault, Some(TrajCtrlFault::DegenerateFit));
        assert!(!report.optimizer_called);
        assert_eq!(out.cmd, first.cmd);
        assert_eq!(script.lock().calls, 1);
        assert_eq!(report.consec_faults, 1);
    }

    #[test]
    fn test_optimizer_failure_escalates() {
        let (mut tc, script) = traj_ctrl(Params::default());

        let (first, _) = tc.proc(&tracking(1, 10)).unwrap();

        script.lock().next = Err(OptimizerError::NonFiniteSolution);

        for i in 1..3 {
            let (out, report) = tc.proc(&tracking(1, 10)).unwrap();
            assert_eq!(report.fault, Some(TrajCtrlFault::OptimizerFailure));
            assert_eq!(report.consec_faults, i);
            assert!(!report.fault_stop);
            assert_eq!(out.cmd, first.cmd);
        }

        let (out, report) = tc.proc(&tracking(1, 10)).unwrap();
        assert!(report.fault_stop);
        assert!(out.cmd.is_stop());
        assert_eq!(report.total_faults, 3);

        // Recovery clears the consecutive count
        script.lock().next = Ok(output(0.1, 0.5));
        let (out, report) = tc.proc(&tracking(1, 10)).unwrap();
        assert_eq!(report.consec_faults, 0);
        assert_eq!(report.total_faults, 3);
        assert!((out.cmd.linear_ms - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_output_is_fault() {
        let (mut tc, script) = traj_ctrl(Params::default());

        let (first, _) = tc.proc(&tracking(1, 10)).unwrap();

        script.lock().next = Ok(output(std::f64::NAN, 0.0));
        let (out, report) = tc.proc(&tracking(1, 10)).unwrap();

        assert_eq!(report.fault, Some(TrajCtrlFault::OptimizerFailure));
        assert_eq!(out.cmd, first.cmd);
    }

    #[test]
    fn test_publication_disabled() {
        let params = Params {
            pub_twist_cmd: false,
            ..Default::default()
        };
        let (mut tc, script) = traj_ctrl(params);

        let (out, _) = tc.proc(&tracking(1, 10)).unwrap();

        assert_eq!(script.lock().calls, 1);
        assert!(out.cmd.is_stop());
        assert_eq!(out.costs, None);
    }

    #[test]
    fn test_idle_and_errors() {
        let (mut tc, script) = traj_ctrl(Params::default());

        let idle = InputData {
            tracking: TrackingState::Idle,
            loc: None,
            path: None,
        };
        let (out, report) = tc.proc(&idle).unwrap();
        assert!(out.cmd.is_stop());
        assert!(!report.optimizer_called);

        let no_pose = InputData {
            loc: None,
            ..tracking(1, 10)
        };
        assert!(matches!(tc.proc(&no_pose), Err(TrajCtrlError::NoPose)));

        let no_path = InputData {
            path: None,
            ..tracking(1, 10)
        };
        assert!(matches!(tc.proc(&no_path), Err(TrajCtrlError::NoPath)));

        assert_eq!(script.lock().calls, 0);
    }

    #[test]
    fn test_progress_across_ticks() {
        let (mut tc, _) = traj_ctrl(Params::default());
        let path = path(1, 40);
        let mut prev = 0;

        for x in [0.0, 1.0, 0.5, 3.0, 2.0, 7.5, 6.0].iter() {
            let input = InputData {
                tracking: TrackingState::Tracking,
                loc: loc(*x, 0.0),
                path: path.clone(),
            };
            let (_, report) = tc.proc(&input).unwrap();

            assert!(report.progress_index >= prev);
            prev = report.progress_index;
        }

        assert_eq!(prev, 15);
    }

    #[test]
    fn test_degenerate_fit_near_path_end() {
        let (mut tc, script) = traj_ctrl(Params::default());
        let path = path(1, 10);

        let (first, _) = tc.proc(&tracking(1, 10)).unwrap();
        assert!(!first.cmd.is_stop());

        // Second to last and last points leave fewer points ahead than a cubic needs
        for (x, index) in [(4.0, 8), (4.5, 9)].iter() {
            let input = InputData {
                tracking: TrackingState::Tracking,
                loc: loc(*x, 0.2),
                path: path.clone(),
            };
            let (out, report) = tc.proc(&input).unwrap();

            assert_eq!(report.progress_index, *index);
            assert_eq!(report.fault, Some(TrajCtrlFault::DegenerateFit));
            assert!(!report.optimizer_called);
            assert_eq!(out.cmd, first.cmd);
        }

        assert_eq!(script.lock().calls, 1);
    }

    #[test]
    fn test_delay_compensation_uses_previous_command() {
        let (mut tc, script) = traj_ctrl(Params::default());
        let dt = Params::default().dt_s();

        // Tick 1 solves from rest, the optimizer demands (0.2, 1.0)
        let (first, _) = tc.proc(&tracking(1, 10)).unwrap();
        let v = first.cmd.linear_ms;
        assert!((v - 0.1).abs() < 1e-12);

        // Tick 2 is projected with tick 1's demands, not its own
        script.lock().next = Ok(output(-0.5, -2.0));
        let (_, report) = tc.proc(&tracking(1, 10)).unwrap();

        {
            let script = script.lock();
            let (state, coeffs) = &script.inputs[1];

            assert!((state[0] - v * dt).abs() < 1e-12);
            assert_eq!(state[1], 0.0);
            assert!((state[2] - 0.2 * dt).abs() < 1e-12);
            assert!((state[3] - (v + 1.0 * dt)).abs() < 1e-12);
            assert!((state[4] - (report.cte_m + v * report.etheta_rad.sin() * dt)).abs() < 1e-12);
            assert!((state[5] - (report.etheta_rad - 0.2 * dt)).abs() < 1e-12);

            assert_eq!(coeffs.len(), 4);
            assert!((coeffs[0] - 0.2).abs() < 1e-9);
            assert!((coeffs[0] - report.cte_m).abs() < 1e-12);
        }

        // Tick 3 uses tick 2's demands, the issued speed was clamped to zero
        tc.proc(&tracking(1, 10)).unwrap();

        let script = script.lock();
        let (state, _) = &script.inputs[2];
        assert_eq!(state[0], 0.0);
        assert!((state[2] + 0.5 * dt).abs() < 1e-12);
        assert!((state[3] + 2.0 * dt).abs() < 1e-12);
    }

    #[test]
    fn test_immediate_state() {
        let params = Params {
            delay_mode: false,
            ..Default::default()
        };
        let (mut tc, script) = traj_ctrl(params);

        tc.proc(&tracking(1, 10)).unwrap();
        let (_, report) = tc.proc(&tracking(1, 10)).unwrap();

        let script = script.lock();
        let (state, _) = &script.inputs[1];

        assert_eq!(&state[0..3], &[0.0, 0.0, 0.0]);
        assert!((state[3] - 0.1).abs() < 1e-12);
        assert_eq!(state[4], report.cte_m);
        assert_eq!(state[5], report.etheta_rad);
    }

    #[test]
    fn test_odometry_speed_source() {
        let params = Params {
            delay_mode: false,
            speed_source: SpeedSource::Odometry,
            ..Default::default()
        };
        let (mut tc, script) = traj_ctrl(params);

        let mut input = tracking(1, 10);
        if let Some(ref mut l) = input.loc {
            l.velocity.linear_ms = 0.3;
        }

        let (out, _) = tc.proc(&input).unwrap();

        let script = script.lock();
        let (state, _) = &script.inputs[0];
        assert_eq!(state[3], 0.3);

        // Measured speed plus the demanded acceleration over one period
        assert!((out.cmd.linear_ms - 0.4).abs() < 1e-12);
    }
}
