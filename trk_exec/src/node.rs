//! # Tracker node
//!
//! Binds trajectory control to its three event sources:
//!
//! - Localisation updates, which refresh the robot pose and check whether the goal was reached.
//! - Path updates, which transform the path into the common frame and replace the active path.
//! - The control timer, which runs one trajectory control tick and publishes its output.
//!
//! Each source is handled by its own worker thread. Shared state lives in a [`DataStore`] behind
//! one lock, which is only held for short updates. Transform lookups are done outside the lock on
//! the path worker, so a slow frame service never stalls the control tick. The tick works from a
//! snapshot of the store, and is skipped rather than queued if the previous one is still running.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use comms_if::msg::{CostTm, Header, Odometry, PathSpeed, Pose2, RefPath, VelCmd};
use util::{module::State, session::Saver};

use crate::{
    data_store::DataStore,
    frame::{FrameService, TfError},
    loc::LocEstimate,
    traj_ctrl::{count_heading_jumps, ActivePath, StatusReport, TrajCtrl},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Period at which idle workers check for shutdown.
const WORKER_POLL_PERIOD: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Sink for everything the node publishes.
pub trait Publisher: Send + Sync {
    /// Publish the velocity command, called every tick.
    fn publish_cmd(&self, cmd: &VelCmd);

    /// Publish the optimizer cost telemetry.
    fn publish_costs(&self, costs: &CostTm);

    /// Publish the reference path of a newly accepted path.
    fn publish_reference(&self, reference: &RefPath);

    /// Notify that the goal of the given path instance was reached.
    fn notify_goal_reached(&self, path_seq: u64);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Node configuration.
#[derive(Debug, Clone)]
pub struct NodeParams {
    /// Common frame paths are transformed into
    pub odom_frame: String,

    /// Time for which path updates are ignored after a transform failure
    pub tf_backoff: Duration,

    pub goal_radius_m: f64,

    pub lookahead_window: usize,

    pub heading_jump_threshold_rad: f64,

    /// Period of the control timer
    pub control_period: Duration,
}

/// The tracker node, shared between the worker threads.
pub struct TrackerNode {
    params: NodeParams,

    store: Mutex<DataStore>,

    /// Held for the whole of a tick
    traj_ctrl: Mutex<TrajCtrl>,

    frames: Arc<dyn FrameService>,

    publisher: Arc<dyn Publisher>,

    /// Accepted paths are archived into the session if set
    saver: Option<Saver>,
}

/// A [`Publisher`] which forwards everything into a channel.
#[derive(Clone)]
pub struct ChannelPublisher {
    sender: Sender<Outbound>,
}

/// Senders feeding the node's inbound queues.
#[derive(Clone)]
pub struct NodeInputs {
    pub loc: Sender<Odometry>,
    pub path: Sender<PathSpeed>,
}

/// Handle on the running worker threads.
pub struct NodeHandle {
    shutdown: Arc<AtomicBool>,
    workers: Vec<(&'static str, JoinHandle<()>)>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Messages published by a [`ChannelPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Cmd(VelCmd),
    Costs(CostTm),
    Reference(RefPath),
    GoalReached(u64),
}

/// Result of a control tick.
#[derive(Debug, Clone, Copy)]
pub enum TickOutcome {
    /// The tick ran, with the given report
    Ran(StatusReport),

    /// The previous tick was still running
    Skipped,

    /// Trajectory control raised an error, a stop was published
    Failed,
}

/// Reasons a path update can be rejected.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum PathUpdateError {
    #[error("Path updates are suspended for another {0:?} after a transform failure")]
    BackingOff(Duration),

    #[error("The path contains no points")]
    EmptyPath,

    #[error("The path speed ({0}) is not finite")]
    InvalidSpeed(f64),

    #[error("Could not transform the path into the common frame: {0}")]
    TransformUnavailable(#[from] TfError),
}

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Could not spawn the {0} worker: {1}")]
    SpawnFailed(&'static str, std::io::Error),

    #[error("The {0} worker panicked")]
    WorkerPanicked(&'static str),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrackerNode {
    pub fn new(
        params: NodeParams,
        traj_ctrl: TrajCtrl,
        frames: Arc<dyn FrameService>,
        publisher: Arc<dyn Publisher>,
        saver: Option<Saver>,
    ) -> Self {
        Self {
            params,
            store: Mutex::new(DataStore::default()),
            traj_ctrl: Mutex::new(traj_ctrl),
            frames,
            publisher,
            saver,
        }
    }

    /// Handle a localisation update.
    ///
    /// Odometry in a frame other than the common frame is transformed first. Returns true if the
    /// update placed the robot at the goal.
    pub fn on_odometry(&self, odom: &Odometry) -> bool {
        let mut loc = LocEstimate::from(odom);

        if loc.frame_id != self.params.odom_frame {
            match self.frames.transform_pose(
                &loc.pose,
                &loc.frame_id,
                &self.params.odom_frame,
                loc.stamp,
            ) {
                Ok(p) => {
                    loc.pose = p;
                    loc.frame_id = self.params.odom_frame.clone();
                }
                Err(e) => {
                    warn!("Dropping odometry update: {}", e);
                    return false;
                }
            }
        }

        self.store.lock().update_loc(loc, self.params.goal_radius_m)
    }

    /// Handle a path update.
    ///
    /// On success the new path replaces the active one and its sequence number is returned. If
    /// the path can't be transformed into the common frame the active path is kept and further
    /// updates are refused until the backoff has elapsed.
    pub fn on_path(&self, msg: &PathSpeed, now: Instant) -> Result<u64, PathUpdateError> {
        if msg.poses.is_empty() {
            return Err(PathUpdateError::EmptyPath);
        }
        if !msg.speed_ms.is_finite() {
            return Err(PathUpdateError::InvalidSpeed(msg.speed_ms));
        }

        {
            let mut ds = self.store.lock();

            if let Some(until) = ds.path_backoff_until {
                if now < until {
                    return Err(PathUpdateError::BackingOff(until - now));
                }
            }

            ds.begin_path_update();
        }

        // Transform outside the lock, the lookup may block
        let stamp = Utc::now();
        let points = msg
            .poses
            .iter()
            .map(|p| {
                self.frames.transform_pose(
                    p,
                    &msg.header.frame_id,
                    &self.params.odom_frame,
                    stamp,
                )
            })
            .collect::<Result<Vec<Pose2>, TfError>>();

        let points = match points {
            Ok(p) => p,
            Err(e) => {
                let mut ds = self.store.lock();
                ds.num_tf_failures += 1;
                ds.path_backoff_until = Some(now + self.params.tf_backoff);

                error!("Path update rejected: {}", e);
                return Err(PathUpdateError::TransformUnavailable(e));
            }
        };

        let num_jumps = count_heading_jumps(&points, self.params.heading_jump_threshold_rad);
        if num_jumps > 0 {
            info!("Received path contains {} heading jump(s)", num_jumps);
        }

        let (path_seq, reference, archive) = {
            let mut ds = self.store.lock();
            ds.num_heading_jumps += num_jumps as u64;

            let path_seq = ds.next_path_seq();
            let position = ds.loc.as_ref().map(|l| l.pose).unwrap_or_default();

            let path = ActivePath::new(
                path_seq,
                &self.params.odom_frame,
                points,
                msg.speed_ms,
                &position,
                self.params.lookahead_window,
            )
            .ok_or(PathUpdateError::EmptyPath)?;

            let reference = path.reference();
            let archive = PathSpeed {
                header: Header::now(&self.params.odom_frame),
                poses: path.points.clone(),
                speed_ms: path.speed_ms,
            };

            info!(
                "Path {} accepted: {} points at {:.2} m/s, starting from point {}",
                path_seq,
                path.points.len(),
                path.speed_ms,
                path.start_index
            );

            ds.accept_path(path);

            (path_seq, reference, archive)
        };

        self.publisher.publish_reference(&reference);

        if let Some(ref saver) = self.saver {
            saver.save(format!("paths/path{}.json", path_seq), archive);
        }

        Ok(path_seq)
    }

    /// Run one control tick.
    pub fn tick(&self) -> TickOutcome {
        let mut traj_ctrl = match self.traj_ctrl.try_lock() {
            Some(t) => t,
            None => {
                self.store.lock().num_skipped_ticks += 1;
                debug!("Previous tick still running, skipping");
                return TickOutcome::Skipped;
            }
        };

        let input = self.store.lock().snapshot();

        match traj_ctrl.proc(&input) {
            Ok((output, report)) => {
                self.publisher.publish_cmd(&output.cmd);

                if let Some(ref costs) = output.costs {
                    self.publisher.publish_costs(costs);
                }
                if let Some(path_seq) = output.goal_reached {
                    self.publisher.notify_goal_reached(path_seq);
                }

                TickOutcome::Ran(report)
            }
            Err(e) => {
                warn!("Error during trajectory control processing: {}", e);
                self.publisher.publish_cmd(&VelCmd::stop());

                TickOutcome::Failed
            }
        }
    }

    /// Read access to the data store, for monitoring.
    pub fn with_store<R, F: FnOnce(&DataStore) -> R>(&self, f: F) -> R {
        f(&self.store.lock())
    }
}

impl ChannelPublisher {
    /// Create a new publisher and the receiving end of its channel.
    ///
    /// If the channel is full new messages are dropped.
    pub fn new(capacity: usize) -> (Self, Receiver<Outbound>) {
        let (sender, receiver) = bounded(capacity);

        (Self { sender }, receiver)
    }

    fn send(&self, msg: Outbound) {
        match self.sender.try_send(msg) {
            Ok(()) => (),
            Err(TrySendError::Full(m)) => warn!("Outbound queue full, dropping {:?}", m),
            Err(TrySendError::Disconnected(_)) => trace!("Outbound queue disconnected"),
        }
    }
}

impl Publisher for ChannelPublisher {
    fn publish_cmd(&self, cmd: &VelCmd) {
        self.send(Outbound::Cmd(*cmd));
    }

    fn publish_costs(&self, costs: &CostTm) {
        self.send(Outbound::Costs(*costs));
    }

    fn publish_reference(&self, reference: &RefPath) {
        self.send(Outbound::Reference(reference.clone()));
    }

    fn notify_goal_reached(&self, path_seq: u64) {
        self.send(Outbound::GoalReached(path_seq));
    }
}

impl NodeHandle {
    /// Stop the workers and wait for them to exit.
    pub fn shutdown(self) -> Result<(), NodeError> {
        self.shutdown.store(true, Ordering::Relaxed);

        let mut result = Ok(());
        for (name, handle) in self.workers {
            if handle.join().is_err() {
                error!("The {} worker panicked", name);
                result = Err(NodeError::WorkerPanicked(name));
            }
        }

        result
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Start the localisation, path, and control timer workers.
///
/// Returns the senders feeding the inbound queues, whose capacities are given, and a handle used
/// to stop the workers.
pub fn spawn(
    node: Arc<TrackerNode>,
    loc_queue_len: usize,
    path_queue_len: usize,
) -> Result<(NodeInputs, NodeHandle), NodeError> {
    let (loc_tx, loc_rx) = bounded::<Odometry>(loc_queue_len);
    let (path_tx, path_rx) = bounded::<PathSpeed>(path_queue_len);
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut handle = NodeHandle {
        shutdown: shutdown.clone(),
        workers: Vec::with_capacity(3),
    };

    let started = {
        let node = node.clone();
        let shutdown = shutdown.clone();
        spawn_worker(&mut handle, "localisation", move || {
            loc_worker(node, loc_rx, shutdown)
        })
    }
    .and_then(|()| {
        let node = node.clone();
        let shutdown = shutdown.clone();
        spawn_worker(&mut handle, "path", move || {
            path_worker(node, path_rx, shutdown)
        })
    })
    .and_then(|()| {
        spawn_worker(&mut handle, "timer", move || timer_worker(node, shutdown))
    });

    if let Err(e) = started {
        // Stop whatever was already started
        handle.shutdown().ok();
        return Err(e);
    }

    Ok((
        NodeInputs {
            loc: loc_tx,
            path: path_tx,
        },
        handle,
    ))
}

fn spawn_worker<F>(handle: &mut NodeHandle, name: &'static str, work: F) -> Result<(), NodeError>
where
    F: FnOnce() + Send + 'static,
{
    let h = thread::Builder::new()
        .name(format!("trk_{}", name))
        .spawn(work)
        .map_err(|e| NodeError::SpawnFailed(name, e))?;

    handle.workers.push((name, h));

    Ok(())
}

fn loc_worker(node: Arc<TrackerNode>, rx: Receiver<Odometry>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        match rx.recv_timeout(WORKER_POLL_PERIOD) {
            Ok(odom) => {
                node.on_odometry(&odom);
            }
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn path_worker(node: Arc<TrackerNode>, rx: Receiver<PathSpeed>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        let msg = match rx.recv_timeout(WORKER_POLL_PERIOD) {
            Ok(m) => m,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        // Keep hold of the message while backing off so it is processed once the backoff ends
        loop {
            match node.on_path(&msg, Instant::now()) {
                Ok(path_seq) => trace!("Path update {} processed", path_seq),
                Err(PathUpdateError::BackingOff(remaining)) => {
                    if shutdown.load(Ordering::Relaxed) {
                        return;
                    }
                    thread::sleep(remaining.min(WORKER_POLL_PERIOD));
                    continue;
                }
                Err(e) => warn!("Path update failed: {}", e),
            }

            break;
        }
    }
}

/// Run the control tick at a fixed period.
///
/// Ticks are scheduled on a fixed grid. If a tick overruns, the periods it overlapped are skipped
/// rather than run back to back.
fn timer_worker(node: Arc<TrackerNode>, shutdown: Arc<AtomicBool>) {
    let period = node.params.control_period;
    let mut next_tick = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        let now = Instant::now();

        if now < next_tick {
            thread::sleep((next_tick - now).min(WORKER_POLL_PERIOD));
            continue;
        }

        node.tick();

        let tick_end = Instant::now();
        let mut missed = 0u32;
        next_tick += period;

        while next_tick <= tick_end {
            next_tick += period;
            missed += 1;
        }

        let mut ds = node.store.lock();
        if missed > 0 {
            ds.num_consec_cycle_overruns += 1;
            warn!(
                "Control tick overran by {:.06} s, skipping {} period(s)",
                (tick_end - now).as_secs_f64() - period.as_secs_f64(),
                missed
            );
        } else {
            ds.num_consec_cycle_overruns = 0;
        }
    }
}
