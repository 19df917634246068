//! Main tracker executable entry point.
//!
//! # Architecture
//!
//! The tracker node runs on its own worker threads (see `trk_lib::node`). This executable drives
//! it in closed loop with a simulated robot:
//!
//!     - Initialise the session, logging, parameters and modules
//!     - Start the node workers
//!     - Main loop:
//!         - Step the simulated robot with the latest command
//!         - Publish the robot's transform and odometry
//!         - Handle everything the node published, sending the next path once a goal is reached
//!
//! The paths to track are loaded from the directory given as the only argument, or from the
//! `paths_dir` parameter. If neither is set a demonstration path is generated.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use comms_if::msg::{PathSpeed, Pose2};
use trk_lib::{
    frame::{FrameService, TfBuffer},
    node::{self, ChannelPublisher, NodeInputs, NodeParams, Outbound, TrackerNode},
    optimizer::ShootingOptimizer,
    params::TrkExecParams,
    path_store,
    sim::{self, SimRobot},
    traj_ctrl::{Params, TrajCtrl},
};
use util::{host, logger::logger_init, module::State, session::Session};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new("trk_exec", "sessions").wrap_err("Failed to create the session")?;

    // Parameters are needed for the log levels, so they are loaded before the logger
    let exec_params: TrkExecParams =
        util::params::load("trk_exec.toml").wrap_err("Could not load trk_exec params")?;
    exec_params
        .validate()
        .wrap_err("Invalid trk_exec params")?;

    let (min_level, module_levels) = exec_params.log_levels()?;

    // Initialise logger
    logger_init(min_level, &module_levels, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("MPC Path Tracker Executable\n");
    info!(
        "Software root: {:?}",
        host::get_sw_root().wrap_err("Failed to get the software root")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PATHS ----

    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    let paths_dir = match args.len() {
        1 => exec_params.paths_dir.clone(),
        2 => Some(args[1].clone()),
        n => {
            return Err(eyre!(
                "Expected either zero or one argument, found {}",
                n - 1
            ))
        }
    };

    let mut pending_paths: VecDeque<PathSpeed> = match paths_dir {
        Some(ref dir) => {
            info!("Loading paths from {:?}", dir);
            path_store::load_paths_from_dir(dir)
                .wrap_err("Failed to load the paths")?
                .into()
        }
        None => {
            info!("No paths directory given, tracking the demonstration path");
            vec![sim::demo_path(&exec_params.sim)].into()
        }
    };

    if pending_paths.is_empty() {
        return Err(eyre!("No paths to track"));
    }

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let traj_params: Params =
        util::params::load("traj_ctrl.toml").wrap_err("Could not load traj_ctrl params")?;

    let node_params = NodeParams {
        odom_frame: exec_params.odom_frame.clone(),
        tf_backoff: exec_params.tf_backoff(),
        goal_radius_m: traj_params.goal_radius_m,
        lookahead_window: traj_params.lookahead_window,
        heading_jump_threshold_rad: traj_params.heading_jump_threshold_rad,
        control_period: Duration::from_secs_f64(traj_params.dt_s()),
    };

    let traj_ctrl = TrajCtrl::init((traj_params, Box::new(ShootingOptimizer::new())))
        .wrap_err("Failed to initialise TrajCtrl")?;
    info!("TrajCtrl init complete");

    let tf_buffer = Arc::new(TfBuffer::new(
        exec_params.tf_max_age_s,
        exec_params.tf_lookup_timeout(),
    ));
    for st in exec_params.static_transforms.iter() {
        tf_buffer.set_static_transform(&st.parent, &st.child, st.transform);
    }
    info!(
        "Transform buffer initialised with {} static transform(s)",
        exec_params.static_transforms.len()
    );

    let (publisher, outbound) = ChannelPublisher::new(exec_params.out_queue_len);

    let node = Arc::new(TrackerNode::new(
        node_params,
        traj_ctrl,
        tf_buffer.clone() as Arc<dyn FrameService>,
        Arc::new(publisher),
        Some(session.saver()),
    ));

    let (inputs, handle) = node::spawn(
        node.clone(),
        exec_params.loc_queue_len,
        exec_params.path_queue_len,
    )
    .wrap_err("Failed to start the tracker node")?;

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    let mut robot = SimRobot::new(Pose2::new(
        exec_params.sim.start_x_m,
        exec_params.sim.start_y_m,
        exec_params.sim.start_heading_rad,
    ));
    let period = Duration::from_secs_f64(exec_params.sim.period_s);
    let max_duration = Duration::from_secs_f64(exec_params.sim.max_duration_s);

    // Publish the robot once so the first path has a pose to start from
    publish_robot(&robot, &tf_buffer, &inputs, &exec_params)?;
    send_next_path(&mut pending_paths, &inputs)?;

    info!("Beginning main loop\n");

    let start = Instant::now();
    let mut num_paths_done = 0;

    loop {
        let cycle_start = Instant::now();

        // ---- SIMULATION ----

        robot.step(exec_params.sim.period_s);
        publish_robot(&robot, &tf_buffer, &inputs, &exec_params)?;

        // ---- NODE OUTPUT HANDLING ----

        let mut all_done = false;

        for msg in outbound.try_iter() {
            match msg {
                Outbound::Cmd(cmd) => robot.set_cmd(cmd),
                Outbound::Costs(costs) => trace!("Costs: {:?}", costs),
                Outbound::Reference(reference) => info!(
                    "Tracking path {} with {} points",
                    reference.path_seq,
                    reference.poses.len()
                ),
                Outbound::GoalReached(path_seq) => {
                    info!(
                        "Goal of path {} reached after {:.2} s at {:?}",
                        path_seq,
                        start.elapsed().as_secs_f64(),
                        robot.pose
                    );
                    num_paths_done += 1;

                    if pending_paths.is_empty() {
                        all_done = true;
                    } else {
                        send_next_path(&mut pending_paths, &inputs)?;
                    }
                }
            }
        }

        if all_done {
            info!("All {} path(s) tracked", num_paths_done);
            break;
        }

        if start.elapsed() > max_duration {
            warn!(
                "Maximum duration of {:?} reached with {} path(s) tracked",
                max_duration, num_paths_done
            );
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = cycle_start.elapsed();

        match period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Simulation cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - period.as_secs_f64()
            ),
        }
    }

    // ---- SHUTDOWN ----

    node.with_store(|ds| {
        info!(
            "Transform failures: {}, heading jumps: {}, skipped ticks: {}",
            ds.num_tf_failures, ds.num_heading_jumps, ds.num_skipped_ticks
        )
    });

    handle
        .shutdown()
        .wrap_err("Failed to stop the tracker node")?;

    info!("End of execution");

    session.exit();

    Ok(())
}

/// Publish the robot body transform and its odometry.
fn publish_robot(
    robot: &SimRobot,
    tf_buffer: &TfBuffer,
    inputs: &NodeInputs,
    exec_params: &TrkExecParams,
) -> Result<(), Report> {
    let (transform, stamp) = robot.body_transform();
    tf_buffer.set_transform(
        &exec_params.odom_frame,
        &exec_params.car_frame,
        transform,
        stamp,
    );

    inputs
        .loc
        .send(robot.odometry(&exec_params.odom_frame))
        .map_err(|_| eyre!("The localisation queue is closed"))
}

/// Send the next pending path to the node.
fn send_next_path(
    pending_paths: &mut VecDeque<PathSpeed>,
    inputs: &NodeInputs,
) -> Result<(), Report> {
    if let Some(path) = pending_paths.pop_front() {
        info!(
            "Sending path of {} points in {:?}, {} remaining",
            path.poses.len(),
            path.header.frame_id,
            pending_paths.len()
        );

        inputs
            .path
            .send(path)
            .map_err(|_| eyre!("The path queue is closed"))?;
    }

    Ok(())
}
