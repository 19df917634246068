//! # Trajectory Control Benchmark

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use comms_if::msg::Pose2;
use trk_lib::{
    frame::to_local,
    loc::{LocEstimate, Velocity},
    optimizer::ShootingOptimizer,
    traj_ctrl::{ActivePath, InputData, LocalCurve, Params, TrackingState, TrajCtrl},
};
use util::module::State;

fn traj_ctrl_benchmark(c: &mut Criterion) {
    // ---- Build a gently curving path and a robot slightly off it ----

    let points: Vec<Pose2> = (0..200)
        .map(|i| {
            let x = i as f64 * 0.05;
            Pose2::new(x, 0.3 * (0.5 * x).sin(), (0.15 * (0.5 * x).cos()).atan())
        })
        .collect();

    let robot = Pose2::new(0.4, 0.15, 0.1);

    let path = ActivePath::new(1, "odom", points.clone(), 0.4, &robot, 50).unwrap();

    let input = InputData {
        tracking: TrackingState::Tracking,
        loc: Some(LocEstimate {
            frame_id: "odom".into(),
            stamp: Utc::now(),
            pose: robot,
            velocity: Velocity {
                linear_ms: 0.3,
                angular_rads: 0.0,
            },
        }),
        path: Some(Arc::new(path)),
    };

    // ---- Curve fit ----

    let (xs, ys) = to_local(&points[5..55], &robot);

    c.bench_function("local_curve_fit", |b| {
        b.iter(|| LocalCurve::fit(black_box(&xs), black_box(&ys), 3).unwrap())
    });

    // ---- Full control tick ----

    let mut traj_ctrl =
        TrajCtrl::init((Params::default(), Box::new(ShootingOptimizer::new()))).unwrap();

    c.bench_function("traj_ctrl_proc", |b| {
        b.iter(|| traj_ctrl.proc(black_box(&input)).unwrap())
    });
}

criterion_group!(benches, traj_ctrl_benchmark);
criterion_main!(benches);
