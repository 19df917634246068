//! # Shooting optimizer
//!
//! A single shooting solver for the path tracking problem. The decision variables are the angular
//! rate and acceleration demands over the horizon, the states are obtained by rolling the
//! kinematic model forward from the predicted state:
//!
//! ```text
//! x'      = x + v cos(heading) dt
//! y'      = y + v sin(heading) dt
//! heading'= heading + w dt
//! v'      = v + a dt
//! cte'    = f(x) - y + v sin(etheta) dt
//! etheta' = atan(f'(x)) - heading - w dt
//! ```
//!
//! where `f` is the local curve. The cost is the weighted sum of squared tracking errors, speed
//! error, actuation, and actuation rate. It is minimised by projected gradient descent with a
//! backtracking line search, so the demands always respect their bounds. The solution of the
//! previous solve, shifted by one step, is used as the starting point.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use nalgebra::DVector;

use comms_if::msg::CostTm;
use util::maths::{poly_deriv_eval, poly_eval};

use super::{Optimizer, OptimizerError, OptimizerInput, OptimizerOutput};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Perturbation used for the finite difference gradient
const GRAD_EPSILON: f64 = 1e-6;

/// Sufficient decrease constant of the line search
const ARMIJO_C: f64 = 1e-4;

/// Maximum number of step halvings in one line search
const MAX_BACKTRACKS: usize = 40;

const MIN_STEP: f64 = 1e-12;
const MAX_STEP: f64 = 1e3;
const INITIAL_STEP: f64 = 1e-3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Projected gradient descent shooting optimizer.
#[derive(Debug, Clone)]
pub struct ShootingOptimizer {
    /// Solution of the last solve, `[w0, a0, w1, a1, ...]`
    prev_controls: Option<DVector<f64>>,

    /// Step length carried between solves
    step: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ShootingOptimizer {
    pub fn new() -> Self {
        Self {
            prev_controls: None,
            step: INITIAL_STEP,
        }
    }

    /// Starting point of the solve, the previous solution advanced by one step.
    fn warm_start(&self, num_controls: usize, input: &OptimizerInput<'_>) -> DVector<f64> {
        let mut u = DVector::zeros(2 * num_controls);

        if let Some(ref prev) = self.prev_controls {
            if prev.len() == u.len() {
                for i in 0..num_controls {
                    let j = (i + 1).min(num_controls - 1);
                    u[2 * i] = prev[2 * j];
                    u[2 * i + 1] = prev[2 * j + 1];
                }
            }
        }

        project(&mut u, input);
        u
    }
}

impl Default for ShootingOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer for ShootingOptimizer {
    fn solve(&mut self, input: &OptimizerInput<'_>) -> Result<OptimizerOutput, OptimizerError> {
        if !(input.state.iter().all(|s| s.is_finite())
            && input.coeffs.iter().all(|c| c.is_finite())
            && input.ref_vel_ms.is_finite()
            && input.dt_s.is_finite())
        {
            return Err(OptimizerError::InvalidInput);
        }

        let num_controls = input.tuning.mpc_steps.saturating_sub(1).max(1);
        let mut u = self.warm_start(num_controls, input);
        let mut cost = rollout_cost(&u, input).total;

        let mut step = self.step;
        let mut iters = 0;

        for _ in 0..input.tuning.max_iters {
            iters += 1;

            let grad = gradient(&u, input);
            if grad.iter().any(|g| !g.is_finite()) {
                return Err(OptimizerError::NonFiniteSolution);
            }

            // Backtracking line search along the projected gradient
            let mut accepted = None;
            for _ in 0..MAX_BACKTRACKS {
                let mut candidate = &u - &grad * step;
                project(&mut candidate, input);

                let candidate_cost = rollout_cost(&candidate, input).total;
                let decrease = grad.dot(&(&u - &candidate));

                if candidate_cost.is_finite() && candidate_cost <= cost - ARMIJO_C * decrease {
                    accepted = Some((candidate, candidate_cost));
                    break;
                }

                step = (step * 0.5).max(MIN_STEP);
            }

            // No descent possible from here, the solution is stationary
            let (candidate, candidate_cost) = match accepted {
                Some(a) => a,
                None => break,
            };

            let rel_change = (cost - candidate_cost) / (1.0 + cost.abs());
            u = candidate;
            cost = candidate_cost;
            step = (step * 2.0).min(MAX_STEP);

            if rel_change < input.tuning.tolerance {
                break;
            }
        }

        let costs = rollout_cost(&u, input);
        let output = OptimizerOutput {
            angvel_rads: u[0],
            accel_ms2: u[1],
            costs,
        };

        if !output.is_finite() {
            self.prev_controls = None;
            return Err(OptimizerError::NonFiniteSolution);
        }

        trace!(
            "Shooting solve finished after {} iterations with cost {}",
            iters,
            costs.total
        );

        self.prev_controls = Some(u);
        self.step = step;

        Ok(output)
    }

    fn reset(&mut self) {
        self.prev_controls = None;
        self.step = INITIAL_STEP;
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp the demands into their bounds.
fn project(u: &mut DVector<f64>, input: &OptimizerInput<'_>) {
    let max_w = input.tuning.max_angvel_rads;
    let max_a = input.tuning.max_throttle_ms2;

    for i in 0..u.len() / 2 {
        u[2 * i] = u[2 * i].max(-max_w).min(max_w);
        u[2 * i + 1] = u[2 * i + 1].max(-max_a).min(max_a);
    }
}

/// Central difference gradient of the total cost.
fn gradient(u: &DVector<f64>, input: &OptimizerInput<'_>) -> DVector<f64> {
    let mut grad = DVector::zeros(u.len());
    let mut probe = u.clone();

    for i in 0..u.len() {
        probe[i] = u[i] + GRAD_EPSILON;
        let plus = rollout_cost(&probe, input).total;

        probe[i] = u[i] - GRAD_EPSILON;
        let minus = rollout_cost(&probe, input).total;

        probe[i] = u[i];
        grad[i] = (plus - minus) / (2.0 * GRAD_EPSILON);
    }

    grad
}

/// Roll the model forward under the demands `u` and compute the cost of the trajectory.
fn rollout_cost(u: &DVector<f64>, input: &OptimizerInput<'_>) -> CostTm {
    let t = input.tuning;
    let dt = input.dt_s;
    let bound = t.bound_value;
    let num_controls = u.len() / 2;

    let [mut x, mut y, mut heading, mut v, mut cte, mut etheta] = input.state;

    let mut cte_cost = 0.0;
    let mut etheta_cost = 0.0;
    let mut other_cost = 0.0;

    for step in 0..=num_controls {
        cte_cost += t.w_cte * (cte - t.ref_cte_m).powi(2);
        etheta_cost += t.w_etheta * (etheta - t.ref_etheta_rad).powi(2);
        other_cost += t.w_vel * (v - input.ref_vel_ms).powi(2);

        if step == num_controls {
            break;
        }

        let w = u[2 * step];
        let a = u[2 * step + 1];

        other_cost += t.w_angvel * w.powi(2) + t.w_accel * a.powi(2);
        if step + 1 < num_controls {
            other_cost += t.w_angvel_d * (u[2 * step + 2] - w).powi(2)
                + t.w_accel_d * (u[2 * step + 3] - a).powi(2);
        }

        let f = poly_eval(input.coeffs, x);
        let path_heading = poly_deriv_eval(input.coeffs, x).atan();

        let next_cte = f - y + v * etheta.sin() * dt;
        let next_etheta = path_heading - heading - w * dt;

        x = saturate(x + v * heading.cos() * dt, bound);
        y = saturate(y + v * heading.sin() * dt, bound);
        heading = saturate(heading + w * dt, bound);
        v = saturate(v + a * dt, bound);
        cte = saturate(next_cte, bound);
        etheta = saturate(next_etheta, bound);
    }

    CostTm {
        total: cte_cost + etheta_cost + other_cost,
        cte: cte_cost,
        etheta: etheta_cost,
    }
}

fn saturate(value: f64, bound: f64) -> f64 {
    value.max(-bound).min(bound)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traj_ctrl::MpcParams;

    fn input<'a>(state: [f64; 6], coeffs: &'a [f64], tuning: &'a MpcParams) -> OptimizerInput<'a> {
        OptimizerInput {
            state,
            coeffs,
            tuning,
            ref_vel_ms: 0.5,
            dt_s: 0.1,
        }
    }

    #[test]
    fn test_on_path_at_speed() {
        let tuning = MpcParams::default();
        let coeffs = [0.0, 0.0, 0.0, 0.0];
        let mut opt = ShootingOptimizer::new();

        let out = opt
            .solve(&input([0.0, 0.0, 0.0, 0.5, 0.0, 0.0], &coeffs, &tuning))
            .unwrap();

        assert!(out.angvel_rads.abs() < 1e-3, "{:?}", out);
        assert!(out.accel_ms2.abs() < 1e-3, "{:?}", out);
        assert!(out.costs.total < 1e-3);
    }

    #[test]
    fn test_turns_towards_path() {
        let tuning = MpcParams::default();
        let mut opt = ShootingOptimizer::new();

        // Path to the left
        let left = [0.5, 0.0, 0.0, 0.0];
        let out = opt
            .solve(&input([0.0, 0.0, 0.0, 0.3, 0.5, 0.0], &left, &tuning))
            .unwrap();
        assert!(out.angvel_rads > 0.0, "{:?}", out);
        assert!(out.costs.cte > 0.0);
        assert!(out.costs.total >= out.costs.cte + out.costs.etheta);

        // Path to the right
        opt.reset();
        let right = [-0.5, 0.0, 0.0, 0.0];
        let out = opt
            .solve(&input([0.0, 0.0, 0.0, 0.3, -0.5, 0.0], &right, &tuning))
            .unwrap();
        assert!(out.angvel_rads < 0.0, "{:?}", out);
    }

    #[test]
    fn test_accelerates_to_reference() {
        let tuning = MpcParams::default();
        let coeffs = [0.0, 0.0, 0.0, 0.0];
        let mut opt = ShootingOptimizer::new();

        let out = opt
            .solve(&input([0.0; 6], &coeffs, &tuning))
            .unwrap();

        assert!(out.accel_ms2 > 0.0, "{:?}", out);
        assert!(out.accel_ms2 <= tuning.max_throttle_ms2);
    }

    #[test]
    fn test_respects_bounds() {
        let mut tuning = MpcParams::default();
        tuning.max_angvel_rads = 0.1;
        tuning.max_throttle_ms2 = 0.05;
        let coeffs = [2.0, 1.0, 0.0, 0.0];
        let mut opt = ShootingOptimizer::new();

        for _ in 0..3 {
            let out = opt
                .solve(&input([0.0, 0.0, 0.0, 0.0, 2.0, 0.78], &coeffs, &tuning))
                .unwrap();
            assert!(out.angvel_rads.abs() <= 0.1 + 1e-12);
            assert!(out.accel_ms2.abs() <= 0.05 + 1e-12);
        }
    }

    #[test]
    fn test_invalid_input() {
        let tuning = MpcParams::default();
        let coeffs = [0.0, std::f64::NAN];
        let mut opt = ShootingOptimizer::new();

        assert_eq!(
            opt.solve(&input([0.0; 6], &coeffs, &tuning)),
            Err(OptimizerError::InvalidInput)
        );
    }
}
