//! # State prediction
//!
//! Builds the state vector handed to the optimizer, `[x, y, heading, speed, cte, etheta]`, in the
//! robot-local frame.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Optimizer state vector, `[x, y, heading, speed, cte, etheta]`.
pub type MpcState = [f64; 6];

/// The raw optimizer output issued on the previous tick.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize)]
pub struct PrevCommand {
    /// Units: radians/second
    pub angvel_rads: f64,

    /// Units: meters/second^2
    pub accel_ms2: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the optimizer state.
///
/// In delay mode the robot is assumed to keep executing `prev` for `dt_s` before the new command
/// takes effect, so the state is projected forward by that interval. Otherwise the state is the
/// robot at the origin with the current errors.
pub fn predict_state(
    delay_mode: bool,
    speed_ms: f64,
    cte_m: f64,
    etheta_rad: f64,
    prev: &PrevCommand,
    dt_s: f64,
) -> MpcState {
    if delay_mode {
        let heading_rad = prev.angvel_rads * dt_s;

        [
            speed_ms * dt_s,
            0.0,
            heading_rad,
            speed_ms + prev.accel_ms2 * dt_s,
            cte_m + speed_ms * etheta_rad.sin() * dt_s,
            etheta_rad - heading_rad,
        ]
    } else {
        [0.0, 0.0, 0.0, speed_ms, cte_m, etheta_rad]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_immediate() {
        let prev = PrevCommand {
            angvel_rads: 1.0,
            accel_ms2: 1.0,
        };

        assert_eq!(
            predict_state(false, 0.4, 0.1, -0.2, &prev, 0.1),
            [0.0, 0.0, 0.0, 0.4, 0.1, -0.2]
        );
    }

    #[test]
    fn test_delay() {
        let prev = PrevCommand {
            angvel_rads: 0.5,
            accel_ms2: -1.0,
        };
        let s = predict_state(true, 0.4, 0.1, 0.3, &prev, 0.1);

        let expected = [
            0.04,
            0.0,
            0.05,
            0.3,
            0.1 + 0.4 * 0.3f64.sin() * 0.1,
            0.25,
        ];
        for (a, b) in s.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12, "{:?} != {:?}", s, expected);
        }
    }

    #[test]
    fn test_zero_delay_matches_immediate() {
        let prev = PrevCommand {
            angvel_rads: -2.3,
            accel_ms2: 0.7,
        };

        for &(v, cte, eth) in [(0.0, 0.0, 0.0), (0.5, -0.3, 1.2), (-0.1, 2.0, -3.0)].iter() {
            assert_eq!(
                predict_state(true, v, cte, eth, &prev, 0.0),
                predict_state(false, v, cte, eth, &prev, 0.0)
            );
        }
    }
}
