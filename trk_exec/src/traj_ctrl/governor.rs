//! # Output governor
//!
//! Turns the optimizer's raw demands into the velocity command actually issued.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::msg::VelCmd;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the command for the given current speed and optimizer demands.
///
/// The speed demand is integrated over one control period and clamped into `[0, max_speed_ms]`.
/// The angular rate is passed through, bounding it is the optimizer's job.
pub fn govern(
    speed_ms: f64,
    accel_ms2: f64,
    angvel_rads: f64,
    dt_s: f64,
    max_speed_ms: f64,
) -> VelCmd {
    VelCmd {
        linear_ms: clamp_speed(speed_ms + accel_ms2 * dt_s, max_speed_ms),
        angular_rads: angvel_rads,
    }
}

/// Clamp a speed demand into `[0, max_speed_ms]`. Non-finite demands become zero.
pub fn clamp_speed(speed_ms: f64, max_speed_ms: f64) -> f64 {
    if speed_ms.is_nan() || speed_ms <= 0.0 {
        0.0
    } else if speed_ms >= max_speed_ms {
        max_speed_ms
    } else {
        speed_ms
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_speed_always_clamped() {
        let max_speed_ms = 0.5;
        let demands = [
            -1e9,
            -3.0,
            -0.0,
            0.0,
            0.2,
            0.5,
            0.51,
            7.0,
            1e12,
            std::f64::INFINITY,
            std::f64::NEG_INFINITY,
            std::f64::NAN,
        ];

        for speed in demands.iter() {
            for accel in demands.iter() {
                let cmd = govern(*speed, *accel, 1.0, 0.1, max_speed_ms);
                assert!(
                    cmd.linear_ms >= 0.0 && cmd.linear_ms <= max_speed_ms,
                    "v = {}, a = {} gave {}",
                    speed,
                    accel,
                    cmd.linear_ms
                );
            }
        }
    }

    #[test]
    fn test_govern() {
        let cmd = govern(0.3, 1.0, -0.7, 0.1, 0.5);
        assert!((cmd.linear_ms - 0.4).abs() < 1e-12);
        assert_eq!(cmd.angular_rads, -0.7);

        // Never reverses
        assert_eq!(govern(0.05, -1.0, 0.0, 0.1, 0.5).linear_ms, 0.0);
    }
}
