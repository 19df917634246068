//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Evaluate a polynomial at `x` using Horner's scheme.
///
/// Coefficients are ordered lowest power first, i.e. `c[0] + c[1]*x + c[2]*x^2 + ...`. An empty
/// coefficient slice evaluates to zero.
pub fn poly_eval<T>(coeffs: &[T], x: T) -> T
where
    T: Float,
{
    coeffs
        .iter()
        .rev()
        .fold(T::zero(), |acc, &c| acc * x + c)
}

/// Evaluate the first derivative of a polynomial at `x`.
///
/// Coefficients are ordered lowest power first, as for [`poly_eval`].
pub fn poly_deriv_eval<T>(coeffs: &[T], x: T) -> T
where
    T: Float,
{
    let mut res = T::zero();

    for (i, &c) in coeffs.iter().enumerate().skip(1).rev() {
        res = res * x + c * T::from(i).unwrap_or_else(T::nan);
    }

    res
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Wrap an angle into the range [-pi, pi).
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float,
{
    let pi_t = T::from(std::f64::consts::PI).unwrap_or_else(T::nan);
    let tau_t = T::from(std::f64::consts::TAU).unwrap_or_else(T::nan);

    rem_euclid(angle + pi_t, tau_t) - pi_t
}

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_poly_eval() {
        // 1 + 2x + 3x^2
        let c = [1.0, 2.0, 3.0];
        assert_eq!(poly_eval(&c, 0.0), 1.0);
        assert_eq!(poly_eval(&c, 2.0), 17.0);
        assert_eq!(poly_eval::<f64>(&[], 3.0), 0.0);

        // d/dx = 2 + 6x
        assert_eq!(poly_deriv_eval(&c, 0.0), 2.0);
        assert_eq!(poly_deriv_eval(&c, 2.0), 14.0);
        assert_eq!(poly_deriv_eval(&[5.0], 2.0), 0.0);
    }

    #[test]
    fn test_wrap_pi() {
        assert!((wrap_pi(0.5) - 0.5).abs() < 1e-12);
        assert!((wrap_pi(PI + 0.5) - (-PI + 0.5)).abs() < 1e-12);
        assert!((wrap_pi(-PI - 0.5) - (PI - 0.5)).abs() < 1e-12);
        assert!((wrap_pi(4.0 * PI + 1.0) - 1.0).abs() < 1e-9);
    }
}
