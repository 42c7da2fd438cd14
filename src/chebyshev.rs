//! Chebyshev series evaluation and fitting.
//!
//! All block kinds store their payload as coefficients of a Chebyshev
//! series of the first kind over `x in [-1, 1]`. Evaluation uses the
//! Clenshaw recurrence, fitting a plain least squares solve.
use crate::Error;

use log::debug;
use nalgebra::{DMatrix, DVector};

/// Trailing coefficients below this magnitude carry no information
/// at float32 storage precision and are trimmed after fitting.
pub(crate) const TRIM_THRESHOLD: f64 = 1e-12;

/// Evaluates a Chebyshev series at `x` using the Clenshaw recurrence.
/// `x` must lie in `[-1, 1]`. An empty coefficient list evaluates to zero.
pub fn eval(coeffs: &[f64], x: f64) -> Result<f64, Error> {
    if !(-1.0..=1.0).contains(&x) {
        return Err(Error::OutOfDomain(x));
    }
    let n = coeffs.len();
    if n == 0 {
        return Ok(0.0);
    }
    if n == 1 {
        return Ok(coeffs[0]);
    }
    let x2 = 2.0 * x;
    let mut b_k1 = 0.0_f64;
    let mut b_k2 = 0.0_f64;
    for &c in coeffs[1..].iter().rev() {
        let b_k = c + x2 * b_k1 - b_k2;
        b_k2 = b_k1;
        b_k1 = b_k;
    }
    Ok(coeffs[0] + x * b_k1 - b_k2)
}

/// [eval] on float32 storage coefficients.
pub fn eval_f32(coeffs: &[f32], x: f64) -> Result<f64, Error> {
    if !(-1.0..=1.0).contains(&x) {
        return Err(Error::OutOfDomain(x));
    }
    let n = coeffs.len();
    if n == 0 {
        return Ok(0.0);
    }
    if n == 1 {
        return Ok(coeffs[0] as f64);
    }
    let x2 = 2.0 * x;
    let mut b_k1 = 0.0_f64;
    let mut b_k2 = 0.0_f64;
    for &c in coeffs[1..].iter().rev() {
        let b_k = c as f64 + x2 * b_k1 - b_k2;
        b_k2 = b_k1;
        b_k1 = b_k;
    }
    Ok(coeffs[0] as f64 + x * b_k1 - b_k2)
}

/// Unwraps a sequence sampled on a wrapping range `[lo, hi)` into a
/// continuous sequence, so a polynomial can be fit through a quantity
/// that crosses the seam (359.9° -> 0.1°). Each successive difference is
/// folded into half the range size before accumulating.
pub fn unwrap_angles(values: &[f64], lo: f64, hi: f64) -> Vec<f64> {
    let range = hi - lo;
    let mut unwrapped = Vec::with_capacity(values.len());
    let Some(first) = values.first() else {
        return unwrapped;
    };
    unwrapped.push(*first);
    for pair in values.windows(2) {
        let mut diff = pair[1] - pair[0];
        while diff > range / 2.0 {
            diff -= range;
        }
        while diff < -range / 2.0 {
            diff += range;
        }
        let previous = unwrapped[unwrapped.len() - 1];
        unwrapped.push(previous + diff);
    }
    unwrapped
}

/// Least squares fit of a degree `degree` Chebyshev series through the
/// samples `(xs[i], ys[i])`, `xs[i] in [-1, 1]`. The requested degree is
/// clamped so the system never has more unknowns than samples. Trailing
/// coefficients below [TRIM_THRESHOLD] are trimmed, keeping at least one.
pub fn fit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Vec<f64>, Error> {
    assert_eq!(xs.len(), ys.len());
    if xs.is_empty() {
        return Ok(vec![0.0]);
    }
    if let Some(&x) = xs.iter().find(|x| !(-1.0..=1.0).contains(*x)) {
        return Err(Error::OutOfDomain(x));
    }

    let degree = degree.min(xs.len() - 1);
    let n = degree + 1;

    // design matrix A[i][k] = T_k(x_i), by the forward recurrence
    let mut design = DMatrix::<f64>::zeros(xs.len(), n);
    for (i, &x) in xs.iter().enumerate() {
        let mut t_prev = 1.0;
        let mut t = x;
        design[(i, 0)] = t_prev;
        if n > 1 {
            design[(i, 1)] = t;
        }
        for k in 2..n {
            let t_next = 2.0 * x * t - t_prev;
            t_prev = t;
            t = t_next;
            design[(i, k)] = t;
        }
    }

    let rhs = DVector::from_column_slice(ys);
    let svd = design.svd(true, true);
    let solution = svd.solve(&rhs, 1e-14).map_err(|_| Error::FitFailure)?;

    let mut coeffs: Vec<f64> = solution.iter().copied().collect();
    let before = coeffs.len();
    while coeffs.len() > 1 && coeffs[coeffs.len() - 1].abs() < TRIM_THRESHOLD {
        coeffs.pop();
    }
    if coeffs.len() < before {
        debug!("trimmed {} negligible trailing coefficients", before - coeffs.len());
    }
    Ok(coeffs)
}

#[cfg(test)]
mod test {
    use super::*;

    /// Textbook evaluation: T_0 = 1, T_1 = x, T_{k+1} = 2x T_k - T_{k-1}
    fn eval_direct(coeffs: &[f64], x: f64) -> f64 {
        let mut sum = 0.0;
        let mut t_prev = 1.0;
        let mut t = x;
        for (k, &c) in coeffs.iter().enumerate() {
            let t_k = match k {
                0 => 1.0,
                1 => x,
                _ => {
                    let t_next = 2.0 * x * t - t_prev;
                    t_prev = t;
                    t = t_next;
                    t
                },
            };
            sum += c * t_k;
        }
        sum
    }

    #[test]
    fn clenshaw_matches_recurrence() {
        let coeffs: Vec<f64> = (0..32).map(|k| 1.0 / (1.0 + k as f64)).collect();
        for i in 0..=100 {
            let x = -1.0 + 2.0 * i as f64 / 100.0;
            let clenshaw = eval(&coeffs, x).unwrap();
            let direct = eval_direct(&coeffs, x);
            let scale = direct.abs().max(1.0);
            assert!(
                (clenshaw - direct).abs() / scale < 1e-12,
                "x={}: clenshaw {} direct {}",
                x,
                clenshaw,
                direct
            );
        }
    }

    #[test]
    fn stable_at_degree_63() {
        let coeffs: Vec<f64> = (0..64).map(|k| if k % 2 == 0 { 1e-3 } else { -1e-3 }).collect();
        let clenshaw = eval(&coeffs, 0.73).unwrap();
        let direct = eval_direct(&coeffs, 0.73);
        assert!((clenshaw - direct).abs() < 1e-12);
    }

    #[test]
    fn domain_is_enforced() {
        assert!(matches!(eval(&[1.0], 1.5), Err(Error::OutOfDomain(_))));
        assert!(matches!(eval(&[1.0], -1.0001), Err(Error::OutOfDomain(_))));
        assert!(eval(&[1.0], 1.0).is_ok());
        assert!(eval(&[1.0], -1.0).is_ok());
    }

    #[test]
    fn empty_and_constant() {
        assert_eq!(eval(&[], 0.3).unwrap(), 0.0);
        assert_eq!(eval(&[4.25], -0.9).unwrap(), 4.25);
    }

    #[test]
    fn unwrap_is_identity_on_smooth_input() {
        let values = vec![10.0, 12.5, 15.0, 17.5, 20.0];
        assert_eq!(unwrap_angles(&values, 0.0, 360.0), values);
    }

    #[test]
    fn unwrap_crosses_the_seam() {
        let values = vec![350.0, 355.0, 0.0, 5.0, 10.0];
        let unwrapped = unwrap_angles(&values, 0.0, 360.0);
        assert_eq!(unwrapped, vec![350.0, 355.0, 360.0, 365.0, 370.0]);
        // modulo the range, the unwrapped sequence is the original
        for (u, v) in unwrapped.iter().zip(values.iter()) {
            assert!((u.rem_euclid(360.0) - v.rem_euclid(360.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn unwrap_descending() {
        let values = vec![10.0, 5.0, 355.0, 350.0];
        let unwrapped = unwrap_angles(&values, 0.0, 360.0);
        assert_eq!(unwrapped, vec![10.0, 5.0, -5.0, -10.0]);
    }

    #[test]
    fn fit_recovers_a_series() {
        let truth = [0.4, -1.2, 0.3, 0.05];
        let xs: Vec<f64> = (0..50).map(|i| -1.0 + 2.0 * i as f64 / 49.0).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| eval(&truth, x).unwrap()).collect();
        let coeffs = fit(&xs, &ys, 8).unwrap();
        assert!(coeffs.len() >= truth.len());
        for (k, &c) in truth.iter().enumerate() {
            assert!((coeffs[k] - c).abs() < 1e-9, "c[{}]: {} vs {}", k, coeffs[k], c);
        }
        for c in &coeffs[truth.len()..] {
            assert!(c.abs() < 1e-9);
        }
    }

    #[test]
    fn fit_trims_trailing_noise() {
        let xs: Vec<f64> = (0..20).map(|i| -1.0 + 2.0 * i as f64 / 19.0).collect();
        let ys: Vec<f64> = xs.iter().map(|_| 2.5).collect();
        let coeffs = fit(&xs, &ys, 10).unwrap();
        assert_eq!(coeffs.len(), 1);
        assert!((coeffs[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn fit_degree_clamps_to_sample_count() {
        let coeffs = fit(&[0.0, 0.5], &[1.0, 2.0], 30).unwrap();
        assert!(coeffs.len() <= 2);
    }
}
