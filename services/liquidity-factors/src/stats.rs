//! Robust statistics helpers
//!
//! Median/MAD based z-scores and the logistic squash used to bound the
//! composite factors. Everything here is stateless.

/// Guard added to denominators that may legitimately be zero.
pub const EPS: f64 = 1e-12;

/// Scales MAD to a standard-deviation equivalent under normality.
pub const MAD_SCALE: f64 = 1.4826;

/// History shorter than this normalises to a neutral 0.0.
pub const MIN_HISTORY: usize = 5;

/// Sort a copy of `values` ascending.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Linear-interpolated quantile of an already sorted sample.
///
/// `q` is clamped to `[0, 1]`. An empty sample yields 0.0.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            (sorted[lo] + (sorted[hi] - sorted[lo]) * frac).clamp(sorted[lo], sorted[hi])
        }
    }
}

/// Linear-interpolated quantile of an unsorted sample.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(quantile_sorted(&sorted(values), q))
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Median absolute deviation from the median.
pub fn mad(values: &[f64]) -> Option<f64> {
    let med = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    median(&deviations)
}

/// Robust z-score of `x` against `history`:
/// `(x - median) / (1.4826 * MAD + EPS)`.
///
/// Returns exactly 0.0 while `history` holds fewer than [`MIN_HISTORY`]
/// samples, so a warming-up window never produces alarming scores.
pub fn robust_z(x: f64, history: &[f64]) -> f64 {
    if history.len() < MIN_HISTORY {
        return 0.0;
    }
    match (median(history), mad(history)) {
        (Some(med), Some(mad)) => (x - med) / (MAD_SCALE * mad + EPS),
        _ => 0.0,
    }
}

/// Logistic function mapping ℝ onto (0, 1).
pub fn squash(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let sample = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&sample, 0.0), Some(1.0));
        assert_eq!(quantile(&sample, 1.0), Some(5.0));
        // pos = 0.95 * 4 = 3.8 -> 4 + 0.8 * (5 - 4)
        let p95 = quantile(&sample, 0.95).unwrap();
        assert!((p95 - 4.8).abs() < 1e-12);
        // pos = 0.1 * 4 = 0.4 -> 1 + 0.4 * (2 - 1)
        let p10 = quantile(&sample, 0.10).unwrap();
        assert!((p10 - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_single_value() {
        assert_eq!(quantile(&[7.5], 0.95), Some(7.5));
        assert_eq!(quantile_sorted(&[], 0.5), 0.0);
    }

    #[test]
    fn test_mad() {
        // median 3, deviations [2,1,0,1,2] -> MAD 1
        assert_eq!(mad(&[1.0, 2.0, 3.0, 4.0, 5.0]), Some(1.0));
    }

    #[test]
    fn test_robust_z_warm_up_is_neutral() {
        for len in 0..MIN_HISTORY {
            let history: Vec<f64> = (0..len).map(|i| i as f64 * 10.0).collect();
            assert_eq!(robust_z(1e9, &history), 0.0);
            assert_eq!(robust_z(-1e9, &history), 0.0);
        }
    }

    #[test]
    fn test_robust_z_known_value() {
        let history = [1.0, 2.0, 3.0, 4.0, 5.0];
        let z = robust_z(4.4826, &history);
        // (4.4826 - 3) / (1.4826 * 1)
        assert!((z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_robust_z_constant_history_is_finite() {
        let history = [2.0; 10];
        assert_eq!(robust_z(2.0, &history), 0.0);
        let z = robust_z(3.0, &history);
        assert!(z.is_finite());
        assert!(z > 0.0);
    }

    #[test]
    fn test_squash_bounds() {
        assert_eq!(squash(0.0), 0.5);
        assert!(squash(10.0) > 0.99);
        assert!(squash(-10.0) < 0.01);
        assert!((0.0..=1.0).contains(&squash(1e6)));
        assert!((0.0..=1.0).contains(&squash(-1e6)));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_short_history_always_neutral(
            history in prop::collection::vec(-1e6f64..1e6, 0..MIN_HISTORY),
            x in -1e9f64..1e9,
        ) {
            prop_assert_eq!(robust_z(x, &history), 0.0);
        }

        #[test]
        fn prop_robust_z_shift_invariant(
            history in prop::collection::vec(-1_000.0f64..1_000.0, MIN_HISTORY..40),
            x in -1_000.0f64..1_000.0,
            shift in -1_000.0f64..1_000.0,
        ) {
            prop_assume!(mad(&history).unwrap() > 1e-3);
            let shifted: Vec<f64> = history.iter().map(|h| h + shift).collect();
            let z = robust_z(x, &history);
            let z_shifted = robust_z(x + shift, &shifted);
            prop_assert!((z - z_shifted).abs() <= 1e-6 * (1.0 + z.abs()));
        }

        #[test]
        fn prop_quantiles_are_ordered(values in prop::collection::vec(0.0f64..1.0, 1..200)) {
            let s = sorted(&values);
            let p50 = quantile_sorted(&s, 0.5);
            let p95 = quantile_sorted(&s, 0.95);
            let max = quantile_sorted(&s, 1.0);
            prop_assert!(p50 <= p95);
            prop_assert!(p95 <= max);
        }
    }
}
