// Cross-correlation primitive
//
// Normalized cross-correlation between two real sequences of possibly
// unequal length over a bounded lag range. The shorter sequence slides as
// the template over the zero-padded longer one; every caller in this crate
// reduces the output to its maximum over the lag range.

/// Cross-correlate two sequences over `2 * max_lag + 1` lags.
///
/// `max_lag` defaults to the full valid overlap range, one less than the
/// shorter sequence's length. With `normalize` set, each lag is divided by
/// the geometric mean of the window energies, giving values in [-1, 1]; a
/// window with exactly zero energy yields 0.0 instead of a division error.
pub fn xcorr(a: &[f64], b: &[f64], max_lag: Option<usize>, normalize: bool) -> Vec<f64> {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let s_len = short.len();
    let max_lag = max_lag.unwrap_or_else(|| s_len.saturating_sub(1));
    let short_energy: f64 = short.iter().map(|v| v * v).sum();

    // Pad so the template window stays in bounds at every lag
    let right_pad = max_lag.saturating_sub(long.len() - s_len);
    let mut padded = vec![0.0; max_lag + long.len() + right_pad];
    padded[max_lag..max_lag + long.len()].copy_from_slice(long);

    let mut corr = Vec::with_capacity(2 * max_lag + 1);
    for lag in 0..=2 * max_lag {
        let window = &padded[lag..lag + s_len];
        let mut dot = 0.0;
        for (w, s) in window.iter().zip(short) {
            dot += w * s;
        }
        if normalize {
            let window_energy: f64 = window.iter().map(|v| v * v).sum();
            let denom = (window_energy * short_energy).sqrt();
            dot = if denom > 0.0 { dot / denom } else { 0.0 };
        }
        corr.push(dot);
    }
    corr
}

/// Maximum normalized cross-correlation over the allowed lag range.
pub fn max_xcorr(a: &[f64], b: &[f64], max_lag: usize) -> f64 {
    xcorr(a, b, Some(max_lag), true)
        .into_iter()
        .fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_correlation_is_one_at_zero_lag() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let corr = xcorr(&x, &x, None, true);
        assert_eq!(corr.len(), 7);
        // Center of the output is the zero-lag correlation
        assert!((corr[3] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_values_bounded() {
        let a = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0];
        let b = [2.0, 7.0, 1.0, 8.0, 2.0, 8.0];
        for v in xcorr(&a, &b, Some(4), true) {
            assert!(v.abs() <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn test_zero_energy_window_is_zero() {
        let silent = [0.0, 0.0, 0.0];
        let loud = [1.0, 2.0, 3.0];
        for v in xcorr(&silent, &loud, Some(1), true) {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_unequal_lengths() {
        let short = [1.0, 2.0];
        let long = [0.0, 1.0, 2.0, 0.0];
        let corr = xcorr(&short, &long, Some(1), true);
        assert_eq!(corr.len(), 3);
        // Argument order does not matter for the maximum
        let m1 = max_xcorr(&short, &long, 1);
        let m2 = max_xcorr(&long, &short, 1);
        assert!((m1 - m2).abs() < 1e-12);
    }

    #[test]
    fn test_unnormalized_dot() {
        let corr = xcorr(&[1.0, 1.0], &[2.0, 3.0], Some(0), false);
        assert_eq!(corr, vec![5.0]);
    }

    #[test]
    fn test_scaled_copy_correlates_fully() {
        let a = [4.0, 2.0, 6.0, 1.0];
        let b: Vec<f64> = a.iter().map(|v| v * 0.3).collect();
        assert!((max_xcorr(&a, &b, 2) - 1.0).abs() < 1e-12);
    }
}
