// Gaussian kernel density estimation
//
// One-dimensional KDE used by the threshold estimator to model the
// empirical window-amplitude distributions. Bandwidth follows Scott's rule
// unless the caller overrides the factor.

use std::f64::consts::PI;

/// Degenerate samples (a single point, or all points equal) get this
/// bandwidth floor instead of a singular estimate.
const MIN_BANDWIDTH: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct GaussianKde {
    samples: Vec<f64>,
    bandwidth: f64,
}

impl GaussianKde {
    /// Build an estimator over `samples`. `bw_factor` scales the sample
    /// standard deviation; it defaults to Scott's factor `n^(-1/5)`.
    pub fn new(samples: Vec<f64>, bw_factor: Option<f64>) -> Self {
        let n = samples.len() as f64;
        let std = sample_std(&samples);
        let factor = bw_factor.unwrap_or_else(|| n.powf(-0.2));
        let bandwidth = (factor * std).max(MIN_BANDWIDTH);
        Self { samples, bandwidth }
    }

    /// Estimated density at `x`. Zero when there are no samples.
    pub fn evaluate(&self, x: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let norm = 1.0 / (self.samples.len() as f64 * self.bandwidth * (2.0 * PI).sqrt());
        let sum: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let z = (x - s) / self.bandwidth;
                (-0.5 * z * z).exp()
            })
            .sum();
        norm * sum
    }

    /// Density folded at zero, for data with non-negative support. The
    /// plain estimate leaks mass below zero; folding reflects it back.
    pub fn folded(&self, x: f64) -> f64 {
        self.evaluate(x) + self.evaluate(-x)
    }
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_density_peaks_near_samples() {
        let kde = GaussianKde::new(vec![1.0, 2.0, 3.0, 2.0, 2.5], None);
        assert!(kde.evaluate(2.0) > kde.evaluate(10.0));
        assert!(kde.evaluate(2.0) > kde.evaluate(-2.0));
    }

    #[test]
    fn test_folded_doubles_at_zero() {
        let kde = GaussianKde::new(vec![0.5, 1.0, 1.5], None);
        assert!((kde.folded(0.0) - 2.0 * kde.evaluate(0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_samples_are_zero_density() {
        let kde = GaussianKde::new(Vec::new(), None);
        assert_eq!(kde.evaluate(1.0), 0.0);
        assert_eq!(kde.folded(1.0), 0.0);
    }

    #[test]
    fn test_degenerate_samples_stay_finite() {
        let kde = GaussianKde::new(vec![5.0, 5.0, 5.0], None);
        assert!(kde.evaluate(5.0).is_finite());
        assert!(kde.evaluate(5.0) > kde.evaluate(6.0));
    }

    #[test]
    fn test_integrates_to_one() {
        let kde = GaussianKde::new(vec![2.0, 4.0, 6.0], None);
        let step = 0.01;
        let mass: f64 = (0..4000)
            .map(|i| kde.evaluate(-10.0 + i as f64 * step) * step)
            .sum();
        assert!((mass - 1.0).abs() < 1e-3);
    }
}
