// VAD Configuration and Constants

use serde::{Deserialize, Serialize};

/// Threshold search grid: candidate thresholds are evaluated on
/// [0, KDE_GRID_MAX) in KDE_GRID_STEP increments.
pub const KDE_GRID_MAX: f64 = 40.0;
pub const KDE_GRID_STEP: f64 = 0.1;

/// Parameters for the windowed voice activity detection stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    /// Non-overlapping classification window, seconds.
    pub window_length: f64,
    /// Largest tolerated temporal shift between badges picking up the same
    /// voice, seconds. Converted to a sample-lag bound for the correlation
    /// search using the recording's sample period.
    pub max_temporal_shift: f64,
    /// Minimum cross-channel correlation for a window to count as one
    /// genuine talker plus leakage on every other channel.
    pub genuine_correlation_threshold: f64,
    /// Silence gate factor on the dominant channel's global mean.
    pub silence_threshold_mean: f64,
    /// Silence gate factor on the dominant channel's global std.
    pub silence_threshold_std: f64,
    /// Correlation above which two simultaneously flagged channels are
    /// considered to capture the same voice.
    pub real_correlation_threshold: f64,
    /// Flag a window as candidate speech when its mean exceeds thr_mean.
    pub threshold_by_mean: bool,
    /// Flag a window as candidate speech when its std exceeds thr_std.
    pub threshold_by_std: bool,
    /// Bandwidth factor for the threshold density estimates. Scott's rule
    /// when unset.
    pub kde_bandwidth: Option<f64>,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            window_length: 1.0,
            max_temporal_shift: 0.15,
            genuine_correlation_threshold: 0.86,
            silence_threshold_mean: 0.5,
            silence_threshold_std: 0.0,
            real_correlation_threshold: 0.88,
            threshold_by_mean: true,
            threshold_by_std: true,
            kde_bandwidth: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VadConfig::default();
        assert_eq!(config.window_length, 1.0);
        assert_eq!(config.genuine_correlation_threshold, 0.86);
        assert_eq!(config.real_correlation_threshold, 0.88);
        assert!(config.threshold_by_mean);
        assert!(config.kde_bandwidth.is_none());
    }
}
