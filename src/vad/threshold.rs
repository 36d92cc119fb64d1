// Adaptive threshold estimation
//
// For each participant, the windows the detector confirmed as "this badge's
// own speech" (gen_speak > 0) and "someone else's speech leaking in"
// (gen_speak < 0) form two empirical amplitude distributions. Their density
// crossover becomes that participant's personal speaking boundary. Channels
// with no confirmed speech at all are non-human beacons.

use log::{debug, warn};

use super::config::{KDE_GRID_MAX, KDE_GRID_STEP};
use super::kde::GaussianKde;
use crate::dataset::{MeetingDataset, ParticipantId};
use crate::error::{AnalysisError, Result};

/// Estimate `thr_mean` and `thr_std` for every participant with at least
/// one genuine-speech window; mark the rest as beacons. `bandwidth`
/// overrides the KDE bandwidth factor (Scott's rule when `None`).
pub fn calculate_thresholds(dataset: &mut MeetingDataset, bandwidth: Option<f64>) -> Result<()> {
    for (&id, rec) in dataset.records_mut().iter_mut() {
        let gen_speak = rec
            .gen_speak
            .as_ref()
            .ok_or(AnalysisError::MissingStage("genuine_speak"))?;
        let win_mean = rec
            .win_mean
            .as_ref()
            .ok_or(AnalysisError::MissingStage("genuine_speak"))?;
        let win_std = rec
            .win_std
            .as_ref()
            .ok_or(AnalysisError::MissingStage("genuine_speak"))?;

        if gen_speak.iter().any(|&g| g > 0) {
            let thr_mean = detect_threshold(win_mean, gen_speak, bandwidth, id, "win_mean");
            let thr_std = detect_threshold(win_std, gen_speak, bandwidth, id, "win_std");
            rec.thr_mean = Some(thr_mean);
            rec.thr_std = Some(thr_std);
        } else {
            debug!(
                "participant {} has no genuine-speech windows, marking as beacon",
                id
            );
            rec.is_beacon = true;
        }
    }
    Ok(())
}

/// Scan the evaluation grid upward for the first point where the speaking
/// density exceeds the silent density. A crossing only counts once the
/// silent density has dominated at least once, which discards spurious
/// crossings before the distributions separate. No crossing at all is a
/// detection failure that degrades to a zero threshold.
fn detect_threshold(
    values: &[f64],
    gen_speak: &[i8],
    bandwidth: Option<f64>,
    participant: ParticipantId,
    stat: &str,
) -> f64 {
    let speaking: Vec<f64> = values
        .iter()
        .zip(gen_speak)
        .filter(|(_, &g)| g > 0)
        .map(|(&v, _)| v)
        .collect();
    let silent: Vec<f64> = values
        .iter()
        .zip(gen_speak)
        .filter(|(_, &g)| g < 0)
        .map(|(&v, _)| v)
        .collect();

    let kde_speaking = GaussianKde::new(speaking, bandwidth);
    let kde_silent = GaussianKde::new(silent, bandwidth);

    let steps = (KDE_GRID_MAX / KDE_GRID_STEP) as usize;
    let mut silent_dominated = false;
    for i in 0..steps {
        let x = i as f64 * KDE_GRID_STEP;
        if kde_speaking.folded(x) > kde_silent.folded(x) {
            if silent_dominated {
                return x;
            }
        } else {
            silent_dominated = true;
        }
    }

    warn!(
        "participant {}: no crossover between speaking and silent {} densities, falling back to threshold 0.0",
        participant, stat
    );
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ChannelRecord;

    fn labeled_record(speaking: &[f64], silent: &[f64]) -> ChannelRecord {
        let mut win_mean = Vec::new();
        let mut gen = Vec::new();
        for &v in silent {
            win_mean.push(v);
            gen.push(-1);
        }
        for &v in speaking {
            win_mean.push(v);
            gen.push(1);
        }
        let n = win_mean.len();
        let mut rec = ChannelRecord::new(vec![0.0, 1.0], vec![0.0, 0.0]);
        rec.win_time = Some((0..n).map(|w| w as f64).collect());
        rec.win_std = Some(win_mean.clone());
        rec.win_mean = Some(win_mean);
        rec.gen_speak = Some(gen);
        rec
    }

    #[test]
    fn test_threshold_lands_between_modes() {
        let speaking = [9.0, 10.0, 11.0, 10.5, 9.5, 10.2, 11.3, 9.8];
        let silent = [1.5, 2.0, 2.5, 1.8, 2.2, 2.4, 1.6, 2.1];
        let mut ds = MeetingDataset::new();
        ds.insert(1, labeled_record(&speaking, &silent));
        calculate_thresholds(&mut ds, None).unwrap();

        let rec = ds.get(1).unwrap();
        let thr = rec.thr_mean.unwrap();
        assert!(thr > 2.5 && thr < 9.0, "threshold {}", thr);
        assert!(!rec.is_beacon);
    }

    #[test]
    fn test_no_crossover_falls_back_to_zero() {
        // Speaking windows quieter than silent ones: the speaking density
        // dominates from x = 0 and never crosses after silent dominance
        let speaking = [0.5, 0.6, 0.7, 0.5];
        let silent = [30.0, 31.0, 32.0, 30.5];
        let mut ds = MeetingDataset::new();
        ds.insert(1, labeled_record(&speaking, &silent));
        calculate_thresholds(&mut ds, None).unwrap();

        assert_eq!(ds.get(1).unwrap().thr_mean.unwrap(), 0.0);
    }

    #[test]
    fn test_channel_without_genuine_speech_becomes_beacon() {
        let mut rec = labeled_record(&[], &[1.0, 1.2, 0.9]);
        rec.gen_speak = Some(vec![-1, -1, 0]);
        let mut ds = MeetingDataset::new();
        ds.insert(7, rec);
        calculate_thresholds(&mut ds, None).unwrap();

        let rec = ds.get(7).unwrap();
        assert!(rec.is_beacon);
        assert!(rec.thr_mean.is_none());
        assert!(rec.thr_std.is_none());
        assert_eq!(ds.members(), Vec::<u32>::new());
        assert_eq!(ds.beacons(), vec![7]);
    }

    #[test]
    fn test_requires_detector_output() {
        let mut ds = MeetingDataset::new();
        ds.insert(1, ChannelRecord::new(vec![0.0, 1.0], vec![0.0, 0.0]));
        let err = calculate_thresholds(&mut ds, None).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingStage("genuine_speak")));
    }
}
