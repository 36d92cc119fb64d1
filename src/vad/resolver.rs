// All-speak / real-speak resolution
//
// all_speak applies each participant's personal thresholds to flag
// candidate speaking windows. real_speak turns the candidates into the
// final timeline: windows already confirmed as leakage are vetoed, and when
// several badges are flagged at once, highly correlated pairs are assumed
// to capture the same voice and the quieter one is suppressed.

use log::debug;

use super::config::VadConfig;
use super::xcorr::max_xcorr;
use crate::dataset::{MeetingDataset, ParticipantId};
use crate::error::{AnalysisError, Result};

/// Flag candidate speaking windows for every non-beacon participant. A
/// window qualifies when its mean exceeds `thr_mean` or its std exceeds
/// `thr_std`, for whichever rules are enabled.
pub fn all_speak(dataset: &mut MeetingDataset, config: &VadConfig) -> Result<()> {
    for (&id, rec) in dataset.records_mut().iter_mut() {
        let win_mean = rec
            .win_mean
            .as_ref()
            .ok_or(AnalysisError::MissingStage("genuine_speak"))?;
        let num_win = win_mean.len();
        if rec.is_beacon {
            rec.all_speak = Some(vec![false; num_win]);
            continue;
        }
        let mut flags = vec![false; num_win];
        if config.threshold_by_mean {
            let thr = rec
                .thr_mean
                .ok_or(AnalysisError::MissingStage("calculate_thresholds"))?;
            for (flag, &m) in flags.iter_mut().zip(win_mean) {
                if m > thr {
                    *flag = true;
                }
            }
        }
        if config.threshold_by_std {
            let win_std = rec
                .win_std
                .as_ref()
                .ok_or(AnalysisError::MissingStage("genuine_speak"))?;
            let thr = rec
                .thr_std
                .ok_or(AnalysisError::MissingStage("calculate_thresholds"))?;
            for (flag, &s) in flags.iter_mut().zip(win_std) {
                if s > thr {
                    *flag = true;
                }
            }
        }
        debug!(
            "participant {}: {} candidate speaking windows",
            id,
            flags.iter().filter(|&&f| f).count()
        );
        rec.all_speak = Some(flags);
    }
    Ok(())
}

/// Resolve the candidate flags into the final `real_speak` timeline.
///
/// Suppression works on pairs: the speaking set of a window is snapshotted
/// up front and every pair in it is compared in ascending participant
/// order, clearing the quieter flag of a correlated pair even if an earlier
/// pair already cleared one of the two. With three or more mutually
/// correlated channels this order-dependent scheme is not globally optimal;
/// the approximation is intentional.
pub fn real_speak(dataset: &mut MeetingDataset, config: &VadConfig) -> Result<()> {
    let ids = dataset.ids();

    for rec in dataset.records_mut().values_mut() {
        let all = rec
            .all_speak
            .as_ref()
            .ok_or(AnalysisError::MissingStage("all_speak"))?;
        let gen = rec
            .gen_speak
            .as_ref()
            .ok_or(AnalysisError::MissingStage("genuine_speak"))?;
        // Confirmed leakage can never count as real speech
        let real: Vec<bool> = if rec.is_beacon {
            vec![false; all.len()]
        } else {
            all.iter().zip(gen).map(|(&a, &g)| a && g >= 0).collect()
        };
        rec.real_speak = Some(real);
    }

    let sample_period = dataset.sample_period()?;
    let max_lag = (config.max_temporal_shift / sample_period).round() as usize;
    let num_win = dataset.num_windows()?;

    for w in 0..num_win.saturating_sub(1) {
        let speaking: Vec<ParticipantId> = ids
            .iter()
            .copied()
            .filter(|&id| {
                dataset.records()[&id]
                    .real_speak
                    .as_ref()
                    .map(|rs| rs[w])
                    .unwrap_or(false)
            })
            .collect();
        if speaking.len() < 2 {
            continue;
        }

        let first = &dataset.records()[&speaking[0]];
        let win_time = first
            .win_time
            .as_ref()
            .ok_or(AnalysisError::MissingStage("genuine_speak"))?;
        let (win_start, win_end) = (win_time[w], win_time[w + 1]);

        let mut losers: Vec<ParticipantId> = Vec::new();
        for i in 0..speaking.len() - 1 {
            for j in i + 1..speaking.len() {
                let rec_i = &dataset.records()[&speaking[i]];
                let rec_j = &dataset.records()[&speaking[j]];
                let corr = max_xcorr(
                    rec_i.window_samples(win_start, win_end),
                    rec_j.window_samples(win_start, win_end),
                    max_lag,
                );
                if corr > config.real_correlation_threshold {
                    let mean_i = rec_i
                        .win_mean
                        .as_ref()
                        .ok_or(AnalysisError::MissingStage("genuine_speak"))?[w];
                    let mean_j = rec_j
                        .win_mean
                        .as_ref()
                        .ok_or(AnalysisError::MissingStage("genuine_speak"))?[w];
                    // Same voice on both badges: drop the quieter pickup
                    losers.push(if mean_i > mean_j {
                        speaking[j]
                    } else {
                        speaking[i]
                    });
                }
            }
        }
        for id in losers {
            if let Some(rec) = dataset.get_mut(id) {
                if let Some(real) = rec.real_speak.as_mut() {
                    real[w] = false;
                }
            }
        }
    }
    Ok(())
}
