// Conversational metrics
//
// Reductions over the finalized real_speak timelines: speaking time,
// overlap time, onset-triggered overlap episodes, and a debounced
// turn-taking state machine. Overlap and turn counters are sequential by
// nature and must scan windows in time order. Beacons never participate.

use serde::{Deserialize, Serialize};

use crate::dataset::MeetingDataset;
use crate::error::{AnalysisError, Result};

/// Parameters for the conversational metrics reductions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Bridge short silences inside a speaker's run before counting
    /// overlaps and turns.
    pub fill_gaps: bool,
    /// Largest silence, in windows, that gap filling bridges.
    pub max_gap: usize,
    /// Consecutive single-speaker windows required before the active
    /// speaker changes.
    pub min_successive_non_overlap: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            fill_gaps: false,
            max_gap: 1,
            min_successive_non_overlap: 2,
        }
    }
}

/// Fraction of the meeting each member spent speaking.
pub fn speaking_time(dataset: &mut MeetingDataset) -> Result<()> {
    let window = dataset.window_length()?;
    let duration = dataset.meeting_duration()?;
    for rec in dataset.records_mut().values_mut().filter(|r| !r.is_beacon) {
        let real = rec
            .real_speak
            .as_ref()
            .ok_or(AnalysisError::MissingStage("real_speak"))?;
        let count = real.iter().filter(|&&s| s).count();
        rec.speaking_time = Some(window * count as f64 / duration);
    }
    Ok(())
}

/// Fraction of the meeting each member spent speaking while at least one
/// other member was speaking too.
pub fn overlap_time(dataset: &mut MeetingDataset) -> Result<()> {
    let window = dataset.window_length()?;
    let duration = dataset.meeting_duration()?;
    let num_win = dataset.num_windows()?;
    let timelines = member_timelines(dataset, false, 0)?;

    let mut totals = vec![0.0; timelines.len()];
    for w in 0..num_win {
        let speaking: Vec<usize> = (0..timelines.len()).filter(|&i| timelines[i][w]).collect();
        if speaking.len() >= 2 {
            for i in speaking {
                totals[i] += window;
            }
        }
    }
    for (rec, total) in dataset
        .records_mut()
        .values_mut()
        .filter(|r| !r.is_beacon)
        .zip(totals)
    {
        rec.overlap_time = Some(total / duration);
    }
    Ok(())
}

/// Bridge silences of up to `max_gap` windows inside a speaking run.
///
/// The scan reads the original timeline only, so repeated application with
/// the same `max_gap` is idempotent. A trailing silence shorter than the
/// remaining-window limit is bridged as well, without a confirmed
/// resumption.
pub fn fill_gaps(timeline: &[bool], max_gap: usize) -> Vec<bool> {
    let num_win = timeline.len();
    let mut filled = timeline.to_vec();
    for w in 0..num_win.saturating_sub(2) {
        if timeline[w] && !timeline[w + 1] {
            let mut gap = 1;
            let limit = (max_gap + 1).min(num_win - 1 - w);
            for d in 2..=limit {
                if timeline[w + d] {
                    break;
                }
                gap += 1;
            }
            if gap <= max_gap {
                for flag in filled.iter_mut().skip(w + 1).take(gap) {
                    *flag = true;
                }
            }
        }
    }
    filled
}

/// Store a gap-filled copy of every member's `real_speak` timeline, keyed
/// by `max_gap`. The original timeline is never modified.
pub fn fill_speech_gaps(dataset: &mut MeetingDataset, max_gap: usize) -> Result<()> {
    for rec in dataset.records_mut().values_mut().filter(|r| !r.is_beacon) {
        let real = rec
            .real_speak
            .as_ref()
            .ok_or(AnalysisError::MissingStage("real_speak"))?;
        let filled = fill_gaps(real, max_gap);
        rec.real_speak_filled.insert(max_gap, filled);
    }
    Ok(())
}

/// Count overlapping-speech episodes per member. An episode is counted
/// once at its onset; staying in overlap does not count again, and the
/// onset state resets as soon as the member stops speaking.
pub fn overlap_count(dataset: &mut MeetingDataset, use_filled: bool, max_gap: usize) -> Result<()> {
    let num_win = dataset.num_windows()?;
    let timelines = member_timelines(dataset, use_filled, max_gap)?;

    let mut counts = vec![0u32; timelines.len()];
    let mut prev_overlap = vec![false; timelines.len()];
    for w in 0..num_win {
        let speaking: Vec<bool> = timelines.iter().map(|t| t[w]).collect();
        if speaking.iter().filter(|&&s| s).count() >= 2 {
            for i in 0..timelines.len() {
                if speaking[i] && !prev_overlap[i] {
                    counts[i] += 1;
                    prev_overlap[i] = true;
                }
            }
        }
        for i in 0..timelines.len() {
            if !speaking[i] {
                prev_overlap[i] = false;
            }
        }
    }
    for (rec, count) in dataset
        .records_mut()
        .values_mut()
        .filter(|r| !r.is_beacon)
        .zip(counts)
    {
        rec.overlap_count = Some(count);
    }
    Ok(())
}

/// Count debounced turns per member.
///
/// Each window with exactly one speaker advances that speaker's
/// accumulator; reaching `min_successive_non_overlap` promotes them to
/// active speaker, counts one turn, and resets every accumulator. Windows
/// with zero or two-plus speakers neither confirm nor break a pending
/// turn, and brief blips below the debounce length never count.
pub fn turn_taking(
    dataset: &mut MeetingDataset,
    min_successive_non_overlap: usize,
    use_filled: bool,
    max_gap: usize,
) -> Result<()> {
    let num_win = dataset.num_windows()?;
    let timelines = member_timelines(dataset, use_filled, max_gap)?;

    let mut counts = vec![0u32; timelines.len()];
    let mut accum = vec![0usize; timelines.len()];
    let mut active: Option<usize> = None;
    for w in 0..num_win {
        let speaking: Vec<usize> = (0..timelines.len()).filter(|&i| timelines[i][w]).collect();
        if speaking.len() != 1 {
            continue;
        }
        let idx = speaking[0];
        if active == Some(idx) {
            continue;
        }
        accum[idx] += 1;
        if accum[idx] >= min_successive_non_overlap {
            active = Some(idx);
            counts[idx] += 1;
            accum.iter_mut().for_each(|a| *a = 0);
        }
    }
    for (rec, count) in dataset
        .records_mut()
        .values_mut()
        .filter(|r| !r.is_beacon)
        .zip(counts)
    {
        rec.turn_taking_count = Some(count);
    }
    Ok(())
}

/// Collect the members' timelines in ascending id order, filling gaps first
/// when requested and not already cached for this `max_gap`.
fn member_timelines(
    dataset: &mut MeetingDataset,
    use_filled: bool,
    max_gap: usize,
) -> Result<Vec<Vec<bool>>> {
    if use_filled {
        let missing = dataset
            .records()
            .values()
            .any(|rec| !rec.is_beacon && !rec.real_speak_filled.contains_key(&max_gap));
        if missing {
            fill_speech_gaps(dataset, max_gap)?;
        }
    }
    dataset
        .records()
        .values()
        .filter(|rec| !rec.is_beacon)
        .map(|rec| {
            if use_filled {
                rec.real_speak_filled
                    .get(&max_gap)
                    .cloned()
                    .ok_or(AnalysisError::MissingStage("fill_speech_gaps"))
            } else {
                rec.real_speak
                    .clone()
                    .ok_or(AnalysisError::MissingStage("real_speak"))
            }
        })
        .collect()
}
