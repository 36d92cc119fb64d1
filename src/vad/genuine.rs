// Genuine-speech detector
//
// Per-window search for the single dominant talker, validated by requiring
// every other channel's pickup in the same window to correlate with the
// dominant channel. High correlation on a quiet channel proves its reading
// is leakage of the same voice rather than independent speech, so the
// window gets one +1 (dominant) and -1 on everyone else; a failed
// correlation leaves the whole window undetermined.

use std::collections::BTreeMap;

use log::debug;

use super::config::VadConfig;
use super::xcorr::max_xcorr;
use crate::dataset::{MeetingDataset, ParticipantId};
use crate::error::{AnalysisError, Result};

struct WindowStats {
    win_mean: Vec<f64>,
    win_std: Vec<f64>,
    gen_speak: Vec<i8>,
    global_mean: f64,
    global_std: f64,
}

/// Classify every window of the meeting and populate the window statistics
/// (`win_time`, `win_mean`, `win_std`, global stats) and `gen_speak` on all
/// records. The final window is left unclassified since its upper edge may
/// exceed the recording.
pub fn genuine_speak(dataset: &mut MeetingDataset, config: &VadConfig) -> Result<()> {
    let ids = dataset.ids();
    if ids.len() < 2 {
        return Err(AnalysisError::InsufficientParticipants(ids.len()));
    }
    for (&id, rec) in dataset.records() {
        if rec.time.len() != rec.signal.len() {
            return Err(AnalysisError::MalformedRecord {
                participant: id,
                reason: format!(
                    "time and signal lengths differ ({} vs {})",
                    rec.time.len(),
                    rec.signal.len()
                ),
            });
        }
        if rec.time.len() < 2 {
            return Err(AnalysisError::MalformedRecord {
                participant: id,
                reason: "need at least two samples".into(),
            });
        }
    }

    let sample_period = dataset.sample_period()?;
    let max_lag = (config.max_temporal_shift / sample_period).round() as usize;
    let start = dataset.meeting_start()?;
    let end = dataset.meeting_end()?;
    if end <= start {
        return Err(AnalysisError::NoCommonInterval);
    }
    let num_win = ((end - start) / config.window_length).ceil() as usize;
    debug!(
        "classifying {} windows of {} s across {} channels (lag bound {} samples)",
        num_win,
        config.window_length,
        ids.len(),
        max_lag
    );

    let mut stats: BTreeMap<ParticipantId, WindowStats> = ids
        .iter()
        .map(|&id| {
            let rec = &dataset.records()[&id];
            let st = WindowStats {
                win_mean: vec![0.0; num_win],
                win_std: vec![0.0; num_win],
                gen_speak: vec![0; num_win],
                global_mean: mean(&rec.signal),
                global_std: pop_std(&rec.signal),
            };
            (id, st)
        })
        .collect();

    for w in 0..num_win.saturating_sub(1) {
        let win_start = start + w as f64 * config.window_length;
        let win_end = win_start + config.window_length;

        for (&id, st) in stats.iter_mut() {
            let samples = dataset.records()[&id].window_samples(win_start, win_end);
            if samples.is_empty() {
                return Err(AnalysisError::EmptyWindow {
                    participant: id,
                    window: w,
                });
            }
            st.win_mean[w] = mean(samples);
            st.win_std[w] = pop_std(samples);
        }

        // Dominant channel: maximum windowed mean, earliest id on ties
        let mut dom_id = ids[0];
        for &id in &ids[1..] {
            if stats[&id].win_mean[w] > stats[&dom_id].win_mean[w] {
                dom_id = id;
            }
        }

        // Gate against the dominant channel's own global statistics to
        // avoid false detections during silence
        let dom = &stats[&dom_id];
        let gate = config.silence_threshold_mean * dom.global_mean
            + config.silence_threshold_std * dom.global_std;
        if dom.win_mean[w] < gate {
            continue;
        }

        let dom_samples = dataset.records()[&dom_id].window_samples(win_start, win_end);
        let mut genuine = true;
        for &id in &ids {
            if id == dom_id {
                continue;
            }
            let samples = dataset.records()[&id].window_samples(win_start, win_end);
            if max_xcorr(dom_samples, samples, max_lag) < config.genuine_correlation_threshold {
                genuine = false;
                break;
            }
        }
        if genuine {
            for (&id, st) in stats.iter_mut() {
                st.gen_speak[w] = if id == dom_id { 1 } else { -1 };
            }
        }
    }

    let win_time: Vec<f64> = (0..num_win)
        .map(|w| start + w as f64 * config.window_length)
        .collect();
    for (&id, rec) in dataset.records_mut().iter_mut() {
        if let Some(st) = stats.remove(&id) {
            rec.win_time = Some(win_time.clone());
            rec.win_mean = Some(st.win_mean);
            rec.win_std = Some(st.win_std);
            rec.gen_speak = Some(st.gen_speak);
            rec.global_mean = Some(st.global_mean);
            rec.global_std = Some(st.global_std);
            // Provisional; the threshold estimator settles this
            rec.is_beacon = false;
        }
    }
    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population (ddof = 0) standard deviation.
fn pop_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
