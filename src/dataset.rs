// Meeting data model
//
// MeetingDataset maps participant ids to per-channel records. Preprocessing
// creates the raw time/signal arrays; every later field is filled in place
// by exactly one pipeline stage. Meeting-wide derived scalars are memoized
// on first access and stay valid for the dataset's lifetime, so a dataset
// must be fully built before analysis starts.

use std::collections::BTreeMap;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

pub type ParticipantId = u32;

/// Per-participant channel data, widened in place by each pipeline stage.
///
/// `time` and `signal` are always present. The stage fields stay `None`
/// until the owning stage runs: the genuine-speech detector fills the window
/// statistics and `gen_speak`, the threshold estimator fills `thr_mean`,
/// `thr_std` and settles `is_beacon`, the resolver fills `all_speak` and
/// `real_speak`, and the metrics engine fills the scalar counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Epoch timestamp per audio sample, monotonically increasing.
    pub time: Vec<f64>,
    /// Amplitude per sample, non-negative after preprocessing.
    pub signal: Vec<f64>,

    /// Window start timestamps, fixed step equal to the window length.
    pub win_time: Option<Vec<f64>>,
    /// Per-window amplitude mean.
    pub win_mean: Option<Vec<f64>>,
    /// Per-window amplitude standard deviation.
    pub win_std: Option<Vec<f64>>,
    pub global_mean: Option<f64>,
    pub global_std: Option<f64>,
    /// +1 confirmed dominant talker, -1 confirmed leakage, 0 undetermined.
    pub gen_speak: Option<Vec<i8>>,

    /// Speaking decision boundary on the windowed mean. Unset for beacons.
    pub thr_mean: Option<f64>,
    /// Speaking decision boundary on the windowed std. Unset for beacons.
    pub thr_std: Option<f64>,
    /// True once the threshold estimator finds no genuine-speech window for
    /// this channel. Beacons are excluded from members() and all metrics.
    pub is_beacon: bool,

    /// Amplitude-threshold speaking candidate, before cross-talk resolution.
    pub all_speak: Option<Vec<bool>>,
    /// Final resolved per-window speaking flag.
    pub real_speak: Option<Vec<bool>>,
    /// Gap-filled copies of `real_speak`, keyed by the max gap used.
    pub real_speak_filled: BTreeMap<usize, Vec<bool>>,

    /// Fraction of the meeting this participant spoke.
    pub speaking_time: Option<f64>,
    /// Fraction of the meeting this participant spoke in overlap.
    pub overlap_time: Option<f64>,
    /// Number of overlapping-speech episodes this participant entered.
    pub overlap_count: Option<u32>,
    /// Number of debounced turns this participant took.
    pub turn_taking_count: Option<u32>,
}

impl ChannelRecord {
    pub fn new(time: Vec<f64>, signal: Vec<f64>) -> Self {
        Self {
            time,
            signal,
            ..Default::default()
        }
    }

    /// Samples with `win_start <= t < win_end`. Timestamps are sorted, so
    /// the slice bounds come from a binary search.
    pub fn window_samples(&self, win_start: f64, win_end: f64) -> &[f64] {
        let lo = self.time.partition_point(|&t| t < win_start);
        let hi = self.time.partition_point(|&t| t < win_end);
        &self.signal[lo..hi]
    }
}

/// All channel records of one meeting plus memoized meeting-wide scalars.
///
/// Records are held in an ordered map so that every per-window scan and the
/// pairwise cross-talk resolution visit participants in ascending id order.
#[derive(Debug, Default)]
pub struct MeetingDataset {
    records: BTreeMap<ParticipantId, ChannelRecord>,
    sample_period: OnceCell<f64>,
    window_length: OnceCell<f64>,
    meeting_start: OnceCell<f64>,
    meeting_end: OnceCell<f64>,
}

impl MeetingDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ParticipantId, record: ChannelRecord) {
        self.records.insert(id, record);
    }

    pub fn get(&self, id: ParticipantId) -> Option<&ChannelRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: ParticipantId) -> Option<&mut ChannelRecord> {
        self.records.get_mut(&id)
    }

    pub fn records(&self) -> &BTreeMap<ParticipantId, ChannelRecord> {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut BTreeMap<ParticipantId, ChannelRecord> {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All participant ids in ascending order.
    pub fn ids(&self) -> Vec<ParticipantId> {
        self.records.keys().copied().collect()
    }

    /// Non-beacon participant ids in ascending order. Until the threshold
    /// estimator has run, no channel is marked as a beacon and every
    /// participant is a member.
    pub fn members(&self) -> Vec<ParticipantId> {
        self.records
            .iter()
            .filter(|(_, rec)| !rec.is_beacon)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Channels classified as non-human beacons.
    pub fn beacons(&self) -> Vec<ParticipantId> {
        self.records
            .iter()
            .filter(|(_, rec)| rec.is_beacon)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Seconds between consecutive samples, assumed uniform across the
    /// whole recording and identical across participants.
    pub fn sample_period(&self) -> Result<f64> {
        self.sample_period
            .get_or_try_init(|| {
                let id = *self.members().first().ok_or(AnalysisError::EmptyDataset)?;
                let rec = &self.records[&id];
                if rec.time.len() < 2 {
                    return Err(AnalysisError::MalformedRecord {
                        participant: id,
                        reason: "need at least two samples".into(),
                    });
                }
                Ok(rec.time[1] - rec.time[0])
            })
            .copied()
    }

    /// Length of the classification window in seconds.
    pub fn window_length(&self) -> Result<f64> {
        self.window_length
            .get_or_try_init(|| {
                let id = *self.members().first().ok_or(AnalysisError::EmptyDataset)?;
                let win_time = self.records[&id]
                    .win_time
                    .as_ref()
                    .ok_or(AnalysisError::MissingStage("genuine_speak"))?;
                if win_time.len() < 2 {
                    return Err(AnalysisError::MalformedRecord {
                        participant: id,
                        reason: "fewer than two windows".into(),
                    });
                }
                Ok(win_time[1] - win_time[0])
            })
            .copied()
    }

    /// Number of classification windows spanning the meeting.
    pub fn num_windows(&self) -> Result<usize> {
        let id = *self.members().first().ok_or(AnalysisError::EmptyDataset)?;
        let win_time = self.records[&id]
            .win_time
            .as_ref()
            .ok_or(AnalysisError::MissingStage("genuine_speak"))?;
        Ok(win_time.len())
    }

    /// Latest first-sample timestamp over all members.
    pub fn meeting_start(&self) -> Result<f64> {
        self.meeting_start
            .get_or_try_init(|| self.edge_timestamp(true))
            .copied()
    }

    /// Earliest last-sample timestamp over all members.
    pub fn meeting_end(&self) -> Result<f64> {
        self.meeting_end
            .get_or_try_init(|| self.edge_timestamp(false))
            .copied()
    }

    pub fn meeting_duration(&self) -> Result<f64> {
        Ok(self.meeting_end()? - self.meeting_start()?)
    }

    fn edge_timestamp(&self, start: bool) -> Result<f64> {
        let members = self.members();
        if members.is_empty() {
            return Err(AnalysisError::EmptyDataset);
        }
        let mut edge = if start {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
        for id in members {
            let rec = &self.records[&id];
            let t = if start {
                rec.time.first()
            } else {
                rec.time.last()
            };
            let &t = t.ok_or_else(|| AnalysisError::MalformedRecord {
                participant: id,
                reason: "empty time array".into(),
            })?;
            edge = if start { edge.max(t) } else { edge.min(t) };
        }
        Ok(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(times: &[f64]) -> ChannelRecord {
        ChannelRecord::new(times.to_vec(), vec![0.0; times.len()])
    }

    #[test]
    fn test_derived_scalars() {
        let mut ds = MeetingDataset::new();
        ds.insert(1, record(&[0.0, 0.5, 1.0, 1.5, 2.0]));
        ds.insert(2, record(&[0.5, 1.0, 1.5, 2.0, 2.5]));

        assert!((ds.sample_period().unwrap() - 0.5).abs() < 1e-12);
        assert!((ds.meeting_start().unwrap() - 0.5).abs() < 1e-12);
        assert!((ds.meeting_end().unwrap() - 2.0).abs() < 1e-12);
        assert!((ds.meeting_duration().unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_members_and_beacons() {
        let mut ds = MeetingDataset::new();
        ds.insert(3, record(&[0.0, 1.0]));
        ds.insert(1, record(&[0.0, 1.0]));
        ds.insert(2, record(&[0.0, 1.0]));

        // Before threshold estimation everyone is a member, in id order
        assert_eq!(ds.members(), vec![1, 2, 3]);

        ds.get_mut(2).unwrap().is_beacon = true;
        assert_eq!(ds.members(), vec![1, 3]);
        assert_eq!(ds.beacons(), vec![2]);
    }

    #[test]
    fn test_window_samples_half_open() {
        let rec = ChannelRecord::new(
            vec![0.0, 0.5, 1.0, 1.5, 2.0],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        );
        assert_eq!(rec.window_samples(0.0, 1.0), &[1.0, 2.0]);
        assert_eq!(rec.window_samples(1.0, 2.0), &[3.0, 4.0]);
        assert!(rec.window_samples(3.0, 4.0).is_empty());
    }

    #[test]
    fn test_window_scalars_require_vad() {
        let mut ds = MeetingDataset::new();
        ds.insert(1, record(&[0.0, 1.0]));
        assert!(matches!(
            ds.window_length(),
            Err(AnalysisError::MissingStage("genuine_speak"))
        ));
    }
}
