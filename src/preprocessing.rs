// Badge packet ingestion and signal conditioning
//
// Consumes the line-delimited JSON stream produced by the badge hub and
// turns it into a MeetingDataset ready for the VAD pipeline: per-sample
// timestamps expanded from the packet headers, clock jumps closed, all
// channels truncated to the common recording interval, noise floor removed.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::dataset::{ChannelRecord, MeetingDataset, ParticipantId};
use crate::error::{AnalysisError, Result};

#[derive(Debug, Deserialize)]
struct BadgePacket {
    data: PacketData,
}

#[derive(Debug, Deserialize)]
struct PacketData {
    member_id: ParticipantId,
    /// Epoch seconds of the first sample in the packet.
    timestamp: f64,
    /// Milliseconds between samples.
    sample_period: f64,
    num_samples: usize,
    samples: Vec<f64>,
}

/// Parse a line-delimited badge packet stream. Packets from excluded
/// members are dropped, and a packet whose timestamp was already seen for
/// its member is treated as a hub retransmission and skipped.
pub fn read_badge_records<R: BufRead>(
    reader: R,
    excluded: &[ParticipantId],
) -> Result<MeetingDataset> {
    let mut dataset = MeetingDataset::new();
    let mut seen: HashMap<ParticipantId, HashSet<u64>> = HashMap::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let packet: BadgePacket = serde_json::from_str(&line)?;
        let data = packet.data;
        if excluded.contains(&data.member_id) {
            continue;
        }
        if data.samples.len() != data.num_samples {
            return Err(AnalysisError::MalformedRecord {
                participant: data.member_id,
                reason: format!(
                    "packet declares {} samples but carries {}",
                    data.num_samples,
                    data.samples.len()
                ),
            });
        }
        if !seen
            .entry(data.member_id)
            .or_default()
            .insert(data.timestamp.to_bits())
        {
            continue;
        }

        let period = data.sample_period / 1000.0;
        let rec = dataset
            .records_mut()
            .entry(data.member_id)
            .or_insert_with(ChannelRecord::default);
        for (i, &sample) in data.samples.iter().enumerate() {
            rec.time.push(data.timestamp + i as f64 * period);
            rec.signal.push(sample);
        }
    }
    info!("ingested {} badge channels", dataset.len());
    Ok(dataset)
}

/// Read a badge recording from a file on disk.
pub fn read_badge_file<P: AsRef<Path>>(
    path: P,
    excluded: &[ParticipantId],
) -> Result<MeetingDataset> {
    let file = File::open(path)?;
    read_badge_records(BufReader::new(file), excluded)
}

/// Close clock jumps caused by mid-recording hub resynchronization.
///
/// Finds the largest inter-sample gap per member; when it exceeds
/// `max_jump_sec`, all samples before the jump are shifted forward so the
/// gap shrinks to the nominal period read from the following gap. Returns
/// the ids that were corrected.
pub fn fix_time_jumps(dataset: &mut MeetingDataset, max_jump_sec: f64) -> Vec<ParticipantId> {
    let mut affected = Vec::new();
    for (&id, rec) in dataset.records_mut().iter_mut() {
        if rec.time.len() < 3 {
            continue;
        }
        let mut idx = 0;
        let mut gap = f64::NEG_INFINITY;
        for (i, pair) in rec.time.windows(2).enumerate() {
            let diff = pair[1] - pair[0];
            if diff > gap {
                gap = diff;
                idx = i;
            }
        }
        // The nominal period comes from the gap right after the jump, so a
        // jump at the very last gap cannot be corrected
        if gap > max_jump_sec && idx + 2 < rec.time.len() {
            let nominal = rec.time[idx + 2] - rec.time[idx + 1];
            let offset = gap - nominal;
            for t in &mut rec.time[..=idx] {
                *t += offset;
            }
            affected.push(id);
        }
    }
    if !affected.is_empty() {
        info!("clock jumps corrected for participants {:?}", affected);
    }
    affected
}

/// Truncate every channel to the interval where all badges were recording.
pub fn truncate_to_overlap(dataset: &mut MeetingDataset) -> Result<()> {
    let mut start = f64::NEG_INFINITY;
    let mut end = f64::INFINITY;
    for (&id, rec) in dataset.records() {
        let &first = rec.time.first().ok_or_else(|| AnalysisError::MalformedRecord {
            participant: id,
            reason: "empty time array".into(),
        })?;
        let &last = rec.time.last().ok_or_else(|| AnalysisError::MalformedRecord {
            participant: id,
            reason: "empty time array".into(),
        })?;
        start = start.max(first);
        end = end.min(last);
    }
    for rec in dataset.records_mut().values_mut() {
        let lo = rec.time.partition_point(|&t| t < start);
        let hi = rec.time.partition_point(|&t| t <= end);
        rec.time = rec.time[lo..hi].to_vec();
        rec.signal = rec.signal[lo..hi].to_vec();
    }
    Ok(())
}

/// Remove each channel's noise-floor offset: subtract the low-percentile
/// amplitude, truncated to an integer, and clamp at zero.
pub fn remove_noise_floor(dataset: &mut MeetingDataset, percentile: f64) {
    for rec in dataset.records_mut().values_mut() {
        if rec.signal.is_empty() {
            continue;
        }
        let offset = percentile_value(&rec.signal, percentile).trunc();
        for s in &mut rec.signal {
            *s = (*s - offset).max(0.0);
        }
    }
}

/// Linear-interpolated percentile over unsorted values.
fn percentile_value(values: &[f64], percentile: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = percentile / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn packet(member: u32, ts: f64, samples: &[f64]) -> String {
        format!(
            r#"{{"data":{{"member_id":{},"timestamp":{},"sample_period":50,"num_samples":{},"samples":{:?}}}}}"#,
            member,
            ts,
            samples.len(),
            samples
        )
    }

    #[test]
    fn test_read_packets() {
        let lines = [
            packet(1, 0.0, &[1.0, 2.0, 3.0]),
            packet(2, 0.0, &[5.0, 6.0, 7.0]),
            packet(1, 0.15, &[4.0, 5.0, 6.0]),
            // Retransmission of the first packet, must be dropped
            packet(1, 0.0, &[1.0, 2.0, 3.0]),
        ]
        .join("\n");
        let ds = read_badge_records(Cursor::new(lines), &[]).unwrap();

        assert_eq!(ds.len(), 2);
        let rec = ds.get(1).unwrap();
        assert_eq!(rec.signal, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        // 50 ms sample period
        assert!((rec.time[1] - rec.time[0] - 0.05).abs() < 1e-12);
        assert!((rec.time[3] - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_read_packets_excludes_members() {
        let lines = [packet(1, 0.0, &[1.0]), packet(9, 0.0, &[1.0])].join("\n");
        let ds = read_badge_records(Cursor::new(lines), &[9]).unwrap();
        assert_eq!(ds.ids(), vec![1]);
    }

    #[test]
    fn test_read_packets_rejects_sample_count_mismatch() {
        let line = r#"{"data":{"member_id":1,"timestamp":0,"sample_period":50,"num_samples":5,"samples":[1.0,2.0]}}"#;
        let err = read_badge_records(Cursor::new(line), &[]).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::MalformedRecord { participant: 1, .. }
        ));
    }

    #[test]
    fn test_fix_time_jumps() {
        let mut ds = MeetingDataset::new();
        ds.insert(
            1,
            ChannelRecord::new(
                vec![0.0, 1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 13.0],
                vec![0.0; 8],
            ),
        );
        let affected = fix_time_jumps(&mut ds, 1.0);
        assert_eq!(affected, vec![1]);
        assert_eq!(
            ds.get(1).unwrap().time,
            vec![6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0]
        );
    }

    #[test]
    fn test_fix_time_jumps_leaves_clean_channels_alone() {
        let mut ds = MeetingDataset::new();
        ds.insert(
            1,
            ChannelRecord::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0; 4]),
        );
        assert!(fix_time_jumps(&mut ds, 1.0).is_empty());
        assert_eq!(ds.get(1).unwrap().time, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_truncate_to_overlap() {
        let mut ds = MeetingDataset::new();
        ds.insert(
            1,
            ChannelRecord::new(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![1.0; 5]),
        );
        ds.insert(
            2,
            ChannelRecord::new(vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![2.0; 5]),
        );
        truncate_to_overlap(&mut ds).unwrap();
        assert_eq!(ds.get(1).unwrap().time, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(ds.get(2).unwrap().time, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(ds.get(1).unwrap().signal.len(), 4);
    }

    #[test]
    fn test_remove_noise_floor() {
        let mut ds = MeetingDataset::new();
        let signal: Vec<f64> = (0..=100).map(|v| v as f64).collect();
        ds.insert(1, ChannelRecord::new(vec![0.0; 101], signal));
        remove_noise_floor(&mut ds, 1.0);

        let signal = &ds.get(1).unwrap().signal;
        // Offset of 1 subtracted, clamped at zero
        assert_eq!(signal[0], 0.0);
        assert_eq!(signal[1], 0.0);
        assert_eq!(signal[2], 1.0);
        assert_eq!(signal[100], 99.0);
        assert!(signal.iter().all(|&s| s >= 0.0));
    }
}
