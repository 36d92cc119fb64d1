// Fixed-order pipeline runner
//
// Stages mutate the dataset in place and each reads what the previous one
// wrote, so they are not safe to run out of order: thresholds need
// gen_speak, the resolver needs thresholds, the metrics need real_speak.
// This runner encodes the only supported order; the stage functions stay
// public for callers that need intermediate results.

use log::{debug, info};

use crate::dataset::MeetingDataset;
use crate::error::Result;
use crate::metrics::{overlap_count, overlap_time, speaking_time, turn_taking, MetricsConfig};
use crate::vad::{all_speak, calculate_thresholds, genuine_speak, real_speak, VadConfig};

/// Run the full analysis over an already preprocessed dataset: VAD,
/// threshold estimation, cross-talk resolution, then every conversational
/// metric. On success each record carries all derived fields.
pub fn run_pipeline(
    dataset: &mut MeetingDataset,
    vad: &VadConfig,
    metrics: &MetricsConfig,
) -> Result<()> {
    info!("analyzing meeting with {} badge channels", dataset.len());

    genuine_speak(dataset, vad)?;
    calculate_thresholds(dataset, vad.kde_bandwidth)?;
    all_speak(dataset, vad)?;
    real_speak(dataset, vad)?;
    debug!(
        "classification done: members {:?}, beacons {:?}",
        dataset.members(),
        dataset.beacons()
    );

    speaking_time(dataset)?;
    overlap_time(dataset)?;
    overlap_count(dataset, metrics.fill_gaps, metrics.max_gap)?;
    turn_taking(
        dataset,
        metrics.min_successive_non_overlap,
        metrics.fill_gaps,
        metrics.max_gap,
    )?;

    info!("pipeline complete");
    Ok(())
}
