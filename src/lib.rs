//! Voice activity detection and conversational metrics for wearable badge
//! audio-level recordings.
//!
//! Each meeting participant wears a badge that records a coarse amplitude
//! envelope of the sound around it; no audio content is captured. This crate
//! ingests the per-badge packet streams, determines for each short time
//! window which badge belongs to the true active talker (as opposed to a
//! nearby badge picking up cross-talk), learns a per-participant speaking
//! threshold from the empirical amplitude distributions, and reduces the
//! resolved speaking timelines to group conversation metrics: speaking time,
//! overlap, and turn-taking.
//!
//! Module structure:
//! - dataset.rs: MeetingDataset and per-participant ChannelRecord
//! - preprocessing.rs: packet ingestion and signal conditioning
//! - vad/: genuine-speech detection, adaptive thresholds, cross-talk resolution
//! - metrics.rs: speaking-time, overlap, and turn-taking statistics
//! - pipeline.rs: fixed-order stage runner

pub mod dataset;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod preprocessing;
pub mod vad;

// Re-export the main types
pub use dataset::{ChannelRecord, MeetingDataset, ParticipantId};
pub use error::{AnalysisError, Result};
pub use metrics::MetricsConfig;
pub use pipeline::run_pipeline;
pub use vad::VadConfig;
