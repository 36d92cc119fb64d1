// Error taxonomy for the analysis pipeline
//
// Structural problems (too few participants, ragged or empty records) abort
// a run. Stage-local anomalies degrade inside the stages themselves: a
// zero-energy correlation window counts as zero correlation and a missing
// density crossover falls back to a zero threshold with a warning, so
// neither ever reaches this type.

use thiserror::Error;

use crate::dataset::ParticipantId;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("at least two participants are required, got {0}")]
    InsufficientParticipants(usize),

    #[error("participant {participant} has no samples in window {window}")]
    EmptyWindow {
        participant: ParticipantId,
        window: usize,
    },

    #[error("participant {participant} record is malformed: {reason}")]
    MalformedRecord {
        participant: ParticipantId,
        reason: String,
    },

    #[error("participants share no common recording interval")]
    NoCommonInterval,

    #[error("dataset has no participants")]
    EmptyDataset,

    #[error("required pipeline stage `{0}` has not run")]
    MissingStage(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed badge packet: {0}")]
    Json(#[from] serde_json::Error),
}
