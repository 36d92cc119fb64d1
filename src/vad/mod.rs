//! Voice activity detection over multi-badge amplitude envelopes.
//!
//! Turns the raw per-badge signals into per-window speaking flags through
//! four stages that run in order: genuine-speech detection, adaptive
//! threshold estimation, candidate flagging, and cross-talk resolution.
//!
//! Module structure:
//! - config.rs: Constants and VadConfig
//! - xcorr.rs: Bounded-lag normalized cross-correlation
//! - genuine.rs: Dominant-talker detection with leakage validation
//! - kde.rs: Gaussian kernel density estimation
//! - threshold.rs: Per-participant speaking thresholds, beacon detection
//! - resolver.rs: Candidate flagging and pairwise cross-talk suppression

pub mod config;
pub mod genuine;
pub mod kde;
pub mod resolver;
pub mod threshold;
pub mod xcorr;

// Re-export the stage entry points
pub use config::VadConfig;
pub use genuine::genuine_speak;
pub use resolver::{all_speak, real_speak};
pub use threshold::calculate_thresholds;
pub use xcorr::{max_xcorr, xcorr};
