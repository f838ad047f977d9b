//! Shotform Analysis Engine
//!
//! Owns the per-clip [`AnalysisSession`] and the async [`AnalysisLoop`] that
//! feeds it from a frame source and a pose estimator, with lock/reset/load
//! control and cooperative cancellation.

pub mod runner;
pub mod session;
pub mod source;

pub use runner::{
    analyze, AnalysisLoop, AnalysisReport, Control, LoopHandles, ScoreUpdate, StopHandle,
};
pub use session::{AnalysisSession, FrameOutcome};
pub use source::{FrameSource, PoseEstimator, RecordedPoses, VideoFrame};
