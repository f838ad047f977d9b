//! Shotform Pose Model
//!
//! Defines the core data contracts for shot analysis:
//! - **Pose:** Named 2D keypoints sampled per video frame
//! - **Score:** Bounded per-criterion and total form scores
//! - **Scoring config:** Piecewise rules and aggregation weights
//!
//! Keypoint coordinates are frame pixels; scores are integers in `[0, 100]`.

pub mod pose;
pub mod score;
pub mod scoring_config;

pub use pose::*;
pub use score::*;
pub use scoring_config::*;
