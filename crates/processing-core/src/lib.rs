//! Shotform Processing Core — pose stream to form score
//!
//! Turns raw keypoint frames into a shooting-form score:
//! - **Smoothing:** Velocity-adaptive EMA per keypoint coordinate
//! - **Features:** Knee flexion, follow-through, sway, shoulder/hip alignment
//! - **Scoring:** Piecewise threshold rules and weighted aggregation
//! - **Finalization:** Bounded live window and a Live → Frozen state machine
//!
//! This crate is pure computation — no I/O, no async runtime.
//! All inputs are data; all outputs are data.

pub mod aggregate;
pub mod features;
pub mod pipeline;
pub mod scorer;
pub mod smoother;
pub mod window;

pub use aggregate::{aggregate, CriterionScores};
pub use features::{extract_features, PoseFeatures};
pub use pipeline::{FrameEvaluation, ScoringPipeline};
pub use scorer::{score_features, CriterionUpdates};
pub use smoother::{KeypointSmoother, SmoothedPose};
pub use window::{FreezeReason, ScoreFinalizer, ScoreWindow, SessionState};
