//! Analysis session management.
//!
//! One [`AnalysisSession`] exists per analysed clip. It owns every piece of
//! mutable scoring state (smoother channels, committed criterion scores, the
//! live window, the frozen score), so independent sessions never share state.

use serde::Serialize;
use shotform_common::config::AnalysisDefaults;
use shotform_pose_model::pose::{FrameGeometry, PoseFrame};
use shotform_pose_model::score::FrameScore;
use shotform_pose_model::scoring_config::ScoreConfig;
use shotform_processing_core::pipeline::{FrameEvaluation, ScoringPipeline};
use shotform_processing_core::window::{FreezeReason, ScoreFinalizer, SessionState};

/// Result of feeding one pose frame to a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameOutcome {
    /// The frame produced a score and the live score was updated.
    Scored {
        evaluation: FrameEvaluation,
        live: FrameScore,
    },
    /// Not every criterion has been committed yet; nothing entered the window.
    Warming { evaluation: FrameEvaluation },
    /// The session is frozen; the frame was not scored.
    Ignored { final_score: FrameScore },
}

impl FrameOutcome {
    /// Live score after this frame, if it changed.
    pub fn live(&self) -> Option<FrameScore> {
        match self {
            FrameOutcome::Scored { live, .. } => Some(*live),
            _ => None,
        }
    }
}

/// A single analysis session.
#[derive(Debug)]
pub struct AnalysisSession {
    pipeline: ScoringPipeline,
    finalizer: ScoreFinalizer,
    frames_processed: u64,
    frames_scored: u64,
}

impl AnalysisSession {
    /// Create a session from explicit parts.
    pub fn new(pipeline: ScoringPipeline, window_size: usize) -> Self {
        Self {
            pipeline,
            finalizer: ScoreFinalizer::new(window_size),
            frames_processed: 0,
            frames_scored: 0,
        }
    }

    /// Create a session from application defaults.
    ///
    /// `geometry` overrides the default frame size when the video reports one.
    pub fn from_defaults(defaults: &AnalysisDefaults, geometry: Option<FrameGeometry>) -> Self {
        let geometry = geometry
            .unwrap_or_else(|| FrameGeometry::new(defaults.frame_width, defaults.frame_height));
        let pipeline = ScoringPipeline::new(defaults.smoothing, defaults.min_confidence, geometry);
        Self::new(pipeline, defaults.window_size)
    }

    /// Run one pose frame through the pipeline.
    ///
    /// While frozen the frame is ignored and the final score is returned.
    pub fn process_frame(&mut self, frame: &PoseFrame, config: &ScoreConfig) -> FrameOutcome {
        if let Some(final_score) = self.finalizer.final_score() {
            return FrameOutcome::Ignored { final_score };
        }

        self.frames_processed += 1;
        let evaluation = self.pipeline.evaluate(frame, config);

        match evaluation.score.and_then(|s| self.finalizer.push(s)) {
            Some(live) => {
                self.frames_scored += 1;
                FrameOutcome::Scored { evaluation, live }
            }
            None => FrameOutcome::Warming { evaluation },
        }
    }

    /// Freeze the current live score on request. No-op when already frozen.
    pub fn lock(&mut self) -> FrameScore {
        self.finalizer.freeze(FreezeReason::Locked)
    }

    /// Freeze the current live score because the input ended.
    pub fn finish(&mut self) -> FrameScore {
        self.finalizer.freeze(FreezeReason::EndOfInput)
    }

    /// Tear down all scoring state and return to an empty live session.
    pub fn reset(&mut self) {
        tracing::info!(
            processed = self.frames_processed,
            scored = self.frames_scored,
            "Analysis session reset"
        );
        self.pipeline.reset();
        self.finalizer.reset();
        self.frames_processed = 0;
        self.frames_scored = 0;
    }

    /// Update the frame size used to normalise the alignment offset.
    pub fn set_geometry(&mut self, geometry: FrameGeometry) {
        if self.pipeline.geometry() != geometry {
            tracing::debug!(width = geometry.width, height = geometry.height, "Frame geometry changed");
            self.pipeline.set_geometry(geometry);
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.pipeline.geometry()
    }

    pub fn live_score(&self) -> Option<FrameScore> {
        self.finalizer.live()
    }

    pub fn final_score(&self) -> Option<FrameScore> {
        self.finalizer.final_score()
    }

    pub fn state(&self) -> &SessionState {
        self.finalizer.state()
    }

    pub fn is_frozen(&self) -> bool {
        self.finalizer.is_frozen()
    }

    /// Frames run through the pipeline since the last reset.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Frames that entered the live window since the last reset.
    pub fn frames_scored(&self) -> u64 {
        self.frames_scored
    }

    pub fn pipeline(&self) -> &ScoringPipeline {
        &self.pipeline
    }
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::from_defaults(&AnalysisDefaults::default(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotform_pose_model::pose::{names, Keypoint};

    fn frame(t_ms: u64, shoulder_shift: f64) -> PoseFrame {
        PoseFrame::new(
            t_ms * 1_000_000,
            vec![
                Keypoint::new(names::LEFT_SHOULDER, 280.0 + shoulder_shift, 100.0),
                Keypoint::new(names::RIGHT_SHOULDER, 360.0 + shoulder_shift, 100.0),
                Keypoint::new(names::LEFT_HIP, 290.0, 200.0),
                Keypoint::new(names::RIGHT_HIP, 350.0, 200.0),
                Keypoint::new(names::LEFT_KNEE, 290.0, 280.0),
                Keypoint::new(names::LEFT_ANKLE, 290.0, 360.0),
                Keypoint::new(names::LEFT_WRIST, 320.0, 30.0),
            ],
        )
    }

    #[test]
    fn test_new_session_is_live_and_empty() {
        let session = AnalysisSession::default();
        assert!(matches!(session.state(), SessionState::Live(w) if w.is_empty()));
        assert_eq!(session.live_score(), None);
        assert_eq!(session.final_score(), None);
        assert_eq!(session.geometry(), FrameGeometry::new(640, 360));
    }

    #[test]
    fn test_process_frame_updates_live_score() {
        let mut session = AnalysisSession::default();
        let outcome = session.process_frame(&frame(0, 0.0), &ScoreConfig::default());

        assert_eq!(outcome.live().map(|s| s.total), Some(100));
        assert_eq!(session.frames_processed(), 1);
        assert_eq!(session.frames_scored(), 1);
    }

    #[test]
    fn test_lock_freezes_and_ignores_later_frames() {
        let mut session = AnalysisSession::default();
        let config = ScoreConfig::default();
        session.process_frame(&frame(0, 0.0), &config);

        let locked = session.lock();
        let outcome = session.process_frame(&frame(33, 120.0), &config);

        assert_eq!(outcome, FrameOutcome::Ignored { final_score: locked });
        assert_eq!(session.lock(), locked);
        assert_eq!(session.finish(), locked);
        assert_eq!(session.frames_processed(), 1);
    }

    #[test]
    fn test_finish_without_frames_is_zero() {
        let mut session = AnalysisSession::default();
        assert_eq!(session.finish(), FrameScore::default());
        assert!(session.is_frozen());
    }

    #[test]
    fn test_reset_returns_to_fresh_live() {
        let mut session = AnalysisSession::default();
        session.process_frame(&frame(0, 0.0), &ScoreConfig::default());
        session.lock();
        session.reset();

        assert!(!session.is_frozen());
        assert_eq!(session.live_score(), None);
        assert_eq!(session.frames_processed(), 0);
        assert_eq!(session.pipeline().smoother().tracked(), 0);
    }

    #[test]
    fn test_reset_makes_next_frame_pass_through() {
        let mut session = AnalysisSession::default();
        let config = ScoreConfig::default();
        session.process_frame(&frame(0, 0.0), &config);
        session.reset();

        // 64px offset on a 640px frame, unsmoothed: alignment 0.1 → 68.
        let outcome = session.process_frame(&frame(33, 64.0), &config);
        let evaluation = match outcome {
            FrameOutcome::Scored { evaluation, .. } => evaluation,
            other => panic!("expected a scored frame, got {other:?}"),
        };
        let offset = evaluation.features.alignment_offset.unwrap();
        assert!((offset - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_outcome_serializes_with_kind_tag() {
        let mut session = AnalysisSession::default();
        session.lock();
        let outcome = session.process_frame(&frame(0, 0.0), &ScoreConfig::default());
        let json = serde_json::to_value(outcome).unwrap();
        assert_eq!(json["kind"], "ignored");
        assert_eq!(json["final_score"]["total"], 0);
    }
}
