//! Per-frame scoring pipeline: smooth → extract → score → aggregate.
//!
//! The pipeline holds the smoother state and the last committed score of
//! each criterion. A criterion whose feature is unavailable in a frame keeps
//! its previous committed value. A frame score is produced only once every
//! criterion has been committed at least once.

use serde::Serialize;
use shotform_common::config::SmoothingConfig;
use shotform_pose_model::pose::{FrameGeometry, PoseFrame};
use shotform_pose_model::score::FrameScore;
use shotform_pose_model::scoring_config::ScoreConfig;

use crate::aggregate::{aggregate, CriterionScores};
use crate::features::{extract_features, PoseFeatures};
use crate::scorer::{score_features, CriterionUpdates};
use crate::smoother::KeypointSmoother;

/// Last committed score per criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CommittedScores {
    pub legs: Option<f64>,
    pub upper: Option<f64>,
    pub balance: Option<f64>,
    pub align: Option<f64>,
}

impl CommittedScores {
    /// Overwrite the criteria that were updated this frame.
    pub fn apply(&mut self, updates: &CriterionUpdates) {
        self.legs = updates.legs.or(self.legs);
        self.upper = updates.upper.or(self.upper);
        self.balance = updates.balance.or(self.balance);
        self.align = updates.align.or(self.align);
    }

    /// All four scores, once each criterion has been committed.
    pub fn complete(&self) -> Option<CriterionScores> {
        Some(CriterionScores {
            legs: self.legs?,
            upper: self.upper?,
            balance: self.balance?,
            align: self.align?,
        })
    }
}

/// What the pipeline derived from one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameEvaluation {
    pub features: PoseFeatures,
    pub updates: CriterionUpdates,
    /// Aggregated score, `None` until every criterion has been committed.
    pub score: Option<FrameScore>,
}

/// Stateful per-session scoring pipeline.
#[derive(Debug)]
pub struct ScoringPipeline {
    smoother: KeypointSmoother,
    committed: CommittedScores,
    geometry: FrameGeometry,
}

impl ScoringPipeline {
    pub fn new(smoothing: SmoothingConfig, min_confidence: f64, geometry: FrameGeometry) -> Self {
        Self {
            smoother: KeypointSmoother::new(smoothing, min_confidence),
            committed: CommittedScores::default(),
            geometry,
        }
    }

    /// Run one raw frame through every stage.
    pub fn evaluate(&mut self, frame: &PoseFrame, config: &ScoreConfig) -> FrameEvaluation {
        let pose = self.smoother.observe(frame);
        let features = extract_features(&pose, &self.geometry, config.balance.sway_cap);
        let updates = score_features(&features, config);
        self.committed.apply(&updates);

        let score = self
            .committed
            .complete()
            .map(|scores| aggregate(&scores, &config.weights));

        tracing::debug!(
            timestamp_secs = frame.timestamp_secs(),
            knee_flex_deg = ?features.knee_flex_deg,
            balance_sway = ?features.balance_sway,
            alignment_offset = ?features.alignment_offset,
            total = ?score.map(|s| s.total),
            "Frame evaluated"
        );

        FrameEvaluation {
            features,
            updates,
            score,
        }
    }

    pub fn committed(&self) -> &CommittedScores {
        &self.committed
    }

    pub fn smoother(&self) -> &KeypointSmoother {
        &self.smoother
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Use new frame dimensions, e.g. after the video reports its metadata.
    pub fn set_geometry(&mut self, geometry: FrameGeometry) {
        self.geometry = geometry;
    }

    /// Clear smoother channels and committed scores.
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.committed = CommittedScores::default();
    }
}

impl Default for ScoringPipeline {
    fn default() -> Self {
        Self::new(SmoothingConfig::default(), 0.35, FrameGeometry::default())
    }
}
