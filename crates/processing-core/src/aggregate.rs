//! Weighted aggregation of criterion scores into a [`FrameScore`].

use serde::{Deserialize, Serialize};
use shotform_pose_model::score::{CriterionScore, FrameScore};
use shotform_pose_model::scoring_config::{Weights, WEIGHT_SUM_TOLERANCE};

/// Last committed score of every criterion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriterionScores {
    pub legs: f64,
    pub upper: f64,
    pub balance: f64,
    pub align: f64,
}

/// Round a score to the nearest integer in `[0, 100]`. NaN maps to 0.
pub fn round_score(value: f64) -> CriterionScore {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as CriterionScore
}

/// Combine four criterion scores into a frame score.
///
/// Each criterion is rounded first, then the weighted sum is rounded.
/// Weights that are negative, non-finite, or do not sum to 1.0 are replaced
/// by [`Weights::default`].
pub fn aggregate(scores: &CriterionScores, weights: &Weights) -> FrameScore {
    let legs = round_score(scores.legs);
    let upper = round_score(scores.upper);
    let balance = round_score(scores.balance);
    let align = round_score(scores.align);

    let w = usable_weights(weights);
    let total = w.legs * legs as f64
        + w.upper * upper as f64
        + w.balance * balance as f64
        + w.align * align as f64;

    FrameScore {
        legs,
        upper,
        balance,
        align,
        total: round_score(total),
    }
}

fn usable_weights(weights: &Weights) -> Weights {
    let values = [weights.legs, weights.upper, weights.balance, weights.align];
    let valid = values.iter().all(|w| w.is_finite() && *w >= 0.0)
        && (weights.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE;
    if valid {
        weights.clone()
    } else {
        Weights::default()
    }
}
