//! Threshold scoring: feature value + rule → bounded criterion score.
//!
//! Every rule is a piecewise function over ascending breakpoints. A value
//! that lands exactly on a breakpoint is scored by whichever adjacent
//! segment gives the lower result. The result is clamped to
//! `[floor, 100]`; an unavailable or non-finite feature yields `None`,
//! which the session treats as "keep the previous committed score".

use serde::Serialize;
use shotform_pose_model::scoring_config::{
    AlignmentRule, BalanceRule, LegsRule, ScoreConfig, UpperRule,
};

use crate::features::{FollowThrough, PoseFeatures};

/// One piece of a piecewise scoring function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    /// `score + slope * (value - anchor)`.
    Linear { anchor: f64, score: f64, slope: f64 },
    /// A fixed score.
    Plateau(f64),
}

impl Segment {
    pub fn eval(&self, value: f64) -> f64 {
        match *self {
            Segment::Linear {
                anchor,
                score,
                slope,
            } => score + slope * (value - anchor),
            Segment::Plateau(score) => score,
        }
    }
}

/// Evaluate a piecewise function.
///
/// `segments` must have one more entry than `breakpoints`, otherwise the
/// result is `None`. Segment `i` covers the open interval between
/// breakpoints `i - 1` and `i`.
pub fn piecewise(value: f64, breakpoints: &[f64], segments: &[Segment]) -> Option<f64> {
    if segments.len() != breakpoints.len() + 1 {
        return None;
    }

    let score = match breakpoints.iter().position(|b| value <= *b) {
        Some(i) if value == breakpoints[i] => {
            segments[i].eval(value).min(segments[i + 1].eval(value))
        }
        Some(i) => segments[i].eval(value),
        None => segments[breakpoints.len()].eval(value),
    };
    Some(score)
}

/// Clamp a raw score into `[floor, 100]`. Non-finite scores are rejected.
pub fn clamp_score(raw: f64, floor: f64) -> Option<f64> {
    if !raw.is_finite() {
        return None;
    }
    let floor = if floor.is_finite() {
        floor.clamp(0.0, 100.0)
    } else {
        0.0
    };
    Some(raw.clamp(floor, 100.0))
}

/// Legs: low plateau, ramp between `min_deg` and `max_deg`, full marks above.
pub fn score_legs(knee_flex_deg: f64, rule: &LegsRule) -> Option<f64> {
    if !knee_flex_deg.is_finite() {
        return None;
    }
    let span = rule.max_deg - rule.min_deg;
    let slope = if span > 0.0 {
        (100.0 - rule.ramp_start) / span
    } else {
        0.0
    };
    let raw = piecewise(
        knee_flex_deg,
        &[rule.min_deg, rule.max_deg],
        &[
            Segment::Plateau(rule.low_plateau),
            Segment::Linear {
                anchor: rule.min_deg,
                score: rule.ramp_start,
                slope,
            },
            Segment::Plateau(100.0),
        ],
    )?;
    clamp_score(raw, rule.floor)
}

/// Upper: low plateau, ramp within `tolerance` below `target`, full marks above.
pub fn score_upper(elevation: f64, rule: &UpperRule) -> Option<f64> {
    if !elevation.is_finite() {
        return None;
    }
    let start = rule.target - rule.tolerance;
    let slope = if rule.tolerance > 0.0 {
        (100.0 - rule.ramp_start) / rule.tolerance
    } else {
        0.0
    };
    let raw = piecewise(
        elevation,
        &[start, rule.target],
        &[
            Segment::Plateau(rule.low_plateau),
            Segment::Linear {
                anchor: start,
                score: rule.ramp_start,
                slope,
            },
            Segment::Plateau(100.0),
        ],
    )?;
    clamp_score(raw, rule.floor)
}

/// Upper with the release angle blended in when the forearm is visible.
pub fn score_follow_through(follow_through: &FollowThrough, rule: &UpperRule) -> Option<f64> {
    let elevation_score = score_upper(follow_through.elevation, rule)?;
    let Some(angle) = follow_through.release_angle_deg.filter(|a| a.is_finite()) else {
        return Some(elevation_score);
    };

    let release = if angle >= rule.release_min_deg {
        100.0
    } else {
        100.0 * rule.release_shortfall
    };
    let weight = rule.release_weight.clamp(0.0, 1.0);
    clamp_score(
        elevation_score * (1.0 - weight) + release * weight,
        rule.floor,
    )
}

/// Balance: gentle decrease, steeper decrease, then a plateau.
pub fn score_balance(sway: f64, rule: &BalanceRule) -> Option<f64> {
    if !sway.is_finite() {
        return None;
    }
    let near_end = rule.center100;
    let wide_end = rule.center100 * rule.widen_factor.max(1.0);
    let raw = piecewise(
        sway,
        &[near_end, wide_end],
        &[
            Segment::Linear {
                anchor: 0.0,
                score: 100.0,
                slope: -rule.near_slope,
            },
            Segment::Linear {
                anchor: near_end,
                score: 100.0 - near_end * rule.near_slope,
                slope: -rule.steep_slope,
            },
            Segment::Plateau(rule.plateau),
        ],
    )?;
    clamp_score(raw, rule.floor)
}

/// Alignment: four linear segments, each anchored on its left breakpoint.
pub fn score_alignment(offset: f64, rule: &AlignmentRule) -> Option<f64> {
    if !offset.is_finite() {
        return None;
    }
    let tol = rule.tolerance;
    let breakpoints = [tol * 0.5, tol, tol * rule.widen_factor.max(1.0)];
    let anchors = [0.0, breakpoints[0], breakpoints[1], breakpoints[2]];
    let segments: [Segment; 4] = std::array::from_fn(|i| Segment::Linear {
        anchor: anchors[i],
        score: rule.anchor_scores[i],
        slope: -rule.slopes[i],
    });
    clamp_score(piecewise(offset, &breakpoints, &segments)?, rule.floor)
}

/// Scores produced for one frame. `None` means "no update this frame".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CriterionUpdates {
    pub legs: Option<f64>,
    pub upper: Option<f64>,
    pub balance: Option<f64>,
    pub align: Option<f64>,
}

/// Score every criterion whose feature is available.
pub fn score_features(features: &PoseFeatures, config: &ScoreConfig) -> CriterionUpdates {
    CriterionUpdates {
        legs: features
            .knee_flex_deg
            .and_then(|v| score_legs(v, &config.legs)),
        upper: features
            .follow_through
            .and_then(|ft| score_follow_through(&ft, &config.upper)),
        balance: features
            .balance_sway
            .and_then(|v| score_balance(v, &config.balance)),
        align: features
            .alignment_offset
            .and_then(|v| score_alignment(v, &config.alignment)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("score should be available");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_legs_ramp_example() {
        let rule = LegsRule::default();
        let score = score_legs(98.0, &rule).unwrap();
        assert!(score > rule.ramp_start && score < 100.0);
        assert_close(Some(score), 60.0 + 3.0 * 40.0 / 45.0);
    }

    #[test]
    fn test_legs_segments() {
        let rule = LegsRule::default();
        assert_eq!(score_legs(60.0, &rule), Some(55.0));
        // On the lower breakpoint the plateau is stricter than the ramp.
        assert_eq!(score_legs(95.0, &rule), Some(55.0));
        assert_close(score_legs(140.0, &rule), 100.0);
        assert_eq!(score_legs(175.0, &rule), Some(100.0));
    }

    #[test]
    fn test_upper_segments() {
        let rule = UpperRule::default();
        assert_eq!(score_upper(0.5, &rule), Some(100.0));
        assert_close(score_upper(0.35, &rule), 100.0);
        assert_eq!(score_upper(0.05, &rule), Some(60.0));
        assert_eq!(score_upper(-1.0, &rule), Some(60.0));
        assert_close(score_upper(0.225, &rule), 85.0);
    }

    #[test]
    fn test_release_angle_blend() {
        let rule = UpperRule::default();
        let ft = |elevation, release_angle_deg| FollowThrough {
            elevation,
            raised: elevation > 0.0,
            release_angle_deg,
        };

        // No forearm: elevation alone.
        assert_close(score_follow_through(&ft(0.225, None), &rule), 85.0);
        // Steep release keeps full marks on that part.
        assert_close(score_follow_through(&ft(0.225, Some(60.0)), &rule), 0.6 * 85.0 + 40.0);
        assert_close(score_follow_through(&ft(0.5, Some(45.0)), &rule), 100.0);
        // Flat release: 80% of full marks on the release part.
        assert_close(score_follow_through(&ft(0.5, Some(20.0)), &rule), 60.0 + 0.4 * 80.0);
    }

    #[test]
    fn test_balance_example() {
        let rule = BalanceRule::default();
        let score = score_balance(0.18, &rule).unwrap();
        assert_eq!(score.round(), 91.0);
        assert!(score > rule.floor);
    }

    #[test]
    fn test_balance_segments() {
        let rule = BalanceRule::default();
        assert_eq!(score_balance(0.0, &rule), Some(100.0));
        assert_close(score_balance(0.25, &rule), 87.5);
        assert_close(score_balance(0.4, &rule), 87.5 - 0.15 * 160.0);
        // Boundary with the plateau: the steep ramp gives 47.5, the plateau 48.
        assert_close(score_balance(0.5, &rule), 47.5);
        assert_eq!(score_balance(0.9, &rule), Some(48.0));
    }

    #[test]
    fn test_alignment_example() {
        let rule = AlignmentRule::default();
        let score = score_alignment(0.09, &rule);
        assert_close(score, 72.4);
        assert_eq!(score.unwrap().round(), 72.0);
    }

    #[test]
    fn test_alignment_segments_and_floor() {
        let rule = AlignmentRule::default();
        assert_eq!(score_alignment(0.0, &rule), Some(100.0));
        assert_close(score_alignment(0.06, &rule), 85.0);
        // On the tolerance breakpoint the second segment (59.8) beats the third (60).
        assert_close(score_alignment(0.12, &rule), 59.8);
        assert_close(score_alignment(0.2, &rule), 52.0);
        assert_eq!(score_alignment(1.0, &rule), Some(45.0));
    }

    #[test]
    fn test_piecewise_rejects_mismatched_segments() {
        let flat = [Segment::Plateau(10.0), Segment::Plateau(20.0)];
        assert_eq!(piecewise(0.5, &[1.0], &flat), Some(10.0));
        assert_eq!(piecewise(0.5, &[1.0, 2.0], &flat), None);
        assert_eq!(piecewise(0.5, &[], &flat), None);
    }

    #[test]
    fn test_non_finite_is_no_update() {
        assert_eq!(score_legs(f64::NAN, &LegsRule::default()), None);
        assert_eq!(score_alignment(f64::INFINITY, &AlignmentRule::default()), None);
        assert_eq!(clamp_score(f64::NAN, 0.0), None);
    }

    #[test]
    fn test_negative_linear_results_clamp_to_floor() {
        let mut rule = AlignmentRule::default();
        rule.floor = 0.0;
        assert_close(score_alignment(1.0, &rule), 17.6);
        rule.slopes[3] = 1_000.0;
        assert_eq!(score_alignment(1.0, &rule), Some(0.0));
    }

    #[test]
    fn test_unavailable_features_produce_no_updates() {
        let updates = score_features(&PoseFeatures::default(), &ScoreConfig::default());
        assert_eq!(updates, CriterionUpdates::default());
    }
}
