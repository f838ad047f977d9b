//! Kinematic features derived from a smoothed pose.
//!
//! Extraction is pure and never fails. A feature whose keypoints have not
//! been observed yet, or whose geometry is degenerate (zero-length segment,
//! zero frame width), is reported as `None` and the scorer leaves the
//! matching criterion untouched for the frame.

use serde::Serialize;
use shotform_pose_model::pose::{names, FrameGeometry, Point2D};

use crate::smoother::SmoothedPose;

/// Segments shorter than this (pixels) are treated as degenerate.
const MIN_SEGMENT_PX: f64 = 1e-6;

/// Bound for the follow-through elevation ratio.
const MAX_ELEVATION: f64 = 2.0;

/// Wrist position relative to the shoulder line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FollowThrough {
    /// Height of the highest wrist above the shoulder midpoint, in torso
    /// lengths. Positive when the wrist is above the shoulders.
    pub elevation: f64,
    /// Whether the highest wrist sits above the shoulder midpoint.
    pub raised: bool,
    /// Elevation of the elbow-to-wrist segment above horizontal on the side
    /// of the highest wrist, in degrees within `[-90, 90]`. `None` when that
    /// side's elbow has not been observed.
    pub release_angle_deg: Option<f64>,
}

/// Scalar features of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PoseFeatures {
    /// Hip-knee-ankle angle in degrees, averaged over the sides available.
    pub knee_flex_deg: Option<f64>,
    pub follow_through: Option<FollowThrough>,
    /// Torso lean from vertical as a fraction of 90°, capped.
    pub balance_sway: Option<f64>,
    /// Horizontal shoulder-to-hip offset as a fraction of frame width.
    pub alignment_offset: Option<f64>,
}

/// Angle ABC at vertex `b` in degrees, in `[0, 180]`.
///
/// Returns `None` when either arm of the angle has zero length.
pub fn angle_deg(a: Point2D, b: Point2D, c: Point2D) -> Option<f64> {
    let ab = (a.x - b.x, a.y - b.y);
    let cb = (c.x - b.x, c.y - b.y);

    let mag_ab = (ab.0 * ab.0 + ab.1 * ab.1).sqrt();
    let mag_cb = (cb.0 * cb.0 + cb.1 * cb.1).sqrt();
    if mag_ab < MIN_SEGMENT_PX || mag_cb < MIN_SEGMENT_PX {
        return None;
    }

    let dot = ab.0 * cb.0 + ab.1 * cb.1;
    let cos = (dot / (mag_ab * mag_cb)).clamp(-1.0, 1.0);
    let deg = cos.acos().to_degrees();
    deg.is_finite().then(|| deg.clamp(0.0, 180.0))
}

/// Extract all features from a smoothed pose.
pub fn extract_features(
    pose: &SmoothedPose,
    geometry: &FrameGeometry,
    sway_cap: f64,
) -> PoseFeatures {
    PoseFeatures {
        knee_flex_deg: knee_flex(pose),
        follow_through: follow_through(pose),
        balance_sway: balance_sway(pose, sway_cap),
        alignment_offset: alignment_offset(pose, geometry),
    }
}

/// Mean knee angle over the sides with hip, knee, and ankle observed.
pub fn knee_flex(pose: &SmoothedPose) -> Option<f64> {
    let sides = [
        (names::LEFT_HIP, names::LEFT_KNEE, names::LEFT_ANKLE),
        (names::RIGHT_HIP, names::RIGHT_KNEE, names::RIGHT_ANKLE),
    ];
    let angles: Vec<f64> = sides
        .iter()
        .filter_map(|(hip, knee, ankle)| {
            angle_deg(pose.get(hip)?, pose.get(knee)?, pose.get(ankle)?)
        })
        .collect();

    if angles.is_empty() {
        return None;
    }
    Some(angles.iter().sum::<f64>() / angles.len() as f64)
}

/// Highest wrist relative to the shoulder midpoint, scaled by torso length.
pub fn follow_through(pose: &SmoothedPose) -> Option<FollowThrough> {
    let shoulders = shoulder_mid(pose)?;
    let hips = hip_mid(pose)?;
    let torso = shoulders.distance_to(&hips);
    if torso < MIN_SEGMENT_PX {
        return None;
    }

    let (wrist, elbow) = [
        (names::LEFT_WRIST, names::LEFT_ELBOW),
        (names::RIGHT_WRIST, names::RIGHT_ELBOW),
    ]
    .iter()
    .filter_map(|(wrist, elbow)| Some((pose.get(wrist)?, pose.get(elbow))))
    .min_by(|a, b| a.0.y.total_cmp(&b.0.y))?;

    // Image y grows downward.
    let elevation = ((shoulders.y - wrist.y) / torso).clamp(-MAX_ELEVATION, MAX_ELEVATION);
    Some(FollowThrough {
        elevation,
        raised: wrist.y < shoulders.y,
        release_angle_deg: elbow.and_then(|elbow| release_angle(elbow, wrist)),
    })
}

/// Elevation of the forearm above horizontal, in degrees.
///
/// Facing direction is ignored, so the horizontal component is taken as an
/// absolute distance.
pub fn release_angle(elbow: Point2D, wrist: Point2D) -> Option<f64> {
    let dx = (wrist.x - elbow.x).abs();
    let dy = elbow.y - wrist.y;
    if dx < MIN_SEGMENT_PX && dy.abs() < MIN_SEGMENT_PX {
        return None;
    }
    let deg = dy.atan2(dx).to_degrees();
    deg.is_finite().then(|| deg.clamp(-90.0, 90.0))
}

/// Torso lean from vertical, `lean_deg / 90` capped at `sway_cap`.
pub fn balance_sway(pose: &SmoothedPose, sway_cap: f64) -> Option<f64> {
    let shoulders = shoulder_mid(pose)?;
    let hips = hip_mid(pose)?;
    let dx = (shoulders.x - hips.x).abs();
    let dy = (hips.y - shoulders.y).abs();
    if dx < MIN_SEGMENT_PX && dy < MIN_SEGMENT_PX {
        return None;
    }

    let lean_deg = dx.atan2(dy).to_degrees();
    let cap = if sway_cap.is_finite() && sway_cap > 0.0 {
        sway_cap
    } else {
        1.0
    };
    Some((lean_deg / 90.0).clamp(0.0, cap))
}

/// Horizontal shoulder-midpoint to hip-midpoint distance over frame width.
pub fn alignment_offset(pose: &SmoothedPose, geometry: &FrameGeometry) -> Option<f64> {
    if geometry.width == 0 {
        return None;
    }
    let shoulders = shoulder_mid(pose)?;
    let hips = hip_mid(pose)?;
    let offset = (shoulders.x - hips.x).abs() / geometry.width as f64;
    offset.is_finite().then(|| offset.clamp(0.0, 1.0))
}

fn shoulder_mid(pose: &SmoothedPose) -> Option<Point2D> {
    Some(Point2D::midpoint(
        &pose.get(names::LEFT_SHOULDER)?,
        &pose.get(names::RIGHT_SHOULDER)?,
    ))
}

fn hip_mid(pose: &SmoothedPose) -> Option<Point2D> {
    Some(Point2D::midpoint(
        &pose.get(names::LEFT_HIP)?,
        &pose.get(names::RIGHT_HIP)?,
    ))
}
