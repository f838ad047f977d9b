//! Pose frame types produced by the pose estimator.
//!
//! A pose stream is stored as JSONL, one [`PoseFrame`] per line. Coordinates
//! are frame pixels with the origin at the top-left and `y` growing downward.

use serde::{Deserialize, Serialize};

/// Monotonic timestamp in nanoseconds since playback start.
pub type TimestampNs = u64;

/// Landmark names used by the feature extractor (COCO/MoveNet naming).
pub mod names {
    pub const LEFT_SHOULDER: &str = "left_shoulder";
    pub const RIGHT_SHOULDER: &str = "right_shoulder";
    pub const LEFT_ELBOW: &str = "left_elbow";
    pub const RIGHT_ELBOW: &str = "right_elbow";
    pub const LEFT_WRIST: &str = "left_wrist";
    pub const RIGHT_WRIST: &str = "right_wrist";
    pub const LEFT_HIP: &str = "left_hip";
    pub const RIGHT_HIP: &str = "right_hip";
    pub const LEFT_KNEE: &str = "left_knee";
    pub const RIGHT_KNEE: &str = "right_knee";
    pub const LEFT_ANKLE: &str = "left_ankle";
    pub const RIGHT_ANKLE: &str = "right_ankle";
}

/// A named anatomical landmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Landmark name, unique within a frame (e.g. `"left_knee"`).
    pub name: String,
    /// Horizontal position in pixels.
    pub x: f64,
    /// Vertical position in pixels.
    pub y: f64,
    /// Detector confidence in `[0, 1]`, when the model reports one.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "score")]
    pub confidence: Option<f64>,
}

impl Keypoint {
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Whether this keypoint counts as detected.
    ///
    /// Non-finite coordinates never count. A missing confidence counts as
    /// detected; a reported one must reach `min_confidence`.
    pub fn is_detected(&self, min_confidence: f64) -> bool {
        if !self.x.is_finite() || !self.y.is_finite() {
            return false;
        }
        match self.confidence {
            Some(c) => c.is_finite() && c >= min_confidence,
            None => true,
        }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

/// One pose sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    /// Playback position in nanoseconds. Non-decreasing within a session.
    #[serde(rename = "t")]
    pub timestamp_ns: TimestampNs,

    /// Detected landmarks.
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
}

impl PoseFrame {
    pub fn new(timestamp_ns: TimestampNs, keypoints: Vec<Keypoint>) -> Self {
        Self {
            timestamp_ns,
            keypoints,
        }
    }

    /// Timestamp as fractional seconds.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ns as f64 / 1_000_000_000.0
    }

    /// Look up a keypoint by name.
    pub fn get(&self, name: &str) -> Option<&Keypoint> {
        self.keypoints.iter().rev().find(|k| k.name == name)
    }

    /// Collapse duplicate names, keeping the last occurrence of each.
    pub fn dedup(&mut self) {
        let mut seen = std::collections::HashSet::new();
        let mut kept: Vec<Keypoint> = self
            .keypoints
            .drain(..)
            .rev()
            .filter(|k| seen.insert(k.name.clone()))
            .collect();
        kept.reverse();
        self.keypoints = kept;
    }
}

/// A 2D point in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Midpoint between two points.
    pub fn midpoint(a: &Point2D, b: &Point2D) -> Point2D {
        Point2D {
            x: (a.x + b.x) * 0.5,
            y: (a.y + b.y) * 0.5,
        }
    }
}

/// Pixel dimensions of the analysed video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
        }
    }
}

/// Parse pose frames from JSONL content (one JSON object per line).
///
/// Blank lines and lines starting with `#` are skipped.
pub fn parse_frames(jsonl: &str) -> Result<Vec<PoseFrame>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}
