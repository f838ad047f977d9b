//! Adaptive keypoint smoothing.
//!
//! Every keypoint name owns two independent filter channels, one per axis.
//! Each channel is an exponential blend whose factor rises with the speed of
//! the raw signal: jitter at rest is damped, fast motion is tracked closely.
//!
//! A keypoint missing from a frame (or reported below the confidence gate)
//! leaves its channels untouched. Its last smoothed position stays available
//! to the feature extractor instead of collapsing to the origin.

use std::collections::{BTreeMap, HashMap, HashSet};

use shotform_common::config::SmoothingConfig;
use shotform_pose_model::pose::{Point2D, PoseFrame};

/// Smallest elapsed time used for velocity estimation (seconds).
pub const MIN_DT_SECS: f64 = 1e-3;

/// State of one filter channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelState {
    /// Last smoothed value.
    pub value: f64,
    /// Timestamp of the last update (seconds).
    pub timestamp_secs: f64,
}

/// Blend factor for a channel moving at `speed` units per second.
pub fn blend_factor(speed: f64, params: &SmoothingConfig) -> f64 {
    let boost = params.beta * (speed / params.velocity_scale).tanh();
    (params.alpha_base + boost).clamp(params.alpha_min, params.alpha_max)
}

/// Advance one channel with a raw sample.
///
/// The first observation passes through unchanged and establishes state.
pub fn filter_channel(
    prev: Option<ChannelState>,
    raw: f64,
    timestamp_secs: f64,
    params: &SmoothingConfig,
) -> ChannelState {
    let Some(prev) = prev else {
        return ChannelState {
            value: raw,
            timestamp_secs,
        };
    };

    let dt = (timestamp_secs - prev.timestamp_secs).max(MIN_DT_SECS);
    let speed = (raw - prev.value).abs() / dt;
    let alpha = blend_factor(speed, params);

    ChannelState {
        value: prev.value + alpha * (raw - prev.value),
        timestamp_secs,
    }
}

/// Smoothed positions of every keypoint observed so far in the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmoothedPose {
    points: BTreeMap<String, Point2D>,
}

impl SmoothedPose {
    /// Smoothed position of a keypoint, if it has ever been observed.
    pub fn get(&self, name: &str) -> Option<Point2D> {
        self.points.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Point2D)> {
        self.points.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, Point2D)> for SmoothedPose {
    fn from_iter<I: IntoIterator<Item = (String, Point2D)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct AxisChannels {
    x: ChannelState,
    y: ChannelState,
}

/// Per-session keypoint smoother.
#[derive(Debug)]
pub struct KeypointSmoother {
    params: SmoothingConfig,
    min_confidence: f64,
    channels: HashMap<String, AxisChannels>,
}

impl KeypointSmoother {
    /// Create a smoother. Parameters are sanitized into their usable range.
    pub fn new(params: SmoothingConfig, min_confidence: f64) -> Self {
        let min_confidence = if min_confidence.is_finite() {
            min_confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            params: params.sanitized(),
            min_confidence,
            channels: HashMap::new(),
        }
    }

    pub fn params(&self) -> &SmoothingConfig {
        &self.params
    }

    /// Feed one raw frame and return the smoothed pose.
    ///
    /// Only keypoints present and detected in `frame` update their channels.
    /// When a name repeats within the frame, the last occurrence is used.
    pub fn observe(&mut self, frame: &PoseFrame) -> SmoothedPose {
        let t = frame.timestamp_secs();
        let mut updated = 0usize;
        let mut seen = HashSet::new();

        for kp in frame.keypoints.iter().rev() {
            if !seen.insert(kp.name.as_str()) || !kp.is_detected(self.min_confidence) {
                continue;
            }
            let prev = self.channels.get(&kp.name).copied();
            let next = AxisChannels {
                x: filter_channel(prev.map(|c| c.x), kp.x, t, &self.params),
                y: filter_channel(prev.map(|c| c.y), kp.y, t, &self.params),
            };
            self.channels.insert(kp.name.clone(), next);
            updated += 1;
        }

        tracing::trace!(
            timestamp_secs = t,
            updated,
            tracked = self.channels.len(),
            "Smoothed pose frame"
        );

        self.snapshot()
    }

    /// Current smoothed positions without feeding a frame.
    pub fn snapshot(&self) -> SmoothedPose {
        self.channels
            .iter()
            .map(|(name, c)| (name.clone(), Point2D::new(c.x.value, c.y.value)))
            .collect()
    }

    /// Filter state of one keypoint as `(x, y)` channels.
    pub fn channel(&self, name: &str) -> Option<(ChannelState, ChannelState)> {
        self.channels.get(name).map(|c| (c.x, c.y))
    }

    /// Number of keypoints with filter state.
    pub fn tracked(&self) -> usize {
        self.channels.len()
    }

    /// Drop all filter state. The next observation of every keypoint
    /// passes through.
    pub fn reset(&mut self) {
        self.channels.clear();
    }
}

impl Default for KeypointSmoother {
    fn default() -> Self {
        Self::new(SmoothingConfig::default(), 0.35)
    }
}
