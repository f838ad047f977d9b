//! Frame sources and pose estimators consumed by the analysis loop.

use std::path::Path;
use std::sync::Arc;

use shotform_common::error::{ShotformError, ShotformResult};
use shotform_pose_model::pose::{parse_frames, FrameGeometry, PoseFrame, TimestampNs};

/// A decoded video frame handed to the pose estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFrame {
    /// Position in the source, starting at 0.
    pub index: u64,
    /// Playback position in nanoseconds.
    pub timestamp_ns: TimestampNs,
    /// Frame width in pixels, 0 when unknown.
    pub width: u32,
    /// Frame height in pixels, 0 when unknown.
    pub height: u32,
}

impl VideoFrame {
    /// Frame size, when the source reports one.
    pub fn geometry(&self) -> Option<FrameGeometry> {
        (self.width > 0 && self.height > 0).then(|| FrameGeometry::new(self.width, self.height))
    }
}

/// Produces video frames in playback order.
#[async_trait::async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` at end of input.
    async fn next_frame(&mut self) -> Option<VideoFrame>;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

/// Turns a video frame into keypoints. May fail for any frame.
#[async_trait::async_trait]
pub trait PoseEstimator: Send + Sync {
    async fn estimate(&self, frame: &VideoFrame) -> ShotformResult<PoseFrame>;
}

/// A parsed pose stream replayed as if it were live video.
///
/// [`RecordedPoses::split`] yields a source that emits one [`VideoFrame`] per
/// recorded pose and an estimator that answers with the recorded pose.
#[derive(Debug, Clone)]
pub struct RecordedPoses {
    label: String,
    frames: Arc<Vec<PoseFrame>>,
    geometry: Option<FrameGeometry>,
}

impl RecordedPoses {
    pub fn new(label: impl Into<String>, frames: Vec<PoseFrame>) -> Self {
        let mut frames = frames;
        for frame in &mut frames {
            frame.dedup();
        }
        Self {
            label: label.into(),
            frames: Arc::new(frames),
            geometry: None,
        }
    }

    /// Report this frame size on every emitted video frame.
    pub fn with_geometry(mut self, geometry: FrameGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Load a JSONL pose stream from disk.
    pub fn load(path: impl AsRef<Path>) -> ShotformResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ShotformError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let frames = parse_frames(&content)?;
        tracing::debug!(path = %path.display(), frames = frames.len(), "Loaded pose stream");
        Ok(Self::new(path.display().to_string(), frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Split into a frame source and the matching estimator.
    pub fn split(self) -> (RecordedSource, RecordedEstimator) {
        let source = RecordedSource {
            label: self.label,
            frames: Arc::clone(&self.frames),
            geometry: self.geometry,
            cursor: 0,
        };
        let estimator = RecordedEstimator {
            frames: self.frames,
        };
        (source, estimator)
    }
}

/// Frame source half of [`RecordedPoses`].
#[derive(Debug)]
pub struct RecordedSource {
    label: String,
    frames: Arc<Vec<PoseFrame>>,
    geometry: Option<FrameGeometry>,
    cursor: usize,
}

#[async_trait::async_trait]
impl FrameSource for RecordedSource {
    async fn next_frame(&mut self) -> Option<VideoFrame> {
        let pose = self.frames.get(self.cursor)?;
        let (width, height) = self.geometry.map_or((0, 0), |g| (g.width, g.height));
        let frame = VideoFrame {
            index: self.cursor as u64,
            timestamp_ns: pose.timestamp_ns,
            width,
            height,
        };
        self.cursor += 1;
        Some(frame)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Estimator half of [`RecordedPoses`].
#[derive(Debug)]
pub struct RecordedEstimator {
    frames: Arc<Vec<PoseFrame>>,
}

#[async_trait::async_trait]
impl PoseEstimator for RecordedEstimator {
    async fn estimate(&self, frame: &VideoFrame) -> ShotformResult<PoseFrame> {
        let recorded = usize::try_from(frame.index)
            .ok()
            .and_then(|i| self.frames.get(i))
            .ok_or_else(|| {
                ShotformError::estimation(format!("no recorded pose for frame {}", frame.index))
            })?;

        if recorded.timestamp_ns != frame.timestamp_ns {
            return Err(ShotformError::estimation(format!(
                "frame {} timestamp {} does not match the recording",
                frame.index, frame.timestamp_ns
            )));
        }
        Ok(recorded.clone())
    }
}
