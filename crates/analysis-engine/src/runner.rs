//! The frame-driven analysis loop.
//!
//! Each iteration pulls a frame from the [`FrameSource`], applies the rate
//! limit, awaits the [`PoseEstimator`] and feeds the pose to the session.
//! The estimate is the only suspension point. A control message that arrives
//! while it is pending drops the estimate before it can reach the session,
//! and a stop request drops it and ends the loop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shotform_common::clock::{RateController, SessionClock};
use shotform_common::error::{ShotformError, ShotformResult};
use shotform_pose_model::pose::PoseFrame;
use shotform_pose_model::score::FrameScore;
use shotform_pose_model::scoring_config::ScoreConfig;
use tokio::sync::{mpsc, watch};

use crate::session::{AnalysisSession, FrameOutcome};
use crate::source::{FrameSource, PoseEstimator, VideoFrame};

const CONTROL_CHANNEL_CAPACITY: usize = 16;

/// Caller requests handled between frames.
pub enum Control {
    /// Freeze the live score now.
    Lock,
    /// Drop all scoring state and start over on the same input.
    Reset,
    /// Switch to new input. Resets the session. `estimator` replaces the
    /// current estimator when given.
    Load {
        source: Box<dyn FrameSource>,
        estimator: Option<Arc<dyn PoseEstimator>>,
    },
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Control::Lock => f.write_str("Lock"),
            Control::Reset => f.write_str("Reset"),
            Control::Load { source, estimator } => f
                .debug_struct("Load")
                .field("source", &source.name())
                .field("estimator", &estimator.is_some())
                .finish(),
        }
    }
}

/// Published after every change to the session's scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreUpdate {
    pub live: Option<FrameScore>,
    pub frozen: Option<FrameScore>,
    pub frames_processed: u64,
}

/// Summary returned when the loop exits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    /// Frames pulled from the source.
    pub frames_seen: u64,
    /// Frames whose pose reached the session since the last reset.
    pub frames_processed: u64,
    /// Processed frames that entered the score window. Lower than
    /// `frames_processed` while the session warms up.
    pub frames_scored: u64,
    /// Frames dropped by the rate limit.
    pub rate_skipped: u64,
    /// Frames whose estimate failed.
    pub failed: u64,
    /// Frames pulled while the session was frozen.
    pub ignored: u64,
    /// Estimates dropped by a control message.
    pub interrupted: u64,
    pub final_score: Option<FrameScore>,
}

/// Ends the loop from outside. Cloneable, and safe to trigger from a signal
/// handler task.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self(Arc::new(tx)), rx)
    }

    /// Request a stop. A pending estimate is dropped.
    pub fn stop(&self) {
        self.0.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }
}

/// Caller-side ends of the loop's channels.
#[derive(Debug)]
pub struct LoopHandles {
    /// Replace the score configuration; takes effect on the next frame.
    /// An invalid configuration is replaced by the defaults.
    pub config: watch::Sender<Arc<ScoreConfig>>,
    pub controls: mpsc::Sender<Control>,
    pub scores: watch::Receiver<ScoreUpdate>,
    pub stop: StopHandle,
}

#[derive(Debug, Default)]
struct LoopStats {
    frames_seen: u64,
    rate_skipped: u64,
    failed: u64,
    ignored: u64,
    interrupted: u64,
}

enum Step {
    Estimated(ShotformResult<PoseFrame>),
    Interrupted(Control),
    Stopped,
}

/// Resolves once a stop has been requested.
async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        let stopped = *stop_rx.borrow_and_update();
        if stopped || stop_rx.changed().await.is_err() {
            return;
        }
    }
}

/// Use `snapshot` if it validates, the defaults otherwise.
fn effective_config(snapshot: Arc<ScoreConfig>) -> Arc<ScoreConfig> {
    let issues = snapshot.validate();
    if issues.is_empty() {
        return snapshot;
    }
    tracing::warn!(?issues, "Score config rejected, using defaults");
    Arc::new(ScoreConfig::default())
}

/// Owns the session and drives it from a frame source.
pub struct AnalysisLoop {
    source: Box<dyn FrameSource>,
    estimator: Arc<dyn PoseEstimator>,
    session: AnalysisSession,
    rate: RateController,
    config_rx: watch::Receiver<Arc<ScoreConfig>>,
    config: Arc<ScoreConfig>,
    control_rx: mpsc::Receiver<Control>,
    controls_open: bool,
    scores_tx: watch::Sender<ScoreUpdate>,
    stop: StopHandle,
    stop_rx: watch::Receiver<bool>,
    lock_after: Option<u64>,
    stats: LoopStats,
}

impl AnalysisLoop {
    /// Create a loop and the handles used to steer it.
    pub fn new(
        source: Box<dyn FrameSource>,
        estimator: Arc<dyn PoseEstimator>,
        session: AnalysisSession,
        config: ScoreConfig,
        max_rate_hz: u32,
    ) -> (Self, LoopHandles) {
        let config = Arc::new(config);
        let (config_tx, config_rx) = watch::channel(Arc::clone(&config));
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let (scores_tx, scores_rx) = watch::channel(ScoreUpdate::default());
        let (stop, stop_rx) = StopHandle::new();

        let analysis = Self {
            source,
            estimator,
            session,
            rate: RateController::new(max_rate_hz),
            config_rx,
            config: effective_config(config),
            control_rx,
            controls_open: true,
            scores_tx,
            stop: stop.clone(),
            stop_rx,
            lock_after: None,
            stats: LoopStats::default(),
        };
        let handles = LoopHandles {
            config: config_tx,
            controls: control_tx,
            scores: scores_rx,
            stop,
        };
        (analysis, handles)
    }

    /// Run until the input ends or a stop is requested.
    ///
    /// Reaching the end of input freezes the session. Stopping leaves it as
    /// it is, even when an estimate was pending.
    pub async fn run(&mut self) -> ShotformResult<AnalysisReport> {
        let clock = SessionClock::start();
        tracing::info!(
            source = %self.source.name(),
            interval_ns = self.rate.interval_ns(),
            "Analysis loop started"
        );

        while !self.stop.is_stopped() {
            self.drain_controls();

            let next = tokio::select! {
                biased;
                _ = stop_requested(&mut self.stop_rx) => break,
                next = self.source.next_frame() => next,
            };
            let Some(frame) = next else {
                tracing::info!(source = %self.source.name(), "End of input");
                self.session.finish();
                self.publish();
                break;
            };
            self.stats.frames_seen += 1;

            if self.session.is_frozen() {
                self.stats.ignored += 1;
                continue;
            }
            if !self.rate.should_tick(frame.timestamp_ns) {
                self.stats.rate_skipped += 1;
                tracing::trace!(index = frame.index, "Frame skipped by rate limit");
                continue;
            }

            match self.estimate(&frame).await {
                Step::Estimated(Ok(pose)) => self.process(&frame, &pose),
                Step::Estimated(Err(e)) => {
                    self.stats.failed += 1;
                    tracing::warn!(index = frame.index, error = %e, "Pose estimation failed, skipping frame");
                }
                Step::Interrupted(control) => {
                    self.stats.interrupted += 1;
                    tracing::debug!(index = frame.index, ?control, "Pending estimate dropped");
                    self.apply(control);
                }
                Step::Stopped => {
                    tracing::debug!(index = frame.index, "Pending estimate dropped by stop");
                    break;
                }
            }
        }

        let report = AnalysisReport {
            started_at: clock.epoch_wall(),
            elapsed_secs: clock.elapsed_secs(),
            frames_seen: self.stats.frames_seen,
            frames_processed: self.session.frames_processed(),
            frames_scored: self.session.frames_scored(),
            rate_skipped: self.stats.rate_skipped,
            failed: self.stats.failed,
            ignored: self.stats.ignored,
            interrupted: self.stats.interrupted,
            final_score: self.session.final_score(),
        };
        tracing::info!(
            frames = report.frames_seen,
            processed = report.frames_processed,
            failed = report.failed,
            total = ?report.final_score.map(|s| s.total),
            "Analysis loop stopped"
        );
        Ok(report)
    }

    /// Await the estimate unless a stop or a control message arrives first.
    async fn estimate(&mut self, frame: &VideoFrame) -> Step {
        let estimator = Arc::clone(&self.estimator);
        let pending = estimator.estimate(frame);
        tokio::pin!(pending);

        loop {
            let control = tokio::select! {
                biased;
                _ = stop_requested(&mut self.stop_rx) => return Step::Stopped,
                control = self.control_rx.recv(), if self.controls_open => control,
                result = &mut pending => return Step::Estimated(result),
            };
            match control {
                Some(control) => return Step::Interrupted(control),
                None => self.controls_open = false,
            }
        }
    }

    fn process(&mut self, frame: &VideoFrame, pose: &PoseFrame) {
        if let Some(geometry) = frame.geometry() {
            self.session.set_geometry(geometry);
        }
        self.refresh_config();
        let config = Arc::clone(&self.config);
        if let FrameOutcome::Scored { live, .. } = self.session.process_frame(pose, &config) {
            tracing::debug!(index = frame.index, total = live.total, "Live score updated");
        }

        match self.lock_after {
            Some(limit) if self.session.frames_processed() >= limit => self.apply(Control::Lock),
            _ => self.publish(),
        }
    }

    /// Pick up a replaced configuration. Validated once per replacement.
    fn refresh_config(&mut self) {
        if !self.config_rx.has_changed().unwrap_or(false) {
            return;
        }
        let snapshot = Arc::clone(&self.config_rx.borrow_and_update());
        self.config = effective_config(snapshot);
    }

    fn drain_controls(&mut self) {
        while self.controls_open {
            match self.control_rx.try_recv() {
                Ok(control) => self.apply(control),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => self.controls_open = false,
            }
        }
    }

    fn apply(&mut self, control: Control) {
        match control {
            Control::Lock => {
                let score = self.session.lock();
                tracing::info!(total = score.total, "Lock requested");
            }
            Control::Reset => {
                self.session.reset();
                self.rate.reset();
            }
            Control::Load { source, estimator } => {
                tracing::info!(source = %source.name(), "Loading new input");
                self.source = source;
                if let Some(estimator) = estimator {
                    self.estimator = estimator;
                }
                self.session.reset();
                self.rate.reset();
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.scores_tx.send_replace(ScoreUpdate {
            live: self.session.live_score(),
            frozen: self.session.final_score(),
            frames_processed: self.session.frames_processed(),
        });
    }

    /// Lock automatically once this many frames have been processed.
    pub fn set_lock_after(&mut self, frames: Option<u64>) {
        self.lock_after = frames;
    }

    pub fn session(&self) -> &AnalysisSession {
        &self.session
    }

    /// The effective score configuration for the next frame.
    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}

/// Replay a source to the end with a fixed configuration.
pub async fn analyze(
    source: Box<dyn FrameSource>,
    estimator: Arc<dyn PoseEstimator>,
    session: AnalysisSession,
    config: ScoreConfig,
    max_rate_hz: u32,
) -> ShotformResult<AnalysisReport> {
    let (mut analysis, _handles) = AnalysisLoop::new(source, estimator, session, config, max_rate_hz);
    let report = analysis.run().await?;
    if report.final_score.is_none() {
        return Err(ShotformError::session("analysis stopped before the input ended"));
    }
    Ok(report)
}
