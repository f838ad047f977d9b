use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shotform_analysis_engine::runner::{analyze, AnalysisLoop, Control};
use shotform_analysis_engine::session::AnalysisSession;
use shotform_analysis_engine::source::{PoseEstimator, RecordedPoses, VideoFrame};
use shotform_common::error::{ShotformError, ShotformResult};
use shotform_pose_model::pose::PoseFrame;
use shotform_pose_model::scoring_config::{ScoreConfig, Weights};

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("sample-shot")
        .join("poses.jsonl")
}

fn recorded() -> RecordedPoses {
    RecordedPoses::load(fixture_path()).expect("fixture poses should load")
}

/// Fails every odd frame.
struct FlakyEstimator<E>(E);

#[async_trait::async_trait]
impl<E: PoseEstimator> PoseEstimator for FlakyEstimator<E> {
    async fn estimate(&self, frame: &VideoFrame) -> ShotformResult<PoseFrame> {
        if frame.index % 2 == 1 {
            return Err(ShotformError::estimation("detector timeout"));
        }
        self.0.estimate(frame).await
    }
}

/// Never answers for `stall_at` (once, or forever when `sticky`).
struct StallingEstimator<E> {
    inner: E,
    stall_at: u64,
    sticky: bool,
    stalled: AtomicBool,
}

impl<E> StallingEstimator<E> {
    fn new(inner: E, stall_at: u64, sticky: bool) -> Self {
        Self {
            inner,
            stall_at,
            sticky,
            stalled: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl<E: PoseEstimator> PoseEstimator for StallingEstimator<E> {
    async fn estimate(&self, frame: &VideoFrame) -> ShotformResult<PoseFrame> {
        let stall = if self.sticky {
            frame.index >= self.stall_at
        } else {
            frame.index == self.stall_at && !self.stalled.swap(true, Ordering::SeqCst)
        };
        if stall {
            std::future::pending::<()>().await;
        }
        self.inner.estimate(frame).await
    }
}

#[tokio::test]
async fn replays_fixture_to_a_final_score() {
    let (source, estimator) = recorded().split();
    let report = analyze(
        Box::new(source),
        Arc::new(estimator),
        AnalysisSession::default(),
        ScoreConfig::default(),
        45,
    )
    .await
    .unwrap();

    assert_eq!(report.frames_seen, 60);
    assert_eq!(report.frames_processed, 60);
    assert_eq!(report.frames_scored, 60);
    assert_eq!(report.rate_skipped, 0);
    let final_score = report.final_score.unwrap();
    assert_eq!(final_score.legs, 100);
    assert!(final_score.total >= 95);
}

#[tokio::test]
async fn rate_limit_skips_frames_closer_than_the_interval() {
    let (source, estimator) = recorded().split();
    let report = analyze(
        Box::new(source),
        Arc::new(estimator),
        AnalysisSession::default(),
        ScoreConfig::default(),
        10,
    )
    .await
    .unwrap();

    // 30 fps against a 100 ms interval: every fourth frame is processed.
    assert_eq!(report.frames_processed, 15);
    assert_eq!(report.rate_skipped, 45);
}

#[tokio::test]
async fn estimation_failures_skip_frames_and_continue() {
    let (source, estimator) = recorded().split();
    let report = analyze(
        Box::new(source),
        Arc::new(FlakyEstimator(estimator)),
        AnalysisSession::default(),
        ScoreConfig::default(),
        45,
    )
    .await
    .unwrap();

    assert_eq!(report.failed, 30);
    assert_eq!(report.frames_processed, 30);
    assert!(report.final_score.is_some());
}

#[tokio::test]
async fn config_replaced_before_a_frame_applies_to_it() {
    let (source, estimator) = recorded().split();
    let (mut analysis, handles) = AnalysisLoop::new(
        Box::new(source),
        Arc::new(estimator),
        AnalysisSession::default(),
        ScoreConfig::default(),
        45,
    );

    let mut legs_only = ScoreConfig::default();
    legs_only.weights = Weights {
        legs: 1.0,
        upper: 0.0,
        balance: 0.0,
        align: 0.0,
    };
    handles.config.send_replace(Arc::new(legs_only));

    let report = analysis.run().await.unwrap();
    let final_score = report.final_score.unwrap();
    assert_eq!(final_score.total, final_score.legs);
}

#[tokio::test]
async fn invalid_config_replacement_falls_back_to_defaults() {
    let (source, estimator) = recorded().split();
    let expected = analyze(
        Box::new(source),
        Arc::new(estimator),
        AnalysisSession::default(),
        ScoreConfig::default(),
        45,
    )
    .await
    .unwrap()
    .final_score;

    let (source, estimator) = recorded().split();
    let (mut analysis, handles) = AnalysisLoop::new(
        Box::new(source),
        Arc::new(estimator),
        AnalysisSession::default(),
        ScoreConfig::default(),
        45,
    );
    let mut inverted = ScoreConfig::default();
    inverted.legs.min_deg = 200.0;
    inverted.legs.max_deg = 100.0;
    assert!(!inverted.is_valid());
    handles.config.send_replace(Arc::new(inverted));

    let report = analysis.run().await.unwrap();
    assert_eq!(report.final_score, expected);
    assert_eq!(analysis.config(), &ScoreConfig::default());
}

#[tokio::test]
async fn invalid_initial_config_falls_back_to_defaults() {
    let (source, estimator) = recorded().split();
    let mut config = ScoreConfig::default();
    config.weights.legs = 0.9;
    let (analysis, _handles) = AnalysisLoop::new(
        Box::new(source),
        Arc::new(estimator),
        AnalysisSession::default(),
        config,
        45,
    );
    assert_eq!(analysis.config(), &ScoreConfig::default());
}

#[tokio::test]
async fn lock_drops_the_pending_estimate_and_freezes() {
    let (source, estimator) = recorded().split();
    let (mut analysis, mut handles) = AnalysisLoop::new(
        Box::new(source),
        Arc::new(StallingEstimator::new(estimator, 3, true)),
        AnalysisSession::default(),
        ScoreConfig::default(),
        45,
    );
    let task = tokio::spawn(async move { analysis.run().await });

    let live = handles
        .scores
        .wait_for(|u| u.frames_processed == 3)
        .await
        .unwrap()
        .live;
    handles.controls.send(Control::Lock).await.unwrap();

    let report = task.await.unwrap().unwrap();
    assert_eq!(report.final_score, live);
    assert_eq!(report.frames_processed, 3);
    assert_eq!(report.interrupted, 1);
    assert_eq!(report.ignored, 56);
    assert_eq!(report.frames_seen, 60);
}

#[tokio::test]
async fn reset_starts_over_on_the_same_input() {
    let (source, estimator) = recorded().split();
    let (mut analysis, mut handles) = AnalysisLoop::new(
        Box::new(source),
        Arc::new(StallingEstimator::new(estimator, 3, false)),
        AnalysisSession::default(),
        ScoreConfig::default(),
        45,
    );
    let task = tokio::spawn(async move { analysis.run().await });

    handles
        .scores
        .wait_for(|u| u.frames_processed == 3)
        .await
        .unwrap();
    handles.controls.send(Control::Reset).await.unwrap();

    let report = task.await.unwrap().unwrap();
    // Frames 4..60 are scored from a fresh session.
    assert_eq!(report.frames_processed, 56);
    assert_eq!(report.interrupted, 1);
    assert!(report.final_score.is_some());
}

#[tokio::test]
async fn load_switches_to_new_input() {
    let (source, estimator) = recorded().split();
    let (mut analysis, mut handles) = AnalysisLoop::new(
        Box::new(source),
        Arc::new(StallingEstimator::new(estimator, 3, true)),
        AnalysisSession::default(),
        ScoreConfig::default(),
        45,
    );
    let task = tokio::spawn(async move { analysis.run().await });

    handles
        .scores
        .wait_for(|u| u.frames_processed == 3)
        .await
        .unwrap();

    let frames = recorded_frames(10);
    let (next_source, next_estimator) = RecordedPoses::new("short clip", frames).split();
    handles
        .controls
        .send(Control::Load {
            source: Box::new(next_source),
            estimator: Some(Arc::new(next_estimator)),
        })
        .await
        .unwrap();

    let report = task.await.unwrap().unwrap();
    assert_eq!(report.frames_processed, 10);
    assert_eq!(report.frames_seen, 14);
    assert!(report.final_score.is_some());
}

#[tokio::test]
async fn lock_after_freezes_at_the_frame_limit() {
    let (source, estimator) = recorded().split();
    let (mut analysis, handles) = AnalysisLoop::new(
        Box::new(source),
        Arc::new(estimator),
        AnalysisSession::default(),
        ScoreConfig::default(),
        45,
    );
    analysis.set_lock_after(Some(20));

    let report = analysis.run().await.unwrap();
    assert_eq!(report.frames_processed, 20);
    assert_eq!(report.ignored, 40);
    assert_eq!(handles.scores.borrow().frozen, report.final_score);
    assert!(report.final_score.is_some());
}

#[tokio::test]
async fn stop_before_start_exits_without_freezing() {
    let (source, estimator) = recorded().split();
    let (mut analysis, handles) = AnalysisLoop::new(
        Box::new(source),
        Arc::new(estimator),
        AnalysisSession::default(),
        ScoreConfig::default(),
        45,
    );
    handles.stop.stop();

    let report = analysis.run().await.unwrap();
    assert_eq!(report.frames_seen, 0);
    assert_eq!(report.final_score, None);
    assert!(!analysis.session().is_frozen());
}

#[tokio::test]
async fn stop_cancels_a_pending_estimate() {
    let (source, estimator) = recorded().split();
    let (mut analysis, mut handles) = AnalysisLoop::new(
        Box::new(source),
        Arc::new(StallingEstimator::new(estimator, 3, true)),
        AnalysisSession::default(),
        ScoreConfig::default(),
        45,
    );
    let task = tokio::spawn(async move {
        let report = analysis.run().await;
        (report, analysis.session().is_frozen())
    });

    handles
        .scores
        .wait_for(|u| u.frames_processed == 3)
        .await
        .unwrap();
    handles.stop.stop();

    let (report, frozen) = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("stop should end the loop while the estimate is pending")
        .unwrap();
    let report = report.unwrap();
    assert_eq!(report.frames_seen, 4);
    assert_eq!(report.frames_processed, 3);
    assert_eq!(report.interrupted, 0);
    assert_eq!(report.final_score, None);
    assert!(!frozen);
    assert!(handles.stop.is_stopped());
}

fn recorded_frames(n: usize) -> Vec<PoseFrame> {
    let content = std::fs::read_to_string(fixture_path()).unwrap();
    let mut frames = shotform_pose_model::pose::parse_frames(&content).unwrap();
    frames.truncate(n);
    frames
}
