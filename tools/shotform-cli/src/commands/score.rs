//! Score a recorded pose stream.

use std::path::PathBuf;
use std::sync::Arc;

use shotform_analysis_engine::runner::{AnalysisLoop, AnalysisReport};
use shotform_analysis_engine::session::AnalysisSession;
use shotform_analysis_engine::source::RecordedPoses;
use shotform_common::config::AnalysisDefaults;
use shotform_pose_model::pose::FrameGeometry;
use shotform_pose_model::score::Criterion;
use shotform_pose_model::scoring_config::ScoreConfig;

pub struct ScoreOptions {
    pub poses: PathBuf,
    pub config: Option<PathBuf>,
    pub geometry: Option<(u32, u32)>,
    pub rate: Option<u32>,
    pub window: Option<usize>,
    pub lock_after: Option<u64>,
    pub json: bool,
}

pub async fn run(options: ScoreOptions, defaults: &AnalysisDefaults) -> anyhow::Result<()> {
    let mut defaults = defaults.clone();
    if let Some(window) = options.window {
        defaults.window_size = window;
    }
    let rate = options.rate.unwrap_or(defaults.max_rate_hz);
    let geometry = options.geometry.map(|(w, h)| FrameGeometry::new(w, h));

    let score_config = match &options.config {
        Some(path) => ScoreConfig::load_or_default(path),
        None => ScoreConfig::default(),
    };

    let mut recorded = RecordedPoses::load(&options.poses)
        .map_err(|e| anyhow::anyhow!("Failed to load pose stream: {e}"))?;
    if recorded.is_empty() {
        anyhow::bail!("Pose stream {} contains no frames", options.poses.display());
    }
    if let Some(geometry) = geometry {
        recorded = recorded.with_geometry(geometry);
    }
    let frame_count = recorded.len();

    let (source, estimator) = recorded.split();
    let session = AnalysisSession::from_defaults(&defaults, geometry);
    let (mut analysis, handles) = AnalysisLoop::new(
        Box::new(source),
        Arc::new(estimator),
        session,
        score_config,
        rate,
    );
    analysis.set_lock_after(options.lock_after);

    let stop = handles.stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping analysis");
            stop.stop();
        }
    });

    tracing::info!(frames = frame_count, rate_hz = rate, "Scoring pose stream");
    let report = analysis.run().await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }

    if report.final_score.is_none() {
        anyhow::bail!("Analysis stopped before a final score was produced");
    }
    Ok(())
}

fn render_report(report: &AnalysisReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Frames: {} seen, {} processed, {} scored, {} rate-limited, {} failed\n",
        report.frames_seen,
        report.frames_processed,
        report.frames_scored,
        report.rate_skipped,
        report.failed
    ));
    if report.ignored > 0 {
        out.push_str(&format!("  {} frame(s) after lock ignored\n", report.ignored));
    }

    match report.final_score {
        Some(score) => {
            out.push_str(&format!("\nForm score: {}\n", score.total));
            for criterion in Criterion::ALL {
                out.push_str(&format!(
                    "  {:<10} {:>3}\n",
                    criterion.label(),
                    score.get(criterion)
                ));
            }
        }
        None => out.push_str("\nNo final score.\n"),
    }
    out
}
