//! Live score window and the Live → Frozen finalization state machine.
//!
//! While live, every accepted frame score enters a bounded FIFO window and
//! the displayed score is the per-channel mean of the window. Locking (or
//! reaching the end of input) computes the final score once from the window
//! and freezes it; later frames no longer change it.

use std::collections::VecDeque;

use serde::Serialize;
use shotform_pose_model::score::FrameScore;

use crate::aggregate::round_score;

/// Default number of frame scores kept for the live average.
pub const DEFAULT_WINDOW_SIZE: usize = 15;

/// Bounded FIFO of the most recent frame scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreWindow {
    capacity: usize,
    frames: VecDeque<FrameScore>,
}

impl ScoreWindow {
    /// Create an empty window holding at most `capacity` scores (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            frames: VecDeque::with_capacity(capacity),
        }
    }

    /// Push a score, evicting the oldest when full.
    pub fn push(&mut self, score: FrameScore) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(score);
    }

    /// Per-channel rounded mean of the window, `None` while empty.
    ///
    /// `total` is the rounded mean of the stored totals, not a re-weighting
    /// of the averaged criteria.
    pub fn mean(&self) -> Option<FrameScore> {
        if self.frames.is_empty() {
            return None;
        }
        let n = self.frames.len() as f64;
        let avg = |pick: fn(&FrameScore) -> u8| {
            round_score(self.frames.iter().map(|f| pick(f) as f64).sum::<f64>() / n)
        };
        Some(FrameScore {
            legs: avg(|f| f.legs),
            upper: avg(|f| f.upper),
            balance: avg(|f| f.balance),
            align: avg(|f| f.align),
            total: avg(|f| f.total),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Default for ScoreWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

/// Why a session was frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezeReason {
    /// Explicit lock request.
    Locked,
    /// The input ran out.
    EndOfInput,
}

/// Scoring state of one analysis session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Live(ScoreWindow),
    Frozen {
        score: FrameScore,
        reason: FreezeReason,
    },
}

/// Owns the [`SessionState`] and enforces its transitions.
#[derive(Debug, Clone)]
pub struct ScoreFinalizer {
    window_size: usize,
    state: SessionState,
}

impl ScoreFinalizer {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            state: SessionState::Live(ScoreWindow::new(window_size)),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.state, SessionState::Frozen { .. })
    }

    /// Accept a frame score while live. Returns the new live score, or
    /// `None` if the session is frozen and the score was ignored.
    pub fn push(&mut self, score: FrameScore) -> Option<FrameScore> {
        match &mut self.state {
            SessionState::Live(window) => {
                window.push(score);
                window.mean()
            }
            SessionState::Frozen { .. } => None,
        }
    }

    /// Current live score; `None` while the window is empty or once frozen.
    pub fn live(&self) -> Option<FrameScore> {
        match &self.state {
            SessionState::Live(window) => window.mean(),
            SessionState::Frozen { .. } => None,
        }
    }

    /// Final score, once frozen.
    pub fn final_score(&self) -> Option<FrameScore> {
        match &self.state {
            SessionState::Live(_) => None,
            SessionState::Frozen { score, .. } => Some(*score),
        }
    }

    /// Freeze the window mean as the final score.
    ///
    /// An empty window freezes to an all-zero score. Freezing an already
    /// frozen session is a no-op and returns the stored score.
    pub fn freeze(&mut self, reason: FreezeReason) -> FrameScore {
        let (score, frames) = match &self.state {
            SessionState::Frozen { score, .. } => return *score,
            SessionState::Live(window) => (window.mean().unwrap_or_default(), window.len()),
        };
        tracing::info!(?reason, frames, total = score.total, "Score frozen");
        self.state = SessionState::Frozen { score, reason };
        score
    }

    /// Return to a fresh live state with an empty window.
    pub fn reset(&mut self) {
        self.state = SessionState::Live(ScoreWindow::new(self.window_size));
    }
}

impl Default for ScoreFinalizer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(total: u8) -> FrameScore {
        FrameScore {
            legs: total,
            upper: total,
            balance: total,
            align: total,
            total,
        }
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = ScoreWindow::new(3);
        for t in [10, 20, 30, 40] {
            window.push(score(t));
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.mean().unwrap().total, 30);
    }

    #[test]
    fn test_mean_rounds_per_channel() {
        let mut window = ScoreWindow::new(15);
        window.push(FrameScore {
            legs: 60,
            upper: 100,
            balance: 91,
            align: 72,
            total: 80,
        });
        window.push(FrameScore {
            legs: 61,
            upper: 100,
            balance: 90,
            align: 73,
            total: 81,
        });
        let mean = window.mean().unwrap();
        assert_eq!(mean.legs, 61); // 60.5 rounds up
        assert_eq!(mean.balance, 91);
        assert_eq!(mean.total, 81);
    }

    #[test]
    fn test_empty_window_has_no_mean() {
        assert_eq!(ScoreWindow::default().mean(), None);
        assert_eq!(ScoreWindow::new(0).capacity(), 1);
    }

    #[test]
    fn test_freeze_is_idempotent_and_ignores_frames() {
        let mut finalizer = ScoreFinalizer::new(15);
        finalizer.push(score(70));
        finalizer.push(score(80));

        let first = finalizer.freeze(FreezeReason::Locked);
        assert_eq!(first.total, 75);
        assert_eq!(finalizer.push(score(10)), None);
        assert_eq!(finalizer.freeze(FreezeReason::EndOfInput), first);
        assert_eq!(finalizer.final_score(), Some(first));
        assert!(matches!(
            finalizer.state(),
            SessionState::Frozen {
                reason: FreezeReason::Locked,
                ..
            }
        ));
    }

    #[test]
    fn test_freeze_empty_window_is_zero() {
        let mut finalizer = ScoreFinalizer::default();
        assert_eq!(finalizer.freeze(FreezeReason::EndOfInput), FrameScore::default());
    }

    #[test]
    fn test_reset_returns_to_empty_live() {
        let mut finalizer = ScoreFinalizer::new(4);
        finalizer.push(score(50));
        finalizer.freeze(FreezeReason::Locked);
        finalizer.reset();

        assert!(!finalizer.is_frozen());
        assert_eq!(finalizer.live(), None);
        match finalizer.state() {
            SessionState::Live(window) => {
                assert!(window.is_empty());
                assert_eq!(window.capacity(), 4);
            }
            other => panic!("expected live state, got {other:?}"),
        }
    }
}
