//! Clock and timing utilities for the analysis loop.
//!
//! Pose frames carry monotonic nanosecond timestamps taken from the video
//! playback position. The session clock records when analysis started; the
//! rate controller decouples pipeline cadence from playback cadence.

use std::time::Instant;

/// A session clock anchored to the moment analysis started.
#[derive(Debug, Clone)]
pub struct SessionClock {
    /// The instant analysis started.
    epoch: Instant,

    /// Wall-clock time at epoch.
    epoch_wall: chrono::DateTime<chrono::Utc>,
}

impl SessionClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now(),
        }
    }

    /// Seconds elapsed since the clock started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at start.
    pub fn epoch_wall(&self) -> chrono::DateTime<chrono::Utc> {
        self.epoch_wall
    }
}

/// Rate controller for frame processing.
///
/// A frame is processed only if at least one interval has elapsed since the
/// previously processed frame.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate (at least 1 Hz).
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last.saturating_add(self.target_interval_ns) => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Forget the last tick so the next frame is always processed.
    pub fn reset(&mut self) {
        self.last_tick_ns = None;
    }

    /// Target interval in nanoseconds.
    pub fn interval_ns(&self) -> u64 {
        self.target_interval_ns
    }
}
