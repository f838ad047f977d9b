//! Application configuration.
//!
//! Missing fields fall back to their defaults, so a config file only needs
//! to name the values it changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Analysis loop defaults.
    pub analysis: AnalysisDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default analysis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisDefaults {
    /// Maximum processed frames per second. Frames arriving sooner are skipped.
    pub max_rate_hz: u32,

    /// Number of frame scores averaged into the live score.
    pub window_size: usize,

    /// Keypoints reported below this confidence are treated as undetected.
    pub min_confidence: f64,

    /// Adaptive smoothing parameters.
    pub smoothing: SmoothingConfig,

    /// Frame width used when the video reports none (pixels).
    pub frame_width: u32,

    /// Frame height used when the video reports none (pixels).
    pub frame_height: u32,
}

/// Adaptive low-pass filter parameters.
///
/// The blend factor is `clamp(alpha_base + beta * tanh(v / velocity_scale), alpha_min, alpha_max)`
/// where `v` is the per-axis speed in pixels per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Blend factor at rest. Lower = smoother.
    pub alpha_base: f64,

    /// How much fast motion raises the blend factor.
    pub beta: f64,

    /// Speed (px/s) at which the boost reaches ~76% of `beta`.
    pub velocity_scale: f64,

    /// Lower bound for the blend factor.
    pub alpha_min: f64,

    /// Upper bound for the blend factor.
    pub alpha_max: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "shotform=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            max_rate_hz: 45,
            window_size: 15,
            min_confidence: 0.35,
            smoothing: SmoothingConfig::default(),
            frame_width: 640,
            frame_height: 360,
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            alpha_base: 0.35,
            beta: 0.15,
            velocity_scale: 80.0,
            alpha_min: 0.05,
            alpha_max: 0.95,
        }
    }
}

impl SmoothingConfig {
    /// Return a copy with every parameter forced into its usable range.
    ///
    /// Non-finite values are replaced by their defaults.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let pick = |v: f64, d: f64| if v.is_finite() { v } else { d };

        let alpha_min = pick(self.alpha_min, defaults.alpha_min).clamp(0.01, 1.0);
        let alpha_max = pick(self.alpha_max, defaults.alpha_max).clamp(alpha_min, 1.0);
        Self {
            alpha_base: pick(self.alpha_base, defaults.alpha_base).clamp(0.05, 0.9),
            beta: pick(self.beta, defaults.beta).clamp(0.0, 1.0),
            velocity_scale: pick(self.velocity_scale, defaults.velocity_scale).max(1e-6),
            alpha_min,
            alpha_max,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from `path`, falling back to defaults on any failure.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("shotform").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("shotform-common-{}-{}", std::process::id(), name))
            .join("config.json")
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"analysis": {"window_size": 9}}"#).unwrap();
        assert_eq!(config.analysis.window_size, 9);
        assert_eq!(config.analysis.max_rate_hz, 45);
        assert_eq!(config.analysis.smoothing, SmoothingConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let path = scratch_path("malformed");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ this is not json").unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.analysis.window_size, 15);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch_path("save");
        let mut config = AppConfig::default();
        config.analysis.max_rate_hz = 30;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.analysis.max_rate_hz, 30);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_sanitized_smoothing_clamps() {
        let wild = SmoothingConfig {
            alpha_base: 4.0,
            beta: -1.0,
            velocity_scale: 0.0,
            alpha_min: f64::NAN,
            alpha_max: 0.01,
        };
        let s = wild.sanitized();
        assert_eq!(s.alpha_base, 0.9);
        assert_eq!(s.beta, 0.0);
        assert!(s.velocity_scale > 0.0);
        assert_eq!(s.alpha_min, 0.05);
        assert!(s.alpha_max >= s.alpha_min);
    }
}
