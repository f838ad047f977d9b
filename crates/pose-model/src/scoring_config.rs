//! Scoring configuration: one piecewise rule per criterion plus the
//! aggregation weights.
//!
//! The configuration is an immutable snapshot from the scorer's point of
//! view. Editors replace it wholesale; the pipeline reads it once per frame.
//! Any file that fails to read, parse, or validate falls back to
//! [`ScoreConfig::default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Complete scoring configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub legs: LegsRule,
    pub upper: UpperRule,
    pub balance: BalanceRule,
    pub alignment: AlignmentRule,
    pub weights: Weights,
}

/// Knee flex rule (degrees). Full marks at or above `max_deg`, a linear ramp
/// from `ramp_start` to 100 between `min_deg` and `max_deg`, and
/// `low_plateau` at or below `min_deg`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegsRule {
    pub min_deg: f64,
    pub max_deg: f64,
    pub ramp_start: f64,
    pub low_plateau: f64,
    pub floor: f64,
}

/// Follow-through rule. The feature is wrist elevation above the shoulder
/// line in torso lengths. Full marks at or above `target`, a ramp from
/// `ramp_start` to 100 within `tolerance` below it, `low_plateau` further down.
///
/// When the forearm is visible, the release angle is blended in with
/// `release_weight`: full marks at or above `release_min_deg`, otherwise
/// `release_shortfall` of full marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpperRule {
    pub target: f64,
    pub tolerance: f64,
    pub ramp_start: f64,
    pub low_plateau: f64,
    pub floor: f64,
    pub release_min_deg: f64,
    pub release_weight: f64,
    pub release_shortfall: f64,
}

/// Torso sway rule. Sway is the torso lean from vertical divided by 90°,
/// capped at `sway_cap`.
///
/// - `sway < center100`: `100 - sway * near_slope`
/// - up to `center100 * widen_factor`: steeper decrease at `steep_slope`
/// - beyond: `plateau`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceRule {
    pub center100: f64,
    pub widen_factor: f64,
    pub near_slope: f64,
    pub steep_slope: f64,
    pub plateau: f64,
    pub sway_cap: f64,
    pub floor: f64,
}

/// Shoulder-over-hip offset rule (fraction of frame width).
///
/// Segment breakpoints are `tolerance * 0.5`, `tolerance`, and
/// `tolerance * widen_factor`. Segment `i` starts at `anchor_scores[i]` on
/// its left breakpoint and falls at `slopes[i]` points per unit of offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentRule {
    pub tolerance: f64,
    pub widen_factor: f64,
    pub anchor_scores: [f64; 4],
    pub slopes: [f64; 4],
    pub floor: f64,
}

/// Aggregation weights. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub legs: f64,
    pub upper: f64,
    pub balance: f64,
    pub align: f64,
}

impl Default for LegsRule {
    fn default() -> Self {
        Self {
            min_deg: 95.0,
            max_deg: 140.0,
            ramp_start: 60.0,
            low_plateau: 55.0,
            floor: 0.0,
        }
    }
}

impl Default for UpperRule {
    fn default() -> Self {
        Self {
            target: 0.35,
            tolerance: 0.25,
            ramp_start: 70.0,
            low_plateau: 60.0,
            floor: 0.0,
            release_min_deg: 45.0,
            release_weight: 0.4,
            release_shortfall: 0.8,
        }
    }
}

impl Default for BalanceRule {
    fn default() -> Self {
        Self {
            center100: 0.25,
            widen_factor: 2.0,
            near_slope: 50.0,
            steep_slope: 160.0,
            plateau: 48.0,
            sway_cap: 1.0,
            floor: 42.0,
        }
    }
}

impl Default for AlignmentRule {
    fn default() -> Self {
        Self {
            tolerance: 0.12,
            widen_factor: 2.0,
            anchor_scores: [100.0, 85.0, 60.0, 48.0],
            slopes: [250.0, 420.0, 100.0, 40.0],
            floor: 45.0,
        }
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            legs: 0.28,
            upper: 0.24,
            balance: 0.24,
            align: 0.24,
        }
    }
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.legs + self.upper + self.balance + self.align
    }
}

/// Allowed deviation of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

impl ScoreConfig {
    /// Check every rule and the weights. Returns human-readable problems;
    /// an empty list means the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = vec![];

        let mut check_finite = |label: &str, values: &[f64]| {
            if values.iter().any(|v| !v.is_finite()) {
                errors.push(format!("{label}: all values must be finite"));
            }
        };
        let legs = &self.legs;
        check_finite(
            "legs",
            &[legs.min_deg, legs.max_deg, legs.ramp_start, legs.low_plateau, legs.floor],
        );
        let upper = &self.upper;
        check_finite(
            "upper",
            &[
                upper.target,
                upper.tolerance,
                upper.ramp_start,
                upper.low_plateau,
                upper.floor,
                upper.release_min_deg,
                upper.release_weight,
                upper.release_shortfall,
            ],
        );
        let balance = &self.balance;
        check_finite(
            "balance",
            &[
                balance.center100,
                balance.widen_factor,
                balance.near_slope,
                balance.steep_slope,
                balance.plateau,
                balance.sway_cap,
                balance.floor,
            ],
        );
        let align = &self.alignment;
        check_finite("alignment", &[align.tolerance, align.widen_factor, align.floor]);
        check_finite("alignment.anchor_scores", &align.anchor_scores);
        check_finite("alignment.slopes", &align.slopes);
        let w = &self.weights;
        check_finite("weights", &[w.legs, w.upper, w.balance, w.align]);

        if !errors.is_empty() {
            return errors;
        }

        if legs.min_deg >= legs.max_deg {
            errors.push(format!(
                "legs: min_deg ({}) must be below max_deg ({})",
                legs.min_deg, legs.max_deg
            ));
        }
        if upper.tolerance <= 0.0 {
            errors.push("upper: tolerance must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&upper.release_weight) {
            errors.push("upper: release_weight must lie in [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&upper.release_shortfall) {
            errors.push("upper: release_shortfall must lie in [0, 1]".to_string());
        }
        if balance.center100 <= 0.0 {
            errors.push("balance: center100 must be positive".to_string());
        }
        if balance.widen_factor < 1.0 {
            errors.push("balance: widen_factor must be at least 1".to_string());
        }
        if balance.near_slope < 0.0 || balance.steep_slope < 0.0 {
            errors.push("balance: slopes must not be negative".to_string());
        }
        if balance.sway_cap <= 0.0 {
            errors.push("balance: sway_cap must be positive".to_string());
        }
        if align.tolerance <= 0.0 {
            errors.push("alignment: tolerance must be positive".to_string());
        }
        if align.widen_factor < 1.0 {
            errors.push("alignment: widen_factor must be at least 1".to_string());
        }
        if align.slopes.iter().any(|s| *s < 0.0) {
            errors.push("alignment: slopes must not be negative".to_string());
        }

        let scores = [
            ("legs.ramp_start", legs.ramp_start),
            ("legs.low_plateau", legs.low_plateau),
            ("legs.floor", legs.floor),
            ("upper.ramp_start", upper.ramp_start),
            ("upper.low_plateau", upper.low_plateau),
            ("upper.floor", upper.floor),
            ("balance.plateau", balance.plateau),
            ("balance.floor", balance.floor),
            ("alignment.floor", align.floor),
        ];
        for (label, value) in scores {
            if !(0.0..=100.0).contains(&value) {
                errors.push(format!("{label} ({value}) must lie in [0, 100]"));
            }
        }
        if align.anchor_scores.iter().any(|s| !(0.0..=100.0).contains(s)) {
            errors.push("alignment: anchor_scores must lie in [0, 100]".to_string());
        }

        if [w.legs, w.upper, w.balance, w.align].iter().any(|v| *v < 0.0) {
            errors.push("weights: must not be negative".to_string());
        }
        if (w.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            errors.push(format!("weights: must sum to 1.0 (got {:.6})", w.sum()));
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Parse and validate a configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ScoreConfig =
            serde_json::from_str(json).map_err(|source| ConfigError::ParseError {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.checked()
    }

    /// Parse a configuration, falling back to the defaults when it is
    /// malformed or invalid.
    pub fn from_json_or_default(json: &str) -> Self {
        Self::from_json(json).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Scoring config rejected, using defaults");
            Self::default()
        })
    }

    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ScoreConfig =
            serde_json::from_str(&json).map_err(|source| ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            })?;
        config.checked()
    }

    /// Load a configuration file, falling back to the defaults on any failure.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Scoring config rejected, using defaults");
            Self::default()
        })
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })
    }

    fn checked(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::ValidationError {
                message: errors.join("; "),
            })
        }
    }
}

/// Errors that can occur when loading a scoring configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error at {}: {source}", .path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {}: {source}", .path.display())]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid scoring config: {message}")]
    ValidationError { message: String },
}
