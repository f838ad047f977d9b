//! Score types shown to the user.

use serde::{Deserialize, Serialize};

/// The four scored aspects of a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Knee flex during the dip.
    Legs,
    /// Follow-through of the shooting arm.
    Upper,
    /// Lean of the torso from vertical.
    Balance,
    /// Horizontal stacking of shoulders over hips.
    Alignment,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::Legs,
        Criterion::Upper,
        Criterion::Balance,
        Criterion::Alignment,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Criterion::Legs => "legs",
            Criterion::Upper => "upper",
            Criterion::Balance => "balance",
            Criterion::Alignment => "align",
        }
    }
}

/// Score of a single criterion, an integer in `[floor, 100]`.
pub type CriterionScore = u8;

/// Per-frame score vector. `total` is always derived from the four criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameScore {
    pub legs: CriterionScore,
    pub upper: CriterionScore,
    pub balance: CriterionScore,
    pub align: CriterionScore,
    pub total: CriterionScore,
}

impl FrameScore {
    /// Score of one criterion.
    pub fn get(&self, criterion: Criterion) -> CriterionScore {
        match criterion {
            Criterion::Legs => self.legs,
            Criterion::Upper => self.upper,
            Criterion::Balance => self.balance,
            Criterion::Alignment => self.align,
        }
    }
}

impl std::fmt::Display for FrameScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total {:>3} | legs {:>3} | upper {:>3} | balance {:>3} | align {:>3}",
            self.total, self.legs, self.upper, self.balance, self.align
        )
    }
}
