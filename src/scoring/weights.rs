//! Criteria, weights and the weighted-sum reduction.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};

/// Allowed drift of the weight sum from 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// The seven scoring criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    ThesisFit,
    SignalDiversity,
    SourceCorroboration,
    FrenchEcosystemBias,
    Timing,
    TeamQuality,
    CompetitivePosition,
}

impl Criterion {
    pub const ALL: [Criterion; 7] = [
        Self::ThesisFit,
        Self::SignalDiversity,
        Self::SourceCorroboration,
        Self::FrenchEcosystemBias,
        Self::Timing,
        Self::TeamQuality,
        Self::CompetitivePosition,
    ];

    /// Wire key (`snake_case`).
    pub fn key(self) -> &'static str {
        match self {
            Self::ThesisFit => "thesis_fit",
            Self::SignalDiversity => "signal_diversity",
            Self::SourceCorroboration => "source_corroboration",
            Self::FrenchEcosystemBias => "french_ecosystem_bias",
            Self::Timing => "timing",
            Self::TeamQuality => "team_quality",
            Self::CompetitivePosition => "competitive_position",
        }
    }

    /// `camelCase` spelling some models prefer.
    pub fn camel_key(self) -> &'static str {
        match self {
            Self::ThesisFit => "thesisFit",
            Self::SignalDiversity => "signalDiversity",
            Self::SourceCorroboration => "sourceCorroboration",
            Self::FrenchEcosystemBias => "frenchEcosystemBias",
            Self::Timing => "timing",
            Self::TeamQuality => "teamQuality",
            Self::CompetitivePosition => "competitivePosition",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Coefficients of the weighted sum. Loaded from `[scoring.weights]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub thesis_fit: f64,
    pub signal_diversity: f64,
    pub source_corroboration: f64,
    pub french_ecosystem_bias: f64,
    pub timing: f64,
    pub team_quality: f64,
    pub competitive_position: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            thesis_fit: 0.30,
            signal_diversity: 0.15,
            source_corroboration: 0.10,
            french_ecosystem_bias: 0.15,
            timing: 0.10,
            team_quality: 0.12,
            competitive_position: 0.08,
        }
    }
}

impl ScoringWeights {
    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::ThesisFit => self.thesis_fit,
            Criterion::SignalDiversity => self.signal_diversity,
            Criterion::SourceCorroboration => self.source_corroboration,
            Criterion::FrenchEcosystemBias => self.french_ecosystem_bias,
            Criterion::Timing => self.timing,
            Criterion::TeamQuality => self.team_quality,
            Criterion::CompetitivePosition => self.competitive_position,
        }
    }

    /// Every weight must lie in `[0, 1]` and the sum must be 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Config`] naming the offending weight or sum.
    pub fn validate(&self) -> Result<()> {
        for criterion in Criterion::ALL {
            let w = self.get(criterion);
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(ScoutError::Config(format!(
                    "scoring weight {criterion} = {w} is outside [0, 1]"
                )));
            }
        }
        let sum: f64 = Criterion::ALL.iter().map(|c| self.get(*c)).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ScoutError::Config(format!(
                "scoring weights sum to {sum}, expected 1.0"
            )));
        }
        Ok(())
    }
}

/// Per-criterion sub-scores on a 0–100 scale. Absent criteria count as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriteriaScores(BTreeMap<Criterion, f64>);

impl CriteriaScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, criterion: Criterion, score: f64) {
        self.0.insert(criterion, score);
    }

    pub fn with(mut self, criterion: Criterion, score: f64) -> Self {
        self.set(criterion, score);
        self
    }

    pub fn get(&self, criterion: Criterion) -> Option<f64> {
        self.0.get(&criterion).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Reduce sub-scores to the 0–100 fit score.
///
/// Missing and NaN sub-scores count as 0; each sub-score is clamped to
/// `[0, 100]` before weighting and the rounded total is clamped again.
pub fn compute_weighted_score(scores: &CriteriaScores, weights: &ScoringWeights) -> u8 {
    let total: f64 = Criterion::ALL
        .iter()
        .map(|&criterion| {
            let raw = scores.get(criterion).unwrap_or(0.0);
            let sub = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 100.0) };
            sub * weights.get(criterion)
        })
        .sum();

    if total.is_nan() {
        return 0;
    }
    total.round().clamp(0.0, 100.0) as u8
}
