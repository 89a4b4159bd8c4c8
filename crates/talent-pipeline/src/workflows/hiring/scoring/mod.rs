//! Scoring provider contract plus the built-in rubric scorer.
//!
//! The pipeline treats scoring as a pure function of applicant and posting. Hosted inference
//! backends implement [`ScoringProvider`]; [`RubricScorer`] is the default used when none is
//! configured.

mod config;
mod rules;

pub use config::ScoringConfig;

use serde::{Deserialize, Serialize};

use super::domain::{Applicant, JobPosting};

pub trait ScoringProvider: Send + Sync {
    /// Score in `[0, 1]`; higher ranks first.
    fn score(&self, applicant: &Applicant, job: &JobPosting) -> Result<f64, ScoringError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("scoring provider unavailable: {0}")]
    Unavailable(String),
    #[error("score {0} is outside [0, 1]")]
    OutOfRange(f64),
    #[error("invalid scoring configuration: {0}")]
    InvalidConfiguration(String),
}

/// Reject provider output that is not a finite value in `[0, 1]`.
pub(crate) fn validate_score(raw: f64) -> Result<f64, ScoringError> {
    if raw.is_finite() && (0.0..=1.0).contains(&raw) {
        Ok(raw)
    } else {
        Err(ScoringError::OutOfRange(raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    SkillMatch,
    Experience,
    ProfileCompleteness,
}

/// Discrete contribution to a score, kept for recruiter-facing explanations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: ScoreFactor,
    pub weight: f64,
    pub value: f64,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub total: f64,
    pub components: Vec<ScoreComponent>,
}

/// Weighted rubric over skill overlap, declared experience, and profile completeness.
#[derive(Debug, Clone, Default)]
pub struct RubricScorer {
    config: ScoringConfig,
}

impl RubricScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn breakdown(
        &self,
        applicant: &Applicant,
        job: &JobPosting,
    ) -> Result<ScoreBreakdown, ScoringError> {
        let components = rules::score_components(applicant, job, &self.config);
        let total_weight: f64 = components.iter().map(|component| component.weight).sum();
        if !total_weight.is_finite() || total_weight <= 0.0 {
            return Err(ScoringError::InvalidConfiguration(format!(
                "weights must sum to a positive value, found {total_weight}"
            )));
        }

        let weighted: f64 = components
            .iter()
            .map(|component| component.weight * component.value)
            .sum();
        let total = validate_score(weighted / total_weight)?;

        Ok(ScoreBreakdown { total, components })
    }
}

impl ScoringProvider for RubricScorer {
    fn score(&self, applicant: &Applicant, job: &JobPosting) -> Result<f64, ScoringError> {
        self.breakdown(applicant, job).map(|breakdown| breakdown.total)
    }
}
