use serde::{Deserialize, Serialize};

/// Rubric weights for the built-in scorer. Weights are relative; the total is normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub skill_weight: f64,
    pub experience_weight: f64,
    pub completeness_weight: f64,
    pub target_years_experience: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            skill_weight: 0.6,
            experience_weight: 0.3,
            completeness_weight: 0.1,
            target_years_experience: 5,
        }
    }
}
