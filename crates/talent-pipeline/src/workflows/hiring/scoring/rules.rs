use std::collections::BTreeSet;

use super::super::domain::{Applicant, JobPosting};
use super::config::ScoringConfig;
use super::{ScoreComponent, ScoreFactor};

const NEUTRAL_SKILL_MATCH: f64 = 0.5;

fn normalize(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

pub(crate) fn score_components(
    applicant: &Applicant,
    job: &JobPosting,
    config: &ScoringConfig,
) -> Vec<ScoreComponent> {
    vec![
        skill_match(applicant, job, config),
        experience(applicant, config),
        completeness(applicant, config),
    ]
}

fn skill_match(applicant: &Applicant, job: &JobPosting, config: &ScoringConfig) -> ScoreComponent {
    let requirements: BTreeSet<String> = job
        .requirements
        .iter()
        .map(|requirement| normalize(requirement))
        .filter(|requirement| !requirement.is_empty())
        .collect();

    if requirements.is_empty() {
        return ScoreComponent {
            factor: ScoreFactor::SkillMatch,
            weight: config.skill_weight,
            value: NEUTRAL_SKILL_MATCH,
            notes: "posting lists no requirements".to_string(),
        };
    }

    let skills: BTreeSet<String> = applicant
        .profile
        .skills
        .iter()
        .map(|skill| normalize(skill))
        .collect();
    let headline = applicant
        .profile
        .headline
        .as_deref()
        .map(normalize)
        .unwrap_or_default();

    let matched: Vec<&String> = requirements
        .iter()
        .filter(|requirement| skills.contains(*requirement) || headline.contains(requirement.as_str()))
        .collect();
    let value = matched.len() as f64 / requirements.len() as f64;

    ScoreComponent {
        factor: ScoreFactor::SkillMatch,
        weight: config.skill_weight,
        value,
        notes: format!(
            "matched {}/{} requirements",
            matched.len(),
            requirements.len()
        ),
    }
}

fn experience(applicant: &Applicant, config: &ScoringConfig) -> ScoreComponent {
    let (value, notes) = match (applicant.profile.years_experience, config.target_years_experience) {
        (None, _) => (0.0, "experience not declared".to_string()),
        (Some(_), 0) => (1.0, "no experience target configured".to_string()),
        (Some(years), target) => (
            (f64::from(years) / f64::from(target)).min(1.0),
            format!("{years} of {target} target years"),
        ),
    };

    ScoreComponent {
        factor: ScoreFactor::Experience,
        weight: config.experience_weight,
        value,
        notes,
    }
}

fn completeness(applicant: &Applicant, config: &ScoringConfig) -> ScoreComponent {
    let checks = [
        applicant.phone.is_some(),
        applicant.resume_ref.is_some(),
        applicant.cover_letter_ref.is_some(),
        applicant.profile.headline.is_some(),
    ];
    let present = checks.iter().filter(|present| **present).count();

    ScoreComponent {
        factor: ScoreFactor::ProfileCompleteness,
        weight: config.completeness_weight,
        value: present as f64 / checks.len() as f64,
        notes: format!("{present}/{} profile fields supplied", checks.len()),
    }
}
