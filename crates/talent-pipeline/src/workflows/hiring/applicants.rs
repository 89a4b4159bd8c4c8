use std::cmp::Ordering;
use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::collaborators::Clock;
use super::domain::{
    Applicant, ApplicantId, ApplicantSource, ApplicantStatus, CandidateFields, EmployeeId,
    EntityKind, JobId, JobStatus, Offer, OfferStatus, StatusChange, Versioned,
};
use super::errors::HiringError;
use super::import::{parse_candidates, ImportReport, ImportRowError};
use super::jobs::load_job;
use super::repository::{HiringRepository, Precondition, WriteBatch};
use super::retry::RetryPolicy;
use super::scoring::{validate_score, ScoringProvider};
use super::transitions::{self, ApplicantTrigger};

const SCORING_FAILED: &str = "SCORING_FAILED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub rank: usize,
    pub applicant_id: ApplicantId,
    pub name: String,
    pub status: ApplicantStatus,
    pub score: f64,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingFailure {
    pub applicant_id: ApplicantId,
    pub code: String,
    pub reason: String,
}

/// Ranked candidates for one posting plus the applicants that could not be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingReport {
    pub job_id: JobId,
    pub ranked: Vec<RankedCandidate>,
    pub failures: Vec<RankingFailure>,
}

pub(crate) fn load_applicant<R>(repository: &R, id: &ApplicantId) -> Result<Applicant, HiringError>
where
    R: HiringRepository + ?Sized,
{
    repository
        .applicant(id)?
        .ok_or_else(|| HiringError::not_found(EntityKind::Applicant, id))
}

fn validate_candidate(fields: &CandidateFields) -> Result<CandidateFields, HiringError> {
    let first_name = fields.first_name.trim();
    let last_name = fields.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(HiringError::Validation(
            "first and last name are required".to_string(),
        ));
    }

    let email = fields.email.trim();
    let valid_email = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid_email {
        return Err(HiringError::Validation(format!(
            "'{email}' is not a valid email address"
        )));
    }

    let mut cleaned = fields.clone();
    cleaned.first_name = first_name.to_string();
    cleaned.last_name = last_name.to_string();
    cleaned.email = email.to_string();
    cleaned.phone = fields
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|phone| !phone.is_empty())
        .map(str::to_string);
    Ok(cleaned)
}

fn compare_ranked(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.applied_at.cmp(&b.applied_at))
        .then_with(|| a.applicant_id.cmp(&b.applicant_id))
}

/// Owns applicant status within a posting and the scoring of its candidates.
pub struct ApplicantPipeline<R> {
    repository: Arc<R>,
    scorer: Arc<dyn ScoringProvider>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl<R> ApplicantPipeline<R>
where
    R: HiringRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        scorer: Arc<dyn ScoringProvider>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            repository,
            scorer,
            clock,
            retry,
        }
    }

    /// Record an application against a published posting.
    pub fn apply(
        &self,
        job_id: &JobId,
        fields: CandidateFields,
        source: ApplicantSource,
    ) -> Result<Applicant, HiringError> {
        let fields = validate_candidate(&fields)?;

        let mut claimed: Option<ApplicantId> = None;
        let applicant = self.retry.run("apply", || {
            let job = load_job(self.repository.as_ref(), job_id)?;
            if job.status != JobStatus::Published {
                return Err(HiringError::JobNotAcceptingApplications {
                    job_id: job.id.to_string(),
                    status: job.status.label(),
                });
            }

            if let Some(existing) = self
                .repository
                .applicants_for_job(job_id)?
                .into_iter()
                .find(|existing| existing.email.eq_ignore_ascii_case(&fields.email))
            {
                // An attempt reported as failed may still have landed.
                if claimed.as_ref() == Some(&existing.id) {
                    return Ok(existing);
                }
                return Err(HiringError::DuplicateApplication {
                    job_id: job_id.to_string(),
                    email: fields.email.clone(),
                    applicant_id: existing.id.to_string(),
                });
            }

            let id = match &claimed {
                Some(id) => id.clone(),
                None => {
                    let sequence = self.repository.next_sequence(EntityKind::Applicant)?;
                    ApplicantId(EntityKind::Applicant.format_id(sequence))
                }
            };
            claimed = Some(id.clone());
            let now = self.clock.now();
            let mut applicant = Applicant {
                id,
                job_posting_id: job.id.clone(),
                first_name: fields.first_name.clone(),
                last_name: fields.last_name.clone(),
                email: fields.email.clone(),
                phone: fields.phone.clone(),
                status: ApplicantStatus::Applied,
                stage_id: job.first_stage().map(|stage| stage.id.clone()),
                profile: fields.profile.clone(),
                source,
                resume_ref: fields.resume_ref.clone(),
                cover_letter_ref: fields.cover_letter_ref.clone(),
                ai_score: None,
                scored_at: None,
                hired_employee_id: None,
                applied_at: now,
                updated_at: now,
                rejected_at: None,
                version: 0,
            };

            self.repository.commit(
                WriteBatch::new()
                    .put_applicant(&applicant)
                    .require(Precondition::UniqueApplication {
                        job_id: job.id.clone(),
                        email: applicant.email.clone(),
                    })
                    .require_open(&job),
            )?;
            applicant.mark_committed();
            Ok(applicant)
        })?;

        info!(
            applicant_id = %applicant.id,
            job_id = %applicant.job_posting_id,
            source = ?applicant.source,
            "application received"
        );
        Ok(applicant)
    }

    /// Move an applicant forward, reject them, or move them between stages.
    ///
    /// Rejecting an applicant withdraws their unanswered offer in the same commit.
    pub fn update_status(
        &self,
        id: &ApplicantId,
        change: &StatusChange,
    ) -> Result<Applicant, HiringError> {
        self.retry.run("update_applicant_status", || {
            let mut applicant = load_applicant(self.repository.as_ref(), id)?;

            if let Some(stage_id) = &change.stage_id {
                let job = load_job(self.repository.as_ref(), &applicant.job_posting_id)?;
                if job.stage(stage_id).is_none() {
                    return Err(HiringError::Validation(format!(
                        "stage {stage_id} is not defined for job {}",
                        job.id
                    )));
                }
            }

            let stage_moved = change
                .stage_id
                .as_ref()
                .is_some_and(|stage| applicant.stage_id.as_ref() != Some(stage));

            if change.status == applicant.status {
                if !stage_moved {
                    return Ok(applicant);
                }
                if applicant.status.is_terminal() {
                    return Err(HiringError::InvalidStateTransition {
                        entity: EntityKind::Applicant,
                        id: applicant.id.to_string(),
                        from: applicant.status.label(),
                        to: "stage move",
                    });
                }
            } else {
                transitions::applicant_transition(
                    &applicant,
                    change.status,
                    ApplicantTrigger::Recruiter,
                )?;
            }

            let from = applicant.status;
            let now = self.clock.now();
            applicant.status = change.status;
            if let Some(stage_id) = &change.stage_id {
                applicant.stage_id = Some(stage_id.clone());
            }
            let withdrawn = if change.status == ApplicantStatus::Rejected {
                applicant.rejected_at = Some(now);
                self.withdraw_active_offers(&applicant.id, now)?
            } else {
                Vec::new()
            };
            applicant.updated_at = now;

            let batch = withdrawn
                .iter()
                .fold(WriteBatch::new().put_applicant(&applicant), WriteBatch::put_offer);
            self.repository.commit(batch)?;
            applicant.mark_committed();
            info!(
                applicant_id = %applicant.id,
                from = from.label(),
                to = applicant.status.label(),
                stage = ?applicant.stage_id,
                offers_withdrawn = withdrawn.len(),
                "applicant status updated"
            );
            Ok(applicant)
        })
    }

    /// Score every non-rejected applicant of a posting and return them best first.
    ///
    /// Scoring runs on a snapshot; each score is then written back on its own, so one failed
    /// applicant never discards the others and re-running overwrites the previous scores.
    pub fn rank_candidates(&self, job_id: &JobId) -> Result<RankingReport, HiringError> {
        let (job, applicants) = self.retry.run("load_candidates", || {
            let job = load_job(self.repository.as_ref(), job_id)?;
            let applicants = self.repository.applicants_for_job(job_id)?;
            Ok((job, applicants))
        })?;

        let mut ranked = Vec::new();
        let mut failures = Vec::new();
        for applicant in applicants
            .iter()
            .filter(|applicant| applicant.status != ApplicantStatus::Rejected)
        {
            let score = match self
                .scorer
                .score(applicant, &job)
                .and_then(validate_score)
            {
                Ok(score) => score,
                Err(err) => {
                    warn!(applicant_id = %applicant.id, error = %err, "scoring failed");
                    failures.push(RankingFailure {
                        applicant_id: applicant.id.clone(),
                        code: SCORING_FAILED.to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            match self.record_score(&applicant.id, score) {
                Ok(stored) => ranked.push(RankedCandidate {
                    rank: 0,
                    applicant_id: stored.id.clone(),
                    name: stored.full_name(),
                    status: stored.status,
                    score,
                    applied_at: stored.applied_at,
                }),
                Err(err) => {
                    warn!(applicant_id = %applicant.id, error = %err, "score write failed");
                    failures.push(RankingFailure {
                        applicant_id: applicant.id.clone(),
                        code: err.code().to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        ranked.sort_by(compare_ranked);
        for (index, candidate) in ranked.iter_mut().enumerate() {
            candidate.rank = index + 1;
        }

        info!(
            job_id = %job.id,
            ranked = ranked.len(),
            failed = failures.len(),
            "candidates ranked"
        );
        Ok(RankingReport {
            job_id: job.id,
            ranked,
            failures,
        })
    }

    fn record_score(&self, id: &ApplicantId, score: f64) -> Result<Applicant, HiringError> {
        self.retry.run("record_score", || {
            let mut applicant = load_applicant(self.repository.as_ref(), id)?;
            applicant.ai_score = Some(score);
            applicant.scored_at = Some(self.clock.now());
            self.repository
                .commit(WriteBatch::new().put_applicant(&applicant))?;
            applicant.mark_committed();
            Ok(applicant)
        })
    }

    /// Bulk intake from a job-board export. Every row goes through [`Self::apply`].
    pub fn import_csv<T: Read>(
        &self,
        job_id: &JobId,
        reader: T,
    ) -> Result<ImportReport, HiringError> {
        let job = self.retry.run("import_applicants", || {
            load_job(self.repository.as_ref(), job_id)
        })?;
        if job.status != JobStatus::Published {
            return Err(HiringError::JobNotAcceptingApplications {
                job_id: job.id.to_string(),
                status: job.status.label(),
            });
        }

        let mut imported = Vec::new();
        let mut rejected = Vec::new();
        for row in parse_candidates(reader) {
            let candidate = match row {
                Ok(candidate) => candidate,
                Err(err) => {
                    rejected.push(ImportRowError {
                        line: err.line(),
                        code: "VALIDATION_ERROR".to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            match self.apply(job_id, candidate.fields, ApplicantSource::Import) {
                Ok(applicant) => imported.push(applicant.id),
                Err(err) => rejected.push(ImportRowError {
                    line: candidate.line,
                    code: err.code().to_string(),
                    reason: err.to_string(),
                }),
            }
        }

        info!(
            job_id = %job_id,
            imported = imported.len(),
            rejected = rejected.len(),
            "applicant import finished"
        );
        Ok(ImportReport {
            job_id: job_id.clone(),
            imported,
            rejected,
        })
    }

    pub fn get(&self, id: &ApplicantId) -> Result<Applicant, HiringError> {
        self.retry
            .run("get_applicant", || load_applicant(self.repository.as_ref(), id))
    }

    /// Applicants of one posting in application order.
    pub fn list(
        &self,
        job_id: &JobId,
        status: Option<ApplicantStatus>,
    ) -> Result<Vec<Applicant>, HiringError> {
        let mut applicants = self.retry.run("list_applicants", || {
            load_job(self.repository.as_ref(), job_id)?;
            Ok(self.repository.applicants_for_job(job_id)?)
        })?;
        if let Some(status) = status {
            applicants.retain(|applicant| applicant.status == status);
        }
        applicants.sort_by(|a, b| a.applied_at.cmp(&b.applied_at).then_with(|| a.id.cmp(&b.id)));
        Ok(applicants)
    }

    /// Unanswered offers of `applicant_id`, staged as WITHDRAWN at `now`.
    fn withdraw_active_offers(
        &self,
        applicant_id: &ApplicantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Offer>, HiringError> {
        Ok(self
            .repository
            .offers_for_applicant(applicant_id)?
            .into_iter()
            .filter(Offer::is_active)
            .map(|mut offer| {
                offer.status = OfferStatus::Withdrawn;
                offer.withdrawn_at = Some(now);
                offer.updated_at = now;
                offer
            })
            .collect())
    }

    pub(crate) fn stage_offered(&self, applicant: &Applicant) -> Result<Applicant, HiringError> {
        self.staged(applicant, ApplicantStatus::Offered, ApplicantTrigger::OfferGenerated)
    }

    pub(crate) fn stage_hired(
        &self,
        applicant: &Applicant,
        employee_id: &EmployeeId,
    ) -> Result<Applicant, HiringError> {
        let mut hired =
            self.staged(applicant, ApplicantStatus::Hired, ApplicantTrigger::OfferAccepted)?;
        hired.hired_employee_id = Some(employee_id.clone());
        Ok(hired)
    }

    pub(crate) fn stage_rejected(&self, applicant: &Applicant) -> Result<Applicant, HiringError> {
        let mut rejected =
            self.staged(applicant, ApplicantStatus::Rejected, ApplicantTrigger::OfferDeclined)?;
        rejected.rejected_at = Some(rejected.updated_at);
        Ok(rejected)
    }

    /// Guarded copy of `applicant` in `to`, for the caller to commit with its own writes.
    fn staged(
        &self,
        applicant: &Applicant,
        to: ApplicantStatus,
        trigger: ApplicantTrigger,
    ) -> Result<Applicant, HiringError> {
        transitions::applicant_transition(applicant, to, trigger)?;
        let mut staged = applicant.clone();
        staged.status = to;
        staged.updated_at = self.clock.now();
        Ok(staged)
    }
}

