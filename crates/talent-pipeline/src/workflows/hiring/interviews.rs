use std::sync::Arc;

use chrono::Duration;
use tracing::info;

use super::applicants::load_applicant;
use super::collaborators::{Clock, OrganizationDirectory};
use super::domain::{
    EntityKind, Interview, InterviewFilter, InterviewId, InterviewStatus, NewInterview, Versioned,
};
use super::errors::HiringError;
use super::jobs::{ensure_job_open, load_job};
use super::repository::{HiringRepository, Precondition, WriteBatch};
use super::retry::RetryPolicy;
use super::transitions::{self, Step};

fn load_interview<R>(repository: &R, id: &InterviewId) -> Result<Interview, HiringError>
where
    R: HiringRepository + ?Sized,
{
    repository
        .interview(id)?
        .ok_or_else(|| HiringError::not_found(EntityKind::Interview, id))
}

/// Books interviewers against screened applicants without double-booking.
pub struct InterviewScheduler<R> {
    repository: Arc<R>,
    directory: Arc<dyn OrganizationDirectory>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl<R> InterviewScheduler<R>
where
    R: HiringRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        directory: Arc<dyn OrganizationDirectory>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            repository,
            directory,
            clock,
            retry,
        }
    }

    fn validate(&self, request: &NewInterview) -> Result<(), HiringError> {
        if request.duration_minutes == 0 {
            return Err(HiringError::Validation(
                "duration must be greater than zero".to_string(),
            ));
        }
        if request.location.trim().is_empty() {
            return Err(HiringError::Validation(
                "location or meeting link is required".to_string(),
            ));
        }
        if request.scheduled_at <= self.clock.now() {
            return Err(HiringError::Validation(
                "interviews must be scheduled in the future".to_string(),
            ));
        }
        if !self.directory.principal_exists(&request.interviewer_id) {
            return Err(HiringError::Validation(format!(
                "interviewer {} is not a known principal",
                request.interviewer_id
            )));
        }
        Ok(())
    }

    /// Book an interview. With an idempotency key, a retried request returns the interview the
    /// first attempt created.
    pub fn schedule(&self, request: NewInterview) -> Result<Interview, HiringError> {
        self.validate(&request)?;
        let ends_at = request.scheduled_at + Duration::minutes(i64::from(request.duration_minutes));

        let mut claimed: Option<InterviewId> = None;
        let (interview, created) = self.retry.run("schedule_interview", || {
            if let Some(key) = &request.idempotency_key {
                let replay = self
                    .repository
                    .interviews(&InterviewFilter {
                        applicant_id: Some(request.applicant_id.clone()),
                        ..InterviewFilter::default()
                    })?
                    .into_iter()
                    .find(|existing| existing.idempotency_key.as_ref() == Some(key));
                if let Some(existing) = replay {
                    return Ok((existing, false));
                }
            }

            let applicant = load_applicant(self.repository.as_ref(), &request.applicant_id)?;
            let job = load_job(self.repository.as_ref(), &applicant.job_posting_id)?;
            if !applicant.status.is_screened() {
                return Err(HiringError::InvalidApplicantState {
                    applicant_id: applicant.id.to_string(),
                    status: applicant.status.label(),
                    requirement: "interviews require an active applicant in SCREENING or later",
                });
            }
            ensure_job_open(&job)?;

            let booked = self.repository.interviews(&InterviewFilter {
                interviewer_id: Some(request.interviewer_id.clone()),
                status: Some(InterviewStatus::Scheduled),
                ..InterviewFilter::default()
            })?;
            if let Some(conflict) = booked
                .iter()
                .find(|existing| existing.overlaps(request.scheduled_at, ends_at))
            {
                // An attempt reported as failed may still have landed.
                if claimed.as_ref() == Some(&conflict.id) {
                    return Ok((conflict.clone(), true));
                }
                return Err(HiringError::SchedulingConflict {
                    interviewer_id: request.interviewer_id.to_string(),
                    conflicting_interview_id: conflict.id.to_string(),
                });
            }

            let id = match &claimed {
                Some(id) => id.clone(),
                None => {
                    let sequence = self.repository.next_sequence(EntityKind::Interview)?;
                    InterviewId(EntityKind::Interview.format_id(sequence))
                }
            };
            claimed = Some(id.clone());
            let now = self.clock.now();
            let mut interview = Interview {
                id,
                applicant_id: applicant.id.clone(),
                job_posting_id: job.id.clone(),
                interviewer_user_id: request.interviewer_id.clone(),
                scheduled_at: request.scheduled_at,
                duration_minutes: request.duration_minutes,
                location_or_meeting_link: request.location.trim().to_string(),
                status: InterviewStatus::Scheduled,
                outcome_notes: None,
                idempotency_key: request.idempotency_key.clone(),
                created_at: now,
                updated_at: now,
                version: 0,
            };

            self.repository.commit(
                WriteBatch::new()
                    .put_interview(&interview)
                    .require(Precondition::InterviewerAvailable {
                        interviewer_id: request.interviewer_id.clone(),
                        starts_at: request.scheduled_at,
                        ends_at,
                    })
                    .require_open(&job)
                    .pin_applicant(&applicant),
            )?;
            interview.mark_committed();
            Ok((interview, true))
        })?;

        if created {
            info!(
                interview_id = %interview.id,
                applicant_id = %interview.applicant_id,
                interviewer_id = %interview.interviewer_user_id,
                scheduled_at = %interview.scheduled_at,
                "interview scheduled"
            );
        }
        Ok(interview)
    }

    pub fn complete(
        &self,
        id: &InterviewId,
        outcome_notes: Option<String>,
    ) -> Result<Interview, HiringError> {
        self.finish(id, InterviewStatus::Completed, outcome_notes)
    }

    pub fn cancel(&self, id: &InterviewId) -> Result<Interview, HiringError> {
        self.finish(id, InterviewStatus::Cancelled, None)
    }

    fn finish(
        &self,
        id: &InterviewId,
        to: InterviewStatus,
        outcome_notes: Option<String>,
    ) -> Result<Interview, HiringError> {
        self.retry.run("finish_interview", || {
            let mut interview = load_interview(self.repository.as_ref(), id)?;
            if transitions::interview_transition(&interview, to)? == Step::Unchanged {
                return Ok(interview);
            }

            interview.status = to;
            if let Some(notes) = outcome_notes.as_deref().map(str::trim) {
                if !notes.is_empty() {
                    interview.outcome_notes = Some(notes.to_string());
                }
            }
            interview.updated_at = self.clock.now();

            self.repository
                .commit(WriteBatch::new().put_interview(&interview))?;
            interview.mark_committed();
            info!(interview_id = %interview.id, status = to.label(), "interview closed out");
            Ok(interview)
        })
    }

    pub fn get(&self, id: &InterviewId) -> Result<Interview, HiringError> {
        self.retry
            .run("get_interview", || load_interview(self.repository.as_ref(), id))
    }

    /// Interviews matching `filter`, earliest slot first.
    pub fn list(&self, filter: &InterviewFilter) -> Result<Vec<Interview>, HiringError> {
        let mut interviews = self
            .retry
            .run("list_interviews", || Ok(self.repository.interviews(filter)?))?;
        interviews.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(interviews)
    }
}
