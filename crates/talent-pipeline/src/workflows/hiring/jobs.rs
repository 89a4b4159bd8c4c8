use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::collaborators::{Clock, OrganizationDirectory};
use super::domain::{
    default_stages, DepartmentId, EntityKind, JobId, JobPosting, JobStatus, NewJobPosting,
    StageDefinition, StageDraft, StageId, Versioned,
};
use super::errors::HiringError;
use super::repository::{HiringRepository, WriteBatch};
use super::retry::RetryPolicy;
use super::transitions::{self, Step};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

/// Owns job requisitions from draft through close.
pub struct JobPostingManager<R> {
    repository: Arc<R>,
    directory: Arc<dyn OrganizationDirectory>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

pub(crate) fn load_job<R>(repository: &R, id: &JobId) -> Result<JobPosting, HiringError>
where
    R: HiringRepository + ?Sized,
{
    repository
        .job(id)?
        .ok_or_else(|| HiringError::not_found(EntityKind::Job, id))
}

/// Interviews and offers may not be started against a closed requisition.
pub(crate) fn ensure_job_open(job: &JobPosting) -> Result<(), HiringError> {
    if job.status == JobStatus::Closed {
        Err(HiringError::JobClosed {
            job_id: job.id.to_string(),
        })
    } else {
        Ok(())
    }
}

fn build_stages(drafts: &[StageDraft]) -> Result<Vec<StageDefinition>, HiringError> {
    let drafts = if drafts.is_empty() {
        default_stages()
    } else {
        drafts.to_vec()
    };

    let mut names = BTreeSet::new();
    let mut orders = BTreeSet::new();
    let mut stages = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(HiringError::Validation(
                "stage names must not be blank".to_string(),
            ));
        }
        if !names.insert(name.to_ascii_lowercase()) {
            return Err(HiringError::Validation(format!(
                "stage name '{name}' is defined twice"
            )));
        }
        if !orders.insert(draft.order) {
            return Err(HiringError::Validation(format!(
                "stage order {} is defined twice",
                draft.order
            )));
        }
        stages.push(StageDefinition {
            id: StageId(format!("stage-{}", draft.order)),
            name,
            order: draft.order,
        });
    }

    stages.sort_by_key(|stage| stage.order);
    Ok(stages)
}

impl<R> JobPostingManager<R>
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

    fn validate(&self, draft: &NewJobPosting) -> Result<Vec<StageDefinition>, HiringError> {
        if !matches!(
            draft.initial_status,
            JobStatus::Draft | JobStatus::PendingApproval
        ) {
            return Err(HiringError::Validation(format!(
                "jobs start as DRAFT or PENDING_APPROVAL, not {}",
                draft.initial_status.label()
            )));
        }
        if draft.title.trim().is_empty() {
            return Err(HiringError::Validation("title is required".to_string()));
        }
        if draft.location.trim().is_empty() {
            return Err(HiringError::Validation("location is required".to_string()));
        }
        if draft.salary_range.min == Some(0) || draft.salary_range.max == Some(0) {
            return Err(HiringError::Validation(
                "salary bounds must be positive".to_string(),
            ));
        }
        if draft.salary_range.is_inverted() {
            return Err(HiringError::Validation(
                "salary minimum exceeds maximum".to_string(),
            ));
        }
        if !self.directory.department_exists(&draft.department_id) {
            return Err(HiringError::Validation(format!(
                "department {} does not exist",
                draft.department_id
            )));
        }
        if !self.directory.position_exists(&draft.position_id) {
            return Err(HiringError::Validation(format!(
                "position {} does not exist",
                draft.position_id
            )));
        }

        build_stages(&draft.stages)
    }

    /// Open a requisition in DRAFT or PENDING_APPROVAL.
    pub fn create(&self, draft: NewJobPosting) -> Result<JobPosting, HiringError> {
        let stages = self.validate(&draft)?;

        let job = self.retry.run("create_job", || {
            let sequence = self.repository.next_sequence(EntityKind::Job)?;
            let now = self.clock.now();
            let mut job = JobPosting {
                id: JobId(EntityKind::Job.format_id(sequence)),
                title: draft.title.trim().to_string(),
                description: draft.description.clone(),
                employment_type: draft.employment_type,
                location: draft.location.trim().to_string(),
                salary_range: draft.salary_range,
                department_id: draft.department_id.clone(),
                position_id: draft.position_id.clone(),
                requirements: draft.requirements.clone(),
                status: draft.initial_status,
                stages: stages.clone(),
                created_at: now,
                updated_at: now,
                approved_at: None,
                published_at: None,
                closed_at: None,
                version: 0,
            };
            self.repository.commit(WriteBatch::new().put_job(&job))?;
            job.mark_committed();
            Ok(job)
        })?;

        info!(job_id = %job.id, status = job.status.label(), "job posting created");
        Ok(job)
    }

    pub fn submit_for_approval(&self, id: &JobId) -> Result<JobPosting, HiringError> {
        self.transition(id, JobStatus::PendingApproval)
    }

    pub fn approve(&self, id: &JobId) -> Result<JobPosting, HiringError> {
        self.transition(id, JobStatus::Approved)
    }

    pub fn publish(&self, id: &JobId) -> Result<JobPosting, HiringError> {
        self.transition(id, JobStatus::Published)
    }

    /// Close from any open state. Applicants stay where they are; new interviews and offers for
    /// them are refused with `JobClosed`.
    pub fn close(&self, id: &JobId) -> Result<JobPosting, HiringError> {
        self.transition(id, JobStatus::Closed)
    }

    fn transition(&self, id: &JobId, to: JobStatus) -> Result<JobPosting, HiringError> {
        self.retry.run("job_transition", || {
            let mut job = load_job(self.repository.as_ref(), id)?;
            if transitions::job_transition(&job, to)? == Step::Unchanged {
                return Ok(job);
            }

            let from = job.status;
            let now = self.clock.now();
            job.status = to;
            job.updated_at = now;
            match to {
                JobStatus::Approved => job.approved_at = Some(now),
                JobStatus::Published => job.published_at = Some(now),
                JobStatus::Closed => job.closed_at = Some(now),
                JobStatus::Draft | JobStatus::PendingApproval => {}
            }

            self.repository.commit(WriteBatch::new().put_job(&job))?;
            job.mark_committed();
            info!(
                job_id = %job.id,
                from = from.label(),
                to = to.label(),
                "job posting transitioned"
            );
            Ok(job)
        })
    }

    /// Replace the stage definitions. Stages are frozen once the posting is published.
    pub fn update_stages(
        &self,
        id: &JobId,
        drafts: &[StageDraft],
    ) -> Result<JobPosting, HiringError> {
        if drafts.is_empty() {
            return Err(HiringError::Validation(
                "at least one stage is required".to_string(),
            ));
        }
        let stages = build_stages(drafts)?;

        self.retry.run("update_job_stages", || {
            let mut job = load_job(self.repository.as_ref(), id)?;
            transitions::job_stages_editable(&job)?;

            job.stages = stages.clone();
            job.updated_at = self.clock.now();
            self.repository.commit(WriteBatch::new().put_job(&job))?;
            job.mark_committed();
            info!(job_id = %job.id, stages = job.stages.len(), "job stages replaced");
            Ok(job)
        })
    }

    pub fn get(&self, id: &JobId) -> Result<JobPosting, HiringError> {
        self.retry
            .run("get_job", || load_job(self.repository.as_ref(), id))
    }

    pub fn list(&self, filter: &JobFilter) -> Result<Vec<JobPosting>, HiringError> {
        let mut jobs = self.retry.run("list_jobs", || Ok(self.repository.jobs()?))?;
        jobs.retain(|job| {
            filter.status.map_or(true, |status| job.status == status)
                && filter
                    .department_id
                    .as_ref()
                    .map_or(true, |department| &job.department_id == department)
        });
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    /// Postings visible on the public careers page.
    pub fn list_public(&self) -> Result<Vec<JobPosting>, HiringError> {
        let mut jobs = self.list(&JobFilter {
            status: Some(JobStatus::Published),
            department_id: None,
        })?;
        jobs.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(jobs)
    }

    pub fn get_public(&self, id: &JobId) -> Result<JobPosting, HiringError> {
        let job = self.get(id)?;
        if job.status == JobStatus::Published {
            Ok(job)
        } else {
            Err(HiringError::not_found(EntityKind::Job, id))
        }
    }
}
