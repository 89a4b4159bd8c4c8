use chrono::{DateTime, Utc};

use super::domain::{
    Applicant, ApplicantId, ApplicantStatus, EntityKind, Interview, InterviewFilter, InterviewId,
    JobId, JobPosting, Offer, OfferId, UserId,
};

/// Storage abstraction shared by the pipeline components.
///
/// Reads return owned snapshots. Every mutation goes through [`HiringRepository::commit`], which
/// applies a [`WriteBatch`] atomically: each write is a compare-and-set on the entity's
/// `version`, and each [`Precondition`] is re-checked against stored state under the same lock.
///
/// A commit that returns an error has applied nothing, so callers may re-run the operation.
pub trait HiringRepository: Send + Sync {
    fn next_sequence(&self, kind: EntityKind) -> Result<u64, RepositoryError>;

    fn job(&self, id: &JobId) -> Result<Option<JobPosting>, RepositoryError>;
    fn jobs(&self) -> Result<Vec<JobPosting>, RepositoryError>;

    fn applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError>;
    fn applicants_for_job(&self, job_id: &JobId) -> Result<Vec<Applicant>, RepositoryError>;
    fn applicants_with_status(
        &self,
        statuses: &[ApplicantStatus],
    ) -> Result<Vec<Applicant>, RepositoryError>;

    fn interview(&self, id: &InterviewId) -> Result<Option<Interview>, RepositoryError>;
    fn interviews(&self, filter: &InterviewFilter) -> Result<Vec<Interview>, RepositoryError>;

    fn offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError>;
    fn offers_for_applicant(&self, id: &ApplicantId) -> Result<Vec<Offer>, RepositoryError>;

    fn commit(&self, batch: WriteBatch) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("stale or duplicate write for {entity}")]
    Conflict { entity: String },
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// One entity write. Version 0 inserts a new record; any other version updates the record whose
/// stored version matches.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Job(JobPosting),
    Applicant(Applicant),
    Interview(Interview),
    Offer(Offer),
}

/// Cross-entity invariant checked inside the commit.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    InterviewerAvailable {
        interviewer_id: UserId,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    },
    NoActiveOffer {
        applicant_id: ApplicantId,
    },
    UniqueApplication {
        job_id: JobId,
        email: String,
    },
    /// The posting exists and has not been closed.
    JobOpen {
        job_id: JobId,
    },
    /// Pins an applicant the batch read but does not write.
    ApplicantUnchanged {
        applicant_id: ApplicantId,
        version: u64,
    },
}

impl Precondition {
    pub fn describe(&self) -> String {
        match self {
            Self::InterviewerAvailable { interviewer_id, .. } => {
                format!("interviewer {interviewer_id} availability")
            }
            Self::NoActiveOffer { applicant_id } => {
                format!("no active offer for applicant {applicant_id}")
            }
            Self::UniqueApplication { job_id, email } => {
                format!("unique application of {email} to job {job_id}")
            }
            Self::JobOpen { job_id } => format!("job {job_id} still open"),
            Self::ApplicantUnchanged {
                applicant_id,
                version,
            } => format!("applicant {applicant_id} still at version {version}"),
        }
    }
}

/// Unit of work applied by [`HiringRepository::commit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub writes: Vec<Write>,
    pub preconditions: Vec<Precondition>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_job(mut self, job: &JobPosting) -> Self {
        self.writes.push(Write::Job(job.clone()));
        self
    }

    pub fn put_applicant(mut self, applicant: &Applicant) -> Self {
        self.writes.push(Write::Applicant(applicant.clone()));
        self
    }

    pub fn put_interview(mut self, interview: &Interview) -> Self {
        self.writes.push(Write::Interview(interview.clone()));
        self
    }

    pub fn put_offer(mut self, offer: &Offer) -> Self {
        self.writes.push(Write::Offer(offer.clone()));
        self
    }

    pub fn require_open(self, job: &JobPosting) -> Self {
        self.require(Precondition::JobOpen {
            job_id: job.id.clone(),
        })
    }

    pub fn pin_applicant(self, applicant: &Applicant) -> Self {
        self.require(Precondition::ApplicantUnchanged {
            applicant_id: applicant.id.clone(),
            version: applicant.version,
        })
    }

    pub fn require(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }
}
