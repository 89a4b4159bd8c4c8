use super::domain::EntityKind;
use super::repository::RepositoryError;

/// Error raised by every hiring pipeline operation.
///
/// Each variant maps to a stable [`HiringError::code`] that callers branch on; the message text
/// is for humans only.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HiringError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} {id} cannot move from {from} to {to}")]
    InvalidStateTransition {
        entity: EntityKind,
        id: String,
        from: &'static str,
        to: &'static str,
    },
    #[error("applicant {applicant_id} is {status}; {requirement}")]
    InvalidApplicantState {
        applicant_id: String,
        status: &'static str,
        requirement: &'static str,
    },
    #[error("interviewer {interviewer_id} is already booked by interview {conflicting_interview_id}")]
    SchedulingConflict {
        interviewer_id: String,
        conflicting_interview_id: String,
    },
    #[error("applicant {applicant_id} already has active offer {offer_id}")]
    DuplicateActiveOffer {
        applicant_id: String,
        offer_id: String,
    },
    #[error("{email} already applied to job {job_id} as applicant {applicant_id}")]
    DuplicateApplication {
        job_id: String,
        email: String,
        applicant_id: String,
    },
    #[error("offer {offer_id} is {status} and can no longer be edited")]
    OfferNotEditable {
        offer_id: String,
        status: &'static str,
    },
    #[error("offer {offer_id} is {status} and can no longer be withdrawn")]
    OfferNotDeletable {
        offer_id: String,
        status: &'static str,
    },
    #[error("job {job_id} is closed")]
    JobClosed { job_id: String },
    #[error("job {job_id} is {status} and not accepting applications")]
    JobNotAcceptingApplications {
        job_id: String,
        status: &'static str,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },
    /// Optimistic concurrency check lost; the whole operation is re-run by the retry policy.
    #[error("{entity} was modified concurrently")]
    Contention { entity: String },
    #[error("storage unavailable: {0}")]
    TransientStorage(String),
}

impl HiringError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::InvalidApplicantState { .. } => "INVALID_APPLICANT_STATE",
            Self::SchedulingConflict { .. } => "SCHEDULING_CONFLICT",
            Self::DuplicateActiveOffer { .. } => "DUPLICATE_ACTIVE_OFFER",
            Self::DuplicateApplication { .. } => "DUPLICATE_APPLICATION",
            Self::OfferNotEditable { .. } => "OFFER_NOT_EDITABLE",
            Self::OfferNotDeletable { .. } => "OFFER_NOT_DELETABLE",
            Self::JobClosed { .. } => "JOB_CLOSED",
            Self::JobNotAcceptingApplications { .. } => "JOB_NOT_ACCEPTING_APPLICATIONS",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Contention { .. } | Self::TransientStorage(_) => "TRANSIENT_STORAGE_ERROR",
        }
    }

    /// Only infrastructure failures are eligible for automatic retry.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention { .. } | Self::TransientStorage(_))
    }

    /// Entity the caller needs to resolve the failure (the conflicting record where there is one).
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Self::InvalidStateTransition { id, .. } | Self::NotFound { id, .. } => Some(id),
            Self::InvalidApplicantState { applicant_id, .. } => Some(applicant_id),
            Self::SchedulingConflict {
                conflicting_interview_id,
                ..
            } => Some(conflicting_interview_id),
            Self::DuplicateActiveOffer { offer_id, .. }
            | Self::OfferNotEditable { offer_id, .. }
            | Self::OfferNotDeletable { offer_id, .. } => Some(offer_id),
            Self::DuplicateApplication { applicant_id, .. } => Some(applicant_id),
            Self::JobClosed { job_id } | Self::JobNotAcceptingApplications { job_id, .. } => {
                Some(job_id)
            }
            Self::Validation(_) | Self::Contention { .. } | Self::TransientStorage(_) => None,
        }
    }

    pub(crate) fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<RepositoryError> for HiringError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict { entity } => Self::Contention { entity },
            RepositoryError::PreconditionFailed(detail) => Self::Contention { entity: detail },
            RepositoryError::Unavailable(reason) => Self::TransientStorage(reason),
        }
    }
}
