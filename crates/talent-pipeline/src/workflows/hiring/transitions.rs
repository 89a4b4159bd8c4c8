//! Transition graphs for every stateful entity. Components never compare statuses ad hoc; they
//! ask the guard for their entity and act on the returned [`Step`].

use super::domain::{
    Applicant, ApplicantStatus, EntityKind, Interview, InterviewStatus, JobPosting, JobStatus,
    Offer, OfferStatus,
};
use super::errors::HiringError;

/// Outcome of a guard check that passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Advance,
    /// The entity already sits in the requested terminal state; retried calls return it as is.
    Unchanged,
}

/// Who is asking an applicant to move. `Offered` and `Hired` belong to the offer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplicantTrigger {
    Recruiter,
    OfferGenerated,
    OfferAccepted,
    OfferDeclined,
}

pub(crate) fn job_transition(job: &JobPosting, to: JobStatus) -> Result<Step, HiringError> {
    let step = match (job.status, to) {
        (JobStatus::Closed, JobStatus::Closed) => Some(Step::Unchanged),
        (JobStatus::Draft, JobStatus::PendingApproval)
        | (JobStatus::PendingApproval, JobStatus::Approved)
        | (JobStatus::Approved, JobStatus::Published) => Some(Step::Advance),
        (from, JobStatus::Closed) if !from.is_terminal() => Some(Step::Advance),
        _ => None,
    };

    step.ok_or_else(|| HiringError::InvalidStateTransition {
        entity: EntityKind::Job,
        id: job.id.to_string(),
        from: job.status.label(),
        to: to.label(),
    })
}

/// Stage definitions may change until the posting goes live.
pub(crate) fn job_stages_editable(job: &JobPosting) -> Result<(), HiringError> {
    match job.status {
        JobStatus::Draft | JobStatus::PendingApproval | JobStatus::Approved => Ok(()),
        JobStatus::Published | JobStatus::Closed => Err(HiringError::InvalidStateTransition {
            entity: EntityKind::Job,
            id: job.id.to_string(),
            from: job.status.label(),
            to: "stage edit",
        }),
    }
}

pub(crate) fn applicant_transition(
    applicant: &Applicant,
    to: ApplicantStatus,
    trigger: ApplicantTrigger,
) -> Result<Step, HiringError> {
    let from = applicant.status;
    let allowed = match (to, trigger) {
        _ if from.is_terminal() => false,
        (ApplicantStatus::Rejected, ApplicantTrigger::Recruiter)
        | (ApplicantStatus::Rejected, ApplicantTrigger::OfferDeclined) => true,
        (ApplicantStatus::Offered, ApplicantTrigger::OfferGenerated) => {
            from == ApplicantStatus::Interview
        }
        (ApplicantStatus::Hired, ApplicantTrigger::OfferAccepted) => {
            from == ApplicantStatus::Offered
        }
        (
            ApplicantStatus::Screening | ApplicantStatus::Shortlisted | ApplicantStatus::Interview,
            ApplicantTrigger::Recruiter,
        ) => matches!(
            (from.progression(), to.progression()),
            (Some(current), Some(next)) if next > current
        ),
        _ => false,
    };

    if allowed {
        Ok(Step::Advance)
    } else {
        Err(HiringError::InvalidStateTransition {
            entity: EntityKind::Applicant,
            id: applicant.id.to_string(),
            from: from.label(),
            to: to.label(),
        })
    }
}

pub(crate) fn interview_transition(
    interview: &Interview,
    to: InterviewStatus,
) -> Result<Step, HiringError> {
    match (interview.status, to) {
        (from, to) if from == to && from != InterviewStatus::Scheduled => Ok(Step::Unchanged),
        (InterviewStatus::Scheduled, InterviewStatus::Completed | InterviewStatus::Cancelled) => {
            Ok(Step::Advance)
        }
        (from, to) => Err(HiringError::InvalidStateTransition {
            entity: EntityKind::Interview,
            id: interview.id.to_string(),
            from: from.label(),
            to: to.label(),
        }),
    }
}

pub(crate) fn offer_transition(offer: &Offer, to: OfferStatus) -> Result<Step, HiringError> {
    match (offer.status, to) {
        (from, to) if from == to && from != OfferStatus::Sent => Ok(Step::Unchanged),
        (OfferStatus::Sent, OfferStatus::Accepted | OfferStatus::Declined) => Ok(Step::Advance),
        (from, to) => Err(HiringError::InvalidStateTransition {
            entity: EntityKind::Offer,
            id: offer.id.to_string(),
            from: from.label(),
            to: to.label(),
        }),
    }
}

pub(crate) fn offer_editable(offer: &Offer) -> Result<(), HiringError> {
    if offer.is_active() {
        Ok(())
    } else {
        Err(HiringError::OfferNotEditable {
            offer_id: offer.id.to_string(),
            status: offer.status.label(),
        })
    }
}

/// Withdrawing twice is a no-op; answered offers stay as they are.
pub(crate) fn offer_deletable(offer: &Offer) -> Result<Step, HiringError> {
    match offer.status {
        OfferStatus::Sent => Ok(Step::Advance),
        OfferStatus::Withdrawn => Ok(Step::Unchanged),
        status => Err(HiringError::OfferNotDeletable {
            offer_id: offer.id.to_string(),
            status: status.label(),
        }),
    }
}
