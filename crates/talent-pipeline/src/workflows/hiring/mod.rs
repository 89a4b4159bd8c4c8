//! Hiring pipeline: job requisitions, applicants, interviews, offers, and the onboarding
//! read model.
//!
//! Components share one [`HiringRepository`] and never hold its lock across a collaborator
//! call. Every mutation is a compare-and-set commit; cross-entity rules (one outstanding offer
//! per applicant, no double-booked interviewer, one application per email and posting) are
//! re-checked inside the commit.

pub mod applicants;
pub mod collaborators;
pub mod domain;
pub mod errors;
pub mod import;
pub mod interviews;
pub mod jobs;
pub mod offers;
pub mod onboarding;
pub mod repository;
pub mod retry;
pub mod router;
pub mod scoring;
pub mod service;
pub mod store;
pub(crate) mod transitions;

#[cfg(test)]
mod tests;

pub use applicants::{ApplicantPipeline, RankedCandidate, RankingFailure, RankingReport};
pub use collaborators::{
    Clock, DocumentError, DocumentStore, NotificationError, NotificationKind,
    NotificationPublisher, OfferLetter, OfferNotification, OrganizationDirectory, StaticDirectory,
    SystemClock,
};
pub use domain::{
    default_stages, Applicant, ApplicantId, ApplicantSource, ApplicantStatus, CandidateFields,
    CandidateProfile, DepartmentId, DocumentRef, EmployeeId, EmploymentType, EntityKind,
    Interview, InterviewFilter, InterviewId, InterviewStatus, JobId, JobPosting, JobStatus,
    NewInterview, NewJobPosting, NewOffer, Offer, OfferId, OfferStatus, OfferUpdate, PositionId,
    SalaryRange, StageDefinition, StageDraft, StageId, StatusChange, TemplateId, UserId,
};
pub use errors::HiringError;
pub use import::{ImportError, ImportReport, ImportRowError};
pub use interviews::InterviewScheduler;
pub use jobs::{JobFilter, JobPostingManager};
pub use offers::{DeclinePolicy, OfferAcceptance, OfferEngine};
pub use onboarding::{
    FollowUp, OfferSummary, OnboardingFilter, OnboardingRecord, OnboardingTracker,
};
pub use repository::{HiringRepository, Precondition, RepositoryError, Write, WriteBatch};
pub use retry::RetryPolicy;
pub use router::hiring_router;
pub use scoring::{
    RubricScorer, ScoreBreakdown, ScoreComponent, ScoreFactor, ScoringConfig, ScoringError,
    ScoringProvider,
};
pub use service::{Collaborators, HiringService, ServiceSettings};
pub use store::InMemoryHiringStore;
