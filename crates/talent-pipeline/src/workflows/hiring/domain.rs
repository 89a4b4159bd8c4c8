use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

identifier!(
    /// Identifier wrapper for job requisitions.
    JobId
);
identifier!(
    /// Identifier wrapper for applicants. Identity is per posting, not per person.
    ApplicantId
);
identifier!(InterviewId);
identifier!(OfferId);
identifier!(
    /// Stage identifier, unique within one posting.
    StageId
);
identifier!(DepartmentId);
identifier!(PositionId);
identifier!(
    /// Principal supplied by the identity provider (interviewers, approvers).
    UserId
);
identifier!(TemplateId);
identifier!(
    /// Employee identity allocated when an offer is accepted.
    EmployeeId
);
identifier!(
    /// Opaque reference into the document store (resumes, cover letters, offer letters).
    DocumentRef
);

/// Entity families persisted by the pipeline, used for error context and id sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Job,
    Applicant,
    Interview,
    Offer,
    Employee,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Applicant => "applicant",
            Self::Interview => "interview",
            Self::Offer => "offer",
            Self::Employee => "employee",
        }
    }

    pub(crate) const fn id_prefix(self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Applicant => "apl",
            Self::Interview => "int",
            Self::Offer => "ofr",
            Self::Employee => "emp",
        }
    }

    pub(crate) fn format_id(self, sequence: u64) -> String {
        format!("{}-{sequence:06}", self.id_prefix())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmploymentType {
    Permanent,
    Contract,
    Intern,
    Consultant,
}

/// Requisition lifecycle. Forward only; `Closed` is reachable from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Draft,
    PendingApproval,
    Approved,
    Published,
    Closed,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Published => "PUBLISHED",
            Self::Closed => "CLOSED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Salary bounds in whole currency units; either side may be omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    #[serde(default)]
    pub min: Option<u64>,
    #[serde(default)]
    pub max: Option<u64>,
}

impl SalaryRange {
    pub fn is_inverted(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min > max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub id: StageId,
    pub name: String,
    pub order: u16,
}

/// Stage supplied by the requester; ids are assigned by the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDraft {
    pub name: String,
    pub order: u16,
}

impl StageDraft {
    pub fn new(name: &str, order: u16) -> Self {
        Self {
            name: name.to_string(),
            order,
        }
    }
}

/// Stages used when a requisition does not define its own.
pub fn default_stages() -> Vec<StageDraft> {
    vec![
        StageDraft::new("Applied", 1),
        StageDraft::new("Screening", 2),
        StageDraft::new("Shortlisted", 3),
        StageDraft::new("Interview", 4),
        StageDraft::new("Offer", 5),
    ]
}

/// Job requisition owned by the job posting manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobId,
    pub title: String,
    pub description: String,
    pub employment_type: EmploymentType,
    pub location: String,
    pub salary_range: SalaryRange,
    pub department_id: DepartmentId,
    pub position_id: PositionId,
    pub requirements: Vec<String>,
    pub status: JobStatus,
    pub stages: Vec<StageDefinition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl JobPosting {
    pub fn stage(&self, id: &StageId) -> Option<&StageDefinition> {
        self.stages.iter().find(|stage| &stage.id == id)
    }

    pub fn first_stage(&self) -> Option<&StageDefinition> {
        self.stages.iter().min_by_key(|stage| stage.order)
    }
}

fn default_initial_status() -> JobStatus {
    JobStatus::Draft
}

/// Fields supplied when an HR user opens a requisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJobPosting {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub employment_type: EmploymentType,
    pub location: String,
    #[serde(default)]
    pub salary_range: SalaryRange,
    pub department_id: DepartmentId,
    pub position_id: PositionId,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub stages: Vec<StageDraft>,
    #[serde(default = "default_initial_status")]
    pub initial_status: JobStatus,
}

/// Per-posting candidate lifecycle. `Hired` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicantStatus {
    Applied,
    Screening,
    Shortlisted,
    Interview,
    Offered,
    Hired,
    Rejected,
}

impl ApplicantStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Applied => "APPLIED",
            Self::Screening => "SCREENING",
            Self::Shortlisted => "SHORTLISTED",
            Self::Interview => "INTERVIEW",
            Self::Offered => "OFFERED",
            Self::Hired => "HIRED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Position along the forward path; `Rejected` sits outside it.
    pub const fn progression(self) -> Option<u8> {
        match self {
            Self::Applied => Some(0),
            Self::Screening => Some(1),
            Self::Shortlisted => Some(2),
            Self::Interview => Some(3),
            Self::Offered => Some(4),
            Self::Hired => Some(5),
            Self::Rejected => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Hired | Self::Rejected)
    }

    /// True for applicants in or beyond screening that are still actionable.
    pub const fn is_screened(self) -> bool {
        matches!(
            self,
            Self::Screening | Self::Shortlisted | Self::Interview | Self::Offered
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicantSource {
    Careers,
    Recruiter,
    Import,
}

/// Features handed to the scoring provider alongside the posting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub years_experience: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: ApplicantId,
    pub job_posting_id: JobId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: ApplicantStatus,
    pub stage_id: Option<StageId>,
    pub profile: CandidateProfile,
    pub source: ApplicantSource,
    pub resume_ref: Option<DocumentRef>,
    pub cover_letter_ref: Option<DocumentRef>,
    pub ai_score: Option<f64>,
    pub scored_at: Option<DateTime<Utc>>,
    pub hired_employee_id: Option<EmployeeId>,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl Applicant {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Candidate-supplied fields for an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFields {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub resume_ref: Option<DocumentRef>,
    #[serde(default)]
    pub cover_letter_ref: Option<DocumentRef>,
    #[serde(default)]
    pub profile: CandidateProfile,
}

/// Recruiter request to move an applicant along the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: ApplicantStatus,
    #[serde(default)]
    pub stage_id: Option<StageId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterviewStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl InterviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interview {
    pub id: InterviewId,
    pub applicant_id: ApplicantId,
    pub job_posting_id: JobId,
    pub interviewer_user_id: UserId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub location_or_meeting_link: String,
    pub status: InterviewStatus,
    pub outcome_notes: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Interview {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Half-open window overlap: `[start, end)` against this interview's slot.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.scheduled_at < end && start < self.ends_at()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInterview {
    pub applicant_id: ApplicantId,
    pub interviewer_id: UserId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub location: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewFilter {
    #[serde(default)]
    pub applicant_id: Option<ApplicantId>,
    #[serde(default)]
    pub interviewer_id: Option<UserId>,
    #[serde(default)]
    pub status: Option<InterviewStatus>,
}

impl InterviewFilter {
    pub fn matches(&self, interview: &Interview) -> bool {
        self.applicant_id
            .as_ref()
            .map_or(true, |id| &interview.applicant_id == id)
            && self
                .interviewer_id
                .as_ref()
                .map_or(true, |id| &interview.interviewer_user_id == id)
            && self.status.map_or(true, |status| interview.status == status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Sent,
    Accepted,
    Declined,
    Withdrawn,
}

impl OfferStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sent => "SENT",
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
            Self::Withdrawn => "WITHDRAWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub applicant_id: ApplicantId,
    pub job_posting_id: JobId,
    pub template_id: TemplateId,
    pub offered_salary: u64,
    pub start_date: NaiveDate,
    pub status: OfferStatus,
    pub sent_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub document_ref: Option<DocumentRef>,
    pub employee_id: Option<EmployeeId>,
    pub resend_count: u32,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Offer {
    pub fn is_active(&self) -> bool {
        self.status == OfferStatus::Sent
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOffer {
    pub applicant_id: ApplicantId,
    pub template_id: TemplateId,
    pub salary: u64,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferUpdate {
    #[serde(default)]
    pub salary: Option<u64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

impl OfferUpdate {
    pub fn is_empty(&self) -> bool {
        self.salary.is_none() && self.start_date.is_none()
    }
}

/// Optimistic-concurrency counter carried by every persisted entity.
pub trait Versioned {
    fn version(&self) -> u64;
    fn version_mut(&mut self) -> &mut u64;

    /// Mirror the store's post-commit increment on the caller's copy.
    fn mark_committed(&mut self) {
        *self.version_mut() += 1;
    }
}

macro_rules! versioned {
    ($($entity:ty),+) => {
        $(
            impl Versioned for $entity {
                fn version(&self) -> u64 {
                    self.version
                }

                fn version_mut(&mut self) -> &mut u64 {
                    &mut self.version
                }
            }
        )+
    };
}

versioned!(JobPosting, Applicant, Interview, Offer);
