//! Contracts for the external systems the pipeline consumes but does not own: identity and
//! org directory, document store, notification transport, and wall clock.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicantId, DepartmentId, DocumentRef, JobId, Offer, OfferId, PositionId, TemplateId, UserId,
};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Resolves org-chart and principal ids owned by the HR and identity systems.
pub trait OrganizationDirectory: Send + Sync {
    fn department_exists(&self, id: &DepartmentId) -> bool;
    fn position_exists(&self, id: &PositionId) -> bool;
    fn principal_exists(&self, id: &UserId) -> bool;
}

/// Directory backed by fixed id sets, loaded from a JSON file or built in code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDirectory {
    #[serde(default)]
    pub departments: BTreeSet<DepartmentId>,
    #[serde(default)]
    pub positions: BTreeSet<PositionId>,
    #[serde(default)]
    pub principals: BTreeSet<UserId>,
}

impl StaticDirectory {
    pub fn with_department(mut self, id: &str) -> Self {
        self.departments.insert(DepartmentId::from(id));
        self
    }

    pub fn with_position(mut self, id: &str) -> Self {
        self.positions.insert(PositionId::from(id));
        self
    }

    pub fn with_principal(mut self, id: &str) -> Self {
        self.principals.insert(UserId::from(id));
        self
    }
}

impl OrganizationDirectory for StaticDirectory {
    fn department_exists(&self, id: &DepartmentId) -> bool {
        self.departments.contains(id)
    }

    fn position_exists(&self, id: &PositionId) -> bool {
        self.positions.contains(id)
    }

    fn principal_exists(&self, id: &UserId) -> bool {
        self.principals.contains(id)
    }
}

/// Everything the document store needs to render an offer letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferLetter {
    pub offer_id: OfferId,
    pub template_id: TemplateId,
    pub job_posting_id: JobId,
    pub job_title: String,
    pub candidate_name: String,
    pub offered_salary: u64,
    pub start_date: NaiveDate,
}

impl OfferLetter {
    /// True while `offer` is still unanswered on the terms this letter was rendered for.
    pub fn matches(&self, offer: &Offer) -> bool {
        offer.is_active()
            && offer.template_id == self.template_id
            && offer.offered_salary == self.offered_salary
            && offer.start_date == self.start_date
    }
}

pub trait DocumentStore: Send + Sync {
    fn render_offer_letter(&self, letter: &OfferLetter) -> Result<DocumentRef, DocumentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("unknown offer template {0}")]
    UnknownTemplate(String),
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OfferSent,
    OfferResent,
}

impl NotificationKind {
    pub const fn template(self) -> &'static str {
        match self {
            Self::OfferSent => "offer_sent",
            Self::OfferResent => "offer_resent",
        }
    }
}

/// Fire-and-forget payload handed to the email/SMS transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferNotification {
    pub kind: NotificationKind,
    pub offer_id: OfferId,
    pub applicant_id: ApplicantId,
    pub recipient_email: String,
    pub document_ref: Option<DocumentRef>,
    pub details: BTreeMap<String, String>,
}

/// Outbound notification hook (email, SMS, or a queue in front of them).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: OfferNotification) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
