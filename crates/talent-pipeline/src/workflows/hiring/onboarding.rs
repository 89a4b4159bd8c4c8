use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicantId, ApplicantStatus, DepartmentId, EmployeeId, JobId, Offer, OfferId, OfferStatus,
};
use super::errors::HiringError;
use super::repository::HiringRepository;
use super::retry::RetryPolicy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingFilter {
    #[serde(default)]
    pub status: Option<ApplicantStatus>,
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

/// What HR needs to do next for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUp {
    AwaitingResponse,
    Declined,
    Withdrawn,
    ReadyToStart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSummary {
    pub offer_id: OfferId,
    pub status: OfferStatus,
    pub offered_salary: u64,
    pub start_date: NaiveDate,
    pub sent_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub resend_count: u32,
}

impl From<&Offer> for OfferSummary {
    fn from(offer: &Offer) -> Self {
        Self {
            offer_id: offer.id.clone(),
            status: offer.status,
            offered_salary: offer.offered_salary,
            start_date: offer.start_date,
            sent_at: offer.sent_at,
            accepted_at: offer.accepted_at,
            declined_at: offer.declined_at,
            withdrawn_at: offer.withdrawn_at,
            resend_count: offer.resend_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingRecord {
    pub applicant_id: ApplicantId,
    pub candidate_name: String,
    pub email: String,
    pub status: ApplicantStatus,
    pub job_posting_id: JobId,
    pub job_title: Option<String>,
    pub department_id: Option<DepartmentId>,
    pub employee_id: Option<EmployeeId>,
    pub latest_offer: Option<OfferSummary>,
    pub follow_up: FollowUp,
    pub updated_at: DateTime<Utc>,
}

fn follow_up(status: ApplicantStatus, latest: Option<&Offer>) -> FollowUp {
    match (status, latest.map(|offer| offer.status)) {
        (ApplicantStatus::Hired, _) | (_, Some(OfferStatus::Accepted)) => FollowUp::ReadyToStart,
        (_, Some(OfferStatus::Sent)) => FollowUp::AwaitingResponse,
        (_, Some(OfferStatus::Declined)) => FollowUp::Declined,
        (_, Some(OfferStatus::Withdrawn) | None) => FollowUp::Withdrawn,
    }
}

/// Read model over applicants who reached OFFERED or HIRED, rebuilt on every call.
pub struct OnboardingTracker<R> {
    repository: Arc<R>,
    retry: RetryPolicy,
}

impl<R> OnboardingTracker<R>
where
    R: HiringRepository + 'static,
{
    pub fn new(repository: Arc<R>, retry: RetryPolicy) -> Self {
        Self { repository, retry }
    }

    /// Candidates with their most recent offer, most recently touched first.
    pub fn list(&self, filter: &OnboardingFilter) -> Result<Vec<OnboardingRecord>, HiringError> {
        let statuses = match filter.status {
            None => vec![ApplicantStatus::Offered, ApplicantStatus::Hired],
            Some(status @ (ApplicantStatus::Offered | ApplicantStatus::Hired)) => vec![status],
            Some(other) => {
                return Err(HiringError::Validation(format!(
                    "onboarding lists OFFERED or HIRED applicants, not {}",
                    other.label()
                )))
            }
        };

        let (applicants, jobs) = self.retry.run("list_onboarding", || {
            let applicants = self.repository.applicants_with_status(&statuses)?;
            let jobs: BTreeMap<_, _> = self
                .repository
                .jobs()?
                .into_iter()
                .map(|job| (job.id.clone(), job))
                .collect();
            Ok((applicants, jobs))
        })?;

        let mut records = Vec::new();
        for applicant in applicants {
            if filter
                .job_id
                .as_ref()
                .is_some_and(|job_id| &applicant.job_posting_id != job_id)
            {
                continue;
            }
            let job = jobs.get(&applicant.job_posting_id);
            if let Some(department) = &filter.department_id {
                if job.map(|job| &job.department_id) != Some(department) {
                    continue;
                }
            }

            let offers = self.retry.run("list_onboarding_offers", || {
                Ok(self.repository.offers_for_applicant(&applicant.id)?)
            })?;
            let latest = offers
                .iter()
                .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            let updated_at = latest
                .map_or(applicant.updated_at, |offer| offer.updated_at.max(applicant.updated_at));

            records.push(OnboardingRecord {
                candidate_name: applicant.full_name(),
                email: applicant.email.clone(),
                status: applicant.status,
                job_title: job.map(|job| job.title.clone()),
                department_id: job.map(|job| job.department_id.clone()),
                employee_id: applicant.hired_employee_id.clone(),
                latest_offer: latest.map(OfferSummary::from),
                follow_up: follow_up(applicant.status, latest),
                updated_at,
                applicant_id: applicant.id,
                job_posting_id: applicant.job_posting_id,
            });
        }

        records.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.applicant_id.cmp(&b.applicant_id))
        });
        Ok(records)
    }
}
