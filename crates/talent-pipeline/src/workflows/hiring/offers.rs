use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::applicants::{load_applicant, ApplicantPipeline};
use super::collaborators::{
    Clock, DocumentStore, NotificationKind, NotificationPublisher, OfferLetter, OfferNotification,
};
use super::domain::{
    Applicant, ApplicantId, ApplicantStatus, EmployeeId, EntityKind, NewOffer, Offer, OfferId,
    OfferStatus, OfferUpdate, Versioned,
};
use super::errors::HiringError;
use super::jobs::{ensure_job_open, load_job};
use super::repository::{HiringRepository, Precondition, WriteBatch};
use super::retry::RetryPolicy;
use super::transitions::{self, Step};

/// What happens to the applicant when a candidate declines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclinePolicy {
    /// Applicant stays OFFERED so the recruiter can re-offer or reject.
    #[default]
    RetainOffered,
    /// Applicant is rejected in the same commit as the decline.
    RejectApplicant,
}

impl DeclinePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "retain" | "retain_offered" => Some(Self::RetainOffered),
            "reject" | "reject_applicant" => Some(Self::RejectApplicant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferAcceptance {
    pub offer: Offer,
    pub applicant: Applicant,
    pub employee_id: EmployeeId,
}

fn load_offer<R>(repository: &R, id: &OfferId) -> Result<Offer, HiringError>
where
    R: HiringRepository + ?Sized,
{
    repository
        .offer(id)?
        .ok_or_else(|| HiringError::not_found(EntityKind::Offer, id))
}

/// Generates, sends, and finalizes offers, moving the applicant in the same commit.
pub struct OfferEngine<R, N> {
    repository: Arc<R>,
    applicants: Arc<ApplicantPipeline<R>>,
    notifications: Arc<N>,
    documents: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    decline_policy: DeclinePolicy,
}

impl<R, N> OfferEngine<R, N>
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        applicants: Arc<ApplicantPipeline<R>>,
        notifications: Arc<N>,
        documents: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        decline_policy: DeclinePolicy,
    ) -> Self {
        Self {
            repository,
            applicants,
            notifications,
            documents,
            clock,
            retry,
            decline_policy,
        }
    }

    pub fn decline_policy(&self) -> DeclinePolicy {
        self.decline_policy
    }

    fn validate_terms(
        &self,
        salary: Option<u64>,
        start_date: Option<NaiveDate>,
    ) -> Result<(), HiringError> {
        if salary == Some(0) {
            return Err(HiringError::Validation(
                "offered salary must be positive".to_string(),
            ));
        }
        let today = self.clock.now().date_naive();
        if let Some(start_date) = start_date {
            if start_date < today {
                return Err(HiringError::Validation(format!(
                    "start date {start_date} is in the past"
                )));
            }
        }
        Ok(())
    }

    /// Create a SENT offer and move the applicant to OFFERED in one commit.
    ///
    /// A re-offer is allowed for an applicant already OFFERED once their previous offer was
    /// declined or withdrawn.
    pub fn generate(&self, request: NewOffer) -> Result<Offer, HiringError> {
        self.validate_terms(Some(request.salary), Some(request.start_date))?;

        let mut claimed: Option<OfferId> = None;
        let (offer, applicant) = self.retry.run("generate_offer", || {
            let existing = self.repository.offers_for_applicant(&request.applicant_id)?;
            if let Some(key) = &request.idempotency_key {
                if let Some(replay) = existing
                    .iter()
                    .find(|offer| offer.idempotency_key.as_ref() == Some(key))
                {
                    return Ok((replay.clone(), None));
                }
            }

            let applicant = load_applicant(self.repository.as_ref(), &request.applicant_id)?;
            let job = load_job(self.repository.as_ref(), &applicant.job_posting_id)?;
            ensure_job_open(&job)?;

            if let Some(active) = existing.iter().find(|offer| offer.is_active()) {
                // An attempt reported as failed may still have landed.
                if claimed.as_ref() == Some(&active.id) {
                    return Ok((active.clone(), Some(applicant)));
                }
                return Err(HiringError::DuplicateActiveOffer {
                    applicant_id: applicant.id.to_string(),
                    offer_id: active.id.to_string(),
                });
            }

            // Re-offers pin the applicant rather than writing it.
            let mut staged = match applicant.status {
                ApplicantStatus::Interview => Some(self.applicants.stage_offered(&applicant)?),
                ApplicantStatus::Offered => None,
                status => {
                    return Err(HiringError::InvalidApplicantState {
                        applicant_id: applicant.id.to_string(),
                        status: status.label(),
                        requirement: "offers require INTERVIEW, or OFFERED after a declined offer",
                    })
                }
            };

            let id = match &claimed {
                Some(id) => id.clone(),
                None => {
                    let sequence = self.repository.next_sequence(EntityKind::Offer)?;
                    OfferId(EntityKind::Offer.format_id(sequence))
                }
            };
            claimed = Some(id.clone());
            let now = self.clock.now();
            let mut offer = Offer {
                id,
                applicant_id: applicant.id.clone(),
                job_posting_id: job.id.clone(),
                template_id: request.template_id.clone(),
                offered_salary: request.salary,
                start_date: request.start_date,
                status: OfferStatus::Sent,
                sent_at: now,
                accepted_at: None,
                declined_at: None,
                withdrawn_at: None,
                document_ref: None,
                employee_id: None,
                resend_count: 0,
                idempotency_key: request.idempotency_key.clone(),
                created_at: now,
                updated_at: now,
                version: 0,
            };

            let batch = WriteBatch::new()
                .put_offer(&offer)
                .require(Precondition::NoActiveOffer {
                    applicant_id: applicant.id.clone(),
                })
                .require_open(&job);
            let batch = match &staged {
                Some(staged) => batch.put_applicant(staged),
                None => batch.pin_applicant(&applicant),
            };
            self.repository.commit(batch)?;
            offer.mark_committed();
            if let Some(staged) = staged.as_mut() {
                staged.mark_committed();
            }

            Ok((offer, Some(staged.unwrap_or(applicant))))
        })?;

        // Replayed requests return the stored offer without re-rendering or re-notifying.
        let Some(applicant) = applicant else {
            return Ok(offer);
        };

        info!(
            offer_id = %offer.id,
            applicant_id = %offer.applicant_id,
            salary = offer.offered_salary,
            "offer generated"
        );
        let offer = self.attach_document(offer, &applicant);
        self.notify(NotificationKind::OfferSent, &offer, &applicant);
        Ok(offer)
    }

    /// Change salary or start date of an unanswered offer. The letter is re-rendered.
    pub fn update(&self, id: &OfferId, update: &OfferUpdate) -> Result<Offer, HiringError> {
        if update.is_empty() {
            return Err(HiringError::Validation(
                "an update needs a salary or a start date".to_string(),
            ));
        }
        self.validate_terms(update.salary, update.start_date)?;

        let (offer, applicant) = self.retry.run("update_offer", || {
            let mut offer = load_offer(self.repository.as_ref(), id)?;
            transitions::offer_editable(&offer)?;
            let job = load_job(self.repository.as_ref(), &offer.job_posting_id)?;
            ensure_job_open(&job)?;
            let applicant = load_applicant(self.repository.as_ref(), &offer.applicant_id)?;

            if let Some(salary) = update.salary {
                offer.offered_salary = salary;
            }
            if let Some(start_date) = update.start_date {
                offer.start_date = start_date;
            }
            offer.document_ref = None;
            offer.updated_at = self.clock.now();

            self.repository
                .commit(WriteBatch::new().put_offer(&offer).require_open(&job))?;
            offer.mark_committed();
            Ok((offer, applicant))
        })?;

        info!(
            offer_id = %offer.id,
            salary = offer.offered_salary,
            start_date = %offer.start_date,
            "offer updated"
        );
        Ok(self.attach_document(offer, &applicant))
    }

    /// Re-send an unanswered offer. Acceptance state is never touched.
    pub fn resend(&self, id: &OfferId) -> Result<Offer, HiringError> {
        let (offer, applicant) = self.retry.run("resend_offer", || {
            let mut offer = load_offer(self.repository.as_ref(), id)?;
            transitions::offer_editable(&offer)?;
            let job = load_job(self.repository.as_ref(), &offer.job_posting_id)?;
            ensure_job_open(&job)?;
            let applicant = load_applicant(self.repository.as_ref(), &offer.applicant_id)?;

            let now = self.clock.now();
            offer.sent_at = now;
            offer.resend_count += 1;
            offer.updated_at = now;

            self.repository
                .commit(WriteBatch::new().put_offer(&offer).require_open(&job))?;
            offer.mark_committed();
            Ok((offer, applicant))
        })?;

        info!(offer_id = %offer.id, resend_count = offer.resend_count, "offer resent");
        let offer = if offer.document_ref.is_none() {
            self.attach_document(offer, &applicant)
        } else {
            offer
        };
        self.notify(NotificationKind::OfferResent, &offer, &applicant);
        Ok(offer)
    }

    /// Accept an offer: the offer, the hired applicant, and the new employee id land in one
    /// commit. Accepting again returns the same employee id.
    pub fn accept(&self, id: &OfferId) -> Result<OfferAcceptance, HiringError> {
        let (acceptance, step) = self.retry.run("accept_offer", || {
            let mut offer = load_offer(self.repository.as_ref(), id)?;
            let step = transitions::offer_transition(&offer, OfferStatus::Accepted)?;
            let applicant = load_applicant(self.repository.as_ref(), &offer.applicant_id)?;

            if step == Step::Unchanged {
                let employee_id = offer.employee_id.clone().ok_or_else(|| {
                    HiringError::TransientStorage(format!(
                        "accepted offer {} has no employee id",
                        offer.id
                    ))
                })?;
                return Ok((
                    OfferAcceptance {
                        offer,
                        applicant,
                        employee_id,
                    },
                    step,
                ));
            }

            let sequence = self.repository.next_sequence(EntityKind::Employee)?;
            let employee_id = EmployeeId(EntityKind::Employee.format_id(sequence));
            let mut hired = self.applicants.stage_hired(&applicant, &employee_id)?;

            let now = self.clock.now();
            offer.status = OfferStatus::Accepted;
            offer.accepted_at = Some(now);
            offer.employee_id = Some(employee_id.clone());
            offer.updated_at = now;

            self.repository.commit(
                WriteBatch::new()
                    .put_offer(&offer)
                    .put_applicant(&hired),
            )?;
            offer.mark_committed();
            hired.mark_committed();
            Ok((
                OfferAcceptance {
                    offer,
                    applicant: hired,
                    employee_id,
                },
                step,
            ))
        })?;

        if step == Step::Advance {
            info!(
                offer_id = %acceptance.offer.id,
                applicant_id = %acceptance.applicant.id,
                employee_id = %acceptance.employee_id,
                "offer accepted"
            );
        }
        Ok(acceptance)
    }

    /// Record a decline. The applicant is handled per the configured [`DeclinePolicy`].
    pub fn decline(&self, id: &OfferId) -> Result<Offer, HiringError> {
        self.retry.run("decline_offer", || {
            let mut offer = load_offer(self.repository.as_ref(), id)?;
            if transitions::offer_transition(&offer, OfferStatus::Declined)? == Step::Unchanged {
                return Ok(offer);
            }

            let now = self.clock.now();
            offer.status = OfferStatus::Declined;
            offer.declined_at = Some(now);
            offer.updated_at = now;

            let mut batch = WriteBatch::new().put_offer(&offer);
            if self.decline_policy == DeclinePolicy::RejectApplicant {
                let applicant = load_applicant(self.repository.as_ref(), &offer.applicant_id)?;
                if !applicant.status.is_terminal() {
                    batch = batch.put_applicant(&self.applicants.stage_rejected(&applicant)?);
                }
            }

            self.repository.commit(batch)?;
            offer.mark_committed();
            info!(
                offer_id = %offer.id,
                applicant_id = %offer.applicant_id,
                policy = ?self.decline_policy,
                "offer declined"
            );
            Ok(offer)
        })
    }

    /// Withdraw an unanswered offer. The record stays behind as WITHDRAWN, so withdrawing
    /// again returns it unchanged. The applicant stays OFFERED and may be re-offered.
    pub fn delete(&self, id: &OfferId) -> Result<Offer, HiringError> {
        self.retry.run("delete_offer", || {
            let mut offer = load_offer(self.repository.as_ref(), id)?;
            if transitions::offer_deletable(&offer)? == Step::Unchanged {
                return Ok(offer);
            }

            let now = self.clock.now();
            offer.status = OfferStatus::Withdrawn;
            offer.withdrawn_at = Some(now);
            offer.updated_at = now;

            self.repository.commit(WriteBatch::new().put_offer(&offer))?;
            offer.mark_committed();
            info!(offer_id = %offer.id, applicant_id = %offer.applicant_id, "offer withdrawn");
            Ok(offer)
        })
    }

    pub fn get(&self, id: &OfferId) -> Result<Offer, HiringError> {
        self.retry
            .run("get_offer", || load_offer(self.repository.as_ref(), id))
    }

    /// Offers made to one applicant, newest first.
    pub fn list_for_applicant(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Vec<Offer>, HiringError> {
        let mut offers = self.retry.run("list_offers", || {
            load_applicant(self.repository.as_ref(), applicant_id)?;
            Ok(self.repository.offers_for_applicant(applicant_id)?)
        })?;
        offers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(offers)
    }

    /// Render the letter and store its reference. Failures leave the offer without a document;
    /// the next resend tries again. The reference is dropped when the offer was answered or its
    /// terms changed while the letter was rendering.
    fn attach_document(&self, offer: Offer, applicant: &Applicant) -> Offer {
        let job_title = match load_job(self.repository.as_ref(), &offer.job_posting_id) {
            Ok(job) => job.title,
            Err(err) => {
                warn!(offer_id = %offer.id, error = %err, "offer letter skipped");
                return offer;
            }
        };

        let letter = OfferLetter {
            offer_id: offer.id.clone(),
            template_id: offer.template_id.clone(),
            job_posting_id: offer.job_posting_id.clone(),
            job_title,
            candidate_name: applicant.full_name(),
            offered_salary: offer.offered_salary,
            start_date: offer.start_date,
        };
        let document_ref = match self.documents.render_offer_letter(&letter) {
            Ok(document_ref) => document_ref,
            Err(err) => {
                warn!(offer_id = %offer.id, error = %err, "offer letter rendering failed");
                return offer;
            }
        };

        let stored = self.retry.run("attach_offer_document", || {
            let mut current = load_offer(self.repository.as_ref(), &offer.id)?;
            if !letter.matches(&current) {
                warn!(offer_id = %current.id, "offer changed during rendering; letter discarded");
                return Ok(current);
            }
            current.document_ref = Some(document_ref.clone());
            self.repository.commit(WriteBatch::new().put_offer(&current))?;
            current.mark_committed();
            Ok(current)
        });

        match stored {
            Ok(current) => current,
            Err(err) => {
                warn!(offer_id = %offer.id, error = %err, "offer document reference not stored");
                offer
            }
        }
    }

    fn notify(&self, kind: NotificationKind, offer: &Offer, applicant: &Applicant) {
        let mut details = BTreeMap::new();
        details.insert("candidate_name".to_string(), applicant.full_name());
        details.insert("salary".to_string(), offer.offered_salary.to_string());
        details.insert("start_date".to_string(), offer.start_date.to_string());
        details.insert("resend_count".to_string(), offer.resend_count.to_string());

        let notification = OfferNotification {
            kind,
            offer_id: offer.id.clone(),
            applicant_id: applicant.id.clone(),
            recipient_email: applicant.email.clone(),
            document_ref: offer.document_ref.clone(),
            details,
        };

        if let Err(err) = self.notifications.publish(notification) {
            warn!(
                offer_id = %offer.id,
                template = kind.template(),
                error = %err,
                "offer notification not delivered"
            );
        }
    }
}
