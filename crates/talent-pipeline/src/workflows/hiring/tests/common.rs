use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::hiring::collaborators::{
    Clock, DocumentError, DocumentStore, NotificationError, NotificationPublisher, OfferLetter,
    OfferNotification, StaticDirectory,
};
use crate::workflows::hiring::domain::{
    Applicant, ApplicantId, ApplicantSource, ApplicantStatus, CandidateFields, CandidateProfile,
    DocumentRef, EmploymentType, EntityKind, Interview, InterviewFilter, InterviewId, JobId,
    JobPosting, JobStatus, NewInterview, NewJobPosting, NewOffer, Offer, OfferId, SalaryRange,
    StatusChange, TemplateId, UserId,
};
use crate::workflows::hiring::repository::{HiringRepository, RepositoryError, WriteBatch};
use crate::workflows::hiring::scoring::{ScoringError, ScoringProvider};
use crate::workflows::hiring::{
    hiring_router, Collaborators, HiringService, InMemoryHiringStore, RetryPolicy,
    ServiceSettings,
};

pub(super) const DEPARTMENT: &str = "dept-engineering";
pub(super) const POSITION: &str = "pos-backend";
pub(super) const INTERVIEWER: &str = "usr-alice";
pub(super) const OTHER_INTERVIEWER: &str = "usr-bob";

pub(super) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .expect("valid base time")
}

pub(super) fn start_date() -> NaiveDate {
    base_time().date_naive() + Duration::days(30)
}

/// Clock that only moves when a test tells it to.
#[derive(Debug)]
pub(super) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(super) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

#[derive(Debug, Default)]
pub(super) struct RecordingNotifications {
    events: Mutex<Vec<OfferNotification>>,
    failing: AtomicBool,
}

impl RecordingNotifications {
    pub(super) fn events(&self) -> Vec<OfferNotification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }

    pub(super) fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl NotificationPublisher for RecordingNotifications {
    fn publish(&self, notification: OfferNotification) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Transport("smtp relay down".to_string()));
        }
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

type RenderHook = Box<dyn FnOnce(&OfferLetter) + Send>;

#[derive(Default)]
pub(super) struct RecordingDocuments {
    rendered: Mutex<Vec<OfferLetter>>,
    failing: AtomicBool,
    during_render: Mutex<Option<RenderHook>>,
}

impl RecordingDocuments {
    /// Run `hook` while the next letter is being rendered.
    pub(super) fn during_next_render(&self, hook: impl FnOnce(&OfferLetter) + Send + 'static) {
        *self.during_render.lock().expect("document mutex poisoned") = Some(Box::new(hook));
    }

    pub(super) fn rendered(&self) -> Vec<OfferLetter> {
        self.rendered.lock().expect("document mutex poisoned").clone()
    }

    pub(super) fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl DocumentStore for RecordingDocuments {
    fn render_offer_letter(&self, letter: &OfferLetter) -> Result<DocumentRef, DocumentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DocumentError::Unavailable("renderer offline".to_string()));
        }
        let hook = self
            .during_render
            .lock()
            .expect("document mutex poisoned")
            .take();
        if let Some(hook) = hook {
            hook(letter);
        }
        let mut guard = self.rendered.lock().expect("document mutex poisoned");
        guard.push(letter.clone());
        Ok(DocumentRef(format!(
            "letters/{}-v{}.pdf",
            letter.offer_id,
            guard.len()
        )))
    }
}

/// Scorer returning fixed scores keyed by applicant email.
#[derive(Debug, Default)]
pub(super) struct TableScorer {
    scores: BTreeMap<String, Result<f64, ScoringError>>,
    calls: AtomicU32,
}

impl TableScorer {
    pub(super) fn with(mut self, email: &str, score: Result<f64, ScoringError>) -> Self {
        self.scores.insert(email.to_string(), score);
        self
    }

    pub(super) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ScoringProvider for TableScorer {
    fn score(&self, applicant: &Applicant, _job: &JobPosting) -> Result<f64, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.scores
            .get(&applicant.email)
            .cloned()
            .unwrap_or(Ok(0.5))
    }
}

type CommitHook = Box<dyn FnOnce(&InMemoryHiringStore) + Send>;

/// Store wrapper whose next commits fail with a scripted error, or lose a race against a write
/// that lands just before them.
#[derive(Default)]
pub(super) struct ScriptedStore {
    inner: InMemoryHiringStore,
    failures: Mutex<Vec<RepositoryError>>,
    race: Mutex<Option<CommitHook>>,
    lose_ack: AtomicBool,
}

impl ScriptedStore {
    pub(super) fn fail_next_commits(&self, errors: Vec<RepositoryError>) {
        let mut guard = self.failures.lock().expect("scripted mutex poisoned");
        *guard = errors;
        guard.reverse();
    }

    /// Run `write` against the underlying store right before the next commit is applied.
    pub(super) fn before_next_commit(
        &self,
        write: impl FnOnce(&InMemoryHiringStore) + Send + 'static,
    ) {
        *self.race.lock().expect("scripted mutex poisoned") = Some(Box::new(write));
    }

    /// Apply the next commit but report it as failed.
    pub(super) fn lose_next_acknowledgement(&self) {
        self.lose_ack.store(true, Ordering::SeqCst);
    }
}

impl HiringRepository for ScriptedStore {
    fn next_sequence(&self, kind: EntityKind) -> Result<u64, RepositoryError> {
        self.inner.next_sequence(kind)
    }

    fn job(&self, id: &JobId) -> Result<Option<JobPosting>, RepositoryError> {
        self.inner.job(id)
    }

    fn jobs(&self) -> Result<Vec<JobPosting>, RepositoryError> {
        self.inner.jobs()
    }

    fn applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        self.inner.applicant(id)
    }

    fn applicants_for_job(&self, job_id: &JobId) -> Result<Vec<Applicant>, RepositoryError> {
        self.inner.applicants_for_job(job_id)
    }

    fn applicants_with_status(
        &self,
        statuses: &[ApplicantStatus],
    ) -> Result<Vec<Applicant>, RepositoryError> {
        self.inner.applicants_with_status(statuses)
    }

    fn interview(&self, id: &InterviewId) -> Result<Option<Interview>, RepositoryError> {
        self.inner.interview(id)
    }

    fn interviews(&self, filter: &InterviewFilter) -> Result<Vec<Interview>, RepositoryError> {
        self.inner.interviews(filter)
    }

    fn offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        self.inner.offer(id)
    }

    fn offers_for_applicant(&self, id: &ApplicantId) -> Result<Vec<Offer>, RepositoryError> {
        self.inner.offers_for_applicant(id)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), RepositoryError> {
        let race = self.race.lock().expect("scripted mutex poisoned").take();
        if let Some(write) = race {
            write(&self.inner);
        }
        let scripted = self.failures.lock().expect("scripted mutex poisoned").pop();
        match scripted {
            Some(err) => Err(err),
            None if self.lose_ack.swap(false, Ordering::SeqCst) => {
                self.inner.commit(batch)?;
                Err(RepositoryError::Unavailable("acknowledgement lost".to_string()))
            }
            None => self.inner.commit(batch),
        }
    }
}

/// Close a posting behind the service's back.
pub(super) fn close_job_in(store: &InMemoryHiringStore, job_id: &JobId) {
    let mut job = store.job(job_id).expect("read").expect("job present");
    job.status = JobStatus::Closed;
    job.closed_at = Some(base_time());
    store
        .commit(WriteBatch::new().put_job(&job))
        .expect("job closed");
}

/// Reject an applicant behind the service's back.
pub(super) fn reject_applicant_in(store: &InMemoryHiringStore, applicant_id: &ApplicantId) {
    let mut applicant = store
        .applicant(applicant_id)
        .expect("read")
        .expect("applicant present");
    applicant.status = ApplicantStatus::Rejected;
    applicant.rejected_at = Some(base_time());
    store
        .commit(WriteBatch::new().put_applicant(&applicant))
        .expect("applicant rejected");
}

pub(super) fn directory() -> StaticDirectory {
    StaticDirectory::default()
        .with_department(DEPARTMENT)
        .with_position(POSITION)
        .with_principal(INTERVIEWER)
        .with_principal(OTHER_INTERVIEWER)
}

pub(super) struct Harness<R: HiringRepository + 'static = InMemoryHiringStore> {
    pub(super) service: Arc<HiringService<R, RecordingNotifications>>,
    pub(super) store: Arc<R>,
    pub(super) notifications: Arc<RecordingNotifications>,
    pub(super) documents: Arc<RecordingDocuments>,
    pub(super) clock: Arc<FixedClock>,
}

pub(super) fn settings() -> ServiceSettings {
    ServiceSettings {
        retry: RetryPolicy::no_delay(3),
        ..ServiceSettings::default()
    }
}

pub(super) fn harness() -> Harness {
    harness_with(settings(), None)
}

pub(super) fn harness_with(
    settings: ServiceSettings,
    scorer: Option<Arc<dyn ScoringProvider>>,
) -> Harness {
    harness_over(Arc::new(InMemoryHiringStore::new()), settings, scorer)
}

pub(super) fn harness_over<R: HiringRepository + 'static>(
    store: Arc<R>,
    settings: ServiceSettings,
    scorer: Option<Arc<dyn ScoringProvider>>,
) -> Harness<R> {
    let notifications = Arc::new(RecordingNotifications::default());
    let documents = Arc::new(RecordingDocuments::default());
    let clock = Arc::new(FixedClock::new(base_time()));

    let mut collaborators = Collaborators::new(Arc::new(directory()), documents.clone())
        .with_clock(clock.clone());
    if let Some(scorer) = scorer {
        collaborators = collaborators.with_scorer(scorer);
    }

    let service = Arc::new(HiringService::new(
        store.clone(),
        notifications.clone(),
        collaborators,
        settings,
    ));

    Harness {
        service,
        store,
        notifications,
        documents,
        clock,
    }
}

pub(super) fn job_draft(title: &str) -> NewJobPosting {
    NewJobPosting {
        title: title.to_string(),
        description: "Own the hiring platform backend.".to_string(),
        employment_type: EmploymentType::Permanent,
        location: "Remote (EU)".to_string(),
        salary_range: SalaryRange {
            min: Some(70_000),
            max: Some(95_000),
        },
        department_id: DEPARTMENT.into(),
        position_id: POSITION.into(),
        requirements: vec!["rust".to_string(), "postgres".to_string()],
        stages: Vec::new(),
        initial_status: JobStatus::Draft,
    }
}

pub(super) fn published_job<R: HiringRepository + 'static>(harness: &Harness<R>) -> JobPosting {
    let jobs = harness.service.jobs();
    let job = jobs
        .create(job_draft("Backend Engineer"))
        .expect("job created");
    jobs.submit_for_approval(&job.id).expect("submitted");
    jobs.approve(&job.id).expect("approved");
    jobs.publish(&job.id).expect("published")
}

pub(super) fn candidate(first_name: &str, email: &str) -> CandidateFields {
    CandidateFields {
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        email: email.to_string(),
        phone: Some("+44 20 7946 0000".to_string()),
        resume_ref: Some(DocumentRef(format!("resumes/{first_name}.pdf"))),
        cover_letter_ref: None,
        profile: CandidateProfile {
            headline: Some("Backend engineer".to_string()),
            skills: vec!["rust".to_string()],
            years_experience: Some(4),
        },
    }
}

pub(super) fn apply<R: HiringRepository + 'static>(
    harness: &Harness<R>,
    job: &JobPosting,
    first_name: &str,
) -> Applicant {
    let email = format!("{}@example.com", first_name.to_ascii_lowercase());
    harness
        .service
        .applicants()
        .apply(&job.id, candidate(first_name, &email), ApplicantSource::Careers)
        .expect("application accepted")
}

pub(super) fn advance<R: HiringRepository + 'static>(
    harness: &Harness<R>,
    applicant: &ApplicantId,
    status: ApplicantStatus,
) -> Applicant {
    harness
        .service
        .applicants()
        .update_status(
            applicant,
            &StatusChange {
                status,
                stage_id: None,
            },
        )
        .expect("status updated")
}

/// A published job with one applicant already in INTERVIEW.
pub(super) fn interviewed_applicant<R: HiringRepository + 'static>(
    harness: &Harness<R>,
) -> (JobPosting, Applicant) {
    let job = published_job(harness);
    let applicant = apply(harness, &job, "Ada");
    let applicant = advance(harness, &applicant.id, ApplicantStatus::Interview);
    (job, applicant)
}

pub(super) fn interview_request(applicant: &ApplicantId, hours_ahead: i64) -> NewInterview {
    NewInterview {
        applicant_id: applicant.clone(),
        interviewer_id: UserId::from(INTERVIEWER),
        scheduled_at: base_time() + Duration::hours(hours_ahead),
        duration_minutes: 60,
        location: "https://meet.example.com/room-1".to_string(),
        idempotency_key: None,
    }
}

pub(super) fn offer_request(applicant: &ApplicantId) -> NewOffer {
    NewOffer {
        applicant_id: applicant.clone(),
        template_id: TemplateId::from("tpl-standard"),
        salary: 85_000,
        start_date: start_date(),
        idempotency_key: None,
    }
}

pub(super) fn router_for(harness: &Harness) -> axum::Router {
    hiring_router(harness.service.clone())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
