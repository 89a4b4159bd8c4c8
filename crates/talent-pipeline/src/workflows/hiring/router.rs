use std::io::Cursor;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::collaborators::NotificationPublisher;
use super::domain::{
    ApplicantId, ApplicantSource, ApplicantStatus, CandidateFields, EmploymentType,
    InterviewFilter, InterviewId, JobId, JobPosting, NewInterview, NewJobPosting, NewOffer,
    OfferId, OfferUpdate, SalaryRange, StageDraft, StatusChange,
};
use super::errors::HiringError;
use super::jobs::JobFilter;
use super::onboarding::OnboardingFilter;
use super::repository::HiringRepository;
use super::service::HiringService;

type Shared<R, N> = State<Arc<HiringService<R, N>>>;

impl IntoResponse for HiringError {
    fn into_response(self) -> Response {
        let status = match &self {
            HiringError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            HiringError::NotFound { .. } => StatusCode::NOT_FOUND,
            HiringError::Contention { .. } | HiringError::TransientStorage(_) => {
                warn!(error = %self, "hiring request failed on storage");
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::CONFLICT,
        };

        let payload = json!({
            "code": self.code(),
            "error": self.to_string(),
            "entity_id": self.entity_id(),
        });
        (status, Json(payload)).into_response()
    }
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, HiringError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Run a mutating service call on the blocking pool. Commits hold the store lock, may flush the
/// snapshot file, and back off between retries with a thread sleep.
async fn blocking<R, N, T, F>(
    service: Arc<HiringService<R, N>>,
    operation: &'static str,
    call: F,
) -> Result<T, HiringError>
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
    T: Send + 'static,
    F: FnOnce(&HiringService<R, N>) -> Result<T, HiringError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(&service))
        .await
        .unwrap_or_else(|err| {
            Err(HiringError::TransientStorage(format!(
                "{operation} task failed: {err}"
            )))
        })
}

#[derive(Debug, Deserialize)]
pub(crate) struct StagesRequest {
    pub(crate) stages: Vec<StageDraft>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApplicantListQuery {
    #[serde(default)]
    pub(crate) status: Option<ApplicantStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OfferListQuery {
    pub(crate) applicant_id: ApplicantId,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CompleteInterviewRequest {
    #[serde(default)]
    pub(crate) outcome_notes: Option<String>,
}

/// Posting as shown on the careers page.
#[derive(Debug, Serialize)]
pub(crate) struct PublicJobView {
    pub(crate) id: JobId,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) employment_type: EmploymentType,
    pub(crate) location: String,
    pub(crate) salary_range: SalaryRange,
    pub(crate) requirements: Vec<String>,
    pub(crate) published_at: Option<DateTime<Utc>>,
}

impl From<JobPosting> for PublicJobView {
    fn from(job: JobPosting) -> Self {
        Self {
            id: job.id,
            title: job.title,
            description: job.description,
            employment_type: job.employment_type,
            location: job.location,
            salary_range: job.salary_range,
            requirements: job.requirements,
            published_at: job.published_at,
        }
    }
}

/// Router exposing every pipeline operation plus the public careers endpoints.
pub fn hiring_router<R, N>(service: Arc<HiringService<R, N>>) -> Router
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/jobs",
            post(create_job_handler::<R, N>).get(list_jobs_handler::<R, N>),
        )
        .route("/api/v1/jobs/:job_id", get(get_job_handler::<R, N>))
        .route(
            "/api/v1/jobs/:job_id/submit",
            post(submit_job_handler::<R, N>),
        )
        .route(
            "/api/v1/jobs/:job_id/approve",
            post(approve_job_handler::<R, N>),
        )
        .route(
            "/api/v1/jobs/:job_id/publish",
            post(publish_job_handler::<R, N>),
        )
        .route("/api/v1/jobs/:job_id/close", post(close_job_handler::<R, N>))
        .route(
            "/api/v1/jobs/:job_id/stages",
            put(update_stages_handler::<R, N>),
        )
        .route(
            "/api/v1/jobs/:job_id/applicants",
            post(add_applicant_handler::<R, N>).get(list_applicants_handler::<R, N>),
        )
        .route(
            "/api/v1/jobs/:job_id/applicants/import",
            post(import_applicants_handler::<R, N>),
        )
        .route(
            "/api/v1/jobs/:job_id/rank-candidates",
            post(rank_candidates_handler::<R, N>),
        )
        .route(
            "/api/v1/applicants/:applicant_id",
            get(get_applicant_handler::<R, N>),
        )
        .route(
            "/api/v1/applicants/:applicant_id/status",
            patch(update_status_handler::<R, N>),
        )
        .route(
            "/api/v1/interviews",
            post(schedule_interview_handler::<R, N>).get(list_interviews_handler::<R, N>),
        )
        .route(
            "/api/v1/interviews/:interview_id",
            get(get_interview_handler::<R, N>),
        )
        .route(
            "/api/v1/interviews/:interview_id/complete",
            post(complete_interview_handler::<R, N>),
        )
        .route(
            "/api/v1/interviews/:interview_id/cancel",
            post(cancel_interview_handler::<R, N>),
        )
        .route(
            "/api/v1/offers",
            post(generate_offer_handler::<R, N>).get(list_offers_handler::<R, N>),
        )
        .route(
            "/api/v1/offers/:offer_id",
            get(get_offer_handler::<R, N>)
                .patch(update_offer_handler::<R, N>)
                .delete(delete_offer_handler::<R, N>),
        )
        .route(
            "/api/v1/offers/:offer_id/accept",
            post(accept_offer_handler::<R, N>),
        )
        .route(
            "/api/v1/offers/:offer_id/decline",
            post(decline_offer_handler::<R, N>),
        )
        .route(
            "/api/v1/offers/:offer_id/resend",
            post(resend_offer_handler::<R, N>),
        )
        .route("/api/v1/onboarding", get(onboarding_handler::<R, N>))
        .route("/careers", get(careers_handler::<R, N>))
        .route("/careers/:job_id", get(career_posting_handler::<R, N>))
        .route("/careers/:job_id/apply", post(career_apply_handler::<R, N>))
        .with_state(service)
}

pub(crate) async fn create_job_handler<R, N>(
    State(service): Shared<R, N>,
    Json(draft): Json<NewJobPosting>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "create_job", move |service| {
        service.jobs().create(draft)
    })
    .await;
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_jobs_handler<R, N>(
    State(service): Shared<R, N>,
    Query(filter): Query<JobFilter>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.jobs().list(&filter))
}

pub(crate) async fn get_job_handler<R, N>(
    State(service): Shared<R, N>,
    Path(job_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.jobs().get(&JobId(job_id)))
}

pub(crate) async fn submit_job_handler<R, N>(
    State(service): Shared<R, N>,
    Path(job_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "submit_job", move |service| {
        service.jobs().submit_for_approval(&JobId(job_id))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn approve_job_handler<R, N>(
    State(service): Shared<R, N>,
    Path(job_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "approve_job", move |service| {
        service.jobs().approve(&JobId(job_id))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn publish_job_handler<R, N>(
    State(service): Shared<R, N>,
    Path(job_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "publish_job", move |service| {
        service.jobs().publish(&JobId(job_id))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn close_job_handler<R, N>(
    State(service): Shared<R, N>,
    Path(job_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "close_job", move |service| {
        service.jobs().close(&JobId(job_id))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn update_stages_handler<R, N>(
    State(service): Shared<R, N>,
    Path(job_id): Path<String>,
    Json(request): Json<StagesRequest>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "update_stages", move |service| {
        service.jobs().update_stages(&JobId(job_id), &request.stages)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn add_applicant_handler<R, N>(
    State(service): Shared<R, N>,
    Path(job_id): Path<String>,
    Json(fields): Json<CandidateFields>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "add_applicant", move |service| {
        service.applicants().apply(&JobId(job_id), fields, ApplicantSource::Recruiter)
    })
    .await;
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_applicants_handler<R, N>(
    State(service): Shared<R, N>,
    Path(job_id): Path<String>,
    Query(query): Query<ApplicantListQuery>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.applicants().list(&JobId(job_id), query.status),
    )
}

pub(crate) async fn import_applicants_handler<R, N>(
    State(service): Shared<R, N>,
    Path(job_id): Path<String>,
    body: String,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let reader = Cursor::new(body.into_bytes());
    let result = blocking(service, "import_applicants", move |service| {
        service.applicants().import_csv(&JobId(job_id), reader)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn rank_candidates_handler<R, N>(
    State(service): Shared<R, N>,
    Path(job_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "rank_candidates", move |service| {
        service.applicants().rank_candidates(&JobId(job_id))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn get_applicant_handler<R, N>(
    State(service): Shared<R, N>,
    Path(applicant_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.applicants().get(&ApplicantId(applicant_id)),
    )
}

pub(crate) async fn update_status_handler<R, N>(
    State(service): Shared<R, N>,
    Path(applicant_id): Path<String>,
    Json(change): Json<StatusChange>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "update_applicant_status", move |service| {
        service.applicants().update_status(&ApplicantId(applicant_id), &change)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn schedule_interview_handler<R, N>(
    State(service): Shared<R, N>,
    Json(request): Json<NewInterview>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "schedule_interview", move |service| {
        service.interviews().schedule(request)
    })
    .await;
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_interviews_handler<R, N>(
    State(service): Shared<R, N>,
    Query(filter): Query<InterviewFilter>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.interviews().list(&filter))
}

pub(crate) async fn get_interview_handler<R, N>(
    State(service): Shared<R, N>,
    Path(interview_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.interviews().get(&InterviewId(interview_id)),
    )
}

pub(crate) async fn complete_interview_handler<R, N>(
    State(service): Shared<R, N>,
    Path(interview_id): Path<String>,
    request: Option<Json<CompleteInterviewRequest>>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let result = blocking(service, "complete_interview", move |service| {
        service.interviews().complete(&InterviewId(interview_id), request.outcome_notes)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn cancel_interview_handler<R, N>(
    State(service): Shared<R, N>,
    Path(interview_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "cancel_interview", move |service| {
        service.interviews().cancel(&InterviewId(interview_id))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn generate_offer_handler<R, N>(
    State(service): Shared<R, N>,
    Json(request): Json<NewOffer>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "generate_offer", move |service| {
        service.offers().generate(request)
    })
    .await;
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_offers_handler<R, N>(
    State(service): Shared<R, N>,
    Query(query): Query<OfferListQuery>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.offers().list_for_applicant(&query.applicant_id),
    )
}

pub(crate) async fn get_offer_handler<R, N>(
    State(service): Shared<R, N>,
    Path(offer_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.offers().get(&OfferId(offer_id)))
}

pub(crate) async fn update_offer_handler<R, N>(
    State(service): Shared<R, N>,
    Path(offer_id): Path<String>,
    Json(update): Json<OfferUpdate>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "update_offer", move |service| {
        service.offers().update(&OfferId(offer_id), &update)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn delete_offer_handler<R, N>(
    State(service): Shared<R, N>,
    Path(offer_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "delete_offer", move |service| {
        service.offers().delete(&OfferId(offer_id))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn accept_offer_handler<R, N>(
    State(service): Shared<R, N>,
    Path(offer_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "accept_offer", move |service| {
        service.offers().accept(&OfferId(offer_id))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn decline_offer_handler<R, N>(
    State(service): Shared<R, N>,
    Path(offer_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "decline_offer", move |service| {
        service.offers().decline(&OfferId(offer_id))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn resend_offer_handler<R, N>(
    State(service): Shared<R, N>,
    Path(offer_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "resend_offer", move |service| {
        service.offers().resend(&OfferId(offer_id))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn onboarding_handler<R, N>(
    State(service): Shared<R, N>,
    Query(filter): Query<OnboardingFilter>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.onboarding().list(&filter))
}

pub(crate) async fn careers_handler<R, N>(State(service): Shared<R, N>) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let postings = service
        .jobs()
        .list_public()
        .map(|jobs| jobs.into_iter().map(PublicJobView::from).collect::<Vec<_>>());
    respond(StatusCode::OK, postings)
}

pub(crate) async fn career_posting_handler<R, N>(
    State(service): Shared<R, N>,
    Path(job_id): Path<String>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service
            .jobs()
            .get_public(&JobId(job_id))
            .map(PublicJobView::from),
    )
}

pub(crate) async fn career_apply_handler<R, N>(
    State(service): Shared<R, N>,
    Path(job_id): Path<String>,
    Json(fields): Json<CandidateFields>,
) -> Response
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = blocking(service, "career_apply", move |service| {
        service
            .applicants()
            .apply(&JobId(job_id), fields, ApplicantSource::Careers)
    })
    .await
    .map(|applicant| {
        json!({
            "applicant_id": applicant.id,
            "status": applicant.status,
            "applied_at": applicant.applied_at,
        })
    });
    respond(StatusCode::CREATED, result)
}
