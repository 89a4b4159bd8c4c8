use std::sync::Arc;

use super::applicants::ApplicantPipeline;
use super::collaborators::{
    Clock, DocumentStore, NotificationPublisher, OrganizationDirectory, SystemClock,
};
use super::interviews::InterviewScheduler;
use super::jobs::JobPostingManager;
use super::offers::{DeclinePolicy, OfferEngine};
use super::onboarding::OnboardingTracker;
use super::repository::HiringRepository;
use super::retry::RetryPolicy;
use super::scoring::{RubricScorer, ScoringProvider};

/// External systems the pipeline consumes.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn OrganizationDirectory>,
    pub documents: Arc<dyn DocumentStore>,
    pub scorer: Arc<dyn ScoringProvider>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Wall clock and the rubric scorer; directory and document store are always supplied.
    pub fn new(
        directory: Arc<dyn OrganizationDirectory>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            directory,
            documents,
            scorer: Arc::new(RubricScorer::default()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn ScoringProvider>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Knobs the components share.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceSettings {
    pub retry: RetryPolicy,
    pub decline_policy: DeclinePolicy,
}

/// Service composing the five pipeline components over one repository.
pub struct HiringService<R, N> {
    jobs: JobPostingManager<R>,
    applicants: Arc<ApplicantPipeline<R>>,
    interviews: InterviewScheduler<R>,
    offers: OfferEngine<R, N>,
    onboarding: OnboardingTracker<R>,
}

impl<R, N> HiringService<R, N>
where
    R: HiringRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifications: Arc<N>,
        collaborators: Collaborators,
        settings: ServiceSettings,
    ) -> Self {
        let Collaborators {
            directory,
            documents,
            scorer,
            clock,
        } = collaborators;
        let retry = settings.retry;

        let applicants = Arc::new(ApplicantPipeline::new(
            repository.clone(),
            scorer,
            clock.clone(),
            retry,
        ));

        Self {
            jobs: JobPostingManager::new(
                repository.clone(),
                directory.clone(),
                clock.clone(),
                retry,
            ),
            interviews: InterviewScheduler::new(
                repository.clone(),
                directory,
                clock.clone(),
                retry,
            ),
            offers: OfferEngine::new(
                repository.clone(),
                applicants.clone(),
                notifications,
                documents,
                clock,
                retry,
                settings.decline_policy,
            ),
            onboarding: OnboardingTracker::new(repository, retry),
            applicants,
        }
    }

    pub fn jobs(&self) -> &JobPostingManager<R> {
        &self.jobs
    }

    pub fn applicants(&self) -> &ApplicantPipeline<R> {
        &self.applicants
    }

    pub fn interviews(&self) -> &InterviewScheduler<R> {
        &self.interviews
    }

    pub fn offers(&self) -> &OfferEngine<R, N> {
        &self.offers
    }

    pub fn onboarding(&self) -> &OnboardingTracker<R> {
        &self.onboarding
    }
}
