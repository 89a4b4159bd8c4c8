use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{
    Applicant, ApplicantId, ApplicantStatus, EntityKind, Interview, InterviewFilter, InterviewId,
    InterviewStatus, JobId, JobPosting, JobStatus, Offer, OfferId,
};
use super::repository::{HiringRepository, Precondition, RepositoryError, Write, WriteBatch};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    sequences: BTreeMap<String, u64>,
    #[serde(default)]
    jobs: BTreeMap<JobId, JobPosting>,
    #[serde(default)]
    applicants: BTreeMap<ApplicantId, Applicant>,
    #[serde(default)]
    interviews: BTreeMap<InterviewId, Interview>,
    #[serde(default)]
    offers: BTreeMap<OfferId, Offer>,
}

/// Process-wide entity store.
///
/// State lives behind one mutex that is held only for a single read or commit. When opened with
/// a snapshot path every committed batch is flushed to a JSON file (write to a sibling temp file,
/// then rename) so state survives restarts. A batch whose flush fails is rolled back in memory
/// before the error is returned. Sequence counters ride along with the next flushed batch.
#[derive(Debug, Default)]
pub struct InMemoryHiringStore {
    state: Mutex<StoreState>,
    snapshot: Option<PathBuf>,
}

impl InMemoryHiringStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store persisted at `path`, loading existing state when the file is present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                RepositoryError::Unavailable(format!(
                    "snapshot {} is corrupt: {err}",
                    path.display()
                ))
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => StoreState::default(),
            Err(err) => {
                return Err(RepositoryError::Unavailable(format!(
                    "unable to read snapshot {}: {err}",
                    path.display()
                )))
            }
        };

        info!(
            path = %path.display(),
            jobs = state.jobs.len(),
            applicants = state.applicants.len(),
            "hiring store opened"
        );

        Ok(Self {
            state: Mutex::new(state),
            snapshot: Some(path),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    fn persist(&self, state: &StoreState) -> Result<(), RepositoryError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|err| RepositoryError::Unavailable(format!("snapshot encode: {err}")))?;
        let staging = path.with_extension("tmp");
        fs::write(&staging, bytes)
            .and_then(|()| fs::rename(&staging, path))
            .map_err(|err| {
                RepositoryError::Unavailable(format!(
                    "unable to write snapshot {}: {err}",
                    path.display()
                ))
            })
    }
}

fn check_version<K: Ord, V>(
    records: &BTreeMap<K, V>,
    key: &K,
    version: u64,
    stored_version: impl Fn(&V) -> u64,
    label: impl Fn() -> String,
) -> Result<(), RepositoryError> {
    match (records.get(key), version) {
        (None, 0) => Ok(()),
        (Some(existing), expected) if expected > 0 && stored_version(existing) == expected => {
            Ok(())
        }
        _ => Err(RepositoryError::Conflict { entity: label() }),
    }
}

fn check_write(state: &StoreState, write: &Write) -> Result<(), RepositoryError> {
    match write {
        Write::Job(job) => check_version(
            &state.jobs,
            &job.id,
            job.version,
            |stored| stored.version,
            || format!("job {}", job.id),
        ),
        Write::Applicant(applicant) => check_version(
            &state.applicants,
            &applicant.id,
            applicant.version,
            |stored| stored.version,
            || format!("applicant {}", applicant.id),
        ),
        Write::Interview(interview) => check_version(
            &state.interviews,
            &interview.id,
            interview.version,
            |stored| stored.version,
            || format!("interview {}", interview.id),
        ),
        Write::Offer(offer) => check_version(
            &state.offers,
            &offer.id,
            offer.version,
            |stored| stored.version,
            || format!("offer {}", offer.id),
        ),
    }
}

fn check_precondition(state: &StoreState, precondition: &Precondition) -> bool {
    match precondition {
        Precondition::InterviewerAvailable {
            interviewer_id,
            starts_at,
            ends_at,
        } => !state.interviews.values().any(|interview| {
            &interview.interviewer_user_id == interviewer_id
                && interview.status == InterviewStatus::Scheduled
                && interview.overlaps(*starts_at, *ends_at)
        }),
        Precondition::NoActiveOffer { applicant_id } => !state
            .offers
            .values()
            .any(|offer| &offer.applicant_id == applicant_id && offer.is_active()),
        Precondition::UniqueApplication { job_id, email } => {
            !state.applicants.values().any(|applicant| {
                &applicant.job_posting_id == job_id && applicant.email.eq_ignore_ascii_case(email)
            })
        }
        Precondition::JobOpen { job_id } => state
            .jobs
            .get(job_id)
            .is_some_and(|job| job.status != JobStatus::Closed),
        Precondition::ApplicantUnchanged {
            applicant_id,
            version,
        } => state
            .applicants
            .get(applicant_id)
            .is_some_and(|applicant| applicant.version == *version),
    }
}

/// Prior value of one record touched by an applied write.
enum Undo {
    Job(JobId, Option<JobPosting>),
    Applicant(ApplicantId, Option<Applicant>),
    Interview(InterviewId, Option<Interview>),
    Offer(OfferId, Option<Offer>),
}

fn apply_write(state: &mut StoreState, write: Write) -> Undo {
    match write {
        Write::Job(mut job) => {
            job.version += 1;
            let id = job.id.clone();
            Undo::Job(id.clone(), state.jobs.insert(id, job))
        }
        Write::Applicant(mut applicant) => {
            applicant.version += 1;
            let id = applicant.id.clone();
            Undo::Applicant(id.clone(), state.applicants.insert(id, applicant))
        }
        Write::Interview(mut interview) => {
            interview.version += 1;
            let id = interview.id.clone();
            Undo::Interview(id.clone(), state.interviews.insert(id, interview))
        }
        Write::Offer(mut offer) => {
            offer.version += 1;
            let id = offer.id.clone();
            Undo::Offer(id.clone(), state.offers.insert(id, offer))
        }
    }
}

fn restore<K: Ord, V>(records: &mut BTreeMap<K, V>, key: K, previous: Option<V>) {
    match previous {
        Some(value) => {
            records.insert(key, value);
        }
        None => {
            records.remove(&key);
        }
    }
}

fn revert(state: &mut StoreState, undo: Undo) {
    match undo {
        Undo::Job(id, previous) => restore(&mut state.jobs, id, previous),
        Undo::Applicant(id, previous) => restore(&mut state.applicants, id, previous),
        Undo::Interview(id, previous) => restore(&mut state.interviews, id, previous),
        Undo::Offer(id, previous) => restore(&mut state.offers, id, previous),
    }
}

impl HiringRepository for InMemoryHiringStore {
    fn next_sequence(&self, kind: EntityKind) -> Result<u64, RepositoryError> {
        let mut guard = self.lock()?;
        let counter = guard
            .sequences
            .entry(kind.label().to_string())
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    fn job(&self, id: &JobId) -> Result<Option<JobPosting>, RepositoryError> {
        Ok(self.lock()?.jobs.get(id).cloned())
    }

    fn jobs(&self) -> Result<Vec<JobPosting>, RepositoryError> {
        Ok(self.lock()?.jobs.values().cloned().collect())
    }

    fn applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        Ok(self.lock()?.applicants.get(id).cloned())
    }

    fn applicants_for_job(&self, job_id: &JobId) -> Result<Vec<Applicant>, RepositoryError> {
        Ok(self
            .lock()?
            .applicants
            .values()
            .filter(|applicant| &applicant.job_posting_id == job_id)
            .cloned()
            .collect())
    }

    fn applicants_with_status(
        &self,
        statuses: &[ApplicantStatus],
    ) -> Result<Vec<Applicant>, RepositoryError> {
        Ok(self
            .lock()?
            .applicants
            .values()
            .filter(|applicant| statuses.contains(&applicant.status))
            .cloned()
            .collect())
    }

    fn interview(&self, id: &InterviewId) -> Result<Option<Interview>, RepositoryError> {
        Ok(self.lock()?.interviews.get(id).cloned())
    }

    fn interviews(&self, filter: &InterviewFilter) -> Result<Vec<Interview>, RepositoryError> {
        Ok(self
            .lock()?
            .interviews
            .values()
            .filter(|interview| filter.matches(interview))
            .cloned()
            .collect())
    }

    fn offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        Ok(self.lock()?.offers.get(id).cloned())
    }

    fn offers_for_applicant(&self, id: &ApplicantId) -> Result<Vec<Offer>, RepositoryError> {
        Ok(self
            .lock()?
            .offers
            .values()
            .filter(|offer| &offer.applicant_id == id)
            .cloned()
            .collect())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;

        for write in &batch.writes {
            check_write(&guard, write)?;
        }
        if let Some(failed) = batch
            .preconditions
            .iter()
            .find(|precondition| !check_precondition(&guard, precondition))
        {
            return Err(RepositoryError::PreconditionFailed(failed.describe()));
        }

        let count = batch.writes.len();
        let undo: Vec<Undo> = batch
            .writes
            .into_iter()
            .map(|write| apply_write(&mut guard, write))
            .collect();
        if let Err(err) = self.persist(&guard) {
            for entry in undo.into_iter().rev() {
                revert(&mut guard, entry);
            }
            warn!(writes = count, error = %err, "hiring batch rolled back");
            return Err(err);
        }
        debug!(writes = count, "hiring batch committed");
        Ok(())
    }
}
