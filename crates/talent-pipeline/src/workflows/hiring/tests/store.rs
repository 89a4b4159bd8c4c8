use super::common::*;
use crate::workflows::hiring::{
    ApplicantSource, ApplicantStatus, EntityKind, HiringError, HiringRepository,
    InMemoryHiringStore, InterviewFilter, JobStatus, Precondition, RepositoryError, WriteBatch,
};
use std::sync::Arc;

#[test]
fn stale_versions_are_rejected() {
    let harness = harness();
    let job = published_job(&harness);
    let applicant = apply(&harness, &job, "Ada");
    let stale = harness
        .store
        .applicant(&applicant.id)
        .expect("read")
        .expect("present");

    advance(&harness, &applicant.id, ApplicantStatus::Screening);

    match harness
        .store
        .commit(WriteBatch::new().put_applicant(&stale))
    {
        Err(RepositoryError::Conflict { entity }) => assert!(entity.contains("apl-000001")),
        other => panic!("expected conflict, got {other:?}"),
    }
    let current = harness
        .store
        .applicant(&applicant.id)
        .expect("read")
        .expect("present");
    assert_eq!(current.status, ApplicantStatus::Screening);
}

#[test]
fn inserting_an_existing_id_conflicts() {
    let harness = harness();
    let job = published_job(&harness);
    let mut copy = job.clone();
    copy.version = 0;

    match harness.store.commit(WriteBatch::new().put_job(&copy)) {
        Err(RepositoryError::Conflict { .. }) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn failed_batches_apply_nothing() {
    let harness = harness();
    let (_, applicant) = interviewed_applicant(&harness);
    let offer = harness
        .service
        .offers()
        .generate(offer_request(&applicant.id))
        .expect("offer generated");

    let current = harness
        .store
        .applicant(&applicant.id)
        .expect("read")
        .expect("present");
    let mut renamed = current.clone();
    renamed.first_name = "Augusta".to_string();

    let batch = WriteBatch::new()
        .put_applicant(&renamed)
        .require(Precondition::NoActiveOffer {
            applicant_id: applicant.id.clone(),
        });
    match harness.store.commit(batch) {
        Err(RepositoryError::PreconditionFailed(detail)) => {
            assert!(detail.contains(applicant.id.as_str()))
        }
        other => panic!("expected precondition failure, got {other:?}"),
    }

    let unchanged = harness
        .store
        .applicant(&applicant.id)
        .expect("read")
        .expect("present");
    assert_eq!(unchanged.first_name, "Ada");
    assert!(harness.store.offer(&offer.id).expect("read").is_some());
}

#[test]
fn sequences_are_independent_per_entity() {
    let store = InMemoryHiringStore::new();
    assert_eq!(store.next_sequence(EntityKind::Job).expect("seq"), 1);
    assert_eq!(store.next_sequence(EntityKind::Job).expect("seq"), 2);
    assert_eq!(store.next_sequence(EntityKind::Offer).expect("seq"), 1);
}

#[test]
fn snapshot_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("hiring.json");

    let (job_id, interview_id) = {
        let store = Arc::new(InMemoryHiringStore::open(&path).expect("open"));
        let harness = harness_over(store, settings(), None);
        let (job, applicant) = interviewed_applicant(&harness);
        let interview = harness
            .service
            .interviews()
            .schedule(interview_request(&applicant.id, 24))
            .expect("scheduled");
        (job.id, interview.id)
    };

    let reopened = Arc::new(InMemoryHiringStore::open(&path).expect("reopen"));
    let job = reopened.job(&job_id).expect("read").expect("job persisted");
    assert_eq!(job.title, "Backend Engineer");
    let interviews = reopened
        .interviews(&InterviewFilter::default())
        .expect("read");
    assert_eq!(interviews.len(), 1);
    assert_eq!(interviews[0].id, interview_id);

    let harness = harness_over(reopened, settings(), None);
    let next = published_job(&harness);
    assert_eq!(next.id.as_str(), "job-000002");
}

#[test]
fn corrupt_snapshots_are_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("hiring.json");
    std::fs::write(&path, b"{ not json").expect("write");

    match InMemoryHiringStore::open(&path) {
        Err(RepositoryError::Unavailable(reason)) => assert!(reason.contains("corrupt")),
        other => panic!("expected unavailable, got {other:?}"),
    }
}

#[test]
fn failed_snapshot_writes_roll_the_batch_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("hiring.json");
    let store = Arc::new(InMemoryHiringStore::open(&path).expect("open"));
    let harness = harness_over(store.clone(), settings(), None);
    let job = published_job(&harness);

    // A directory where the staging file belongs makes every flush fail.
    let staging = path.with_extension("tmp");
    std::fs::create_dir(&staging).expect("block staging file");

    let fields = candidate("Ada", "ada@example.com");
    match harness
        .service
        .applicants()
        .apply(&job.id, fields.clone(), ApplicantSource::Careers)
    {
        Err(err @ HiringError::TransientStorage(_)) => {
            assert_eq!(err.code(), "TRANSIENT_STORAGE_ERROR")
        }
        other => panic!("expected transient storage error, got {other:?}"),
    }
    assert!(store.applicants_for_job(&job.id).expect("read").is_empty());

    std::fs::remove_dir(&staging).expect("unblock staging file");
    let applicant = harness
        .service
        .applicants()
        .apply(&job.id, fields, ApplicantSource::Careers)
        .expect("retry after the outage succeeds");

    let reopened = InMemoryHiringStore::open(&path).expect("reopen");
    let persisted = reopened.applicants_for_job(&job.id).expect("read");
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].id, applicant.id);
}

#[test]
fn rolled_back_updates_restore_the_previous_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("hiring.json");
    let store = Arc::new(InMemoryHiringStore::open(&path).expect("open"));
    let harness = harness_over(store.clone(), settings(), None);
    let job = published_job(&harness);

    let staging = path.with_extension("tmp");
    std::fs::create_dir(&staging).expect("block staging file");
    match harness.service.jobs().close(&job.id) {
        Err(err) => assert_eq!(err.code(), "TRANSIENT_STORAGE_ERROR"),
        other => panic!("expected transient storage error, got {other:?}"),
    }
    let current = store.job(&job.id).expect("read").expect("present");
    assert_eq!(current.status, JobStatus::Published);
    assert_eq!(current.version, job.version);
    std::fs::remove_dir(&staging).expect("unblock staging file");

    let closed = harness.service.jobs().close(&job.id).expect("closed");
    assert_eq!(closed.status, JobStatus::Closed);
}

#[test]
fn open_job_and_pinned_applicant_checks() {
    let harness = harness();
    let job = published_job(&harness);
    let applicant = apply(&harness, &job, "Ada");
    let stale = applicant.clone();
    advance(&harness, &applicant.id, ApplicantStatus::Screening);

    let mut touched = harness
        .store
        .job(&job.id)
        .expect("read")
        .expect("present");
    touched.title = "Platform Engineer".to_string();
    match harness.store.commit(
        WriteBatch::new()
            .put_job(&touched)
            .pin_applicant(&stale),
    ) {
        Err(RepositoryError::PreconditionFailed(detail)) => {
            assert!(detail.contains(applicant.id.as_str()))
        }
        other => panic!("expected precondition failure, got {other:?}"),
    }

    harness.service.jobs().close(&job.id).expect("closed");
    let closed = harness
        .store
        .job(&job.id)
        .expect("read")
        .expect("present");
    let mut renamed = closed.clone();
    renamed.title = "Platform Engineer".to_string();
    match harness
        .store
        .commit(WriteBatch::new().put_job(&renamed).require_open(&closed))
    {
        Err(RepositoryError::PreconditionFailed(detail)) => assert!(detail.contains("open")),
        other => panic!("expected precondition failure, got {other:?}"),
    }
}
