use super::common::*;
use crate::workflows::hiring::{
    HiringError, JobFilter, JobId, JobStatus, SalaryRange, StageDraft, StageId,
};
use chrono::Duration;

#[test]
fn create_assigns_sequential_ids_and_default_stages() {
    let harness = harness();
    let jobs = harness.service.jobs();

    let first = jobs.create(job_draft("Backend Engineer")).expect("created");
    let second = jobs.create(job_draft("Data Engineer")).expect("created");

    assert_eq!(first.id, JobId::from("job-000001"));
    assert_eq!(second.id, JobId::from("job-000002"));
    assert_eq!(first.status, JobStatus::Draft);
    assert_eq!(first.version, 1);
    let names: Vec<_> = first.stages.iter().map(|stage| stage.name.as_str()).collect();
    assert_eq!(
        names,
        ["Applied", "Screening", "Shortlisted", "Interview", "Offer"]
    );
    assert_eq!(first.first_stage().map(|s| s.id.clone()), Some(StageId::from("stage-1")));
}

#[test]
fn create_may_start_in_pending_approval() {
    let harness = harness();
    let mut draft = job_draft("Platform Engineer");
    draft.initial_status = JobStatus::PendingApproval;

    let job = harness.service.jobs().create(draft).expect("created");
    assert_eq!(job.status, JobStatus::PendingApproval);

    let approved = harness.service.jobs().approve(&job.id).expect("approved");
    assert_eq!(approved.approved_at, Some(base_time()));
}

#[test]
fn create_rejects_invalid_requisitions() {
    let harness = harness();
    let jobs = harness.service.jobs();

    let mut inverted = job_draft("Backend Engineer");
    inverted.salary_range = SalaryRange {
        min: Some(120_000),
        max: Some(90_000),
    };
    let mut zero = job_draft("Backend Engineer");
    zero.salary_range.min = Some(0);
    let mut blank = job_draft("   ");
    blank.location = "Berlin".to_string();
    let mut unknown_department = job_draft("Backend Engineer");
    unknown_department.department_id = "dept-ghost".into();
    let mut unknown_position = job_draft("Backend Engineer");
    unknown_position.position_id = "pos-ghost".into();
    let mut published = job_draft("Backend Engineer");
    published.initial_status = JobStatus::Published;

    for draft in [
        inverted,
        zero,
        blank,
        unknown_department,
        unknown_position,
        published,
    ] {
        match jobs.create(draft) {
            Err(HiringError::Validation(_)) => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }
    assert!(jobs.list(&JobFilter::default()).expect("list").is_empty());
}

#[test]
fn open_ended_salary_ranges_are_accepted() {
    let harness = harness();
    let mut draft = job_draft("Backend Engineer");
    draft.salary_range = SalaryRange {
        min: Some(60_000),
        max: None,
    };

    let job = harness.service.jobs().create(draft).expect("created");
    assert_eq!(job.salary_range.max, None);
}

#[test]
fn publish_requires_approval() {
    let harness = harness();
    let jobs = harness.service.jobs();
    let job = jobs.create(job_draft("Backend Engineer")).expect("created");

    match jobs.publish(&job.id) {
        Err(HiringError::InvalidStateTransition { from, to, .. }) => {
            assert_eq!(from, "DRAFT");
            assert_eq!(to, "PUBLISHED");
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }

    jobs.submit_for_approval(&job.id).expect("submitted");
    match jobs.publish(&job.id) {
        Err(HiringError::InvalidStateTransition { from, .. }) => {
            assert_eq!(from, "PENDING_APPROVAL")
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }

    jobs.approve(&job.id).expect("approved");
    harness.clock.advance(Duration::hours(2));
    let published = jobs.publish(&job.id).expect("published");
    assert_eq!(published.status, JobStatus::Published);
    assert_eq!(published.published_at, Some(base_time() + Duration::hours(2)));
}

#[test]
fn approval_cannot_be_repeated() {
    let harness = harness();
    let jobs = harness.service.jobs();
    let job = published_job(&harness);

    match jobs.approve(&job.id) {
        Err(err) => assert_eq!(err.code(), "INVALID_STATE_TRANSITION"),
        other => panic!("expected invalid transition, got {other:?}"),
    }
    match jobs.submit_for_approval(&job.id) {
        Err(err) => assert_eq!(err.code(), "INVALID_STATE_TRANSITION"),
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn close_is_reachable_from_any_open_state_and_idempotent() {
    let harness = harness();
    let jobs = harness.service.jobs();
    let draft = jobs.create(job_draft("Backend Engineer")).expect("created");

    let closed = jobs.close(&draft.id).expect("closed from draft");
    assert_eq!(closed.status, JobStatus::Closed);
    assert_eq!(closed.closed_at, Some(base_time()));

    harness.clock.advance(Duration::minutes(5));
    let again = jobs.close(&draft.id).expect("close repeated");
    assert_eq!(again.closed_at, Some(base_time()));
    assert_eq!(again.version, closed.version);

    match jobs.publish(&draft.id) {
        Err(HiringError::InvalidStateTransition { from, .. }) => assert_eq!(from, "CLOSED"),
        other => panic!("expected invalid transition, got {other:?}"),
    }

    let live = published_job(&harness);
    assert_eq!(
        jobs.close(&live.id).expect("closed").status,
        JobStatus::Closed
    );
}

#[test]
fn stages_are_editable_until_published() {
    let harness = harness();
    let jobs = harness.service.jobs();
    let job = jobs.create(job_draft("Backend Engineer")).expect("created");

    let updated = jobs
        .update_stages(
            &job.id,
            &[
                StageDraft::new("Take-home", 2),
                StageDraft::new("Intro call", 1),
            ],
        )
        .expect("stages replaced");
    let names: Vec<_> = updated.stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Intro call", "Take-home"]);
    assert_eq!(updated.stages[1].id, StageId::from("stage-2"));

    match jobs.update_stages(
        &job.id,
        &[StageDraft::new("Screen", 1), StageDraft::new("screen", 2)],
    ) {
        Err(HiringError::Validation(reason)) => assert!(reason.contains("twice")),
        other => panic!("expected validation error, got {other:?}"),
    }
    match jobs.update_stages(&job.id, &[]) {
        Err(HiringError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }

    let live = published_job(&harness);
    match jobs.update_stages(&live.id, &[StageDraft::new("Only", 1)]) {
        Err(HiringError::InvalidStateTransition { to, .. }) => assert_eq!(to, "stage edit"),
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn list_filters_and_orders_newest_first() {
    let harness = harness();
    let jobs = harness.service.jobs();
    let older = published_job(&harness);
    harness.clock.advance(Duration::days(1));
    let newer = jobs.create(job_draft("Site Reliability")).expect("created");

    let all = jobs.list(&JobFilter::default()).expect("list");
    let ids: Vec<_> = all.iter().map(|job| job.id.clone()).collect();
    assert_eq!(ids, vec![newer.id.clone(), older.id.clone()]);

    let published = jobs
        .list(&JobFilter {
            status: Some(JobStatus::Published),
            department_id: None,
        })
        .expect("list");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].id, older.id);

    let elsewhere = jobs
        .list(&JobFilter {
            status: None,
            department_id: Some("dept-sales".into()),
        })
        .expect("list");
    assert!(elsewhere.is_empty());
}

#[test]
fn public_views_only_expose_published_postings() {
    let harness = harness();
    let jobs = harness.service.jobs();
    let live = published_job(&harness);
    let draft = jobs.create(job_draft("Hidden role")).expect("created");

    let public = jobs.list_public().expect("public list");
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].id, live.id);

    assert!(jobs.get_public(&live.id).is_ok());
    match jobs.get_public(&draft.id) {
        Err(HiringError::NotFound { .. }) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn unknown_job_is_not_found() {
    let harness = harness();
    match harness.service.jobs().get(&JobId::from("job-404404")) {
        Err(err) => {
            assert_eq!(err.code(), "NOT_FOUND");
            assert_eq!(err.entity_id(), Some("job-404404"));
        }
        other => panic!("expected not found, got {other:?}"),
    }
}
