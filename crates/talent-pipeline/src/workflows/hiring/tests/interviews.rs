use super::common::*;
use crate::workflows::hiring::{
    ApplicantStatus, HiringError, InterviewFilter, InterviewId, InterviewStatus, UserId,
};
use chrono::Duration;
use std::sync::Arc;
use std::thread;

#[test]
fn schedules_screened_applicants() {
    let harness = harness();
    let (job, applicant) = interviewed_applicant(&harness);

    let interview = harness
        .service
        .interviews()
        .schedule(interview_request(&applicant.id, 24))
        .expect("scheduled");

    assert_eq!(interview.id, InterviewId::from("int-000001"));
    assert_eq!(interview.status, InterviewStatus::Scheduled);
    assert_eq!(interview.job_posting_id, job.id);
    assert_eq!(interview.ends_at(), base_time() + Duration::hours(25));

    let unchanged = harness.service.applicants().get(&applicant.id).expect("stored");
    assert_eq!(unchanged.status, ApplicantStatus::Interview);
}

#[test]
fn rejects_applicants_before_screening_or_after_rejection() {
    let harness = harness();
    let job = published_job(&harness);
    let fresh = apply(&harness, &job, "Ada");
    let rejected = apply(&harness, &job, "Grace");
    advance(&harness, &rejected.id, ApplicantStatus::Rejected);

    for applicant in [&fresh, &rejected] {
        match harness
            .service
            .interviews()
            .schedule(interview_request(&applicant.id, 24))
        {
            Err(HiringError::InvalidApplicantState { applicant_id, .. }) => {
                assert_eq!(applicant_id, applicant.id.to_string())
            }
            other => panic!("expected invalid applicant state, got {other:?}"),
        }
    }
}

#[test]
fn validates_requests() {
    let harness = harness();
    let (_, applicant) = interviewed_applicant(&harness);
    let interviews = harness.service.interviews();

    let mut zero = interview_request(&applicant.id, 24);
    zero.duration_minutes = 0;
    let mut past = interview_request(&applicant.id, 24);
    past.scheduled_at = base_time() - Duration::minutes(1);
    let now = interview_request(&applicant.id, 0);
    let mut nowhere = interview_request(&applicant.id, 24);
    nowhere.location = "  ".to_string();
    let mut stranger = interview_request(&applicant.id, 24);
    stranger.interviewer_id = UserId::from("usr-mallory");

    for request in [zero, past, now, nowhere, stranger] {
        match interviews.schedule(request) {
            Err(HiringError::Validation(_)) => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}

#[test]
fn overlapping_slots_conflict_but_adjacent_slots_do_not() {
    let harness = harness();
    let job = published_job(&harness);
    let ada = apply(&harness, &job, "Ada");
    let grace = apply(&harness, &job, "Grace");
    advance(&harness, &ada.id, ApplicantStatus::Screening);
    advance(&harness, &grace.id, ApplicantStatus::Shortlisted);
    let interviews = harness.service.interviews();

    let first = interviews
        .schedule(interview_request(&ada.id, 24))
        .expect("first slot");

    let mut overlapping = interview_request(&grace.id, 24);
    overlapping.scheduled_at += Duration::minutes(30);
    match interviews.schedule(overlapping) {
        Err(HiringError::SchedulingConflict {
            conflicting_interview_id,
            ..
        }) => assert_eq!(conflicting_interview_id, first.id.to_string()),
        other => panic!("expected scheduling conflict, got {other:?}"),
    }

    let adjacent = interviews
        .schedule(interview_request(&grace.id, 25))
        .expect("back-to-back slot is free");
    assert_eq!(adjacent.scheduled_at, first.ends_at());

    let mut other_interviewer = interview_request(&grace.id, 24);
    other_interviewer.interviewer_id = UserId::from(OTHER_INTERVIEWER);
    interviews
        .schedule(other_interviewer)
        .expect("another interviewer is free");
}

#[test]
fn cancelled_interviews_free_the_slot() {
    let harness = harness();
    let (_, applicant) = interviewed_applicant(&harness);
    let interviews = harness.service.interviews();

    let first = interviews
        .schedule(interview_request(&applicant.id, 24))
        .expect("scheduled");
    interviews.cancel(&first.id).expect("cancelled");

    let rebooked = interviews
        .schedule(interview_request(&applicant.id, 24))
        .expect("slot reused");
    assert_ne!(rebooked.id, first.id);
}

#[test]
fn idempotency_key_returns_the_original_interview() {
    let harness = harness();
    let (_, applicant) = interviewed_applicant(&harness);
    let mut request = interview_request(&applicant.id, 24);
    request.idempotency_key = Some("req-7f3a".to_string());

    let first = harness
        .service
        .interviews()
        .schedule(request.clone())
        .expect("scheduled");
    let replay = harness
        .service
        .interviews()
        .schedule(request)
        .expect("replayed");

    assert_eq!(replay, first);
    let all = harness
        .service
        .interviews()
        .list(&InterviewFilter::default())
        .expect("list");
    assert_eq!(all.len(), 1);
}

#[test]
fn closed_jobs_refuse_new_interviews() {
    let harness = harness();
    let (job, applicant) = interviewed_applicant(&harness);
    harness.service.jobs().close(&job.id).expect("closed");

    match harness
        .service
        .interviews()
        .schedule(interview_request(&applicant.id, 24))
    {
        Err(HiringError::JobClosed { job_id }) => assert_eq!(job_id, job.id.to_string()),
        other => panic!("expected job closed, got {other:?}"),
    }
}

#[test]
fn complete_and_cancel_are_terminal() {
    let harness = harness();
    let (_, applicant) = interviewed_applicant(&harness);
    let interviews = harness.service.interviews();
    let interview = interviews
        .schedule(interview_request(&applicant.id, 24))
        .expect("scheduled");

    harness.clock.advance(Duration::hours(26));
    let completed = interviews
        .complete(&interview.id, Some("  Strong systems design.  ".to_string()))
        .expect("completed");
    assert_eq!(completed.status, InterviewStatus::Completed);
    assert_eq!(
        completed.outcome_notes.as_deref(),
        Some("Strong systems design.")
    );

    let again = interviews
        .complete(&interview.id, None)
        .expect("repeat is a no-op");
    assert_eq!(again.version, completed.version);

    match interviews.cancel(&interview.id) {
        Err(HiringError::InvalidStateTransition { from, to, .. }) => {
            assert_eq!(from, "COMPLETED");
            assert_eq!(to, "CANCELLED");
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn list_filters_by_interviewer_and_status() {
    let harness = harness();
    let job = published_job(&harness);
    let ada = apply(&harness, &job, "Ada");
    advance(&harness, &ada.id, ApplicantStatus::Interview);
    let interviews = harness.service.interviews();

    let later = interviews
        .schedule(interview_request(&ada.id, 48))
        .expect("scheduled");
    let mut bob = interview_request(&ada.id, 24);
    bob.interviewer_id = UserId::from(OTHER_INTERVIEWER);
    let earlier = interviews.schedule(bob).expect("scheduled");
    interviews.cancel(&later.id).expect("cancelled");

    let everything = interviews
        .list(&InterviewFilter {
            applicant_id: Some(ada.id.clone()),
            ..InterviewFilter::default()
        })
        .expect("list");
    let ids: Vec<_> = everything.iter().map(|i| i.id.clone()).collect();
    assert_eq!(ids, vec![earlier.id.clone(), later.id.clone()]);

    let scheduled_for_alice = interviews
        .list(&InterviewFilter {
            interviewer_id: Some(UserId::from(INTERVIEWER)),
            status: Some(InterviewStatus::Scheduled),
            ..InterviewFilter::default()
        })
        .expect("list");
    assert!(scheduled_for_alice.is_empty());
}

#[test]
fn concurrent_bookings_for_one_slot_admit_a_single_winner() {
    let harness = harness();
    let job = published_job(&harness);
    let mut applicants = Vec::new();
    for name in ["Ada", "Grace", "Linus", "Barbara"] {
        let applicant = apply(&harness, &job, name);
        advance(&harness, &applicant.id, ApplicantStatus::Screening);
        applicants.push(applicant.id);
    }

    let service = Arc::clone(&harness.service);
    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = applicants
            .iter()
            .map(|applicant| {
                let service = Arc::clone(&service);
                scope.spawn(move || service.interviews().schedule(interview_request(applicant, 24)))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("booking thread"))
            .collect()
    });

    let booked = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(booked, 1);
    for result in results.iter().filter_map(|result| result.as_ref().err()) {
        assert_eq!(result.code(), "SCHEDULING_CONFLICT");
    }
}

#[test]
fn scheduling_loses_to_a_concurrent_close() {
    let store = Arc::new(ScriptedStore::default());
    let harness = harness_over(store.clone(), settings(), None);
    let (job, applicant) = interviewed_applicant(&harness);

    let job_id = job.id.clone();
    store.before_next_commit(move |inner| close_job_in(inner, &job_id));
    match harness
        .service
        .interviews()
        .schedule(interview_request(&applicant.id, 24))
    {
        Err(HiringError::JobClosed { job_id }) => assert_eq!(job_id, job.id.to_string()),
        other => panic!("expected job closed, got {other:?}"),
    }
    assert!(harness
        .service
        .interviews()
        .list(&InterviewFilter::default())
        .expect("list")
        .is_empty());
}

#[test]
fn scheduling_loses_to_a_concurrent_rejection() {
    let store = Arc::new(ScriptedStore::default());
    let harness = harness_over(store.clone(), settings(), None);
    let (_, applicant) = interviewed_applicant(&harness);

    let applicant_id = applicant.id.clone();
    store.before_next_commit(move |inner| reject_applicant_in(inner, &applicant_id));
    match harness
        .service
        .interviews()
        .schedule(interview_request(&applicant.id, 24))
    {
        Err(HiringError::InvalidApplicantState { status, .. }) => assert_eq!(status, "REJECTED"),
        other => panic!("expected invalid applicant state, got {other:?}"),
    }
    assert!(harness
        .service
        .interviews()
        .list(&InterviewFilter {
            applicant_id: Some(applicant.id.clone()),
            ..InterviewFilter::default()
        })
        .expect("list")
        .is_empty());
}

#[test]
fn scheduling_survives_a_lost_acknowledgement() {
    let store = Arc::new(ScriptedStore::default());
    let harness = harness_over(store.clone(), settings(), None);
    let (_, applicant) = interviewed_applicant(&harness);

    store.lose_next_acknowledgement();
    let interview = harness
        .service
        .interviews()
        .schedule(interview_request(&applicant.id, 24))
        .expect("retry finds its own booking");

    assert_eq!(interview.id, InterviewId::from("int-000001"));
    let booked = harness
        .service
        .interviews()
        .list(&InterviewFilter::default())
        .expect("list");
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0].status, InterviewStatus::Scheduled);
}
