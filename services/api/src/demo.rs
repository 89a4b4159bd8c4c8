use crate::infra::{seeded_directory, LocalDocumentStore, LoggingNotificationPublisher};
use chrono::{Duration, Utc};
use clap::Args;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use talent_pipeline::error::AppError;
use talent_pipeline::workflows::hiring::{
    ApplicantId, ApplicantSource, ApplicantStatus, CandidateFields, CandidateProfile,
    Collaborators, EmploymentType, HiringService, InMemoryHiringStore, JobPosting, JobStatus,
    NewInterview, NewJobPosting, NewOffer, OnboardingFilter, SalaryRange, ServiceSettings,
    StatusChange, TemplateId, UserId,
};

type DemoService = HiringService<InMemoryHiringStore, LoggingNotificationPublisher>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Optional job-board CSV export to import before ranking.
    #[arg(long)]
    pub(crate) applicants_csv: Option<PathBuf>,
    /// Stop after ranking; skip interviews, offers, and onboarding.
    #[arg(long)]
    pub(crate) skip_offer: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        applicants_csv,
        skip_offer,
    } = args;

    let notifications = Arc::new(LoggingNotificationPublisher::default());
    let service = HiringService::new(
        Arc::new(InMemoryHiringStore::new()),
        notifications.clone(),
        Collaborators::new(
            Arc::new(seeded_directory()),
            Arc::new(LocalDocumentStore::default()),
        ),
        ServiceSettings::default(),
    );

    println!("Talent pipeline demo");
    let job = open_requisition(&service)?;
    println!(
        "- Requisition {} '{}' -> {:?} ({} stages)",
        job.id,
        job.title,
        job.status,
        job.stages.len()
    );

    for (first, last, email, skills, years) in [
        ("Grace", "Hopper", "grace@example.com", &["rust", "postgres"][..], 9),
        ("Ada", "Lovelace", "ada@example.com", &["rust"][..], 3),
        ("Alan", "Turing", "alan@example.com", &[] as &[&str], 1),
    ] {
        let fields = CandidateFields {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.to_string(),
            phone: None,
            resume_ref: None,
            cover_letter_ref: None,
            profile: CandidateProfile {
                headline: None,
                skills: skills.iter().map(|skill| skill.to_string()).collect(),
                years_experience: Some(years),
            },
        };
        match service
            .applicants()
            .apply(&job.id, fields, ApplicantSource::Careers)
        {
            Ok(applicant) => println!("  Applied: {} {} ({})", first, last, applicant.id),
            Err(err) => println!("  Application rejected [{}]: {}", err.code(), err),
        }
    }

    if let Some(path) = applicants_csv {
        let file = File::open(&path)?;
        let report = service.applicants().import_csv(&job.id, file)?;
        println!(
            "- Imported {} applicants from {} ({} rows rejected)",
            report.imported.len(),
            path.display(),
            report.rejected.len()
        );
        for row in &report.rejected {
            println!("    line {} [{}]: {}", row.line, row.code, row.reason);
        }
    }

    let ranking = service.applicants().rank_candidates(&job.id)?;
    println!("\nCandidate ranking");
    for candidate in &ranking.ranked {
        println!(
            "  {}. {} score {:.3} ({:?})",
            candidate.rank, candidate.name, candidate.score, candidate.status
        );
    }
    for failure in &ranking.failures {
        println!(
            "  ! {} not scored [{}]: {}",
            failure.applicant_id, failure.code, failure.reason
        );
    }

    if skip_offer {
        return Ok(());
    }
    let Some(top) = ranking.ranked.first() else {
        println!("  No candidates to take forward");
        return Ok(());
    };

    println!("\nInterview and offer");
    move_to(&service, &top.applicant_id, ApplicantStatus::Screening)?;
    let interview = service.interviews().schedule(NewInterview {
        applicant_id: top.applicant_id.clone(),
        interviewer_id: UserId::from("usr-interviewer"),
        scheduled_at: Utc::now() + Duration::days(2),
        duration_minutes: 60,
        location: "Video call".to_string(),
        idempotency_key: None,
    })?;
    println!(
        "- Interview {} with {} at {}",
        interview.id, interview.interviewer_user_id, interview.scheduled_at
    );
    service
        .interviews()
        .complete(&interview.id, Some("Strong systems design".to_string()))?;
    move_to(&service, &top.applicant_id, ApplicantStatus::Interview)?;

    let offer = service.offers().generate(NewOffer {
        applicant_id: top.applicant_id.clone(),
        template_id: TemplateId::from("tpl-standard"),
        salary: 92_000,
        start_date: Utc::now().date_naive() + Duration::days(30),
        idempotency_key: None,
    })?;
    println!(
        "- Offer {} sent: {} starting {} (letter {})",
        offer.id,
        offer.offered_salary,
        offer.start_date,
        offer
            .document_ref
            .as_ref()
            .map(|doc| doc.as_str())
            .unwrap_or("pending")
    );

    let acceptance = service.offers().accept(&offer.id)?;
    println!(
        "- {} accepted; employee record {}",
        top.name, acceptance.employee_id
    );

    println!("\nOnboarding queue");
    for record in service.onboarding().list(&OnboardingFilter::default())? {
        println!(
            "  {} <{}> {:?} follow-up {:?}",
            record.candidate_name, record.email, record.status, record.follow_up
        );
    }

    let events = notifications.events();
    if events.is_empty() {
        println!("  Notifications: none dispatched");
    } else {
        println!("  Notifications:");
        for event in events {
            println!(
                "    - template={} -> {}",
                event.kind.template(),
                event.recipient_email
            );
        }
    }

    Ok(())
}

fn open_requisition(service: &DemoService) -> Result<JobPosting, AppError> {
    let job = service.jobs().create(NewJobPosting {
        title: "Backend Engineer".to_string(),
        description: "Build the services behind our hiring platform.".to_string(),
        employment_type: EmploymentType::Permanent,
        location: "Remote (EU)".to_string(),
        salary_range: SalaryRange {
            min: Some(80_000),
            max: Some(100_000),
        },
        department_id: "dept-engineering".into(),
        position_id: "pos-backend".into(),
        requirements: vec!["rust".to_string(), "postgres".to_string()],
        stages: Vec::new(),
        initial_status: JobStatus::Draft,
    })?;
    service.jobs().submit_for_approval(&job.id)?;
    service.jobs().approve(&job.id)?;
    Ok(service.jobs().publish(&job.id)?)
}

fn move_to(
    service: &DemoService,
    applicant: &ApplicantId,
    status: ApplicantStatus,
) -> Result<(), AppError> {
    service.applicants().update_status(
        applicant,
        &StatusChange {
            status,
            stage_id: None,
        },
    )?;
    Ok(())
}
