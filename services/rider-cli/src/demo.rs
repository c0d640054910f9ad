use std::sync::Arc;
use std::time::Duration;

use crate::infra::DemoBackend;
use crate::rider::{follow_ride, render_policy};
use campus_ride::config::{AppConfig, WorkflowConfig};
use campus_ride::error::AppError;
use campus_ride::telemetry;
use campus_ride::workflows::ride::{
    AddressField, RideDecision, RideWorkflowController, Session, WorkflowError,
};
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Args, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum DemoOutcome {
    Created,
    #[default]
    Queued,
    Rejected,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct DemoArgs {
    /// How the in-memory ride service answers the request
    #[arg(long, value_enum, default_value_t = DemoOutcome::Queued)]
    pub(crate) outcome: DemoOutcome,
    /// Delay between simulated status changes, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub(crate) step_ms: u64,
    /// Sample password to run through the credential policy
    #[arg(long, default_value = "Shuttle#2025")]
    pub(crate) password: String,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            outcome: DemoOutcome::Queued,
            step_ms: 200,
            password: "Shuttle#2025".to_string(),
        }
    }
}

fn backend(outcome: DemoOutcome, step: Duration) -> DemoBackend {
    match outcome {
        DemoOutcome::Queued => DemoBackend::queued(3, step),
        DemoOutcome::Created => DemoBackend::new(
            RideDecision {
                outcome: Some("created".to_string()),
                ride_id: Some("R1".to_string()),
                ride_code: Some("CR-1042".to_string()),
                driver_name: Some("Dana".to_string()),
                ..RideDecision::default()
            },
            step,
        ),
        DemoOutcome::Rejected => DemoBackend::new(
            RideDecision {
                outcome: Some("rejected".to_string()),
                reason: Some("Outside service hours".to_string()),
                ..RideDecision::default()
            },
            step,
        ),
    }
}

fn demo_session() -> Session {
    Session {
        access_token: "demo-access-token".to_string(),
        refresh_token: "demo-refresh-token".to_string(),
        username: "demo.rider".to_string(),
        rider_id: "rider-1".to_string(),
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    println!("== Credential policy ==");
    let policy = config.password.policy();
    render_policy(&policy, &policy.evaluate(&args.password));

    println!();
    println!("== Ride request ==");
    let api = Arc::new(backend(args.outcome, Duration::from_millis(args.step_ms)));
    let workflow = WorkflowConfig {
        suggestion_debounce: Duration::ZERO,
        ..config.workflow.clone()
    };
    let mut controller = RideWorkflowController::new(
        demo_session(),
        &workflow,
        Arc::clone(&api),
        Arc::clone(&api),
        api,
    );

    for (field, text) in [
        (AddressField::Pickup, "Library"),
        (AddressField::Dropoff, "Student Center"),
    ] {
        controller.edit_address(field, text)?;
        controller.next_suggestions().await;
        let choices = controller.suggestions(field);
        println!("{} suggestions for '{text}':", field.label());
        for candidate in choices {
            println!("  - {}", candidate.description);
        }
        match choices.first().cloned() {
            Some(candidate) => controller.select_address(field, &candidate)?,
            None => controller.enter_address(field, text)?,
        }
    }
    controller.set_passenger_count(2)?;
    controller.set_requested_time(Utc::now() + ChronoDuration::minutes(15))?;

    match follow_ride(&mut controller, true).await {
        Err(AppError::Workflow(WorkflowError::RejectedByService { reason })) => {
            println!("Request declined: {reason}");
            let draft = controller.draft();
            println!(
                "Draft kept for correction: '{}' to '{}'",
                draft.pickup, draft.dropoff
            );
            Ok(())
        }
        other => other,
    }
}
