use std::sync::Arc;

use crate::infra::{parse_datetime, EnvSessionStore};
use campus_ride::config::AppConfig;
use campus_ride::error::AppError;
use campus_ride::telemetry;
use campus_ride::workflows::credentials::{
    confirmation_matches, PasswordChangeRequest, PasswordPolicy, PasswordPolicyResult,
    PasswordRule,
};
use campus_ride::workflows::ride::{
    AddressField, AddressQuery, AddressSuggester, GeocodingGateway, HttpRideApi, RideOutcome,
    RideServiceGateway, RideStatusGateway, RideWorkflowController, SessionStore, TrackingEvent,
};
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use tracing::info;

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub(crate) enum FieldArg {
    #[default]
    Pickup,
    Dropoff,
}

impl From<FieldArg> for AddressField {
    fn from(value: FieldArg) -> Self {
        match value {
            FieldArg::Pickup => AddressField::Pickup,
            FieldArg::Dropoff => AddressField::Dropoff,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct SuggestArgs {
    /// Free text typed into the address field
    pub(crate) text: String,
    /// Which field the text belongs to
    #[arg(long, value_enum, default_value_t = FieldArg::Pickup)]
    pub(crate) field: FieldArg,
}

#[derive(Args, Debug)]
pub(crate) struct PasswordArgs {
    /// Candidate password
    pub(crate) password: String,
    /// Re-typed password to compare against
    #[arg(long)]
    pub(crate) confirm: Option<String>,
    /// Username for a full reset-form check (with --confirm)
    #[arg(long)]
    pub(crate) username: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct RequestArgs {
    /// Pickup location
    #[arg(long)]
    pub(crate) pickup: String,
    /// Drop-off location
    #[arg(long)]
    pub(crate) dropoff: String,
    /// Number of passengers (1-5)
    #[arg(long, default_value_t = 1)]
    pub(crate) passengers: u8,
    /// Request an accessible (ADA) vehicle
    #[arg(long)]
    pub(crate) accessible: bool,
    /// Pickup time as RFC 3339. Defaults to now.
    #[arg(long, value_parser = parse_datetime)]
    pub(crate) pickup_time: Option<DateTime<Utc>>,
    /// Pick the first suggestion for each address instead of the typed text
    #[arg(long)]
    pub(crate) pick_first: bool,
    /// Stop after the ride is accepted instead of following its status
    #[arg(long)]
    pub(crate) no_follow: bool,
}

pub(crate) async fn run_suggest(args: SuggestArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let api = Arc::new(HttpRideApi::from_config(&config)?);
    let suggester = AddressSuggester::new(api, &config.workflow);
    let field = AddressField::from(args.field);
    let candidates = suggester.suggest(&AddressQuery::new(args.text)).await;

    if candidates.is_empty() {
        println!("No {} suggestions.", field.label());
    }
    for candidate in candidates {
        println!("{:<24} {}", candidate.id, candidate.description);
    }
    Ok(())
}

pub(crate) fn run_password(args: PasswordArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let policy = config.password.policy();
    let result = policy.evaluate(&args.password);

    render_policy(&policy, &result);
    if let Some(confirmation) = args.confirm.as_deref() {
        let matches = confirmation_matches(&args.password, confirmation);
        println!("  [{}] Passwords match", mark(matches));

        if let Some(username) = args.username {
            let request = PasswordChangeRequest {
                username,
                password: args.password,
                confirmation: confirmation.to_string(),
            };
            match request.validate(&policy) {
                Ok(()) => println!("Reset form is ready to submit."),
                Err(err) => println!("{err}"),
            }
        }
    }
    Ok(())
}

pub(crate) fn render_policy(policy: &PasswordPolicy, result: &PasswordPolicyResult) {
    println!(
        "Password requirements (special characters: {})",
        policy.special_characters()
    );
    for rule in PasswordRule::ALL {
        println!("  [{}] {}", mark(result.is_met(rule)), rule.label());
    }
}

fn mark(met: bool) -> char {
    if met {
        'x'
    } else {
        ' '
    }
}

pub(crate) async fn run_request(args: RequestArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let session = EnvSessionStore.session()?;
    let api = Arc::new(HttpRideApi::from_config(&config)?);
    info!(base = %api.base_url(), rider = %session.username, "submitting ride request");

    let mut controller = RideWorkflowController::new(
        session,
        &config.workflow,
        Arc::clone(&api),
        Arc::clone(&api),
        api,
    );

    for (field, text) in [
        (AddressField::Pickup, args.pickup),
        (AddressField::Dropoff, args.dropoff),
    ] {
        if args.pick_first {
            controller.edit_address(field, text.clone())?;
            controller.next_suggestions().await;
            match controller.suggestions(field).first().cloned() {
                Some(candidate) => controller.select_address(field, &candidate)?,
                None => controller.enter_address(field, text)?,
            }
        } else {
            controller.enter_address(field, text)?;
        }
    }
    controller.set_passenger_count(args.passengers)?;
    controller.set_accessibility_required(args.accessible)?;
    controller.set_requested_time(args.pickup_time.unwrap_or_else(Utc::now))?;

    follow_ride(&mut controller, !args.no_follow).await
}

/// Consecutive failed status checks after which the CLI stops following a ride.
const MAX_CONSECUTIVE_FEED_ERRORS: u32 = 5;

/// Submit the composed draft and print each status until the ride ends.
pub(crate) async fn follow_ride<G, S, T>(
    controller: &mut RideWorkflowController<G, S, T>,
    follow: bool,
) -> Result<(), AppError>
where
    G: GeocodingGateway + 'static,
    S: RideServiceGateway + 'static,
    T: RideStatusGateway + 'static,
{
    let draft = controller.draft().clone();
    println!(
        "Requesting a ride from '{}' to '{}' for {} passenger(s)",
        draft.pickup,
        draft.dropoff,
        draft.passenger_count.get()
    );

    controller.submit().await?;
    if let Some(outcome) = controller.last_outcome() {
        println!("{}", outcome.summary());
        if let RideOutcome::Created {
            ride_code: Some(code),
            ..
        }
        | RideOutcome::Queued {
            ride_code: Some(code),
            ..
        } = outcome
        {
            println!("Ride code: {code}");
        }
    }
    if let Some(notice) = controller.notice() {
        println!("Notice: {notice}");
    }
    if !follow {
        return Ok(());
    }

    let mut resumed = false;
    let mut failures = 0;
    loop {
        match controller.next_status_update().await {
            Some(TrackingEvent::Advanced { to, .. }) => {
                failures = 0;
                println!("Status: {to}");
            }
            Some(TrackingEvent::Ended(status)) => {
                println!("Ride finished: {status}");
                return Ok(());
            }
            Some(TrackingEvent::FeedError(err)) => {
                failures += 1;
                println!("Status check failed: {err}");
                if failures >= MAX_CONSECUTIVE_FEED_ERRORS {
                    println!("Status checks keep failing; stopped following the ride.");
                    controller.teardown();
                    return Ok(());
                }
            }
            Some(TrackingEvent::FeedClosed) | None if !resumed => {
                resumed = true;
                println!("Status feed interrupted; reconnecting");
                controller.resume_tracking().await?;
            }
            Some(TrackingEvent::FeedClosed) | None => {
                println!("Status feed unavailable; stopped following the ride.");
                return Ok(());
            }
        }
    }
}
