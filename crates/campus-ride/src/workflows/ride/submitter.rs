use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::domain::{
    DraftIssue, DraftValidationError, RideId, RideOutcome, RideRequestDraft, Session,
    DEFAULT_REJECTION_REASON,
};
use super::ports::{GatewayError, RideCreation, RideDecision, RideServiceGateway};
use crate::config::WorkflowConfig;

/// Validates a draft, sends it exactly once, and classifies the service's decision.
///
/// Holds no ride state after returning; never retries, since a repeated request could
/// create a second ride.
pub struct RideRequestSubmitter<S> {
    service: Arc<S>,
    timeout: Duration,
}

impl<S> Clone for RideRequestSubmitter<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            timeout: self.timeout,
        }
    }
}

impl<S> RideRequestSubmitter<S>
where
    S: RideServiceGateway + 'static,
{
    pub fn new(service: Arc<S>, config: &WorkflowConfig) -> Self {
        Self {
            service,
            timeout: config.request_timeout,
        }
    }

    pub async fn submit(
        &self,
        draft: &RideRequestDraft,
        session: &Session,
    ) -> Result<RideOutcome, SubmissionError> {
        draft.validate()?;
        let request = RideCreation::from_draft(draft, session)
            .ok_or_else(|| DraftValidationError::from(DraftIssue::MissingRequestedTime))?;

        let decision =
            match tokio::time::timeout(self.timeout, self.service.create_ride(&request, session))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    warn!(
                        rider = %session.username,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "ride submission timed out"
                    );
                    return Err(SubmissionError::Network(GatewayError::Timeout));
                }
            };

        let outcome = classify(decision);
        info!(rider = %session.username, outcome = %outcome.summary(), "ride request classified");
        Ok(outcome)
    }
}

/// Map the explicit `outcome` discriminator onto the three-way result.
///
/// A `created` or `queued` answer missing the fields that make it trackable is treated as a
/// rejection so the rider is never moved into tracking without a ride id.
pub fn classify(decision: RideDecision) -> RideOutcome {
    let RideDecision {
        outcome,
        ride_id,
        driver_name,
        queue_position,
        ride_code,
        reason,
    } = decision;

    let ride_id = ride_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(RideId);
    let driver_name = driver_name.filter(|name| !name.trim().is_empty());
    let kind = outcome
        .as_deref()
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match (kind.as_str(), ride_id, queue_position) {
        ("created", Some(ride_id), _) => RideOutcome::Created {
            ride_id,
            driver_name,
            ride_code,
        },
        ("queued", Some(ride_id), Some(queue_position)) => RideOutcome::Queued {
            ride_id,
            queue_position,
            driver_name,
            ride_code,
        },
        ("created" | "queued", _, _) => {
            warn!(outcome = %kind, "ride service accepted the request without tracking details");
            RideOutcome::Rejected {
                reason: "The ride service response was incomplete. Please try again.".to_string(),
            }
        }
        _ => RideOutcome::Rejected {
            reason: reason
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string()),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] DraftValidationError),
    #[error("ride service unreachable: {0}")]
    Network(#[from] GatewayError),
}
