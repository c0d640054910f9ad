use std::time::Duration;

use tracing::{debug, info, warn};

use super::domain::{RideId, RideOutcome, RideStatus, Session};
use super::ports::{GatewayError, RideStatusGateway};

/// Result of feeding one status update to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Advanced { from: RideStatus, to: RideStatus },
    Ignored,
}

/// Monotonic state machine over [`RideStatus`] for one accepted ride.
#[derive(Debug, Clone)]
pub struct RideLifecycleTracker {
    ride_id: RideId,
    driver_name: Option<String>,
    status: RideStatus,
    history: Vec<RideStatus>,
}

impl RideLifecycleTracker {
    pub fn new(ride_id: RideId, driver_name: Option<String>) -> Self {
        Self {
            ride_id,
            driver_name,
            status: RideStatus::Pending,
            history: vec![RideStatus::Pending],
        }
    }

    /// Start tracking a created or queued ride; rejections have nothing to track.
    pub fn from_outcome(outcome: &RideOutcome) -> Option<Self> {
        let ride_id = outcome.ride_id()?.clone();
        Some(Self::new(
            ride_id,
            outcome.driver_name().map(ToOwned::to_owned),
        ))
    }

    pub fn ride_id(&self) -> &RideId {
        &self.ride_id
    }

    pub fn driver_name(&self) -> Option<&str> {
        self.driver_name.as_deref()
    }

    pub fn status(&self) -> RideStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Every status the ride has been in, oldest first.
    pub fn history(&self) -> &[RideStatus] {
        &self.history
    }

    /// Apply an observed status. Repeats, regressions, and anything after a terminal state
    /// are ignored so late or reordered events cannot move the ride backwards.
    pub fn apply(&mut self, update: RideStatus) -> StatusChange {
        if self.status.is_terminal() {
            debug!(ride = %self.ride_id, ?update, "ride already finished; ignoring update");
            return StatusChange::Ignored;
        }
        if update.rank() <= self.status.rank() {
            debug!(
                ride = %self.ride_id,
                current = ?self.status,
                ?update,
                "ignoring stale or duplicate status update"
            );
            return StatusChange::Ignored;
        }

        let from = self.status;
        self.status = update;
        self.history.push(update);
        info!(ride = %self.ride_id, ?from, to = ?update, "ride status advanced");
        StatusChange::Advanced { from, to: update }
    }

    /// Riders may cancel until the trip starts.
    pub fn ensure_cancellable(&self) -> Result<(), InvalidTransitionError> {
        if self.status.rider_may_cancel() {
            Ok(())
        } else {
            Err(InvalidTransitionError {
                status: self.status,
            })
        }
    }

    /// Ask the service to cancel. State only changes once the service acknowledges.
    pub async fn cancel<G>(
        &mut self,
        gateway: &G,
        session: &Session,
        timeout: Duration,
    ) -> Result<StatusChange, CancelError>
    where
        G: RideStatusGateway + ?Sized,
    {
        self.ensure_cancellable()?;

        match tokio::time::timeout(timeout, gateway.cancel(&self.ride_id, session)).await {
            Ok(Ok(())) => Ok(self.apply(RideStatus::Cancelled)),
            Ok(Err(err)) => {
                warn!(ride = %self.ride_id, error = %err, "cancellation failed");
                Err(CancelError::Network(err))
            }
            Err(_) => {
                warn!(ride = %self.ride_id, "cancellation timed out");
                Err(CancelError::Network(GatewayError::Timeout))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot cancel a ride in state {status:?}")]
pub struct InvalidTransitionError {
    pub status: RideStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CancelError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransitionError),
    #[error("cancellation not confirmed: {0}")]
    Network(#[from] GatewayError),
}
