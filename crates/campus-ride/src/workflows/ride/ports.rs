//! Boundaries to the remote collaborators the ride workflow consumes.
//!
//! Each trait is deliberately narrow so screens, tests, and the HTTP adapters in
//! [`super::http`] can stand in for the real services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::domain::{AddressCandidate, RideId, RideRequestDraft, RideStatus, Session};

/// Free text to candidate addresses.
#[async_trait]
pub trait GeocodingGateway: Send + Sync {
    async fn search(&self, text: &str) -> Result<Vec<AddressCandidate>, GatewayError>;
}

/// Ride creation endpoint.
#[async_trait]
pub trait RideServiceGateway: Send + Sync {
    async fn create_ride(
        &self,
        request: &RideCreation,
        session: &Session,
    ) -> Result<RideDecision, GatewayError>;
}

/// Live status feed and rider cancellation for one ride.
#[async_trait]
pub trait RideStatusGateway: Send + Sync {
    async fn watch(
        &self,
        ride_id: &RideId,
        session: &Session,
    ) -> Result<StatusSubscription, GatewayError>;

    async fn cancel(&self, ride_id: &RideId, session: &Session) -> Result<(), GatewayError>;
}

/// Read access to the persisted rider session.
pub trait SessionStore: Send + Sync {
    fn session(&self) -> Result<Session, SessionStoreError>;
}

/// Wire-level payload sent when a draft is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RideCreation {
    pub username: String,
    pub rider_id: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub num_passengers: u8,
    #[serde(rename = "ADA_required")]
    pub ada_required: bool,
    pub pickup_time: DateTime<Utc>,
}

impl RideCreation {
    /// Returns `None` when the draft has no requested time; validate first.
    pub fn from_draft(draft: &RideRequestDraft, session: &Session) -> Option<Self> {
        Some(Self {
            username: session.username.clone(),
            rider_id: session.rider_id.clone(),
            pickup_location: draft.pickup.trim().to_string(),
            dropoff_location: draft.dropoff.trim().to_string(),
            num_passengers: draft.passenger_count.get(),
            ada_required: draft.accessibility_required,
            pickup_time: draft.requested_time?,
        })
    }
}

/// Raw decision returned by the ride service before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideDecision {
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub ride_id: Option<String>,
    #[serde(default, alias = "driver")]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub ride_code: Option<String>,
    #[serde(default, alias = "message", alias = "error")]
    pub reason: Option<String>,
}

/// Cancellable handle over a ride's status feed.
///
/// Dropping the subscription aborts the producer task, if any.
#[derive(Debug)]
pub struct StatusSubscription {
    updates: mpsc::Receiver<Result<RideStatus, GatewayError>>,
    producer: Option<JoinHandle<()>>,
}

impl StatusSubscription {
    pub fn new(updates: mpsc::Receiver<Result<RideStatus, GatewayError>>) -> Self {
        Self {
            updates,
            producer: None,
        }
    }

    pub fn with_producer(
        updates: mpsc::Receiver<Result<RideStatus, GatewayError>>,
        producer: JoinHandle<()>,
    ) -> Self {
        Self {
            updates,
            producer: Some(producer),
        }
    }

    /// Next update, or `None` once the feed has closed.
    pub async fn next(&mut self) -> Option<Result<RideStatus, GatewayError>> {
        self.updates.recv().await
    }

    pub fn close(&mut self) {
        self.updates.close();
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Collaborator failure. Always transient from the workflow's point of view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response payload: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionStoreError {
    #[error("no signed-in rider session")]
    Missing,
    #[error("session field '{0}' is empty")]
    Incomplete(&'static str),
}
