use std::env;
use std::time::Duration;

use async_trait::async_trait;
use campus_ride::workflows::ride::{
    AddressCandidate, GatewayError, GeocodingGateway, RideCreation, RideDecision, RideId,
    RideServiceGateway, RideStatus, RideStatusGateway, Session, SessionStore, SessionStoreError,
    StatusSubscription,
};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Session persisted by the sign-in flow and exported as `RIDER_*` variables.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct EnvSessionStore;

impl SessionStore for EnvSessionStore {
    fn session(&self) -> Result<Session, SessionStoreError> {
        let access_token =
            env::var("RIDER_ACCESS_TOKEN").map_err(|_| SessionStoreError::Missing)?;
        let session = Session {
            access_token,
            refresh_token: env::var("RIDER_REFRESH_TOKEN").unwrap_or_default(),
            username: env::var("RIDER_USERNAME").unwrap_or_default(),
            rider_id: env::var("RIDER_ID").unwrap_or_default(),
        };

        for (key, value) in [
            ("RIDER_ACCESS_TOKEN", &session.access_token),
            ("RIDER_USERNAME", &session.username),
            ("RIDER_ID", &session.rider_id),
        ] {
            if value.trim().is_empty() {
                return Err(SessionStoreError::Incomplete(key));
            }
        }
        Ok(session)
    }
}

pub(crate) fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

const CAMPUS_PLACES: &[(&str, &str)] = &[
    ("lib-main", "Library, 100 University Ave"),
    ("lib-law", "Law Library, 12 Court St"),
    ("stu-center", "Student Center, 1 Campus Way"),
    ("stu-health", "Student Health Services, 40 Elm Dr"),
    ("rec-center", "Recreation Center, 300 Stadium Rd"),
    ("eng-hall", "Engineering Hall, 55 Tech Loop"),
];

/// Scripted backend used by the demo: fixed campus places, a decision chosen up front, and a
/// status feed that walks the ride to completion.
#[derive(Debug, Clone)]
pub(crate) struct DemoBackend {
    decision: RideDecision,
    step: Duration,
}

impl DemoBackend {
    pub(crate) fn new(decision: RideDecision, step: Duration) -> Self {
        Self { decision, step }
    }

    pub(crate) fn decision(&self) -> &RideDecision {
        &self.decision
    }

    pub(crate) fn queued(position: u32, step: Duration) -> Self {
        Self::new(
            RideDecision {
                outcome: Some("queued".to_string()),
                ride_id: Some("R1".to_string()),
                queue_position: Some(position),
                ..RideDecision::default()
            },
            step,
        )
    }
}

#[async_trait]
impl GeocodingGateway for DemoBackend {
    async fn search(&self, text: &str) -> Result<Vec<AddressCandidate>, GatewayError> {
        let needle = text.to_lowercase();
        Ok(CAMPUS_PLACES
            .iter()
            .filter(|(_, description)| description.to_lowercase().contains(&needle))
            .map(|(id, description)| AddressCandidate {
                id: (*id).to_string(),
                description: (*description).to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl RideServiceGateway for DemoBackend {
    async fn create_ride(
        &self,
        _request: &RideCreation,
        _session: &Session,
    ) -> Result<RideDecision, GatewayError> {
        tokio::time::sleep(self.step).await;
        Ok(self.decision.clone())
    }
}

#[async_trait]
impl RideStatusGateway for DemoBackend {
    async fn watch(
        &self,
        _ride_id: &RideId,
        _session: &Session,
    ) -> Result<StatusSubscription, GatewayError> {
        let (tx, rx) = mpsc::channel(8);
        let step = self.step;
        let producer = tokio::spawn(async move {
            for status in [
                RideStatus::Pending,
                RideStatus::DriverAssigned,
                RideStatus::DriverEnRoute,
                RideStatus::InProgress,
                RideStatus::Completed,
            ] {
                tokio::time::sleep(step).await;
                if tx.send(Ok(status)).await.is_err() {
                    break;
                }
            }
        });
        Ok(StatusSubscription::with_producer(rx, producer))
    }

    async fn cancel(&self, _ride_id: &RideId, _session: &Session) -> Result<(), GatewayError> {
        Ok(())
    }
}
