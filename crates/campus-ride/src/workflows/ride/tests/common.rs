use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;

use crate::config::WorkflowConfig;
use crate::workflows::ride::domain::{
    AddressCandidate, PassengerCount, RideId, RideRequestDraft, RideStatus, Session,
};
use crate::workflows::ride::ports::{
    GatewayError, GeocodingGateway, RideCreation, RideDecision, RideServiceGateway,
    RideStatusGateway, StatusSubscription,
};
use crate::workflows::ride::RideWorkflowController;

pub(super) type StatusFeed = mpsc::Sender<Result<RideStatus, GatewayError>>;

pub(super) fn session() -> Session {
    Session {
        access_token: "access-token".to_string(),
        refresh_token: "refresh-token".to_string(),
        username: "jdoe".to_string(),
        rider_id: "rider-42".to_string(),
    }
}

pub(super) fn config() -> WorkflowConfig {
    WorkflowConfig {
        suggestion_debounce: Duration::ZERO,
        ..WorkflowConfig::default()
    }
}

pub(super) fn pickup_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 18, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn draft() -> RideRequestDraft {
    RideRequestDraft {
        pickup: "Library".to_string(),
        dropoff: "Student Center".to_string(),
        passenger_count: PassengerCount::new(2).expect("valid count"),
        accessibility_required: false,
        requested_time: Some(pickup_time()),
    }
}

pub(super) fn candidate(id: &str, description: &str) -> AddressCandidate {
    AddressCandidate {
        id: id.to_string(),
        description: description.to_string(),
    }
}

pub(super) fn created(ride_id: &str, driver: Option<&str>) -> RideDecision {
    RideDecision {
        outcome: Some("created".to_string()),
        ride_id: Some(ride_id.to_string()),
        driver_name: driver.map(ToOwned::to_owned),
        ..RideDecision::default()
    }
}

pub(super) fn queued(ride_id: &str, position: u32) -> RideDecision {
    RideDecision {
        outcome: Some("queued".to_string()),
        ride_id: Some(ride_id.to_string()),
        queue_position: Some(position),
        ..RideDecision::default()
    }
}

pub(super) fn rejected(reason: Option<&str>) -> RideDecision {
    RideDecision {
        outcome: Some("rejected".to_string()),
        reason: reason.map(ToOwned::to_owned),
        ..RideDecision::default()
    }
}

/// Geocoder answering from a fixed table, optionally after a delay.
#[derive(Default)]
pub(super) struct FakeGeocoder {
    answers: Mutex<HashMap<String, Result<Vec<AddressCandidate>, GatewayError>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGeocoder {
    pub fn answer(&self, text: &str, candidates: Vec<AddressCandidate>) {
        self.answers
            .lock()
            .expect("answers lock")
            .insert(text.to_string(), Ok(candidates));
    }

    pub fn fail(&self, text: &str, err: GatewayError) {
        self.answers
            .lock()
            .expect("answers lock")
            .insert(text.to_string(), Err(err));
    }

    pub fn delay(&self, text: &str, delay: Duration) {
        self.delays
            .lock()
            .expect("delays lock")
            .insert(text.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl GeocodingGateway for FakeGeocoder {
    async fn search(&self, text: &str) -> Result<Vec<AddressCandidate>, GatewayError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(text.to_string());
        let delay = self.delays.lock().expect("delays lock").get(text).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.answers
            .lock()
            .expect("answers lock")
            .get(text)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Ride service replaying scripted decisions in order.
#[derive(Default)]
pub(super) struct FakeRideService {
    script: Mutex<VecDeque<Result<RideDecision, GatewayError>>>,
    delay: Mutex<Option<Duration>>,
    requests: Mutex<Vec<RideCreation>>,
}

impl FakeRideService {
    pub fn respond(&self, decision: Result<RideDecision, GatewayError>) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(decision);
    }

    pub fn respond_after(&self, delay: Duration) {
        *self.delay.lock().expect("delay lock") = Some(delay);
    }

    pub fn requests(&self) -> Vec<RideCreation> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl RideServiceGateway for FakeRideService {
    async fn create_ride(
        &self,
        request: &RideCreation,
        _session: &Session,
    ) -> Result<RideDecision, GatewayError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let delay = *self.delay.lock().expect("delay lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Transport("no scripted decision".to_string())))
    }
}

/// Status collaborator whose feeds are driven by the test.
pub(super) struct FakeStatusGateway {
    feeds: Mutex<Vec<(RideId, Option<StatusFeed>)>>,
    watch_failure: Mutex<Option<GatewayError>>,
    cancel_result: Mutex<Result<(), GatewayError>>,
    cancelled: Mutex<Vec<RideId>>,
}

impl Default for FakeStatusGateway {
    fn default() -> Self {
        Self {
            feeds: Mutex::new(Vec::new()),
            watch_failure: Mutex::new(None),
            cancel_result: Mutex::new(Ok(())),
            cancelled: Mutex::new(Vec::new()),
        }
    }
}

impl FakeStatusGateway {
    /// Sender for the most recent subscription.
    pub fn feed(&self) -> StatusFeed {
        self.feeds
            .lock()
            .expect("feeds lock")
            .last()
            .and_then(|(_, feed)| feed.clone())
            .expect("a ride is being watched")
    }

    /// Drop the service side of the most recent feed, closing it.
    pub fn end_feed(&self) {
        if let Some((_, feed)) = self.feeds.lock().expect("feeds lock").last_mut() {
            feed.take();
        }
    }

    pub fn watch_count(&self) -> usize {
        self.feeds.lock().expect("feeds lock").len()
    }

    pub fn watched(&self) -> Vec<RideId> {
        self.feeds
            .lock()
            .expect("feeds lock")
            .iter()
            .map(|(ride, _)| ride.clone())
            .collect()
    }

    pub fn fail_next_watch(&self, err: GatewayError) {
        *self.watch_failure.lock().expect("watch lock") = Some(err);
    }

    pub fn cancel_with(&self, result: Result<(), GatewayError>) {
        *self.cancel_result.lock().expect("cancel lock") = result;
    }

    pub fn cancelled(&self) -> Vec<RideId> {
        self.cancelled.lock().expect("cancelled lock").clone()
    }
}

#[async_trait]
impl RideStatusGateway for FakeStatusGateway {
    async fn watch(
        &self,
        ride_id: &RideId,
        _session: &Session,
    ) -> Result<StatusSubscription, GatewayError> {
        if let Some(err) = self.watch_failure.lock().expect("watch lock").take() {
            return Err(err);
        }
        let (tx, rx) = mpsc::channel(8);
        self.feeds
            .lock()
            .expect("feeds lock")
            .push((ride_id.clone(), Some(tx)));
        Ok(StatusSubscription::new(rx))
    }

    async fn cancel(&self, ride_id: &RideId, _session: &Session) -> Result<(), GatewayError> {
        self.cancelled
            .lock()
            .expect("cancelled lock")
            .push(ride_id.clone());
        self.cancel_result.lock().expect("cancel lock").clone()
    }
}

pub(super) type TestController =
    RideWorkflowController<FakeGeocoder, FakeRideService, FakeStatusGateway>;

pub(super) struct Harness {
    pub controller: TestController,
    pub geocoder: Arc<FakeGeocoder>,
    pub rides: Arc<FakeRideService>,
    pub statuses: Arc<FakeStatusGateway>,
}

pub(super) fn harness_with(config: WorkflowConfig) -> Harness {
    let geocoder = Arc::new(FakeGeocoder::default());
    let rides = Arc::new(FakeRideService::default());
    let statuses = Arc::new(FakeStatusGateway::default());
    let controller = RideWorkflowController::new(
        session(),
        &config,
        Arc::clone(&geocoder),
        Arc::clone(&rides),
        Arc::clone(&statuses),
    );
    Harness {
        controller,
        geocoder,
        rides,
        statuses,
    }
}

pub(super) fn harness() -> Harness {
    harness_with(config())
}

/// Fill the controller's draft through rider intents.
pub(super) fn compose(controller: &mut TestController, pickup: &str, dropoff: &str) {
    use crate::workflows::ride::domain::AddressField;

    controller
        .select_address(AddressField::Pickup, &candidate("p", pickup))
        .expect("composing");
    controller
        .select_address(AddressField::Dropoff, &candidate("d", dropoff))
        .expect("composing");
    controller.set_passenger_count(2).expect("valid count");
    controller
        .set_requested_time(pickup_time())
        .expect("composing");
}
