//! Reqwest-backed adapters for the campus ride backend.
//!
//! One client serves all three remote collaborators; it owns transport details only (URL
//! building, bearer auth, status mapping, JSON decoding).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use super::domain::{AddressCandidate, RideId, RideStatus, Session};
use super::ports::{
    GatewayError, GeocodingGateway, RideCreation, RideDecision, RideServiceGateway,
    RideStatusGateway, StatusSubscription,
};
use crate::config::AppConfig;

const STATUS_FEED_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct HttpRideApi {
    client: Client,
    base: Url,
    poll_interval: Duration,
}

impl HttpRideApi {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base: Url,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base,
            poll_interval,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            config.api.base_url.clone(),
            config.workflow.request_timeout,
            config.workflow.status_poll_interval,
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                GatewayError::Transport(format!("base url {} cannot carry a path", self.base))
            })?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct PredictionsDto {
    #[serde(default)]
    predictions: Vec<PredictionDto>,
}

#[derive(Debug, Deserialize)]
struct PredictionDto {
    place_id: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct StatusDto {
    status: RideStatus,
}

#[async_trait]
impl GeocodingGateway for HttpRideApi {
    async fn search(&self, text: &str) -> Result<Vec<AddressCandidate>, GatewayError> {
        let mut url = self.endpoint(&["locations", "search"])?;
        url.query_pairs_mut().append_pair("query", text);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }

        let decoded: PredictionsDto = serde_json::from_slice(&body)
            .map_err(|err| GatewayError::Decode(format!("invalid predictions payload: {err}")))?;
        Ok(decoded
            .predictions
            .into_iter()
            .map(|prediction| AddressCandidate {
                id: prediction.place_id,
                description: prediction.description,
            })
            .collect())
    }
}

#[async_trait]
impl RideServiceGateway for HttpRideApi {
    async fn create_ride(
        &self,
        request: &RideCreation,
        session: &Session,
    ) -> Result<RideDecision, GatewayError> {
        let url = self.endpoint(&["rides", "create"])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&session.access_token)
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;

        if status.is_success() {
            return serde_json::from_slice(&body)
                .map_err(|err| GatewayError::Decode(format!("invalid ride decision: {err}")));
        }
        if status.is_client_error() {
            // The backend reports rejections with 4xx; an unreadable body still rejects.
            let decision = serde_json::from_slice(&body).unwrap_or_else(|err| {
                debug!(
                    status = status.as_u16(),
                    error = %err,
                    "rejection body was not a ride decision"
                );
                RideDecision::default()
            });
            return Ok(decision);
        }
        Err(map_status_error(status, &body))
    }
}

#[async_trait]
impl RideStatusGateway for HttpRideApi {
    async fn watch(
        &self,
        ride_id: &RideId,
        session: &Session,
    ) -> Result<StatusSubscription, GatewayError> {
        let url = self.endpoint(&["rides", ride_id.0.as_str(), "status"])?;
        let (tx, rx) = mpsc::channel(STATUS_FEED_CAPACITY);
        let producer = spawn_status_poller(
            self.client.clone(),
            url,
            session.access_token.clone(),
            self.poll_interval,
            tx,
        );
        Ok(StatusSubscription::with_producer(rx, producer))
    }

    async fn cancel(&self, ride_id: &RideId, session: &Session) -> Result<(), GatewayError> {
        let url = self.endpoint(&["rides", ride_id.0.as_str(), "cancel"])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await.map_err(map_transport_error)?;
        Err(map_status_error(status, &body))
    }
}

/// Poll the status endpoint, forwarding changes and errors until the ride ends or the
/// subscriber goes away.
fn spawn_status_poller(
    client: Client,
    url: Url,
    access_token: String,
    interval: Duration,
    feed: mpsc::Sender<Result<RideStatus, GatewayError>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_seen: Option<RideStatus> = None;
        loop {
            match fetch_status(&client, &url, &access_token).await {
                Ok(status) if last_seen == Some(status) => {}
                Ok(status) => {
                    last_seen = Some(status);
                    if feed.send(Ok(status)).await.is_err() || status.is_terminal() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "ride status poll failed");
                    if feed.send(Err(err)).await.is_err() {
                        break;
                    }
                }
            }
            tokio::time::sleep(interval).await;
        }
        debug!(url = %url, "ride status poller stopped");
    })
}

async fn fetch_status(
    client: &Client,
    url: &Url,
    access_token: &str,
) -> Result<RideStatus, GatewayError> {
    let response = client
        .get(url.clone())
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(map_transport_error)?;
    let status = response.status();
    let body = response.bytes().await.map_err(map_transport_error)?;
    if !status.is_success() {
        return Err(map_status_error(status, &body));
    }
    let decoded: StatusDto = serde_json::from_slice(&body)
        .map_err(|err| GatewayError::Decode(format!("invalid ride status payload: {err}")))?;
    Ok(decoded.status)
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> GatewayError {
    let message = String::from_utf8_lossy(body).trim().to_string();
    GatewayError::Status {
        status: status.as_u16(),
        message: if message.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string()
        } else {
            message
        },
    }
}
