use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-issued ride identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RideId(pub String);

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which address input a query or candidate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressField {
    Pickup,
    Dropoff,
}

impl AddressField {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Dropoff => "drop-off",
        }
    }
}

/// One keystroke's worth of free text. Superseded queries are dropped, never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressQuery {
    pub text: String,
    pub issued_at: DateTime<Utc>,
}

impl AddressQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            issued_at: Utc::now(),
        }
    }

    pub fn at(text: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            issued_at,
        }
    }

    /// Character count of the trimmed text, used for the short-query guard.
    pub fn significant_len(&self) -> usize {
        self.text.trim().chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressCandidate {
    pub id: String,
    pub description: String,
}

pub const MIN_PASSENGERS: u8 = 1;
pub const MAX_PASSENGERS: u8 = 5;

/// Party size, always within `MIN_PASSENGERS..=MAX_PASSENGERS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PassengerCount(u8);

impl PassengerCount {
    pub fn new(count: u8) -> Result<Self, DraftIssue> {
        if (MIN_PASSENGERS..=MAX_PASSENGERS).contains(&count) {
            Ok(Self(count))
        } else {
            Err(DraftIssue::PassengerCountOutOfRange(count))
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Stepper "+" button: stops at the maximum instead of failing.
    pub fn increment(self) -> Self {
        Self(self.0.saturating_add(1).min(MAX_PASSENGERS))
    }

    /// Stepper "-" button: stops at the minimum instead of failing.
    pub fn decrement(self) -> Self {
        Self(self.0.saturating_sub(1).max(MIN_PASSENGERS))
    }
}

impl Default for PassengerCount {
    fn default() -> Self {
        Self(MIN_PASSENGERS)
    }
}

/// Ride request being composed by the rider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RideRequestDraft {
    pub pickup: String,
    pub dropoff: String,
    pub passenger_count: PassengerCount,
    pub accessibility_required: bool,
    pub requested_time: Option<DateTime<Utc>>,
}

impl RideRequestDraft {
    pub fn address(&self, field: AddressField) -> &str {
        match field {
            AddressField::Pickup => &self.pickup,
            AddressField::Dropoff => &self.dropoff,
        }
    }

    pub fn set_address(&mut self, field: AddressField, value: impl Into<String>) {
        match field {
            AddressField::Pickup => self.pickup = value.into(),
            AddressField::Dropoff => self.dropoff = value.into(),
        }
    }

    /// Local preconditions checked before any network call.
    pub fn validate(&self) -> Result<(), DraftValidationError> {
        let pickup = self.pickup.trim();
        let dropoff = self.dropoff.trim();
        let mut issues = Vec::new();

        if pickup.is_empty() {
            issues.push(DraftIssue::MissingPickup);
        }
        if dropoff.is_empty() {
            issues.push(DraftIssue::MissingDropoff);
        }
        if !pickup.is_empty() && pickup.eq_ignore_ascii_case(dropoff) {
            issues.push(DraftIssue::SameLocations);
        }
        if self.requested_time.is_none() {
            issues.push(DraftIssue::MissingRequestedTime);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(DraftValidationError { issues })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftIssue {
    MissingPickup,
    MissingDropoff,
    SameLocations,
    MissingRequestedTime,
    PassengerCountOutOfRange(u8),
}

impl DraftIssue {
    pub fn summary(&self) -> String {
        match self {
            DraftIssue::MissingPickup => "pickup location is required".to_string(),
            DraftIssue::MissingDropoff => "drop-off location is required".to_string(),
            DraftIssue::SameLocations => {
                "pickup and drop-off must be different locations".to_string()
            }
            DraftIssue::MissingRequestedTime => "pickup time is required".to_string(),
            DraftIssue::PassengerCountOutOfRange(count) => format!(
                "passenger count {count} outside {MIN_PASSENGERS}..={MAX_PASSENGERS}"
            ),
        }
    }
}

/// Local rejection of a draft; no network round trip was spent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ride request: {}", self.summary())]
pub struct DraftValidationError {
    pub issues: Vec<DraftIssue>,
}

impl DraftValidationError {
    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(DraftIssue::summary)
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn contains(&self, issue: &DraftIssue) -> bool {
        self.issues.contains(issue)
    }
}

impl From<DraftIssue> for DraftValidationError {
    fn from(issue: DraftIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }
}

pub const DEFAULT_REJECTION_REASON: &str = "The ride service could not accept this request.";

/// The service's three-way decision for one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RideOutcome {
    Created {
        ride_id: RideId,
        driver_name: Option<String>,
        ride_code: Option<String>,
    },
    Queued {
        ride_id: RideId,
        queue_position: u32,
        driver_name: Option<String>,
        ride_code: Option<String>,
    },
    Rejected {
        reason: String,
    },
}

impl RideOutcome {
    pub fn ride_id(&self) -> Option<&RideId> {
        match self {
            RideOutcome::Created { ride_id, .. } | RideOutcome::Queued { ride_id, .. } => {
                Some(ride_id)
            }
            RideOutcome::Rejected { .. } => None,
        }
    }

    pub fn driver_name(&self) -> Option<&str> {
        match self {
            RideOutcome::Created { driver_name, .. } | RideOutcome::Queued { driver_name, .. } => {
                driver_name.as_deref()
            }
            RideOutcome::Rejected { .. } => None,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            RideOutcome::Created {
                ride_id,
                driver_name,
                ..
            } => match driver_name {
                Some(driver) => format!("ride {ride_id} confirmed with {driver}"),
                None => format!("ride {ride_id} confirmed"),
            },
            RideOutcome::Queued {
                ride_id,
                queue_position,
                ..
            } => format!("ride {ride_id} queued at position {queue_position}"),
            RideOutcome::Rejected { reason } => format!("ride rejected: {reason}"),
        }
    }
}

/// Lifecycle of a ride after the service accepted it, in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Pending,
    DriverAssigned,
    DriverEnRoute,
    InProgress,
    Completed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl RideStatus {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Pending,
            Self::DriverAssigned,
            Self::DriverEnRoute,
            Self::InProgress,
            Self::Completed,
            Self::Cancelled,
        ]
    }

    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::DriverAssigned => 1,
            Self::DriverEnRoute => 2,
            Self::InProgress => 3,
            Self::Completed => 4,
            Self::Cancelled => 5,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub const fn rider_may_cancel(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::DriverAssigned | Self::DriverEnRoute
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Waiting for a driver",
            Self::DriverAssigned => "Driver assigned",
            Self::DriverEnRoute => "Driver is on the way",
            Self::InProgress => "Ride in progress",
            Self::Completed => "Ride completed",
            Self::Cancelled => "Ride cancelled",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Signed-in rider credentials. Read-only for the ride workflow.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub username: String,
    pub rider_id: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("username", &self.username)
            .field("rider_id", &self.rider_id)
            .finish()
    }
}
