//! Ride request and assignment workflow.
//!
//! A rider composes a [`RideRequestDraft`] with address suggestions, submits it once, and the
//! accepted ride is followed through its monotonic [`RideStatus`] lifecycle.
//! [`RideWorkflowController`] sequences the components; each one is usable on its own.

pub mod controller;
pub mod domain;
pub mod http;
pub mod ports;
pub mod submitter;
pub mod suggester;
pub mod tracker;

#[cfg(test)]
mod tests;

pub use controller::{RideWorkflowController, TrackingEvent, WorkflowError, WorkflowPhase};
pub use domain::{
    AddressCandidate, AddressField, AddressQuery, DraftIssue, DraftValidationError,
    PassengerCount, RideId, RideOutcome, RideRequestDraft, RideStatus, Session,
    DEFAULT_REJECTION_REASON, MAX_PASSENGERS, MIN_PASSENGERS,
};
pub use http::HttpRideApi;
pub use ports::{
    GatewayError, GeocodingGateway, RideCreation, RideDecision, RideServiceGateway,
    RideStatusGateway, SessionStore, SessionStoreError, StatusSubscription,
};
pub use submitter::{classify, RideRequestSubmitter, SubmissionError};
pub use suggester::{AddressSuggester, SuggestionBatch, SuggestionBoard, SuggestionTicket};
pub use tracker::{
    CancelError, InvalidTransitionError, RideLifecycleTracker, StatusChange,
};
