use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

use super::domain::{
    AddressCandidate, AddressField, AddressQuery, DraftValidationError, PassengerCount,
    RideOutcome, RideRequestDraft, RideStatus, Session, DEFAULT_REJECTION_REASON,
};
use super::ports::{
    GatewayError, GeocodingGateway, RideServiceGateway, RideStatusGateway, StatusSubscription,
};
use super::submitter::{RideRequestSubmitter, SubmissionError};
use super::suggester::{AddressSuggester, SuggestionBatch, SuggestionBoard};
use super::tracker::{CancelError, InvalidTransitionError, RideLifecycleTracker, StatusChange};
use crate::config::WorkflowConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Coarse state a rider screen renders against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Composing,
    Submitting,
    Tracking,
    Rejected,
}

impl WorkflowPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Composing => "Composing",
            Self::Submitting => "Submitting",
            Self::Tracking => "Tracking",
            Self::Rejected => "Rejected",
        }
    }
}

/// What happened when the controller consumed the next item of the status feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingEvent {
    Advanced { from: RideStatus, to: RideStatus },
    /// Terminal status reached; the controller is back in `Composing`.
    Ended(RideStatus),
    FeedError(GatewayError),
    /// The feed stopped before the ride finished; see [`RideWorkflowController::resume_tracking`].
    FeedClosed,
}

/// User-visible failure. Never fatal: the worst case returns the rider to `Composing`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] DraftValidationError),
    #[error("network problem: {0}")]
    Network(#[from] GatewayError),
    #[error("cannot {action} while {}", .phase.label().to_lowercase())]
    Conflict {
        action: &'static str,
        phase: WorkflowPhase,
    },
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransitionError),
    #[error("ride request declined: {reason}")]
    RejectedByService { reason: String },
}

struct ActiveRide {
    tracker: RideLifecycleTracker,
    submitted: RideRequestDraft,
    subscription: Option<StatusSubscription>,
}

type SubmissionReply = (RideRequestDraft, Result<RideOutcome, SubmissionError>);

/// End-to-end ride request flow for one rider session.
///
/// Holds one draft and at most one tracked ride. Methods that spawn work (address lookups,
/// submission, status feeds) must run inside a Tokio runtime.
pub struct RideWorkflowController<G, S, T> {
    session: Session,
    config: WorkflowConfig,
    suggester: AddressSuggester<G>,
    submitter: RideRequestSubmitter<S>,
    statuses: Arc<T>,
    draft: RideRequestDraft,
    board: SuggestionBoard,
    batches_tx: mpsc::UnboundedSender<SuggestionBatch>,
    batches_rx: mpsc::UnboundedReceiver<SuggestionBatch>,
    phase_tx: watch::Sender<WorkflowPhase>,
    pending_submission: Option<oneshot::Receiver<SubmissionReply>>,
    active: Option<ActiveRide>,
    finished: Option<RideLifecycleTracker>,
    last_outcome: Option<RideOutcome>,
    last_error: Option<WorkflowError>,
}

impl<G, S, T> RideWorkflowController<G, S, T>
where
    G: GeocodingGateway + 'static,
    S: RideServiceGateway + 'static,
    T: RideStatusGateway + 'static,
{
    pub fn new(
        session: Session,
        config: &WorkflowConfig,
        geocoding: Arc<G>,
        rides: Arc<S>,
        statuses: Arc<T>,
    ) -> Self {
        let (batches_tx, batches_rx) = mpsc::unbounded_channel();
        let (phase_tx, _) = watch::channel(WorkflowPhase::Composing);
        Self {
            session,
            config: config.clone(),
            suggester: AddressSuggester::new(geocoding, config),
            submitter: RideRequestSubmitter::new(rides, config),
            statuses,
            draft: RideRequestDraft::default(),
            board: SuggestionBoard::default(),
            batches_tx,
            batches_rx,
            phase_tx,
            pending_submission: None,
            active: None,
            finished: None,
            last_outcome: None,
            last_error: None,
        }
    }

    pub fn phase(&self) -> WorkflowPhase {
        *self.phase_tx.borrow()
    }

    /// Observe every phase change from another task.
    pub fn subscribe_phase(&self) -> watch::Receiver<WorkflowPhase> {
        self.phase_tx.subscribe()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn draft(&self) -> &RideRequestDraft {
        &self.draft
    }

    pub fn suggestions(&self, field: AddressField) -> &[AddressCandidate] {
        self.board.candidates(field)
    }

    pub fn tracker(&self) -> Option<&RideLifecycleTracker> {
        self.active.as_ref().map(|active| &active.tracker)
    }

    pub fn ride_status(&self) -> Option<RideStatus> {
        self.tracker().map(RideLifecycleTracker::status)
    }

    /// The draft that produced the ride currently being tracked.
    pub fn submitted_draft(&self) -> Option<&RideRequestDraft> {
        self.active.as_ref().map(|active| &active.submitted)
    }

    /// The most recent ride that reached a terminal state.
    pub fn finished_ride(&self) -> Option<&RideLifecycleTracker> {
        self.finished.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&RideOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn last_error(&self) -> Option<&WorkflowError> {
        self.last_error.as_ref()
    }

    /// Explanatory message for the rider, if the last action failed.
    pub fn notice(&self) -> Option<String> {
        self.last_error.as_ref().map(ToString::to_string)
    }

    // ---- composing ----

    /// Rider typed into an address field: update the draft and start a lookup.
    pub fn edit_address(
        &mut self,
        field: AddressField,
        text: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        let text = text.into();
        self.ensure_composing("edit the ride request")?;
        self.draft.set_address(field, text.clone());
        self.request_suggestions(field, AddressQuery::new(text))?;
        Ok(())
    }

    /// Issue a lookup for an explicit query, superseding the field's previous one.
    /// Returns whether the query is long enough to reach the geocoder.
    pub fn request_suggestions(
        &mut self,
        field: AddressField,
        query: AddressQuery,
    ) -> Result<bool, WorkflowError> {
        self.ensure_composing("look up addresses")?;
        let ticket = self.board.issue(field, query);

        let reaches_network = self.suggester.reaches_network(&ticket.query);
        if reaches_network {
            let task = self.suggester.spawn(ticket.clone(), self.batches_tx.clone());
            self.board.track(&ticket, task);
        } else {
            self.board.apply(SuggestionBatch {
                ticket,
                candidates: Vec::new(),
            });
        }
        Ok(reaches_network)
    }

    /// Apply every lookup that has already answered. Returns the fields that changed.
    pub fn poll_suggestions(&mut self) -> Vec<AddressField> {
        let mut updated = Vec::new();
        while let Ok(batch) = self.batches_rx.try_recv() {
            let field = batch.ticket.field;
            if self.board.apply(batch) && !updated.contains(&field) {
                updated.push(field);
            }
        }
        updated
    }

    /// Wait for the next current lookup to answer. `None` when nothing is outstanding.
    pub async fn next_suggestions(&mut self) -> Option<AddressField> {
        loop {
            if !self.board.has_pending(AddressField::Pickup)
                && !self.board.has_pending(AddressField::Dropoff)
            {
                return None;
            }
            let batch = self.batches_rx.recv().await?;
            let field = batch.ticket.field;
            if self.board.apply(batch) {
                return Some(field);
            }
        }
    }

    /// Rider picked a suggestion. Late answers for the field can no longer overwrite it.
    pub fn select_address(
        &mut self,
        field: AddressField,
        candidate: &AddressCandidate,
    ) -> Result<(), WorkflowError> {
        self.enter_address(field, candidate.description.clone())
    }

    /// Rider committed free text without picking a suggestion; no lookup is issued.
    pub fn enter_address(
        &mut self,
        field: AddressField,
        text: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        self.ensure_composing("edit the ride request")?;
        self.draft.set_address(field, text);
        self.board.settle(field);
        Ok(())
    }

    /// Rider dismissed a rejection without editing; the kept draft is composable again.
    pub fn acknowledge_rejection(&mut self) -> Result<WorkflowPhase, WorkflowError> {
        if self.phase() != WorkflowPhase::Rejected {
            let phase = self.phase();
            return Err(self.fail(WorkflowError::Conflict {
                action: "acknowledge a rejection",
                phase,
            }));
        }
        self.transition(WorkflowPhase::Composing);
        Ok(WorkflowPhase::Composing)
    }

    pub fn set_passenger_count(&mut self, count: u8) -> Result<(), WorkflowError> {
        self.ensure_composing("edit the ride request")?;
        match PassengerCount::new(count) {
            Ok(count) => self.draft.passenger_count = count,
            Err(issue) => {
                return Err(self.fail(WorkflowError::Validation(DraftValidationError::from(
                    issue,
                ))))
            }
        }
        Ok(())
    }

    pub fn add_passenger(&mut self) -> Result<u8, WorkflowError> {
        self.ensure_composing("edit the ride request")?;
        self.draft.passenger_count = self.draft.passenger_count.increment();
        Ok(self.draft.passenger_count.get())
    }

    pub fn remove_passenger(&mut self) -> Result<u8, WorkflowError> {
        self.ensure_composing("edit the ride request")?;
        self.draft.passenger_count = self.draft.passenger_count.decrement();
        Ok(self.draft.passenger_count.get())
    }

    pub fn set_accessibility_required(&mut self, required: bool) -> Result<(), WorkflowError> {
        self.ensure_composing("edit the ride request")?;
        self.draft.accessibility_required = required;
        Ok(())
    }

    pub fn set_requested_time(&mut self, at: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.ensure_composing("edit the ride request")?;
        self.draft.requested_time = Some(at);
        Ok(())
    }

    // ---- submitting ----

    /// Submit the current draft once. Failures leave the draft intact in `Composing`, service
    /// rejections leave it intact in `Rejected`; accepted rides move to `Tracking` at `Pending`.
    /// Submitting from `Rejected` is the rider's explicit resubmission.
    ///
    /// The request runs on its own task: if this future is dropped mid-flight the response is
    /// still classified, and [`Self::finish_submission`] collects it.
    pub async fn submit(&mut self) -> Result<WorkflowPhase, WorkflowError> {
        if self.active.is_some() {
            return Err(self.fail(WorkflowError::Conflict {
                action: "request another ride",
                phase: WorkflowPhase::Tracking,
            }));
        }
        self.ensure_composing("submit a ride request")?;

        if let Err(err) = self.draft.validate() {
            return Err(self.fail(WorkflowError::Validation(err)));
        }

        let draft = self.draft.clone();
        let session = self.session.clone();
        let submitter = self.submitter.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        self.board.clear();
        self.last_error = None;
        self.transition(WorkflowPhase::Submitting);

        tokio::spawn(async move {
            let result = submitter.submit(&draft, &session).await;
            if let Err((_, result)) = reply_tx.send((draft, result)) {
                match result {
                    Ok(outcome) => warn!(
                        rider = %session.username,
                        outcome = %outcome.summary(),
                        "ride outcome arrived after the rider left the screen"
                    ),
                    Err(err) => warn!(
                        rider = %session.username,
                        error = %err,
                        "ride submission failed after the rider left the screen"
                    ),
                }
            }
        });

        self.pending_submission = Some(reply_rx);
        self.finish_submission().await
    }

    /// Await the in-flight submission, if any, and apply its outcome.
    pub async fn finish_submission(&mut self) -> Result<WorkflowPhase, WorkflowError> {
        let Some(reply) = self.pending_submission.as_mut() else {
            return Err(WorkflowError::Conflict {
                action: "collect a submission",
                phase: self.phase(),
            });
        };
        let received = reply.await;
        self.pending_submission = None;

        match received {
            Ok((submitted, Ok(outcome))) => self.accept_outcome(submitted, outcome).await,
            Ok((_, Err(SubmissionError::Validation(err)))) => {
                self.transition(WorkflowPhase::Composing);
                Err(self.fail(WorkflowError::Validation(err)))
            }
            Ok((_, Err(SubmissionError::Network(err)))) => {
                self.transition(WorkflowPhase::Composing);
                Err(self.fail(WorkflowError::Network(err)))
            }
            Err(_) => {
                self.transition(WorkflowPhase::Composing);
                Err(self.fail(WorkflowError::Network(GatewayError::Transport(
                    "submission ended without a response".to_string(),
                ))))
            }
        }
    }

    async fn accept_outcome(
        &mut self,
        submitted: RideRequestDraft,
        outcome: RideOutcome,
    ) -> Result<WorkflowPhase, WorkflowError> {
        self.last_outcome = Some(outcome.clone());

        let Some(tracker) = RideLifecycleTracker::from_outcome(&outcome) else {
            let reason = match outcome {
                RideOutcome::Rejected { reason } => reason,
                _ => DEFAULT_REJECTION_REASON.to_string(),
            };
            // Stays in Rejected until the rider acts on the kept draft.
            self.transition(WorkflowPhase::Rejected);
            return Err(self.fail(WorkflowError::RejectedByService { reason }));
        };

        self.draft = RideRequestDraft::default();
        self.active = Some(ActiveRide {
            tracker,
            submitted,
            subscription: None,
        });
        self.transition(WorkflowPhase::Tracking);

        // A failed subscription keeps the ride tracked; the rider can resume later.
        if let Err(err) = self.subscribe().await {
            warn!(error = %err, "ride accepted but status feed unavailable");
        }
        Ok(WorkflowPhase::Tracking)
    }

    // ---- tracking ----

    async fn subscribe(&mut self) -> Result<(), WorkflowError> {
        let Some(ride_id) = self
            .active
            .as_ref()
            .map(|active| active.tracker.ride_id().clone())
        else {
            return Ok(());
        };

        let watched = tokio::time::timeout(
            self.config.request_timeout,
            self.statuses.watch(&ride_id, &self.session),
        )
        .await;

        match watched {
            Ok(Ok(subscription)) => {
                if let Some(active) = self.active.as_mut() {
                    active.subscription = Some(subscription);
                }
                Ok(())
            }
            Ok(Err(err)) => Err(self.fail(WorkflowError::Network(err))),
            Err(_) => Err(self.fail(WorkflowError::Network(GatewayError::Timeout))),
        }
    }

    /// Re-open the status feed after it closed or failed to open.
    pub async fn resume_tracking(&mut self) -> Result<(), WorkflowError> {
        match self.active.as_ref() {
            None => Err(WorkflowError::Conflict {
                action: "resume tracking",
                phase: self.phase(),
            }),
            Some(active) if active.subscription.is_some() => Ok(()),
            Some(_) => {
                self.last_error = None;
                self.subscribe().await
            }
        }
    }

    /// Feed a status observed outside the subscription (e.g. a push notification).
    pub fn observe_status(&mut self, status: RideStatus) -> Option<TrackingEvent> {
        let change = self.active.as_mut()?.tracker.apply(status);
        self.after_change(change)
    }

    /// Wait for the next status item and apply it. `None` when no feed is open.
    pub async fn next_status_update(&mut self) -> Option<TrackingEvent> {
        loop {
            let item = {
                let subscription = self.active.as_mut()?.subscription.as_mut()?;
                subscription.next().await
            };

            match item {
                Some(Ok(status)) => {
                    let change = self.active.as_mut()?.tracker.apply(status);
                    if let Some(event) = self.after_change(change) {
                        return Some(event);
                    }
                }
                Some(Err(err)) => {
                    self.fail(WorkflowError::Network(err.clone()));
                    return Some(TrackingEvent::FeedError(err));
                }
                None => {
                    if let Some(active) = self.active.as_mut() {
                        active.subscription = None;
                    }
                    self.fail(WorkflowError::Network(GatewayError::Transport(
                        "ride status feed closed".to_string(),
                    )));
                    return Some(TrackingEvent::FeedClosed);
                }
            }
        }
    }

    fn after_change(&mut self, change: StatusChange) -> Option<TrackingEvent> {
        match change {
            StatusChange::Ignored => None,
            StatusChange::Advanced { to, .. } if to.is_terminal() => {
                self.finish_tracking();
                Some(TrackingEvent::Ended(to))
            }
            StatusChange::Advanced { from, to } => Some(TrackingEvent::Advanced { from, to }),
        }
    }

    /// Rider-initiated cancellation; only allowed before the trip starts.
    pub async fn cancel_ride(&mut self) -> Result<RideStatus, WorkflowError> {
        let Some(active) = self.active.as_mut() else {
            let phase = self.phase();
            return Err(self.fail(WorkflowError::Conflict {
                action: "cancel a ride",
                phase,
            }));
        };

        let result = active
            .tracker
            .cancel(
                self.statuses.as_ref(),
                &self.session,
                self.config.request_timeout,
            )
            .await;

        match result {
            Ok(_) => {
                self.finish_tracking();
                Ok(RideStatus::Cancelled)
            }
            Err(CancelError::InvalidTransition(err)) => {
                Err(self.fail(WorkflowError::InvalidTransition(err)))
            }
            Err(CancelError::Network(err)) => Err(self.fail(WorkflowError::Network(err))),
        }
    }

    fn finish_tracking(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Some(mut subscription) = active.subscription.take() {
                subscription.close();
            }
            info!(
                ride = %active.tracker.ride_id(),
                status = ?active.tracker.status(),
                "ride tracking finished"
            );
            self.finished = Some(active.tracker);
        }
        self.transition(WorkflowPhase::Composing);
    }

    /// Screen closed: cancel lookups and release the status feed. A submission in flight
    /// keeps running so its outcome is still classified and logged.
    pub fn teardown(&mut self) {
        self.board.clear();
        if let Some(active) = self.active.as_mut() {
            if let Some(mut subscription) = active.subscription.take() {
                subscription.close();
            }
        }
    }

    // ---- helpers ----

    /// Any rider intent on the draft after a rejection returns the workflow to `Composing`.
    fn ensure_composing(&mut self, action: &'static str) -> Result<(), WorkflowError> {
        let phase = self.phase();
        if self.active.is_none() {
            match phase {
                WorkflowPhase::Composing => return Ok(()),
                WorkflowPhase::Rejected => {
                    self.transition(WorkflowPhase::Composing);
                    return Ok(());
                }
                WorkflowPhase::Submitting | WorkflowPhase::Tracking => {}
            }
        }
        let phase = if self.active.is_some() {
            WorkflowPhase::Tracking
        } else {
            phase
        };
        Err(self.fail(WorkflowError::Conflict { action, phase }))
    }

    fn transition(&mut self, next: WorkflowPhase) {
        let previous = self.phase_tx.send_replace(next);
        if previous != next {
            info!(from = previous.label(), to = next.label(), "ride workflow phase changed");
        }
    }

    fn fail(&mut self, err: WorkflowError) -> WorkflowError {
        self.last_error = Some(err.clone());
        err
    }
}
