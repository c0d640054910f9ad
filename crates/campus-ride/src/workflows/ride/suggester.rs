use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::domain::{AddressCandidate, AddressField, AddressQuery};
use super::ports::GeocodingGateway;
use crate::config::WorkflowConfig;

/// Best-effort address lookup. Failures collapse into an empty list.
pub struct AddressSuggester<G> {
    gateway: Arc<G>,
    timeout: Duration,
    debounce: Duration,
    min_query_chars: usize,
}

impl<G> Clone for AddressSuggester<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            timeout: self.timeout,
            debounce: self.debounce,
            min_query_chars: self.min_query_chars,
        }
    }
}

impl<G> AddressSuggester<G>
where
    G: GeocodingGateway + 'static,
{
    pub fn new(gateway: Arc<G>, config: &WorkflowConfig) -> Self {
        Self {
            gateway,
            timeout: config.suggestion_timeout,
            debounce: config.suggestion_debounce,
            min_query_chars: config.min_query_chars,
        }
    }

    /// Whether the query is long enough to be worth a network call.
    pub fn reaches_network(&self, query: &AddressQuery) -> bool {
        query.significant_len() >= self.min_query_chars
    }

    /// Resolve one query immediately, without debouncing.
    pub async fn suggest(&self, query: &AddressQuery) -> Vec<AddressCandidate> {
        if !self.reaches_network(query) {
            return Vec::new();
        }

        let text = query.text.trim();
        match tokio::time::timeout(self.timeout, self.gateway.search(text)).await {
            Ok(Ok(candidates)) => {
                debug!(
                    query = text,
                    count = candidates.len(),
                    "address suggestions received"
                );
                candidates
            }
            Ok(Err(err)) => {
                warn!(query = text, error = %err, "address lookup failed; showing no suggestions");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    query = text,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "address lookup timed out"
                );
                Vec::new()
            }
        }
    }

    /// Debounce, look up, and deliver the batch to `sink`. Aborting the returned handle
    /// during the quiet period means no request ever leaves the device.
    pub fn spawn(
        &self,
        ticket: SuggestionTicket,
        sink: mpsc::UnboundedSender<SuggestionBatch>,
    ) -> JoinHandle<()> {
        let suggester = self.clone();
        tokio::spawn(async move {
            if !suggester.debounce.is_zero() {
                tokio::time::sleep(suggester.debounce).await;
            }
            let candidates = suggester.suggest(&ticket.query).await;
            if sink.send(SuggestionBatch { ticket, candidates }).is_err() {
                debug!("suggestion receiver dropped before delivery");
            }
        })
    }
}

/// Identifies one issued query so its late answer can be recognised as stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionTicket {
    pub field: AddressField,
    pub generation: u64,
    pub query: AddressQuery,
}

/// Lookup result paired with the ticket it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionBatch {
    pub ticket: SuggestionTicket,
    pub candidates: Vec<AddressCandidate>,
}

#[derive(Debug, Default)]
struct FieldSlot {
    generation: u64,
    candidates: Vec<AddressCandidate>,
    in_flight: Option<JoinHandle<()>>,
}

impl FieldSlot {
    fn supersede(&mut self) {
        self.generation += 1;
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}

/// Per-field bookkeeping that applies suggestion batches in issuance order.
///
/// Only the most recently issued query of a field may update that field's candidates; a rider
/// selection supersedes every outstanding query.
#[derive(Debug, Default)]
pub struct SuggestionBoard {
    pickup: FieldSlot,
    dropoff: FieldSlot,
}

impl SuggestionBoard {
    fn slot(&self, field: AddressField) -> &FieldSlot {
        match field {
            AddressField::Pickup => &self.pickup,
            AddressField::Dropoff => &self.dropoff,
        }
    }

    fn slot_mut(&mut self, field: AddressField) -> &mut FieldSlot {
        match field {
            AddressField::Pickup => &mut self.pickup,
            AddressField::Dropoff => &mut self.dropoff,
        }
    }

    /// Register a new query for `field`, cancelling whatever was in flight.
    ///
    /// Issuance order is the call order: the returned ticket is always the field's current
    /// query, whatever its `issued_at` stamp says.
    pub fn issue(&mut self, field: AddressField, query: AddressQuery) -> SuggestionTicket {
        let slot = self.slot_mut(field);
        slot.supersede();
        SuggestionTicket {
            field,
            generation: slot.generation,
            query,
        }
    }

    /// Keep the lookup task so a newer query can cancel it.
    pub fn track(&mut self, ticket: &SuggestionTicket, task: JoinHandle<()>) {
        let slot = self.slot_mut(ticket.field);
        if slot.generation == ticket.generation {
            if let Some(previous) = slot.in_flight.replace(task) {
                previous.abort();
            }
        } else {
            task.abort();
        }
    }

    /// Apply a batch if it answers the field's current query. Returns whether it was applied.
    pub fn apply(&mut self, batch: SuggestionBatch) -> bool {
        let SuggestionBatch { ticket, candidates } = batch;
        let slot = self.slot_mut(ticket.field);
        if slot.generation != ticket.generation {
            debug!(
                field = ticket.field.label(),
                stale = ticket.generation,
                current = slot.generation,
                "discarding superseded suggestions"
            );
            return false;
        }

        slot.candidates = candidates;
        slot.in_flight = None;
        true
    }

    /// The rider picked a value; outstanding lookups for the field can no longer apply.
    pub fn settle(&mut self, field: AddressField) {
        let slot = self.slot_mut(field);
        slot.supersede();
        slot.candidates.clear();
    }

    pub fn candidates(&self, field: AddressField) -> &[AddressCandidate] {
        &self.slot(field).candidates
    }

    pub fn find(&self, field: AddressField, candidate_id: &str) -> Option<&AddressCandidate> {
        self.slot(field)
            .candidates
            .iter()
            .find(|candidate| candidate.id == candidate_id)
    }

    pub fn has_pending(&self, field: AddressField) -> bool {
        self.slot(field).in_flight.is_some()
    }

    /// Cancel every lookup and forget all candidates.
    pub fn clear(&mut self) {
        self.settle(AddressField::Pickup);
        self.settle(AddressField::Dropoff);
    }
}

impl Drop for SuggestionBoard {
    fn drop(&mut self) {
        for slot in [&mut self.pickup, &mut self.dropoff] {
            if let Some(task) = slot.in_flight.take() {
                task.abort();
            }
        }
    }
}
