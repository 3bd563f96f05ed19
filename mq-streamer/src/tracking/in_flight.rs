//! In-flight table: which destination each emitted, not yet acknowledged delivery came from.

use crate::control_plane::destination_table::DestinationTable;
use crate::data_plane::consumer::DestinationConsumer;
use crate::envelope::DeliveryId;
use crate::error::StreamerError;
use crate::observability::events;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

const COMPONENT: &str = "in_flight";

/// What an `ack` or `fail` call did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AckOutcome {
    /// The stage runs in automatic-ack mode; nothing to do.
    AutoAck,
    /// The id was not in flight (never emitted, or already acked or failed).
    Untracked,
    /// The originating consumer performed the operation.
    Routed { destination: String },
    /// The originating destination was removed; the call was dropped.
    DestinationGone { destination: String },
    /// The consumer was reached but the broker refused the operation.
    BrokerRejected {
        destination: String,
        error: StreamerError,
    },
}

impl AckOutcome {
    pub fn is_routed(&self) -> bool {
        matches!(self, AckOutcome::Routed { .. })
    }
}

/// A handle that is replaced, not reused, when its destination is re-provisioned.
pub(crate) trait Generational {
    fn generation(&self) -> u64;
}

impl Generational for DestinationConsumer {
    fn generation(&self) -> u64 {
        DestinationConsumer::generation(self)
    }
}

/// Result of looking up an in-flight id against the live destination handles.
pub(crate) enum InFlightResolution<T> {
    Untracked,
    Live { destination: String, handle: Arc<T> },
    /// The destination was removed, or replaced by a handle of a later generation.
    DestinationGone { destination: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct InFlightEntry {
    pub(crate) destination: String,
    pub(crate) generation: u64,
}

pub(crate) struct InFlightTable {
    entries: Mutex<HashMap<DeliveryId, InFlightEntry>>,
}

/// Finds the live handle for `destination`, provided it is still `generation`.
pub(crate) async fn live_handle<T: Generational>(
    handles: &DestinationTable<T>,
    destination: &str,
    generation: u64,
) -> Option<Arc<T>> {
    handles
        .get(destination)
        .await
        .filter(|handle| handle.generation() == generation)
}

impl InFlightTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records `delivery_id` as emitted from generation `generation` of `destination`.
    ///
    /// An id already in flight is replaced; the older delivery can no longer be acked.
    pub(crate) async fn track(&self, delivery_id: DeliveryId, destination: &str, generation: u64) {
        let entry = InFlightEntry {
            destination: destination.to_string(),
            generation,
        };
        let previous = self
            .entries
            .lock()
            .await
            .insert(delivery_id.clone(), entry);

        if let Some(previous) = previous {
            warn!(
                event = events::IN_FLIGHT_ID_COLLISION,
                component = COMPONENT,
                delivery_id = delivery_id.as_str(),
                destination,
                previous_destination = previous.destination.as_str(),
                "delivery id already in flight; replacing older entry"
            );
        }
    }

    /// Removes `delivery_id`, returning where it came from if it was in flight.
    pub(crate) async fn take(&self, delivery_id: &DeliveryId) -> Option<InFlightEntry> {
        self.entries.lock().await.remove(delivery_id)
    }

    pub(crate) async fn contains(&self, delivery_id: &DeliveryId) -> bool {
        self.entries.lock().await.contains_key(delivery_id)
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Removes `delivery_id` and finds the live handle of its destination.
    pub(crate) async fn resolve<T: Generational>(
        &self,
        delivery_id: &DeliveryId,
        handles: &DestinationTable<T>,
    ) -> InFlightResolution<T> {
        let Some(InFlightEntry {
            destination,
            generation,
        }) = self.take(delivery_id).await
        else {
            return InFlightResolution::Untracked;
        };

        match live_handle(handles, &destination, generation).await {
            Some(handle) => InFlightResolution::Live {
                destination,
                handle,
            },
            None => InFlightResolution::DestinationGone { destination },
        }
    }
}
