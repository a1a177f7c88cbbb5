use std::fmt::Debug;

use async_trait::async_trait;

use crate::{Event, EventPayload, Result, Serializer, Uuid};

pub mod cache;
pub mod manager;

/// The `Aggregate` trait defines the behavior of an aggregate, which represent the state of a domain entity and can be modified by applying events.
///
/// Aggregates are rebuilt by replaying their events in version order, so `apply` must be a pure
/// function of the current state and the event. Rebuilt aggregates may be kept in an
/// [`cache::AggregateCache`]; the cache is a disposable projection and never a source of truth.
///
/// ## Implementing the `Aggregate` Trait
///
/// Define the associated type `Event`, the payload your aggregate reacts to. It must implement
/// [`EventPayload`] so it can travel through the event store.
#[async_trait]
pub trait Aggregate: Clone + Debug + Default + Sync + Send + 'static {
    /// The type of event that this aggregate can handle.
    type Event: EventPayload;

    /// Applies an event to the aggregate's state.
    async fn apply(&mut self, event: &Self::Event);

    /// Returns the aggregate's ID.
    fn aggregate_id(&self) -> Uuid;

    /// Sets the aggregate's ID.
    fn set_aggregate_id(&mut self, id: Uuid);

    /// Decodes a sequence of stored events with `serializer` and applies them in order.
    async fn apply_events<S>(&mut self, serializer: &S, events: &[Event]) -> Result<()>
    where
        S: Serializer,
    {
        for e in events.iter() {
            let payload = e.get_payload::<Self::Event, S>(serializer)?;
            self.apply(&payload).await;
        }
        Ok(())
    }
}
