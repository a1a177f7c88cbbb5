use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Result, Serializer, StoreError, Uuid};

/// The `Event` struct is the immutable record the event store appends and replays.
///
/// An event carries its unique ID, the aggregate it belongs to, its position (`version`) in that
/// aggregate's history, the time it was produced, and an encoded payload together with a type tag.
/// The payload bytes are opaque to the store; they are produced and read back through a
/// [`Serializer`].
///
/// For a given aggregate, versions start at 1 and grow by exactly one per appended event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The ID of the event.
    pub id: Uuid,

    /// The type of event.
    pub event_type: String,

    /// The ID of the aggregate that the event is associated with.
    pub aggregate_id: Uuid,

    /// The encoded payload of the event.
    payload: Vec<u8>,

    /// The version of the aggregate this event produces.
    pub version: u64,

    /// The timestamp of the event.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates a new event by encoding `payload` with `serializer`.
    pub fn new<T, S>(serializer: &S, payload: &T, version: u64) -> Result<Self>
    where
        T: EventPayload,
        S: Serializer,
    {
        let aggregate_id = payload.aggregate_id();
        let bytes = serializer.serialize(payload).map_err(|e| with_aggregate(e, aggregate_id))?;

        Ok(Self::from_parts(aggregate_id, version, payload.name(), bytes))
    }

    /// Builds an event from an already-encoded payload.
    pub fn from_parts(
        aggregate_id: Uuid,
        version: u64,
        event_type: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            aggregate_id,
            payload,
            version,
            timestamp: Utc::now(),
        }
    }

    /// Overrides the production timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Raw payload bytes, as stored.
    pub fn payload_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Gets the payload of the event.
    pub fn get_payload<T, S>(&self, serializer: &S) -> Result<T>
    where
        T: DeserializeOwned,
        S: Serializer,
    {
        serializer
            .deserialize(&self.payload)
            .map_err(|e| with_aggregate(e, self.aggregate_id))
    }
}

fn with_aggregate(err: StoreError, aggregate_id: Uuid) -> StoreError {
    match err {
        StoreError::StoreFailure { source, .. } => StoreError::StoreFailure {
            aggregate_id: Some(aggregate_id),
            source,
        },
        other => other,
    }
}

/// The `EventPayload` trait defines the behavior of an event payload, representing the change the event made to the state of an aggregate.
///
/// To create an event payload in your application, you should implement this trait for each specific event payload type.
pub trait EventPayload: Serialize + DeserializeOwned + Clone + ToString + Send + Sync {
    /// Gets the ID of the aggregate that the event payload is associated with.
    fn aggregate_id(&self) -> Uuid;

    /// Gets the name of the event payload.
    fn name(&self) -> String {
        self.to_string()
    }
}
