//! Fixtures shared by the unit tests.

use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    Aggregate, Command, Event, EventConsumer, EventPayload, Result, Serializer, StoreError, Uuid,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counter {
    pub id: Uuid,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CounterEvent {
    Incremented { id: Uuid, by: i64 },
    Decremented { id: Uuid, by: i64 },
}

impl fmt::Display for CounterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterEvent::Incremented { .. } => write!(f, "Incremented"),
            CounterEvent::Decremented { .. } => write!(f, "Decremented"),
        }
    }
}

impl EventPayload for CounterEvent {
    fn aggregate_id(&self) -> Uuid {
        match self {
            CounterEvent::Incremented { id, .. } | CounterEvent::Decremented { id, .. } => *id,
        }
    }
}

#[async_trait]
impl Aggregate for Counter {
    type Event = CounterEvent;

    async fn apply(&mut self, event: &CounterEvent) {
        match event {
            CounterEvent::Incremented { by, .. } => self.count += by,
            CounterEvent::Decremented { by, .. } => self.count -= by,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn set_aggregate_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

pub struct Increment(pub i64);

#[async_trait]
impl Command for Increment {
    type Aggregate = Counter;

    async fn handle(&self, counter: &Counter) -> Result<Vec<CounterEvent>> {
        Ok(vec![CounterEvent::Incremented {
            id: counter.id,
            by: self.0,
        }])
    }
}

pub struct Decrement(pub i64);

#[async_trait]
impl Command for Decrement {
    type Aggregate = Counter;

    async fn handle(&self, counter: &Counter) -> Result<Vec<CounterEvent>> {
        if counter.count < self.0 {
            return Err(StoreError::rejected(
                counter.id,
                format!("cannot take {} from {}", self.0, counter.count),
            ));
        }
        Ok(vec![CounterEvent::Decremented {
            id: counter.id,
            by: self.0,
        }])
    }
}

/// Encoded counter event; negative `by` becomes a decrement.
pub fn counter_event<S: Serializer>(serializer: &S, id: Uuid, version: u64, by: i64) -> Event {
    let payload = if by >= 0 {
        CounterEvent::Incremented { id, by }
    } else {
        CounterEvent::Decremented { id, by: -by }
    };
    Event::new(serializer, &payload, version).unwrap()
}

#[derive(Default)]
pub struct RecordingConsumer {
    events: Mutex<Vec<Event>>,
}

impl RecordingConsumer {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl EventConsumer for RecordingConsumer {
    async fn process(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}
