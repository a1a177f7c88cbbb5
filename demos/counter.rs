/// # Mini ES Store Example: Counter
///
/// A counter aggregate answering increment and decrement commands. Every appended event is
/// printed by an inline consumer; afterwards a subscription catches up on the full history, the
/// way a projector started late would.
///
/// ## Usage
///
/// ```sh
/// RUST_LOG=debug cargo run --example counter
/// ```
use std::{fmt, sync::Arc};

use mini_es_store::{
    Aggregate, Command, Config, Cqrs, Event, EventConsumer, EventPayload, JsonSerializer, Result,
    StoreError, Subscription, Uuid, async_trait,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

// Aggregate
#[derive(Default, Clone, Debug)]
struct CounterState {
    id: Uuid,
    count: u32,
}

#[async_trait]
impl Aggregate for CounterState {
    type Event = CounterEvent;

    async fn apply(&mut self, event: &Self::Event) {
        match event {
            CounterEvent::Incremented { amount, .. } => self.count += amount,
            CounterEvent::Decremented { amount, .. } => self.count -= amount,
        };
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn set_aggregate_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

// Commands
struct Increment(u32);

#[async_trait]
impl Command for Increment {
    type Aggregate = CounterState;

    async fn handle(&self, counter: &CounterState) -> Result<Vec<CounterEvent>> {
        Ok(vec![CounterEvent::Incremented {
            id: counter.id,
            amount: self.0,
        }])
    }
}

struct Decrement(u32);

#[async_trait]
impl Command for Decrement {
    type Aggregate = CounterState;

    async fn handle(&self, counter: &CounterState) -> Result<Vec<CounterEvent>> {
        if counter.count < self.0 {
            return Err(StoreError::rejected(
                counter.id,
                format!(
                    "decrement amount {} is greater than current count {}",
                    self.0, counter.count
                ),
            ));
        }
        Ok(vec![CounterEvent::Decremented {
            id: counter.id,
            amount: self.0,
        }])
    }
}

// Events
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
enum CounterEvent {
    Incremented { id: Uuid, amount: u32 },
    Decremented { id: Uuid, amount: u32 },
}

impl EventPayload for CounterEvent {
    fn aggregate_id(&self) -> Uuid {
        match self {
            CounterEvent::Incremented { id, .. } | CounterEvent::Decremented { id, .. } => *id,
        }
    }
}

impl fmt::Display for CounterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterEvent::Incremented { .. } => write!(f, "Incremented"),
            CounterEvent::Decremented { .. } => write!(f, "Decremented"),
        }
    }
}

// Consumer
struct PrintEventConsumer {
    label: &'static str,
}

#[async_trait]
impl EventConsumer for PrintEventConsumer {
    async fn process(&self, event: &Event) {
        println!(
            "{}: {} v{} of {}",
            self.label, event.event_type, event.version, event.aggregate_id
        );
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::default();
    let store = Arc::new(config.backend.open().await?);

    let cqrs: Cqrs<CounterState, _, JsonSerializer> = Cqrs::builder()
        .config(config)
        .event_store(store.clone())
        .serializer(config.serializer.build())
        .consumer(Arc::new(PrintEventConsumer { label: "INLINE" }))
        .build()
        .await?;

    let id = Uuid::new_v4();

    let result = cqrs.execute(id, Increment(10)).await?;
    assert_eq!(result.count, 10);
    println!("MAIN: Counter state: {}", result.count);

    let result = cqrs.execute(id, Decrement(3)).await?;
    assert_eq!(result.count, 7);
    println!("MAIN: Counter state: {}", result.count);

    if let Err(err) = cqrs.execute(id, Decrement(10)).await {
        println!("MAIN: {err}");
    }

    let mut subscription = Subscription::open(store.clone(), "printer").await?;
    let delivered = subscription
        .poll(&PrintEventConsumer { label: "CATCH-UP" })
        .await?;
    println!("MAIN: subscription delivered {delivered} events");

    Ok(())
}
