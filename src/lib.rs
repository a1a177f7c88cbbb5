//! # mini_es_store
//!
//! The persistence core of an event-sourcing toolkit:
//!
//! - **Event store**: an append-only log per aggregate, guarded by an optimistic version check
//!   ([`EventStore`], [`InMemoryEventStore`]).
//! - **Cursors**: resumable, gap-free streaming of the whole history to subscribers
//!   ([`EventStore::load_since`], [`Subscription`]).
//! - **Aggregate cache**: a bounded LRU of rebuilt aggregates, or no cache at all
//!   ([`LruAggregateCache`], [`NoCache`]).
//! - **Command flow**: load, decide, append, notify ([`Cqrs`]).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mini_es_store::*;
//!
//! let config = Config::default();
//! let store = Arc::new(config.backend.open().await?);
//!
//! let cqrs: Cqrs<Counter, _, _> = Cqrs::builder()
//!     .config(config)
//!     .event_store(store.clone())
//!     .serializer(config.serializer.build())
//!     .consumer(Arc::new(CounterProjector::default()))
//!     .build()
//!     .await?;
//!
//! let counter = cqrs.execute(id, Increment(10)).await?;
//!
//! let mut subscription = Subscription::open(store, "audit-log").await?;
//! subscription.poll(&audit_log).await?;
//! ```

pub mod aggregate;
pub mod command;
pub mod config;
pub mod consumer;
pub mod cqrs;
pub mod error;
pub mod events;
pub mod serializer;
pub mod store;
pub mod subscription;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregate::{
    Aggregate,
    cache::{AggregateCache, CacheEntry, EvictionListener, LruAggregateCache, NoCache},
    manager::AggregateManager,
};
pub use command::Command;
pub use config::{Backend, CacheCapacity, Config, Notification, SerializerKind};
pub use consumer::{EventConsumer, Notifier};
pub use cqrs::{Cqrs, CqrsBuilder};
pub use error::{ErrorKind, Result, StoreError};
pub use events::{Event, EventPayload};
pub use serializer::{JsonSerializer, Serializer};
pub use store::{EventRange, EventStore, EventStream, InMemoryEventStore, MemoryPosition};
pub use subscription::Subscription;

// Re-exports
pub use async_trait::async_trait;
pub use uuid::Uuid;
