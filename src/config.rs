//! Typed configuration, built once at startup and passed to [`crate::CqrsBuilder`].

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::{
    Aggregate, EventStore, InMemoryEventStore, JsonSerializer, Result, StoreError,
    aggregate::cache::{AggregateCache, LruAggregateCache, NoCache},
};

/// Storage backend. Only the process-local one ships with this crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    InMemory,
}

impl Backend {
    /// Creates the backend and initializes its storage.
    pub async fn open(self) -> Result<InMemoryEventStore> {
        match self {
            Backend::InMemory => {
                let store = InMemoryEventStore::new();
                store.ensure_exists().await?;
                Ok(store)
            }
        }
    }
}

/// Payload encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializerKind {
    #[default]
    Json,
    JsonPretty,
}

impl SerializerKind {
    pub fn build(self) -> JsonSerializer {
        match self {
            SerializerKind::Json => JsonSerializer::new(),
            SerializerKind::JsonPretty => JsonSerializer::pretty(),
        }
    }
}

/// Aggregate cache sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCapacity {
    /// Keep at most this many aggregates.
    Bounded(usize),
    /// Replay every aggregate on every load.
    Disabled,
}

impl Default for CacheCapacity {
    fn default() -> Self {
        CacheCapacity::Bounded(1024)
    }
}

impl CacheCapacity {
    pub fn build<A: Aggregate>(self) -> Result<Box<dyn AggregateCache<A>>> {
        match self {
            CacheCapacity::Bounded(capacity) => {
                let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
                    StoreError::registration(
                        "aggregate cache",
                        "bounded capacity must be at least 1, use `disabled` to turn caching off",
                    )
                })?;
                Ok(Box::new(LruAggregateCache::new(capacity)))
            }
            CacheCapacity::Disabled => Ok(Box::new(NoCache)),
        }
    }
}

/// How appended events reach consumers. Delivery is inline with the append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notification {
    #[default]
    Sync,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub serializer: SerializerKind,
    pub cache: CacheCapacity,
    pub notification: Notification,
}

impl Config {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)
            .map_err(|e| StoreError::registration("configuration", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache == CacheCapacity::Bounded(0) {
            return Err(StoreError::registration(
                "aggregate cache",
                "bounded capacity must be at least 1, use `disabled` to turn caching off",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, Serializer, Uuid, test_support::Counter};

    #[test]
    fn defaults_to_bounded_json_in_memory() {
        let config = Config::default();

        assert_eq!(config.backend, Backend::InMemory);
        assert_eq!(config.serializer, SerializerKind::Json);
        assert_eq!(config.cache, CacheCapacity::Bounded(1024));
        assert_eq!(config.notification, Notification::Sync);
    }

    #[test]
    fn parses_partial_documents() {
        let config = Config::from_json(r#"{ "cache": "disabled", "serializer": "json_pretty" }"#)
            .unwrap();

        assert_eq!(config.cache, CacheCapacity::Disabled);
        assert_eq!(config.serializer, SerializerKind::JsonPretty);
        assert_eq!(config.serializer.build().kind(), SerializerKind::JsonPretty);
        assert_eq!(config.backend, Backend::InMemory);

        let bounded = Config::from_json(r#"{ "cache": { "bounded": 16 } }"#).unwrap();
        assert_eq!(bounded.cache, CacheCapacity::Bounded(16));
    }

    #[test]
    fn zero_capacity_and_unknown_options_are_registration_failures() {
        let zero = Config::from_json(r#"{ "cache": { "bounded": 0 } }"#).unwrap_err();
        let unknown = Config::from_json(r#"{ "backend": "postgres" }"#).unwrap_err();

        assert_eq!(zero.kind(), ErrorKind::RegistrationFailure);
        assert_eq!(unknown.kind(), ErrorKind::RegistrationFailure);
        assert!(CacheCapacity::Bounded(0).build::<Counter>().is_err());
    }

    #[test]
    fn capacity_builds_the_matching_cache() {
        let bounded = CacheCapacity::Bounded(4).build::<Counter>().unwrap();
        let disabled = CacheCapacity::Disabled.build::<Counter>().unwrap();

        assert_eq!(bounded.capacity(), 4);
        assert_eq!(disabled.capacity(), 0);
        assert!(!disabled.contains_key(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn opened_backend_is_ready() {
        let store = Backend::InMemory.open().await.unwrap();

        assert_eq!(store.current_version(Uuid::new_v4()).await.unwrap(), 0);
    }
}
