use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    Aggregate, Command, Config, Event, EventConsumer, EventPayload, EventStore, Notifier, Result,
    Serializer, StoreError, Uuid,
    aggregate::{
        cache::{AggregateCache, CacheEntry},
        manager::AggregateManager,
    },
};

/// Runs commands against aggregates of type `A`: load, decide, append, notify.
///
/// `execute` takes `&self`, so a `Cqrs` can be shared between tasks behind an `Arc`. Writers
/// racing on one aggregate are arbitrated by the event store; the loser gets
/// [`StoreError::ConcurrencyConflict`] and decides for itself whether to retry.
pub struct Cqrs<A, ES, S>
where
    A: Aggregate,
    ES: EventStore,
    S: Serializer,
{
    aggregate_manager: AggregateManager<A, ES, S>,
    event_store: Arc<ES>,
    serializer: Arc<S>,
    notifier: Notifier,
}

impl<A, ES, S> Cqrs<A, ES, S>
where
    A: Aggregate,
    ES: EventStore,
    S: Serializer,
{
    pub fn builder() -> CqrsBuilder<A, ES, S> {
        CqrsBuilder::default()
    }

    /// Executes `command` against the aggregate `aggregate_id` and returns its new state.
    ///
    /// The produced events are appended as one batch at the versions following the loaded
    /// state. On a concurrency conflict the cached state is dropped and the error returned
    /// unchanged; nothing is appended and no consumer is notified.
    pub async fn execute<C>(&self, aggregate_id: Uuid, command: C) -> Result<A>
    where
        C: Command<Aggregate = A>,
    {
        let CacheEntry {
            latest_version,
            state: mut aggregate,
            ..
        } = self.aggregate_manager.load(aggregate_id).await?;

        let payloads = command.handle(&aggregate).await?;
        if payloads.is_empty() {
            return Ok(aggregate);
        }

        let events = payloads
            .iter()
            .zip(latest_version + 1..)
            .map(|(payload, version)| {
                if payload.aggregate_id() != aggregate_id {
                    return Err(StoreError::rejected(
                        aggregate_id,
                        format!(
                            "command produced an event for aggregate {}",
                            payload.aggregate_id()
                        ),
                    ));
                }
                Event::new(self.serializer.as_ref(), payload, version)
            })
            .collect::<Result<Vec<_>>>()?;

        if let Err(err) = self.event_store.save_events(&events).await {
            if err.is_conflict() {
                self.aggregate_manager.invalidate(aggregate_id);
            }
            return Err(err);
        }

        for payload in &payloads {
            aggregate.apply(payload).await;
        }
        let version = latest_version + events.len() as u64;
        self.aggregate_manager
            .store(CacheEntry::new(aggregate_id, version, aggregate.clone()));
        debug!(aggregate_id = %aggregate_id, version, "command executed");

        for event in &events {
            self.notifier.send(event).await;
        }

        Ok(aggregate)
    }

    /// Loads the current state of an aggregate without running a command.
    pub async fn load(&self, aggregate_id: Uuid) -> Result<A> {
        Ok(self.aggregate_manager.load(aggregate_id).await?.state)
    }

    pub fn event_store(&self) -> &Arc<ES> {
        &self.event_store
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    pub fn aggregate_manager(&self) -> &AggregateManager<A, ES, S> {
        &self.aggregate_manager
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

/// Composes a [`Cqrs`] from explicitly supplied parts.
///
/// Everything is checked once in [`CqrsBuilder::build`]: a missing event store or serializer, or
/// a serializer that disagrees with the configuration, is a
/// [`StoreError::RegistrationFailure`] and the instance is never created.
pub struct CqrsBuilder<A, ES, S>
where
    A: Aggregate,
    ES: EventStore,
    S: Serializer,
{
    config: Config,
    event_store: Option<Arc<ES>>,
    serializer: Option<Arc<S>>,
    cache: Option<Box<dyn AggregateCache<A>>>,
    notifier: Notifier,
}

impl<A, ES, S> Default for CqrsBuilder<A, ES, S>
where
    A: Aggregate,
    ES: EventStore,
    S: Serializer,
{
    fn default() -> Self {
        Self {
            config: Config::default(),
            event_store: None,
            serializer: None,
            cache: None,
            notifier: Notifier::new(),
        }
    }
}

impl<A, ES, S> CqrsBuilder<A, ES, S>
where
    A: Aggregate,
    ES: EventStore,
    S: Serializer,
{
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn event_store(mut self, event_store: Arc<ES>) -> Self {
        self.event_store = Some(event_store);
        self
    }

    pub fn serializer(mut self, serializer: S) -> Self {
        self.serializer = Some(Arc::new(serializer));
        self
    }

    /// Uses `cache` instead of the one described by the configuration.
    pub fn cache(mut self, cache: Box<dyn AggregateCache<A>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn consumer<C>(mut self, consumer: Arc<C>) -> Self
    where
        C: EventConsumer,
    {
        self.notifier.register(consumer);
        self
    }

    /// Validates the composition and initializes the event store.
    pub async fn build(self) -> Result<Cqrs<A, ES, S>> {
        self.config.validate()?;

        let event_store = self
            .event_store
            .ok_or_else(|| StoreError::registration("event store", "no event store registered"))?;
        let serializer = self
            .serializer
            .ok_or_else(|| StoreError::registration("serializer", "no serializer registered"))?;
        if serializer.kind() != self.config.serializer {
            return Err(StoreError::registration(
                "serializer",
                format!(
                    "configured {:?} but {:?} was registered",
                    self.config.serializer,
                    serializer.kind()
                ),
            ));
        }
        let cache = match self.cache {
            Some(cache) => cache,
            None => self.config.cache.build::<A>()?,
        };

        let notifier = self.notifier.with_delivery(self.config.notification);

        event_store.ensure_exists().await?;
        info!(
            cache_capacity = cache.capacity(),
            serializer = ?serializer.kind(),
            notification = ?notifier.delivery(),
            consumers = notifier.len(),
            "cqrs composed"
        );

        Ok(Cqrs {
            aggregate_manager: AggregateManager::new(event_store.clone(), serializer.clone(), cache),
            event_store,
            serializer,
            notifier,
        })
    }
}
