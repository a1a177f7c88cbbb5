use std::sync::Arc;

use tracing::debug;

use crate::{EventConsumer, EventStore, Result};

/// Catch-up reader for one subscriber.
///
/// Each [`Subscription::poll`] streams everything appended since the subscriber's cursor into a
/// consumer and then persists the advanced cursor under the subscriber id, so a restarted
/// subscriber resumes where it stopped. One subscription per subscriber id at a time; sharing a
/// cursor between concurrent readers is not supported.
pub struct Subscription<ES>
where
    ES: EventStore,
{
    event_store: Arc<ES>,
    subscriber_id: String,
    position: ES::Position,
}

impl<ES> Subscription<ES>
where
    ES: EventStore,
{
    /// Resumes from the saved cursor of `subscriber_id`, or from the start of history.
    pub async fn open(event_store: Arc<ES>, subscriber_id: impl Into<String>) -> Result<Self> {
        let subscriber_id = subscriber_id.into();
        let position = match event_store.load_position(&subscriber_id).await? {
            Some(position) => position,
            None => event_store.create_position(),
        };

        Ok(Self {
            event_store,
            subscriber_id,
            position,
        })
    }

    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    pub fn position(&self) -> &ES::Position {
        &self.position
    }

    /// Delivers every new event to `consumer`, saves the cursor, and returns how many were
    /// delivered.
    pub async fn poll<C>(&mut self, consumer: &C) -> Result<usize>
    where
        C: EventConsumer + ?Sized,
    {
        let from = self.position.clone();
        let mut delivered = 0;

        let events = self
            .event_store
            .load_since(&from, &mut self.position)
            .await?;
        for event in events {
            consumer.process(&event).await;
            delivered += 1;
        }

        self.event_store
            .save_position(&self.subscriber_id, &self.position)
            .await?;

        debug!(
            subscriber_id = %self.subscriber_id,
            delivered,
            "subscription caught up"
        );
        Ok(delivered)
    }
}
