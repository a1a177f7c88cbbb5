use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::{Event, Notification};

/// A trait that defines the behavior of an event consumer.
///
/// An event consumer receives events right after they have been appended, or while a
/// [`crate::Subscription`] catches up on history. Projectors are the typical consumers.
///
/// Consumers use interior mutability: the same consumer may be shared between a [`Notifier`] and
/// a subscription.
#[async_trait]
pub trait EventConsumer: Send + Sync + 'static {
    async fn process(&self, event: &Event);
}

#[async_trait]
impl<C> EventConsumer for Arc<C>
where
    C: EventConsumer + ?Sized,
{
    async fn process(&self, event: &Event) {
        (**self).process(event).await
    }
}

/// Delivers events to the registered consumers according to its [`Notification`] mode.
///
/// With [`Notification::Sync`] every consumer has processed the event before `send` returns.
/// There is no queueing, batching or retry at this layer.
#[derive(Default)]
pub struct Notifier {
    consumers: Vec<Arc<dyn EventConsumer>>,
    delivery: Notification,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delivery(mut self, delivery: Notification) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn delivery(&self) -> Notification {
        self.delivery
    }

    pub fn register(&mut self, consumer: Arc<dyn EventConsumer>) {
        self.consumers.push(consumer);
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    /// Hands `event` to every consumer in registration order.
    pub async fn send(&self, event: &Event) {
        trace!(
            aggregate_id = %event.aggregate_id,
            version = event.version,
            consumers = self.consumers.len(),
            "notifying consumers"
        );
        match self.delivery {
            Notification::Sync => {
                for consumer in &self.consumers {
                    consumer.process(event).await;
                }
            }
        }
    }
}
