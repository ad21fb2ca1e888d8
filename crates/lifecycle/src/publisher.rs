//! Outbound event publication.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use store::{OutboxMessage, OutboxRepository, StoreError};
use thiserror::Error;

/// Errors raised while handing an event downstream.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The downstream transport rejected or dropped the event.
    #[error("Event transport unavailable: {0}")]
    Unavailable(String),

    /// The event could not be written to the outbox.
    #[error("Failed to enqueue event: {0}")]
    Outbox(#[from] StoreError),
}

/// Port for publishing integration events.
///
/// `payload` is the JSON form of one of the payload types in
/// [`domain::order::events`].
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        subject: &str,
        payload: &serde_json::Value,
    ) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(
        &self,
        subject: &str,
        payload: &serde_json::Value,
    ) -> Result<(), PublishError> {
        (**self).publish(subject, payload).await
    }
}

/// An event captured by [`InMemoryEventPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub subject: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    events: Vec<PublishedEvent>,
    fail: bool,
}

/// In-memory publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<Mutex<InMemoryPublisherState>>,
}

impl InMemoryEventPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryPublisherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every publish call fail while `fail` is set.
    pub fn set_fail(&self, fail: bool) {
        self.state().fail = fail;
    }

    /// Returns every event published so far.
    pub fn events(&self) -> Vec<PublishedEvent> {
        self.state().events.clone()
    }

    /// Returns the events published under `subject`.
    pub fn events_for(&self, subject: &str) -> Vec<PublishedEvent> {
        self.state()
            .events
            .iter()
            .filter(|e| e.subject == subject)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.state().events.clear();
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(
        &self,
        subject: &str,
        payload: &serde_json::Value,
    ) -> Result<(), PublishError> {
        let mut state = self.state();
        if state.fail {
            return Err(PublishError::Unavailable("publisher disabled".to_string()));
        }
        state.events.push(PublishedEvent {
            subject: subject.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}

/// Publisher that only writes events to the log.
///
/// Used as the relay's downstream when no broker is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(
        &self,
        subject: &str,
        payload: &serde_json::Value,
    ) -> Result<(), PublishError> {
        tracing::info!(subject, %payload, "event published");
        Ok(())
    }
}

/// Publisher that appends events to an outbox for the relay to deliver.
#[derive(Debug, Clone)]
pub struct OutboxEventPublisher<R> {
    outbox: R,
}

impl<R: OutboxRepository> OutboxEventPublisher<R> {
    pub fn new(outbox: R) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl<R: OutboxRepository> EventPublisher for OutboxEventPublisher<R> {
    async fn publish(
        &self,
        subject: &str,
        payload: &serde_json::Value,
    ) -> Result<(), PublishError> {
        let message = OutboxMessage::new(subject, payload.clone());
        self.outbox.enqueue(&message).await?;
        tracing::debug!(message_id = %message.id, subject, "event enqueued");
        Ok(())
    }
}
