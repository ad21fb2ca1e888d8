//! Durable queue of outbound integration events.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OutboxMessageId;
use serde::{Deserialize, Serialize};

use crate::Result;

/// An event waiting to be delivered downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: OutboxMessageId,
    pub subject: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    /// Creates a pending message.
    pub fn new(subject: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: OutboxMessageId::new(),
            subject: subject.into(),
            payload,
            created_at: Utc::now(),
            attempts: 0,
            last_error: None,
            delivered_at: None,
        }
    }

    /// Returns true once the message has been handed downstream.
    pub fn is_delivered(&self) -> bool {
        self.delivered_at.is_some()
    }
}

/// Storage for [`OutboxMessage`]s.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Appends a pending message.
    async fn enqueue(&self, message: &OutboxMessage) -> Result<()>;

    /// Returns up to `limit` undelivered messages, fewest failed attempts
    /// first and oldest first within the same attempt count.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>>;

    /// Marks a message as delivered.
    async fn mark_delivered(&self, id: OutboxMessageId, at: DateTime<Utc>) -> Result<()>;

    /// Records a failed delivery attempt; the message stays pending.
    async fn record_failure(&self, id: OutboxMessageId, error: &str) -> Result<()>;
}

#[async_trait]
impl<T: OutboxRepository + ?Sized> OutboxRepository for Arc<T> {
    async fn enqueue(&self, message: &OutboxMessage) -> Result<()> {
        (**self).enqueue(message).await
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        (**self).fetch_pending(limit).await
    }

    async fn mark_delivered(&self, id: OutboxMessageId, at: DateTime<Utc>) -> Result<()> {
        (**self).mark_delivered(id, at).await
    }

    async fn record_failure(&self, id: OutboxMessageId, error: &str) -> Result<()> {
        (**self).record_failure(id, error).await
    }
}
