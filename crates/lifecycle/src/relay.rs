//! Background delivery of outbox messages.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use store::{OutboxRepository, StoreError};

use crate::EventPublisher;

/// Result of one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Forwards pending outbox messages to a downstream publisher.
///
/// Messages are delivered at least once: a message is only marked delivered
/// after the downstream accepted it, so a crash in between re-sends it on the
/// next pass.
pub struct OutboxRelay<R, P> {
    outbox: R,
    downstream: P,
    batch_size: usize,
}

impl<R: OutboxRepository, P: EventPublisher> OutboxRelay<R, P> {
    pub const DEFAULT_BATCH_SIZE: usize = 100;

    pub fn new(outbox: R, downstream: P) -> Self {
        Self {
            outbox,
            downstream,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the number of messages fetched per pass by [`run`](Self::run).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Delivers up to `batch` pending messages, oldest first.
    ///
    /// A message the downstream rejects keeps its place in the queue with the
    /// failure recorded, and the pass moves on to the next message.
    #[tracing::instrument(skip(self))]
    pub async fn drain_once(&self, batch: usize) -> Result<RelayReport, StoreError> {
        let pending = self.outbox.fetch_pending(batch).await?;
        let mut report = RelayReport::default();

        for message in pending {
            match self
                .downstream
                .publish(&message.subject, &message.payload)
                .await
            {
                Ok(()) => {
                    self.outbox.mark_delivered(message.id, Utc::now()).await?;
                    metrics::counter!("outbox_messages_delivered_total").increment(1);
                    report.delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = %message.id,
                        subject = %message.subject,
                        attempts = message.attempts + 1,
                        error = %e,
                        "outbox delivery failed"
                    );
                    metrics::counter!("outbox_delivery_failures_total").increment(1);
                    self.outbox
                        .record_failure(message.id, &e.to_string())
                        .await?;
                    report.failed += 1;
                }
            }
        }

        if report.delivered > 0 || report.failed > 0 {
            tracing::debug!(
                delivered = report.delivered,
                failed = report.failed,
                "outbox pass finished"
            );
        }
        Ok(report)
    }

    /// Drains the outbox every `interval` until `shutdown` resolves.
    pub async fn run<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(?interval, batch_size = self.batch_size, "outbox relay started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.drain_once(self.batch_size).await {
                        tracing::warn!(error = %e, "outbox pass aborted");
                    }
                }
            }
        }
        tracing::info!("outbox relay stopped");
    }
}
