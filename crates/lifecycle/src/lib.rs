//! Application layer for the order lifecycle engine.
//!
//! [`OrderLifecycleService`] drives order creation, status transitions at
//! order and seller-order granularity, and cancellation with a best-effort
//! cascade. Every status change that maps to an outbound subject is handed
//! to an [`EventPublisher`]; publication failures never fail the write.
//!
//! The [`OutboxEventPublisher`] and [`OutboxRelay`] pair provides
//! at-least-once delivery on top of an [`store::OutboxRepository`].

pub mod config;
pub mod error;
pub mod publisher;
pub mod relay;
pub mod service;

pub use config::LifecycleConfig;
pub use error::{ErrorKind, LifecycleError, Result};
pub use publisher::{
    EventPublisher, InMemoryEventPublisher, OutboxEventPublisher, PublishError, PublishedEvent,
    TracingEventPublisher,
};
pub use relay::{OutboxRelay, RelayReport};
pub use service::{
    CancellationOutcome, FailedSellerOrder, OrderLifecycleService, OrderQuery, Page,
    SkippedSellerOrder,
};
