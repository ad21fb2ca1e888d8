//! Storage ports and adapters for the order lifecycle engine.
//!
//! The repository traits are the only way the lifecycle service touches
//! persisted state. Two adapters are provided: an in-memory store for tests
//! and local runs, and a PostgreSQL store built on `sqlx`.

pub mod error;
pub mod filter;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod repository;

pub use error::{Result, StoreError};
pub use filter::{OrderFilter, PageRequest};
pub use memory::{
    InMemoryOrderRepository, InMemoryOutboxRepository, InMemorySellerOrderRepository,
    InMemoryStore,
};
pub use outbox::{OutboxMessage, OutboxRepository};
pub use postgres::{
    PostgresOrderRepository, PostgresOutboxRepository, PostgresSellerOrderRepository,
    PostgresStore,
};
pub use repository::{OrderRepository, SellerOrderRepository};
