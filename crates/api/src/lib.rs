//! HTTP adapter for the order lifecycle engine.
//!
//! Exposes the lifecycle service over REST with structured logging
//! (tracing) and Prometheus metrics. The store backend and event publisher
//! are chosen at startup, so handlers only see trait objects.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use lifecycle::{EventPublisher, LifecycleConfig, OrderLifecycleService, OutboxEventPublisher};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{
    InMemoryStore, OrderRepository, OutboxRepository, PostgresStore, SellerOrderRepository,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Lifecycle service over dynamically chosen adapters.
pub type LifecycleService = OrderLifecycleService<
    Arc<dyn OrderRepository>,
    Arc<dyn SellerOrderRepository>,
    Arc<dyn EventPublisher>,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub service: LifecycleService,
}

impl AppState {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        seller_orders: Arc<dyn SellerOrderRepository>,
        publisher: Arc<dyn EventPublisher>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            service: OrderLifecycleService::new(orders, seller_orders, publisher)
                .with_config(config),
        }
    }

    /// State over the in-memory store, publishing through its outbox.
    pub fn in_memory(store: &InMemoryStore, config: LifecycleConfig) -> Self {
        Self::new(
            Arc::new(store.orders()),
            Arc::new(store.seller_orders()),
            Arc::new(OutboxEventPublisher::new(store.outbox())),
            config,
        )
    }

    /// State over PostgreSQL, publishing through its outbox table.
    pub fn postgres(store: &PostgresStore, config: LifecycleConfig) -> Self {
        Self::new(
            Arc::new(store.orders()),
            Arc::new(store.seller_orders()),
            Arc::new(OutboxEventPublisher::new(store.outbox())),
            config,
        )
    }
}

/// The storage backend selected at startup.
#[derive(Clone)]
pub enum Backend {
    InMemory(InMemoryStore),
    Postgres(PostgresStore),
}

impl Backend {
    pub fn state(&self, config: LifecycleConfig) -> AppState {
        match self {
            Backend::InMemory(store) => AppState::in_memory(store, config),
            Backend::Postgres(store) => AppState::postgres(store, config),
        }
    }

    /// Returns the outbox the relay drains.
    pub fn outbox(&self) -> Arc<dyn OutboxRepository> {
        match self {
            Backend::InMemory(store) => Arc::new(store.outbox()),
            Backend::Postgres(store) => Arc::new(store.outbox()),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create).get(routes::orders::list),
        )
        .route("/orders/{id}", get(routes::orders::get))
        .route(
            "/orders/by-number/{number}",
            get(routes::orders::get_by_number),
        )
        .route("/orders/{id}/status", put(routes::orders::update_status))
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route(
            "/orders/{id}/seller-orders",
            get(routes::orders::seller_orders),
        )
        .route("/seller-orders/{id}", get(routes::seller_orders::get))
        .route(
            "/seller-orders/{id}/status",
            put(routes::seller_orders::update_status),
        )
        .route(
            "/sellers/{seller_id}/orders",
            get(routes::seller_orders::list_for_seller),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
