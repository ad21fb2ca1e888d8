//! API server entry point.

use std::sync::Arc;

use api::Backend;
use api::config::Config;
use lifecycle::{LifecycleConfig, OutboxRelay, TracingEventPublisher};
use store::{InMemoryStore, PostgresStore};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect_backend(config: &Config) -> Result<Backend, store::StoreError> {
    match config.database_url {
        Some(ref url) => {
            let store = PostgresStore::connect(url, 10).await?;
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL store");
            Ok(Backend::Postgres(store))
        }
        None => {
            tracing::info!("DATABASE_URL not set; using in-memory store");
            Ok(Backend::InMemory(InMemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration and tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Storage backend and application state
    let backend = connect_backend(&config).await?;
    let state = Arc::new(backend.state(LifecycleConfig::from_env()));

    // 4. Outbox relay, stopped together with the server
    let (shutdown_tx, mut shutdown_rx) = watch::channel(());
    let relay = OutboxRelay::new(backend.outbox(), TracingEventPublisher)
        .with_batch_size(config.outbox_batch_size);
    let poll_interval = config.outbox_poll_interval;
    let relay_task = tokio::spawn(async move {
        relay
            .run(poll_interval, async move {
                let _ = shutdown_rx.changed().await;
            })
            .await;
    });

    // 5. Build the application and serve
    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(());
        })
        .await?;

    relay_task.await?;
    tracing::info!("server shut down gracefully");
    Ok(())
}
