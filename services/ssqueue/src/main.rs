//! ssqueue service entry point.
//!
//! # Purpose
//! Wires configuration, observability, the registry and both HTTP listeners,
//! restores the latest snapshot on start and writes a new one on shutdown.
//!
//! # Notes
//! Shutdown order matters: readiness drops first, then both servers drain
//! in-flight requests, and only then is the registry exported.
use anyhow::{Context, Result};
use ssqueue::app::{AppState, ServiceState, build_router, build_service_router};
use ssqueue::config::SsqueueConfig;
use ssqueue::observability;
use ssqueue::snapshots::{self, SnapshotStore};
use ssqueue_core::Registry;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const SERVICE_NAME: &str = "ssqueue";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let config = SsqueueConfig::from_env_or_yaml()?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: SsqueueConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability(SERVICE_NAME, config.debug);
    metrics::counter!("ssqueue_info", "version" => VERSION).increment(1);
    tracing::info!(version = VERSION, "starting ssqueue");

    // Everything fallible happens before restore, which consumes the
    // snapshot file.
    let api_listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind api listener {}", config.bind_addr))?;
    let service_listener = match config.service_bind {
        Some(addr) => Some(
            TcpListener::bind(addr)
                .await
                .with_context(|| format!("bind service listener {addr}"))?,
        ),
        None => None,
    };
    let api_addr = api_listener.local_addr()?;
    let service_addr = match &service_listener {
        Some(listener) => Some(listener.local_addr()?),
        None => None,
    };

    let registry = Arc::new(Registry::new());
    let store = (!config.snapshot.disable).then(|| SnapshotStore::new(&config.snapshot.path));
    if let Some(store) = &store
        && let Err(err) = snapshots::restore(store, &registry).await
    {
        tracing::error!(error = %format!("{err:#}"), "error restore from snapshot");
    }
    registry.startup();

    let (stop_tx, stop_rx) = watch::channel(());

    tracing::info!(addr = %api_addr, "api server listening");
    let api_app = build_router(AppState {
        registry: Arc::clone(&registry),
        default_get_timeout: config.get_timeout(),
    });
    let api_task = spawn_server("api", api_listener, api_app, stop_rx.clone());

    let service_task = match service_listener.zip(service_addr) {
        Some((listener, addr)) => {
            tracing::info!(addr = %addr, "service server listening");
            let service_app = build_service_router(ServiceState {
                registry: Arc::clone(&registry),
                metrics: metrics_handle,
                log_tags: observability::log_tags(),
            });
            Some(spawn_server("service", listener, service_app, stop_rx))
        }
        None => {
            tracing::info!("service server disabled (SSQUEUE_SERVICE_ADDRESS empty)");
            None
        }
    };

    shutdown.await;
    registry.begin_shutdown();
    let _ = stop_tx.send(());

    let _ = api_task.await;
    if let Some(task) = service_task {
        let _ = task.await;
    }

    if let Some(store) = &store
        && let Err(err) = snapshots::persist(store, &registry).await
    {
        tracing::error!(error = %format!("{err:#}"), "error save to snapshot");
    }

    tracing::info!("done");
    Ok(())
}

// Serve until the stop channel fires, then drain in-flight requests.
fn spawn_server(
    name: &'static str,
    listener: TcpListener,
    app: axum::Router,
    mut stop: watch::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = stop.changed().await;
                tracing::info!(server = name, "shutting down server");
            })
            .await;
        if let Err(err) = result {
            tracing::error!(server = name, error = %err, "server exited with error");
        }
    })
}
