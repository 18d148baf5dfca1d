use anyhow::Result;
use axum::serve;
use std::sync::Arc;
use tokio::{signal, sync::broadcast};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vigil_core::{
    backend::{BackendTransport, HttpClient, RpcTransport},
    config::AppConfig,
    Backend, BackendGroup, ConsensusDriver,
};

mod router;

/// Initializes the logging system based on the configuration.
///
/// `RUST_LOG` wins when set; `debug` and `trace` are shorthands scoped to this project's
/// crates. Otherwise `logging.level` applies to them and everything else logs at `warn`.
fn init_logging(config: &AppConfig) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(level) if level == "debug" || level == "trace" => {
            EnvFilter::new(format!("warn,vigil_core={level},vigil={level}"))
        }
        Ok(_) => EnvFilter::try_from_env("RUST_LOG")
            .unwrap_or_else(|_| EnvFilter::new("warn,vigil_core=info,vigil=info")),
        Err(_) => {
            let level = &config.logging.level;
            EnvFilter::try_new(format!("warn,vigil_core={level},vigil={level}"))
                .unwrap_or_else(|_| EnvFilter::new("warn,vigil_core=info,vigil=info"))
        }
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer().json();
        registry.with(fmt_layer).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

/// Builds one RPC transport per configured backend and the group over them.
fn build_group(config: &AppConfig) -> Result<Arc<BackendGroup>> {
    let http_client = Arc::new(
        HttpClient::with_config(config.http_client_config())
            .map_err(|e| anyhow::anyhow!("Failed to initialize HTTP client: {e}"))?,
    );

    let backends = config
        .backends
        .iter()
        .map(|backend| {
            let transport: Arc<dyn BackendTransport> = Arc::new(RpcTransport::new(
                backend.rpc_url.as_str(),
                Arc::clone(&http_client),
                backend.probe_timeout(&config.tracker),
            ));
            Arc::new(Backend::new(backend.options(&config.tracker), transport))
        })
        .collect();

    let group = BackendGroup::new(backends, config.tracker_settings())
        .map_err(|e| anyhow::anyhow!("Backend group initialization failed: {e}"))?;

    Ok(Arc::new(group))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Configuration load failed: {e}"))?;
    config.validate().map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

    init_logging(&config);
    info!(environment = %config.environment, "Starting Vigil");
    debug!(
        backends_count = config.backends.len(),
        poll_interval_ms = config.tracker.poll_interval_ms,
        min_peer_count = config.tracker.min_peer_count,
        warm_fallbacks = config.tracker.warm_fallbacks,
        "Configuration loaded"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let group = build_group(&config)?;
    for backend in group.backends() {
        info!(
            backend = %backend.name(),
            class = %backend.class(),
            rank = backend.rank(),
            "Backend registered"
        );
    }

    let driver = ConsensusDriver::new(Arc::clone(&group), config.poll_interval());
    let driver_handle = driver.start_with_shutdown(shutdown_tx.subscribe());

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Status server listening");

    if let Err(e) = serve(listener, router::create_router(group)).with_graceful_shutdown(shutdown_signal()).await {
        error!(error = %e, "Status server error occurred");
    }

    let _ = shutdown_tx.send(());
    if let Err(e) = driver_handle.await {
        error!(error = %e, "Consensus driver task failed");
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
