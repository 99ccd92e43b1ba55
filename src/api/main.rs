use anyhow::Context;
use axum::Router;
use business_approvals_api::config::ApiConfig;
use business_approvals_api::middleware::{create_cors_layer, init_tracing, trace_layer};
use business_approvals_api::routes::{self, AppState};
use tower::ServiceBuilder;
use tracing::{info, warn};

// Panic hook to catch and log panics
fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());
        tracing::error!("PANIC at {}: {}", location, panic_info);
    }));
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env();

    if let Err(e) = init_tracing(&config) {
        eprintln!("Failed to initialize tracing: {}", e);
    }
    setup_panic_hook();
    info!("Application starting...");

    let app_state = AppState::from_config(&config)
        .await
        .context("Failed to initialize storage backends")?;
    if !app_state.durable {
        warn!("Change request history will be lost on restart (set DATABASE_URL to persist it)");
    }

    let app = Router::new()
        .route("/health", axum::routing::get(routes::health_check))
        .nest("/api/v1", routes::create_api_router())
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(trace_layer())
                .layer(create_cors_layer(&config.cors_allowed_origins)),
        );

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind listener on {}", addr))?;
    info!("Server listening on {}", addr);
    info!("API health check available at http://{}/api/v1/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

// Handle both SIGINT (Ctrl+C) and SIGTERM (Docker stop)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, shutting down gracefully"),
        _ = terminate => info!("SIGTERM received, shutting down gracefully"),
    }
}
