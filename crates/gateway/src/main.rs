//! RPMS API Gateway
//!
//! The HTTP surface of the publication workflow.
//! Handles:
//! - Authentication (bearer JWT) and the user directory
//! - Rate limiting
//! - Request routing to the workflow service
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;
mod state;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use rpms_common::{
    config::{AppConfig, ObservabilityConfig, StorageBackend},
    db::{DbPool, InMemoryStore, Repository, WorkflowStore},
    errors::Result,
};
use tokio::signal;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub use state::AppState;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting RPMS API Gateway v{}",
        rpms_common::VERSION
    );

    init_metrics(&config.observability)?;

    let config = Arc::new(config);
    let store = build_store(&config).await?;
    let state = AppState::new(config.clone(), store)?;
    bootstrap_admin(&state).await?;
    let notifier = state.workflow.notifier().clone();

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let detached fan-outs finish writing before the runtime goes away
    let pending = notifier.in_flight();
    if pending > 0 {
        info!(pending, "Waiting for notification fan-outs to drain");
    }
    if tokio::time::timeout(config.shutdown_timeout(), notifier.wait_idle())
        .await
        .is_err()
    {
        warn!(
            pending = notifier.in_flight(),
            "Shutdown timeout reached with fan-outs still running"
        );
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

/// Install the Prometheus exporter. Port 0 disables it.
fn init_metrics(config: &ObservabilityConfig) -> std::result::Result<(), Box<dyn std::error::Error>> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            rpms_common::metrics::LATENCY_BUCKETS,
        )?
        .install()?;

    rpms_common::metrics::register_metrics();
    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn WorkflowStore>> {
    match config.database.backend {
        StorageBackend::Memory => {
            warn!("Using the in-memory store, nothing survives a restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StorageBackend::Postgres => {
            info!("Connecting to database...");
            let pool = DbPool::new(&config.database).await?;
            if config.database.run_migrations {
                pool.run_migrations().await?;
            }
            Ok(Arc::new(Repository::new(pool)))
        }
    }
}

/// Seed the configured admin account on first start
async fn bootstrap_admin(state: &AppState) -> Result<()> {
    let auth = &state.config.auth;
    match (auth.admin_email.as_deref(), auth.admin_password.as_deref()) {
        (Some(email), Some(password)) => {
            if state.identity.bootstrap_admin(email, password).await?.is_none() {
                info!("Admin account already present");
            }
        }
        (None, None) => {}
        _ => warn!("Admin bootstrap skipped: auth.admin_email and auth.admin_password go together"),
    }
    Ok(())
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = TimeoutLayer::new(state.config.request_timeout());
    // One semaphore shared by every route
    let concurrency =
        GlobalConcurrencyLimitLayer::new(state.config.server.max_concurrent_requests.max(1));

    let api_routes = Router::new()
        // Identity (no auth)
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/profile", get(handlers::auth::profile))
        .route("/admin/users", post(handlers::auth::create_user))
        // Paper endpoints
        .route(
            "/papers",
            get(handlers::papers::list_papers).post(handlers::papers::create_paper),
        )
        .route(
            "/papers/{id}",
            put(handlers::papers::update_paper).delete(handlers::papers::delete_paper),
        )
        .route("/papers/{id}/recommend", post(handlers::papers::recommend_paper))
        .route("/papers/{id}/details", put(handlers::papers::update_publication_details))
        // Review endpoints
        .route(
            "/reviews",
            get(handlers::reviews::list_reviews).post(handlers::reviews::create_review),
        )
        // Notification endpoints
        .route(
            "/notifications",
            get(handlers::notifications::list_notifications)
                .post(handlers::notifications::create_notification),
        )
        .route(
            "/notifications/{id}/read",
            put(handlers::notifications::mark_read),
        )
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_metrics));

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api/v1", api_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(concurrency)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
