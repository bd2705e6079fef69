//! DocLens API Gateway
//!
//! The single entry point for all external API requests.
//! Handles:
//! - Identity resolution and access control
//! - Analysis CRUD, sharing, and duplication
//! - File upload/download against blob storage
//! - LLM proxying
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{delete, get, patch, post},
    Router,
};
use doclens_common::{config::AppConfig, db::DbPool, metrics, storage, BlobStore};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub blobs: Arc<dyn BlobStore>,
    pub http: reqwest::Client,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    let config = Arc::new(config);

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting DocLens API Gateway v{}", doclens_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port > 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                metrics::LATENCY_BUCKETS,
            )?
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }

    // Initialize database connection and run migrations
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    sqlx::migrate!("../../migrations")
        .run(db.write().get_postgres_connection_pool())
        .await?;

    // Initialize blob storage
    let blobs = storage::from_config(&config.storage).await?;

    // Shared HTTP client for the LLM proxy
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.llm.timeout_secs))
        .build()?;

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        blobs,
        http,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Analysis endpoints
        .route("/analyses", get(handlers::analyses::list_analyses))
        .route("/analyses", post(handlers::analyses::create_analysis))
        .route("/analyses/{id}", get(handlers::analyses::get_analysis))
        .route("/analyses/{id}", patch(handlers::analyses::patch_analysis))
        .route("/analyses/{id}", delete(handlers::analyses::delete_analysis))
        .route(
            "/analyses/{id}/duplicate",
            post(handlers::analyses::duplicate_analysis),
        )
        // Share management (owner view)
        .route("/analyses/{id}/shares", get(handlers::shares::list_shares))
        .route("/analyses/{id}/shares", post(handlers::shares::create_share))
        .route(
            "/analyses/{id}/shares",
            delete(handlers::shares::revoke_share),
        )
        // Share-link validation (anonymous) and claim (authenticated)
        .route("/share/{token}", get(handlers::share_link::validate_token))
        .route("/share/{token}", post(handlers::share_link::claim_token))
        // File endpoints
        .route("/files", post(handlers::files::upload_file))
        .route("/files/{*key}", get(handlers::files::download_file))
        // LLM proxy
        .route("/llm/{model}", post(handlers::llm::generate));

    // Rate limiting (disabled via config for tests)
    let limiter = middleware::rate_limit::create_rate_limiter(
        state.config.rate_limit.requests_per_second,
        state.config.rate_limit.burst,
    );
    let rate_limit_enabled = state.config.rate_limit.enabled;
    let rate_limit = state.config.rate_limit.requests_per_second;
    let max_upload = state.config.storage.max_upload_bytes;

    let mut app = Router::new()
        // Health endpoints (no auth, outside /api)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        // Multipart bodies carry the document plus form overhead
        .layer(DefaultBodyLimit::max(max_upload + 64 * 1024))
        .layer(axum::middleware::from_fn(middleware::metrics::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id);

    if rate_limit_enabled {
        app = app.layer(axum::middleware::from_fn(move |req, next| {
            let limiter = limiter.clone();
            async move {
                middleware::rate_limit::rate_limit_middleware(req, next, limiter, rate_limit).await
            }
        }));
    }

    app.with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
