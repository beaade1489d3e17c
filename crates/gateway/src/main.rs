//! RankForge API Gateway
//!
//! HTTP entry point for the hybrid retrieval engine.
//! Handles:
//! - Record store selection (Postgres or in-memory snapshot)
//! - Query embedding through the configured provider
//! - Rate limiting and request validation
//! - Search response caching
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use rankforge_common::{
    cache::Cache,
    config::{AppConfig, ObservabilityConfig, StoreBackend},
    db::{DbPool, Repository},
    embeddings::create_embedder,
    metrics::{self, EMBEDDING_BUCKETS, LATENCY_BUCKETS, METRICS_PREFIX},
    Embedder,
};
use rankforge_search::{HybridSearchEngine, InMemoryRecordStore, PgRecordStore, RecordStore};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<HybridSearchEngine>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub cache: Option<Cache>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.observability);

    info!("Starting RankForge API Gateway v{}", rankforge_common::VERSION);

    init_metrics(&config.observability)?;

    let store = build_store(&config).await?;
    let engine = HybridSearchEngine::new(store, &config.search, &config.expansion)
        .context("invalid search configuration")?;

    let embedder = create_embedder(&config.embedding).context("invalid embedding configuration")?;
    match &embedder {
        Some(embedder) if embedder.dimension() != config.search.embedding_dimension => warn!(
            embedder_dimension = embedder.dimension(),
            search_dimension = config.search.embedding_dimension,
            "Embedding provider dimension differs from the store; dense retrieval will reject its vectors"
        ),
        Some(embedder) => info!(model = embedder.model_name(), "Query embedding enabled"),
        None => info!("No embedding provider configured; dense retrieval needs caller-supplied embeddings"),
    }

    // Caching is optional; an unreachable Redis only disables it
    let cache = match Cache::from_config(&config.cache).await {
        Ok(cache) => cache,
        Err(e) => {
            warn!(error = %e, "Cache unavailable, continuing without it");
            None
        }
    };

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        engine: Arc::new(engine),
        embedder,
        cache,
    };

    let app = create_router(state)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing; `RUST_LOG` overrides the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the Prometheus exporter unless the port is 0
fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_embedding_duration_seconds", METRICS_PREFIX)),
            EMBEDDING_BUCKETS,
        )?
        .set_buckets_for_metric(Matcher::Suffix("_duration_seconds".to_string()), LATENCY_BUCKETS)?
        .install()
        .context("failed to install Prometheus exporter")?;

    metrics::register_metrics();
    info!(port = config.metrics_port, "Metrics exporter listening");
    Ok(())
}

/// Open the configured record store
async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.store.backend {
        StoreBackend::Postgres => {
            info!("Connecting to database...");
            let pool = DbPool::new(&config.database).await?;
            Ok(Arc::new(PgRecordStore::new(Repository::new(pool))))
        }
        StoreBackend::Memory => {
            let dimension = config.search.embedding_dimension;
            let store = match &config.store.snapshot_path {
                Some(path) => InMemoryRecordStore::load_snapshot(Path::new(path), dimension)
                    .await
                    .with_context(|| format!("failed to load snapshot {}", path))?,
                None => {
                    warn!("Memory store has no snapshot_path; starting empty");
                    InMemoryRecordStore::new(dimension)
                }
            };
            Ok(Arc::new(store))
        }
    }
}

/// Create the main application router
fn create_router(state: AppState) -> anyhow::Result<Router> {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        .route("/search", post(handlers::search::search))
        .route("/search/methods", get(handlers::search::methods))
        .route("/search/stats", get(handlers::search::stats))
        .route("/context/expand", post(handlers::context::expand))
        .route("/context/ranges", post(handlers::context::ranges));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::RateLimitState::from_config(&state.config.rate_limit)?;
        api_routes = api_routes.route_layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Health endpoints sit outside the rate limiter
    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .route_layer(from_fn(middleware::metrics::track_metrics))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state);

    Ok(app)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
