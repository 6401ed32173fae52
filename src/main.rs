mod app_state;
mod config;
mod models;
mod routes;
mod services;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::storage::ResultStore;
use services::tryon::TryOnService;
use services::vendor;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing tryon-gateway server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("tryon_jobs_total", "Total try-on jobs submitted");
    metrics::describe_counter!("tryon_jobs_completed", "Total try-on jobs completed");
    metrics::describe_counter!("tryon_jobs_failed", "Total try-on jobs that failed");
    metrics::describe_histogram!(
        "tryon_processing_seconds",
        "Time from upload to finished composite"
    );

    // Initialize vendor client for the configured endpoint profile
    tracing::info!(profile = ?config.vendor_profile, "Initializing try-on vendor client");
    let vendor_client = vendor::from_config(&config).expect("Failed to initialize vendor client");

    // Result store for generated composites
    let store = ResultStore::new(&config.tryon_result_dir, &config.static_root);

    let tryon = TryOnService::new(
        vendor_client,
        store,
        config.tryon_model.clone(),
        Duration::from_secs(config.poll_interval_secs),
        Duration::from_secs(config.poll_timeout_secs),
    );

    let vendor_configured = config
        .dashscope_api_key
        .as_deref()
        .is_some_and(|k| !k.is_empty());
    if !vendor_configured {
        tracing::warn!("DASHSCOPE_API_KEY is not set; try-on requests will fail until it is");
    }

    // Create shared application state
    let state = AppState::new(tryon, &config.tryon_result_dir, vendor_configured);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/tryon", post(routes::tryon::try_on))
        .with_state(state)
        // Generated results are served from the static root
        .nest_service("/static", ServeDir::new(&config.static_root))
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(30 * 1024 * 1024)); // two raw uploads

    tracing::info!("Starting tryon-gateway on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
