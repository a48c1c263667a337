//! OpenRepo HTTP gateway
//!
//! The public face of the repository. Handles:
//! - article record views, PDF downloads behind the embargo gate
//! - author deposit and harvested-record ingest
//! - lifecycle transitions (publish, withdraw, reinstate, merge)
//! - search, browse, suggest, featured and recent listings
//! - RIS and RDF export
//!
//! Authentication happens upstream: a fronting SSO proxy sets
//! `X-Remote-User`, which the [`identity`] extractor trusts.

mod handlers;
mod identity;

use axum::{
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use openrepo_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    fedora::FedoraClient,
    metrics,
    pidman::Minter,
    solr::SolrClient,
    RepoContext,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub ctx: Arc<RepoContext>,
    pub repo: Arc<Repository>,
    pub db: DbPool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.observability.log_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting OpenRepo gateway v{}", openrepo_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    info!("Prometheus exporter listening on {metrics_addr}");

    // Connect backends; a bad minter configuration fails startup rather
    // than the first deposit.
    let db = DbPool::new(&config.database).await?;
    let store = FedoraClient::new(&config.fedora)?;
    let index = SolrClient::new(&config.solr)?;
    let minter = Minter::new(config.pidman.clone())?;
    minter.verify().await?;

    let ctx = Arc::new(RepoContext::new(
        Arc::new(store),
        Arc::new(index),
        Arc::new(minter),
        &config.repository,
    )?);
    let repo = Arc::new(Repository::new(db.clone()));

    let state = AppState {
        config: Arc::new(config),
        ctx,
        repo,
        db,
    };

    let port = state.config.server.port;
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
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

    let api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Article endpoints
        .route("/publications", post(handlers::ingest::upload))
        .route("/publications/{pid}", get(handlers::articles::get_article))
        .route("/publications/{pid}/pdf", get(handlers::download::download_pdf))
        .route("/publications/{pid}/ris", get(handlers::articles::export_ris))
        .route("/publications/{pid}/rdf", get(handlers::articles::export_rdf))
        // Lifecycle endpoints
        .route("/publications/{pid}/review", post(handlers::articles::review))
        .route("/publications/{pid}/publish", post(handlers::articles::publish))
        .route("/publications/{pid}/withdraw", post(handlers::articles::withdraw))
        .route("/publications/{pid}/reinstate", post(handlers::articles::reinstate))
        .route("/publications/{pid}/merge", post(handlers::articles::merge))
        // Harvest queue endpoints
        .route("/harvest", get(handlers::ingest::harvest_queue))
        .route("/harvest/{pmcid}", post(handlers::ingest::harvest_ingest))
        .route("/harvest/{pmcid}/ignore", post(handlers::ingest::harvest_ignore))
        // Duplicate reconciliation
        .route("/reconcile/{pid}", post(handlers::ingest::reconcile))
        // Search and browse endpoints
        .route("/search", get(handlers::search::search))
        .route("/browse/{field}", get(handlers::search::browse))
        .route("/suggest/{field}", get(handlers::search::suggest))
        .route("/recent", get(handlers::search::recent))
        // Featured articles and summary statistics
        .route("/featured", get(handlers::search::featured))
        .route("/featured/{pid}", post(handlers::search::feature))
        .route("/featured/{pid}", delete(handlers::search::unfeature))
        .route("/stats/top", get(handlers::search::top_stats))
        .route("/reindex", post(handlers::search::reindex));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
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
