use anyhow::{bail, Context};
use axum::{
    Router,
    extract::{Json, Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use cdc_archive::{ArchiveConfig, ArchiveTransform, ChangeEvent, MemoryStore, ObjectStore, S3Store};
use futures::future::join_all;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, instrument, warn};

pub mod logging;

// --- Configuration ---

/// Which object store backs the archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    S3,
    /// Process-local store, for development. Contents are lost on exit.
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(StoreKind::S3),
            "memory" => Ok(StoreKind::Memory),
            _ => bail!("Unknown ARCHIVE_STORE '{}' (expected 's3' or 'memory')", s),
        }
    }
}

pub struct Config {
    pub listen_addr: String,
    pub auth_secret: Option<String>,
    pub store: StoreKind,
    pub archive: ArchiveConfig,
}

pub fn load_config() -> anyhow::Result<Config> {
    let store = match std::env::var("ARCHIVE_STORE") {
        Ok(raw) => raw.parse::<StoreKind>()?,
        Err(_) => StoreKind::S3,
    };

    Ok(Config {
        listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8668".to_string()),
        auth_secret: std::env::var("ARCHIVER_AUTH_SECRET")
            .ok()
            .filter(|s| !s.is_empty()),
        store,
        archive: ArchiveConfig::from_env().context("Invalid archive configuration")?,
    })
}

pub fn build_store(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.store {
        StoreKind::S3 => Arc::new(S3Store::new(&config.archive)?),
        StoreKind::Memory => {
            warn!("Using in-memory archive store - archived objects are not persisted");
            Arc::new(MemoryStore::new(config.archive.bucket.clone())?)
        }
    };
    Ok(store)
}

// --- Application State ---

#[derive(Clone)]
pub struct AppState {
    pub transform: Arc<ArchiveTransform>,
    pub auth_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(transform: ArchiveTransform, auth_secret: Option<String>) -> Self {
        Self {
            transform: Arc::new(transform),
            auth_secret: auth_secret.map(Arc::from),
        }
    }
}

// --- Router Setup ---

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/events", post(event_handler))
        .route("/events/batch", post(batch_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .with_state(state)
}

// --- Server Lifecycle ---

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    logging::init_tracing().context("Failed to initialize tracing")?;

    info!("Starting CDC archiver...");

    let config = load_config()?;
    let store = build_store(&config).context("Failed to initialize archive store")?;

    info!(
        bucket = %config.archive.bucket,
        store = ?config.store,
        auth = config.auth_secret.is_some(),
        "Archive destination configured"
    );

    let transform = ArchiveTransform::new(config.archive.clone(), store);
    let state = AppState::new(transform, config.auth_secret.clone());
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .context("Failed to bind port")?;

    info!(addr = %config.listen_addr, "Listening for change events");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("CDC archiver stopped");
    Ok(())
}

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
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}

async fn auth_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(secret) = state.auth_secret.as_deref() else {
        return next.run(req).await;
    };

    let authorized = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .is_some_and(|token| token == secret);

    if authorized {
        next.run(req).await
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

// --- Handlers ---

/// Archive a single event. Always accepted: archive failures are only visible in the logs.
#[instrument(skip(state, event), fields(source = %event.source))]
async fn event_handler(
    State(state): State<AppState>,
    Json(event): Json<ChangeEvent>,
) -> impl IntoResponse {
    let outcome = state.transform.archive(&event).await;
    debug!(outcome = outcome.as_str(), "Event processed");
    StatusCode::ACCEPTED
}

/// Archive several events, one concurrent invocation per event.
#[instrument(skip(state, events), fields(events = events.len()))]
async fn batch_handler(
    State(state): State<AppState>,
    Json(events): Json<Vec<ChangeEvent>>,
) -> impl IntoResponse {
    let outcomes = join_all(events.iter().map(|event| state.transform.archive(event))).await;

    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    if failed > 0 {
        warn!(failed, total = outcomes.len(), "Some events could not be archived");
    } else {
        debug!(total = outcomes.len(), "Batch processed");
    }

    (StatusCode::ACCEPTED, Json(json!({ "accepted": events.len() })))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "bucket": state.transform.bucket(),
    }))
}

async fn version_handler() -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "cdc-archiver"
    }))
}
