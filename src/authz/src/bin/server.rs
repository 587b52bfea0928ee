//! # RBAC Decision Server
//!
//! HTTP front for the permission resolution engine.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /v1/permissions/:identity` - Effective permissions as `{action, resource, allowed}` records
//! - `POST /v1/check` - Single decision for `{identity, action, resource}`
//! - `POST /v1/invalidate` - Drop cached permissions for `{identity}` or everyone
//!
//! ## Configuration
//!
//! See [`rbac_authz::config`]; logging is controlled by `RUST_LOG` (default: info).

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    serve, Router,
};
use rbac_authz::{
    AuthzError, InMemoryRoleStore, PermissionGrant, PermissionsProvider, RbacConfig, RoleStore,
    StoragePermissionsProvider, TtlCache,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shared application state
#[derive(Clone)]
struct AppState {
    provider: Arc<dyn PermissionsProvider>,
    start_time: std::time::Instant,
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Application error type
#[derive(Debug)]
struct AppError(AuthzError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let error = match &self.0 {
            AuthzError::Unauthenticated(_) => "unauthenticated",
            AuthzError::Forbidden { .. } => "forbidden",
            AuthzError::Storage(_) => "storage_error",
            AuthzError::InvalidInput(_) => "bad_request",
            _ => "internal_error",
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: self.0.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        AppError(err)
    }
}

/// Decision request
#[derive(Debug, Deserialize)]
struct CheckRequest {
    identity: String,
    action: String,
    resource: String,
}

/// Decision response
#[derive(Debug, Serialize)]
struct CheckResponse {
    allowed: bool,
    decision: String,
}

/// Invalidation request; no identity clears every entry
#[derive(Debug, Default, Deserialize)]
struct InvalidateRequest {
    #[serde(default)]
    identity: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// GET /v1/permissions/:identity
async fn get_permissions(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<Vec<PermissionGrant>>, AppError> {
    let perms = state.provider.get_permissions_by_identity(&identity).await?;
    Ok(Json(perms.to_grants()))
}

/// POST /v1/check
async fn check(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    if req.identity.is_empty() {
        return Err(AuthzError::Unauthenticated("empty identity".to_string()).into());
    }

    let perms = state.provider.get_permissions_by_identity(&req.identity).await?;
    let allowed = perms.is_allowed(&req.action, &req.resource);

    info!(
        "Decision: {} (action={}, resource={})",
        if allowed { "ALLOW" } else { "DENY" },
        req.action,
        req.resource
    );

    Ok(Json(CheckResponse {
        allowed,
        decision: if allowed { "allow".to_string() } else { "deny".to_string() },
    }))
}

/// POST /v1/invalidate
async fn invalidate(
    State(state): State<AppState>,
    body: Option<Json<InvalidateRequest>>,
) -> StatusCode {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    state.provider.invalidate(req.identity.as_deref());
    StatusCode::NO_CONTENT
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: rbac_authz::VERSION.to_string(),
    })
}

/// Create the HTTP router with all endpoints
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http()
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/v1/permissions/:identity", get(get_permissions))
        .route("/v1/check", post(check))
        .route("/v1/invalidate", post(invalidate))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
        .with_state(state)
}

/// Pick the role store from configuration
async fn build_store(config: &RbacConfig) -> anyhow::Result<Arc<dyn RoleStore>> {
    if let Some(url) = &config.database_url {
        #[cfg(feature = "postgres")]
        {
            info!("Using PostgreSQL role store");
            let store = rbac_authz::storage::PostgresRoleStore::new(url, config.tables.clone())
                .await
                .context("connecting to PostgreSQL")?;
            return Ok(Arc::new(store));
        }

        #[cfg(not(feature = "postgres"))]
        {
            let _ = url;
            warn!("DATABASE_URL set but the postgres feature is disabled; ignoring");
        }
    }

    if let Some(path) = &config.fixture {
        info!("Using in-memory role store from {}", path.display());
        let store = InMemoryRoleStore::from_json_file(path)
            .await
            .with_context(|| format!("loading fixture {}", path.display()))?;
        return Ok(Arc::new(store));
    }

    warn!("No DATABASE_URL or RBAC_FIXTURE configured; every identity resolves to no permissions");
    Ok(Arc::new(InMemoryRoleStore::new()))
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

/// Main server entrypoint
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting RBAC Decision Server v{}", rbac_authz::VERSION);

    let config = RbacConfig::from_env().context("reading configuration")?;

    info!("Configuration:");
    info!("  Port: {}", config.port);
    info!("  Identity field: {}", config.identity_field);
    info!("  Cache TTL: {:?}", config.cache_ttl);

    let store = build_store(&config).await?;
    let base = StoragePermissionsProvider::with_identity_field(store, config.identity_field);

    let provider: Arc<dyn PermissionsProvider> = match config.cache_ttl {
        Some(ttl) => Arc::new(TtlCache::new(base, ttl)),
        None => Arc::new(base),
    };

    let state = AppState {
        provider,
        start_time: std::time::Instant::now(),
    };

    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server shut down gracefully");
    Ok(())
}
