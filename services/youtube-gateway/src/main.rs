//! YouTube Gateway
//!
//! Single-binary service that:
//! 1. Holds one delegated Google OAuth2 credential for a channel owner
//! 2. Runs the consent flow that produces it (`/auth/google`, `/oauth2callback`)
//! 3. Exposes a small REST surface over the YouTube Data API, refreshing the
//!    credential before upstream calls when it has expired
//! 4. Records outcomes to tracing, Prometheus and a best-effort audit table

mod audit;
mod config;
mod error;
mod metrics;
mod routes;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use google_auth::{CONSENT_SCOPES, CredentialStore, now_millis};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{Instrument, debug, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use youtube::YouTubeClient;

use crate::audit::{AuditLog, PgLogStore};
use crate::config::Config;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// How long pending audit records get to reach the store at shutdown.
const AUDIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    pub credentials: Arc<CredentialStore>,
    pub youtube: YouTubeClient,
    /// Computed once at boot; the consent route only redirects to it.
    pub consent_url: String,
    pub audit: AuditLog,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

/// Build the axum router with all routes and shared state.
fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(routes::router())
        .layer(axum::middleware::from_fn(track_request))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables win over it
    dotenvy::dotenv().ok();

    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting youtube-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file, using environment only"),
    }

    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;

    info!(
        port = config.port,
        redirect_uri = %config.redirect_uri,
        youtube_api = %config.youtube_api_base_url,
        has_refresh_token = !config.refresh_token.is_blank(),
        audit_enabled = config.database_url.is_some(),
        "configuration loaded"
    );

    let http = reqwest::Client::new();
    let credentials = Arc::new(CredentialStore::new(
        config.oauth_client(),
        http.clone(),
        config.seed_credential(now_millis()),
    ));
    let consent_url = credentials
        .build_authorization_url(CONSENT_SCOPES, true, true)
        .context("failed to build consent URL")?;

    let (audit, audit_writer) = match &config.database_url {
        Some(url) => {
            let store = PgLogStore::connect_lazy(url.expose())
                .context("failed to configure audit database")?;
            let (audit, writer) = AuditLog::spawn(Arc::new(store));
            (audit, Some(writer))
        }
        None => {
            warn!("DATABASE_URL not set, audit log disabled");
            (AuditLog::disabled(), None)
        }
    };

    let app_state = AppState {
        credentials,
        youtube: YouTubeClient::with_base_url(http, config.youtube_api_base_url.clone()),
        consent_url: consent_url.to_string(),
        audit: audit.clone(),
        prometheus: prometheus_handle,
        started_at: Instant::now(),
    };

    let app = build_router(app_state);

    let listen_addr = config.listen_addr();
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(
        addr = %listen_addr,
        audit_enabled = audit.is_enabled(),
        "accepting requests; open /auth/google to authorize"
    );

    // The drain timeout starts when the shutdown signal fires: the server is
    // told to drain, then the drain races DRAIN_TIMEOUT.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;

    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    // The writer exits once the last handle is gone and its queue is empty
    drop(audit);
    if let Some(writer) = audit_writer {
        if tokio::time::timeout(AUDIT_FLUSH_TIMEOUT, writer).await.is_err() {
            warn!(
                flush_timeout_secs = AUDIT_FLUSH_TIMEOUT.as_secs(),
                "audit records still pending at exit, dropped"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Tag each request with an id and span, and record its metrics.
async fn track_request(request: Request, next: Next) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        route = %route,
    );

    let started = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let elapsed = started.elapsed();
    let status = response.status().as_u16();

    metrics::record_request(&route, status, elapsed.as_secs_f64());
    span.in_scope(|| {
        debug!(status, duration_ms = elapsed.as_millis() as u64, "request completed");
    });
    response
}

/// Health endpoint: credential readiness and uptime, never token material.
/// Returns 503 when the credential can neither be used nor refreshed.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let credential = state.credentials.current().await;
    let expired = credential.is_expired_at(now_millis());
    let usable = credential.has_refresh_token() || !expired;

    let body = serde_json::json!({
        "status": if usable { "healthy" } else { "degraded" },
        "credential": {
            "has_refresh_token": credential.has_refresh_token(),
            "access_token_expired": expired,
            "expires_at_ms": credential.expiry,
        },
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });
    let status = if usable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, axum::Json(body))
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
