//! HTTP server for the scrape and self-metrics endpoints.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use prometheus_client::registry::Registry;
use serde::Deserialize;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::config::HttpConfig;
use crate::scrape::{Scraper, Target, TargetError};
use crate::telemetry::ScrapeOutcome;

/// How long a stopping server gets to finish in-flight scrapes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

const LANDING_PAGE: &str = r#"<html>
<head><title>ZooKeeper Exporter</title></head>
<body>
<h1>ZooKeeper Exporter</h1>
<p>/scrape?target=ip:port</p>
</body>
</html>
"#;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    scraper: Scraper,
    telemetry: Arc<Registry>,
}

#[derive(Debug, Deserialize)]
struct ScrapeParams {
    target: Option<String>,
}

impl IntoResponse for TargetError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, format!("{}\n", self)).into_response()
    }
}

/// Create the HTTP router.
pub fn create_router(scraper: Scraper, config: &HttpConfig) -> Router {
    let telemetry = Arc::new(scraper.metrics().registry());
    let state = AppState { scraper, telemetry };

    Router::new()
        .route("/", get(root_handler))
        .route(&config.scrape_path, get(scrape_handler))
        .route(&config.metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the landing page.
async fn root_handler() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

/// Handler for the scrape endpoint.
async fn scrape_handler(
    State(state): State<AppState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    Query(params): Query<ScrapeParams>,
) -> Response {
    let remote = remote.map(|ConnectInfo(addr)| addr);
    let metrics = state.scraper.metrics().clone();

    let target = match Target::parse(params.target.as_deref()) {
        Ok(target) => target,
        Err(e) => {
            warn!(remote = ?remote, error = %e, "Rejected scrape request");
            metrics.record_scrape(ScrapeOutcome::Rejected);
            return e.into_response();
        }
    };

    info!(%target, "Scrape target");

    let scraper = state.scraper;
    let scrape_target = target.clone();
    let encoded =
        run_guarded(remote, async move { scraper.scrape(scrape_target).await.encode() }).await;

    match encoded {
        Ok(Ok(body)) => (
            StatusCode::OK,
            [("content-type", OPENMETRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Ok(Err(e)) => {
            error!(%target, error = %e, "Failed to encode scrape result");
            metrics.record_scrape(ScrapeOutcome::Failed);
            internal_error()
        }
        Err(response) => {
            metrics.record_scrape(ScrapeOutcome::Failed);
            response
        }
    }
}

/// Handler for the exporter's own metrics.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let mut body = String::new();
    match prometheus_client::encoding::text::encode(&mut body, &state.telemetry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", OPENMETRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode exporter metrics");
            internal_error()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        StatusCode::INTERNAL_SERVER_ERROR
            .canonical_reason()
            .unwrap_or("Internal Server Error"),
    )
        .into_response()
}

/// Run `fut` on its own task, turning a panic into a 500 response.
async fn run_guarded<F, T>(remote: Option<SocketAddr>, fut: F) -> Result<T, Response>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(fut).await.map_err(|e| {
        error!(remote = ?remote, error = %e, "Caught panic while handling request");
        internal_error()
    })
}

/// HTTP server configuration.
pub struct HttpServer {
    scraper: Scraper,
    listen_addr: SocketAddr,
    config: HttpConfig,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(scraper: Scraper, listen_addr: SocketAddr, config: HttpConfig) -> Self {
        Self {
            scraper,
            listen_addr,
            config,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.scraper, &self.config);

        info!(
            addr = %self.listen_addr,
            scrape_path = %self.config.scrape_path,
            metrics_path = %self.config.metrics_path,
            "Starting HTTP server"
        );

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(addr = %self.listen_addr, "HTTP server listening");

        // Run server with graceful shutdown
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            loop {
                if shutdown.changed().await.is_err() {
                    break;
                }
                if *shutdown.borrow() {
                    break;
                }
            }
            info!("HTTP server shutting down");
        })
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Serve until `signal` resolves, then shut down gracefully.
    ///
    /// Returns early with the server's error if it stops on its own, for
    /// example when the listen address cannot be bound.
    pub async fn run_until<F>(self, signal: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut server = tokio::spawn(self.run(shutdown_rx));

        tokio::select! {
            () = signal => {}
            result = &mut server => return result?,
        }

        let _ = shutdown_tx.send(true);
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    grace_secs = SHUTDOWN_GRACE.as_secs(),
                    "HTTP server did not stop in time"
                );
                Ok(())
            }
        }
    }
}
