//! HTTP endpoints
//!
//! Two small HTTP/1 servers: one serving the Prometheus scrape endpoint and
//! `/ping`, one serving Kubernetes-style health probes.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::health::HealthMonitor;
use crate::metrics::PrometheusMetricSink;

type HttpResponse = Response<Full<Bytes>>;

fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> HttpResponse {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn not_found() -> HttpResponse {
    respond(StatusCode::NOT_FOUND, "text/plain", "not found")
}

// =============================================================================
// Routes
// =============================================================================

/// Routes for the metrics listener
pub fn metrics_routes(sink: &PrometheusMetricSink, path: &str) -> HttpResponse {
    match path {
        "/metrics" => match sink.encode() {
            Ok(buffer) => respond(StatusCode::OK, prometheus::TEXT_FORMAT, buffer),
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    "failed to encode metrics",
                )
            }
        },
        "/ping" => respond(StatusCode::OK, "text/plain", "pong"),
        _ => not_found(),
    }
}

/// Routes for the health listener
pub fn health_routes(health: &HealthMonitor, path: &str) -> HttpResponse {
    match path {
        "/healthz" | "/livez" => {
            let check = health.liveness_check();
            if check.status.is_operational() {
                respond(StatusCode::OK, "text/plain", "ok")
            } else {
                respond(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "text/plain",
                    check.message.unwrap_or_default(),
                )
            }
        }
        "/readyz" => {
            let response = health.check_all();
            let status = if response.status.is_operational() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            match serde_json::to_vec(&response) {
                Ok(body) => respond(status, "application/json", body),
                Err(e) => {
                    error!("Failed to serialize health response: {}", e);
                    respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "error")
                }
            }
        }
        _ => not_found(),
    }
}

// =============================================================================
// Server Loop
// =============================================================================

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Source of incoming connections
#[async_trait]
trait Acceptor: Send {
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn accept(&mut self) -> std::io::Result<Self::Io>;

    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

#[async_trait]
impl Acceptor for TcpListener {
    type Io = TcpStream;

    async fn accept(&mut self) -> std::io::Result<TcpStream> {
        TcpListener::accept(self).await.map(|(stream, _)| stream)
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Serve `routes` on `listener` until `shutdown` is cancelled.
///
/// Failed accepts (e.g. file descriptor exhaustion) are logged and retried.
pub async fn serve<F>(
    name: &'static str,
    listener: TcpListener,
    routes: F,
    shutdown: CancellationToken,
) -> Result<()>
where
    F: Fn(&str) -> HttpResponse + Send + Sync + 'static,
{
    serve_on(name, listener, routes, shutdown).await
}

async fn serve_on<A, F>(
    name: &'static str,
    mut listener: A,
    routes: F,
    shutdown: CancellationToken,
) -> Result<()>
where
    A: Acceptor,
    F: Fn(&str) -> HttpResponse + Send + Sync + 'static,
{
    let routes = Arc::new(routes);
    info!("{} server listening on {}", name, listener.local_addr()?);

    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let stream = match accepted {
            Ok(stream) => stream,
            Err(e) => {
                warn!("{} server failed to accept connection: {}", name, e);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(ACCEPT_BACKOFF) => continue,
                }
            }
        };

        let io = TokioIo::new(stream);
        let routes = Arc::clone(&routes);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let response = routes(req.uri().path());
                async move { Ok::<_, Infallible>(response) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("{} server connection error: {}", name, e);
            }
        });
    }

    info!("{} server stopped", name);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
