//! HTTP scrape endpoint: a metrics route (Prometheus text exposition) and a
//! minimal root HTML index, bound to a configured address.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_io_timeout::TimeoutStream;
use tokio_util::sync::CancellationToken;
use tower::Service;

const GRACEFUL_SHUTDOWN: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(10);
const READ_HEADER_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to bind scrape listener on {addr}: {source}")]
    Bind { addr: SocketAddr, source: std::io::Error },
}

/// Serves `/metrics` and `/` on `addr` until `cancel` fires, then performs a
/// graceful shutdown bounded to 10 seconds.
///
/// Each accepted connection is driven through its own `hyper_util` builder
/// rather than axum's high-level `serve`, so the conservative bounds apply
/// per connection: reads capped at 10s, the header block at 5s, writes at
/// 30s, and a connection sitting fully idle past 60s is dropped outright.
pub async fn serve(addr: SocketAddr, registry: Registry, cancel: CancellationToken) -> Result<(), ServeError> {
    let state = Arc::new(registry);
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/", get(index_handler))
        .with_state(state);

    let listener = TcpListener::bind(addr).await.map_err(|source| ServeError::Bind { addr, source })?;
    tracing::info!(%addr, "metrics scrape server listening");

    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let app = app.clone();
                        let cancel = cancel.clone();
                        connections.spawn(async move { serve_connection(stream, peer, app, cancel).await });
                    }
                    Err(err) => tracing::warn!(error = %err, "failed to accept scrape connection"),
                }
            }
            () = cancel.cancelled() => {
                tracing::info!("metrics scrape server shutting down");
                break;
            }
        }
    }

    drop(listener);

    tokio::select! {
        () = drain(&mut connections) => {}
        () = tokio::time::sleep(GRACEFUL_SHUTDOWN) => {
            tracing::warn!("metrics scrape server graceful shutdown stalled past 10s, forcing stop");
            connections.abort_all();
        }
    }

    Ok(())
}

async fn drain(connections: &mut JoinSet<()>) {
    while connections.join_next().await.is_some() {}
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, app: Router, cancel: CancellationToken) {
    let mut timeout_stream = Box::pin(TimeoutStream::new(stream));
    timeout_stream.as_mut().set_read_timeout_pinned(Some(READ_TIMEOUT));
    timeout_stream.as_mut().set_write_timeout_pinned(Some(WRITE_TIMEOUT));
    let io = TokioIo::new(timeout_stream);

    let tower_service = app;
    let hyper_service = hyper::service::service_fn(move |request: Request<Incoming>| {
        tower_service.clone().call(request)
    });

    let mut builder = ConnBuilder::new(TokioExecutor::new());
    builder.http1().header_read_timeout(READ_HEADER_TIMEOUT);

    let conn = builder.serve_connection_with_upgrades(io, hyper_service);
    tokio::pin!(conn);

    let outcome = tokio::select! {
        result = conn.as_mut() => result,
        () = tokio::time::sleep(IDLE_TIMEOUT) => {
            tracing::debug!(%peer, "scrape connection idle past 60s, dropping");
            return;
        }
        () = cancel.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(err) = outcome {
        tracing::debug!(%peer, error = %err, "scrape connection ended with error");
    }
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = registry.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut buffer) {
        tracing::warn!(error = %err, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    (StatusCode::OK, String::from_utf8_lossy(&buffer).into_owned())
}

async fn index_handler() -> Html<&'static str> {
    Html("<html><body><a href=\"/metrics\">metrics</a></body></html>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MetricRegistry;

    #[tokio::test]
    async fn scrape_route_exposes_counter_and_gauge_values() {
        let metrics = MetricRegistry::new("test");
        metrics.counter("total", "help").unwrap().inc_by(2);
        metrics.gauge("conn", "help").unwrap().set(5);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let registry = metrics.inner().clone();
        let handle = tokio::spawn(async move { serve(addr, registry, cancel_clone).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let body = reqwest::get(format!("http://{addr}/metrics")).await.unwrap().text().await.unwrap();
        assert!(body.contains("test_total 2"));
        assert!(body.contains("test_conn 5"));

        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    #[tokio::test]
    async fn root_route_returns_html_index() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move { serve(addr, Registry::new(), cancel_clone).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let resp = reqwest::get(format!("http://{addr}/")).await.unwrap();
        assert!(resp.status().is_success());
        let body = resp.text().await.unwrap();
        assert!(body.contains("/metrics"));

        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }
}
