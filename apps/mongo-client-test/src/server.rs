//! The metrics endpoint.

use axum::{Router, middleware, routing::get};
use core_config::server::ServerConfig;
use observability::{metrics_handler, middleware::metrics_middleware};
use std::io;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::shutdown::wait_for_shutdown;

/// Body of every non-metrics path
pub const FALLBACK_BODY: &str = "OK";

async fn fallback() -> &'static str {
    FALLBACK_BODY
}

/// `GET /metrics` in text exposition format, `OK` everywhere else
pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .fallback(fallback)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Bind the metrics port. Fails when the address is taken.
pub async fn bind(config: &ServerConfig) -> io::Result<TcpListener> {
    let address = config.address();
    let listener = TcpListener::bind(&address).await.inspect_err(|e| {
        error!(address = %address, error = %e, "Failed to bind metrics server");
    })?;

    info!("Metrics server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Serve [`router`] until `shutdown` flips, then drain in-flight requests
pub async fn serve(listener: TcpListener, shutdown: watch::Receiver<bool>) -> io::Result<()> {
    axum::serve(listener, router())
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
        .inspect_err(|e| {
            error!("Server encountered an error: {:?}", e);
        })?;

    info!("Metrics server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_text(uri: &str) -> (StatusCode, String) {
        let response = router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_fallback_answers_ok() {
        let (status, body) = get_text("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");

        let (status, body) = get_text("/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_bind_fails_on_occupied_port() {
        let taken = bind(&ServerConfig::new("127.0.0.1".to_string(), 0))
            .await
            .unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = bind(&ServerConfig::new("127.0.0.1".to_string(), port))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let config = ServerConfig::new("127.0.0.1".to_string(), 0);
        let listener = bind(&config).await.unwrap();
        let server = tokio::spawn(serve(listener, rx));

        tx.send(true).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .expect("server stopped")
            .unwrap();
        assert!(result.is_ok());
    }
}
