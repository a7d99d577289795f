//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the health endpoint
//! - Wire up middleware (tracing, limits, timeouts, request ID)
//! - Serve until stopped, draining in-flight requests until the deadline
//! - Answer requests still in flight at the deadline with 503 so their
//!   connection tasks end instead of outliving `serve`

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ListenerConfig;
use crate::health::{HealthFlag, HealthState};
use crate::lifecycle::listener::{ListenerError, ServiceListener, StopSignal};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub health: HealthFlag,
}

/// Body of `GET /healthz`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub dependency: &'static str,
}

/// HTTP server for the service.
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
    abort: CancellationToken,
}

impl HttpServer {
    /// Bind to the configured address.
    pub async fn bind(
        config: &ListenerConfig,
        health: HealthFlag,
    ) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(config.bind_target())
            .await
            .map_err(|source| ListenerError::Bind {
                addr: config.bind_address.clone(),
                source,
            })?;

        Ok(Self::from_listener(listener, config, health))
    }

    /// Wrap an already bound listener.
    pub fn from_listener(
        listener: TcpListener,
        config: &ListenerConfig,
        health: HealthFlag,
    ) -> Self {
        let abort = CancellationToken::new();
        let router = Self::with_middleware(routes(AppState { health }), config, abort.clone());
        Self {
            listener,
            router,
            abort,
        }
    }

    /// Wrap `router` in all middleware layers.
    ///
    /// Requests still running when `abort` is cancelled get a 503.
    #[allow(deprecated)]
    fn with_middleware(
        router: Router,
        config: &ListenerConfig,
        abort: CancellationToken,
    ) -> Router {
        router
            .layer(middleware::from_fn_with_state(abort, abort_on_deadline))
            .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }
}

fn routes(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .fallback(not_found)
        .with_state(state)
}

impl ServiceListener for HttpServer {
    fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        self.listener.local_addr().map_err(ListenerError::Serve)
    }

    async fn serve(self, stop: StopSignal) -> Result<(), ListenerError> {
        let addr = self.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let abort = self.abort;
        let mut graceful_stop = stop.clone();
        let server = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                graceful_stop.requested().await;
                tracing::info!("No longer accepting connections, draining");
            })
            .into_future();

        let mut deadline_stop = stop;
        let drain_deadline = async move {
            let deadline = deadline_stop.requested().await;
            deadline.cancelled_owned().await;
        };

        tokio::select! {
            served = server => served?,
            _ = drain_deadline => {
                abort.cancel();
                tracing::warn!("Drain deadline reached, aborting in-flight requests");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let dependency = state.health.get();
    let (code, status) = match dependency {
        HealthState::Healthy => (StatusCode::OK, "ok"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
    };

    (
        code,
        Json(HealthResponse {
            status,
            dependency: dependency.as_str(),
        }),
    )
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

async fn abort_on_deadline(
    State(abort): State<CancellationToken>,
    request: Request,
    next: Next,
) -> Response {
    tokio::select! {
        response = next.run(request) => response,
        _ = abort.cancelled() => {
            (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::listener::stop_channel;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    fn router(health: HealthFlag) -> Router {
        HttpServer::with_middleware(
            routes(AppState { health }),
            &ListenerConfig::default(),
            CancellationToken::new(),
        )
    }

    /// A server whose only route signals `entered`, then runs `handler`.
    async fn slow_server<F, Fut>(entered: Arc<Notify>, handler: F) -> (HttpServer, SocketAddr)
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: std::future::Future<Output = &'static str> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let slow = Router::new().route(
            "/slow",
            get(move || {
                let entered = entered.clone();
                let handler = handler.clone();
                async move {
                    entered.notify_one();
                    handler().await
                }
            }),
        );

        let abort = CancellationToken::new();
        let router =
            HttpServer::with_middleware(slow, &ListenerConfig::default(), abort.clone());
        (
            HttpServer {
                listener,
                router,
                abort,
            },
            addr,
        )
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn healthz_reports_unknown_as_unavailable() {
        let response = router(HealthFlag::new())
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn healthz_reports_healthy() {
        let health = HealthFlag::new();
        health.set(HealthState::Healthy);

        let response = router(health)
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["dependency"], "healthy");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found_with_request_id() {
        let response = router(HealthFlag::new())
            .oneshot(Request::get("/v1/guilds").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn in_flight_request_finishes_during_drain() {
        let entered = Arc::new(Notify::new());
        let (server, addr) = slow_server(entered.clone(), || async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            "done"
        })
        .await;

        let (stop, signal) = stop_channel();
        let serving = tokio::spawn(server.serve(signal));
        let request = tokio::spawn(client().get(format!("http://{}/slow", addr)).send());

        entered.notified().await;
        let deadline = CancellationToken::new();
        stop.stop(deadline.clone());

        let response = request.await.unwrap().expect("in-flight request dropped");
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "done");

        tokio::time::timeout(Duration::from_secs(1), serving)
            .await
            .expect("serve should return after the drain")
            .unwrap()
            .unwrap();
        assert!(!deadline.is_cancelled());
    }

    #[tokio::test]
    async fn deadline_aborts_in_flight_request() {
        let entered = Arc::new(Notify::new());
        let (server, addr) =
            slow_server(entered.clone(), std::future::pending::<&'static str>).await;

        let (stop, signal) = stop_channel();
        let serving = tokio::spawn(server.serve(signal));
        let request = tokio::spawn(client().get(format!("http://{}/slow", addr)).send());

        entered.notified().await;
        let deadline = CancellationToken::new();
        stop.stop(deadline.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!serving.is_finished());

        deadline.cancel();
        tokio::time::timeout(Duration::from_secs(1), serving)
            .await
            .expect("serve should return at the deadline")
            .unwrap()
            .unwrap();

        let response = tokio::time::timeout(Duration::from_secs(1), request)
            .await
            .expect("aborted request should be answered")
            .unwrap()
            .unwrap();
        assert_eq!(response.status(), 503);
    }
}
