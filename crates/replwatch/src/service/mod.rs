//! HTTP service exposing replica set status.
//!
//! Every request is answered from a single shared [`ConnectionGuard`]. The
//! router accepts `GET` on any path; other methods are rejected before the
//! guard is touched. A timeout layer bounds each exchange at a multiple of
//! the per-operation timeout and answers `408` with the usual JSON error body.

mod dispatch;
mod errors;

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use replwatch_config::Config;

use crate::driver::ClusterDriver;
use crate::guard::ConnectionGuard;
use crate::health::HealthReporter;

pub use dispatch::ServiceState;
pub use errors::{DispatchError, ServeError};

pub(crate) const SERVICE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::service");

/// Builds the router answering status requests.
#[must_use]
pub fn router<D: ClusterDriver>(state: Arc<ServiceState<D>>, listener_timeout: Duration) -> Router {
    Router::new()
        .fallback(dispatch::handle::<D>)
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            listener_timeout,
        ))
        .layer(middleware::map_response(errors::describe_timeout))
        .layer(TraceLayer::new_for_http())
}

/// Runs the HTTP service until `shutdown` resolves, then closes the shared
/// connection.
///
/// # Errors
///
/// Returns [`ServeError`] when the port cannot be bound or the server loop
/// fails.
pub async fn serve<D, F>(
    driver: Arc<D>,
    config: &Config,
    reporter: Arc<dyn HealthReporter>,
    shutdown: F,
) -> Result<(), ServeError>
where
    D: ClusterDriver,
    F: Future<Output = ()> + Send + 'static,
{
    let guard = Arc::new(ConnectionGuard::new(
        driver,
        config.uri(),
        config.timeout(),
        reporter,
    ));
    let state = Arc::new(ServiceState::new(Arc::clone(&guard), config));
    let app = router(state, config.listener_timeout());

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port()));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    info!(target: SERVICE_TARGET, %addr, "listening for status requests");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServeError::Serve);

    info!(target: SERVICE_TARGET, "service stopped; closing cluster connection");
    guard.shutdown().await;
    served
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{FakeDriver, RecordingHealthReporter};
    use axum::body::{Body, Bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use mongodb::bson::doc;
    use replwatch_config::InvalidationPolicy;
    use rstest::{fixture, rstest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const CHUNK: usize = 8 * 1024;
    const CHUNKS: usize = 32;

    struct Service {
        driver: FakeDriver,
        state: Arc<ServiceState<FakeDriver>>,
        app: Router,
    }

    fn service_with(config: &Config) -> Service {
        let driver = FakeDriver::new();
        let guard = Arc::new(ConnectionGuard::new(
            Arc::new(driver.clone()),
            config.uri(),
            config.timeout(),
            Arc::new(RecordingHealthReporter::default()),
        ));
        let state = Arc::new(ServiceState::new(guard, config));
        let app = router(Arc::clone(&state), config.listener_timeout());
        Service { driver, state, app }
    }

    #[fixture]
    fn service() -> Service {
        service_with(&Config::default())
    }

    fn request(method: Method) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri("/")
            .body(Body::from("ignored"))
            .expect("request should build")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[rstest]
    #[tokio::test]
    async fn get_returns_encoded_status(service: Service) {
        let response = service
            .app
            .oneshot(request(Method::GET))
            .await
            .expect("router is infallible");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/json")
        );
        let body = body_json(response).await;
        assert_eq!(body["set"], "rs0");
        assert_eq!(
            service.driver.commands(),
            vec![("admin".to_owned(), doc! { "replSetGetStatus": 1 })]
        );
    }

    #[rstest]
    #[case(Method::POST)]
    #[case(Method::PUT)]
    #[case(Method::DELETE)]
    #[tokio::test]
    async fn other_methods_are_rejected_without_connecting(
        service: Service,
        #[case] method: Method,
    ) {
        let response = service
            .app
            .oneshot(request(method))
            .await
            .expect("router is infallible");

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = body_json(response).await;
        assert_eq!(body["status"], 405);
        assert_eq!(service.driver.connect_count(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn upstream_failure_returns_500_and_reconnects_next_time(service: Service) {
        service.driver.reject_commands("no replset config has been received");
        let response = service
            .app
            .clone()
            .oneshot(request(Method::GET))
            .await
            .expect("router is infallible");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "upstream");
        assert!(!service.state.guard().is_connected().await);

        service.driver.accept_commands();
        let response = service
            .app
            .oneshot(request(Method::GET))
            .await
            .expect("router is infallible");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(service.driver.connect_count(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn connection_failure_policy_keeps_handle_after_rejection() {
        let config = Config {
            invalidation_policy: InvalidationPolicy::ConnectionFailure,
            ..Config::default()
        };
        let service = service_with(&config);
        service.driver.reject_commands("no replset config has been received");

        let response = service
            .app
            .oneshot(request(Method::GET))
            .await
            .expect("router is infallible");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(service.state.guard().is_connected().await);
    }

    #[rstest]
    #[tokio::test]
    async fn unreachable_cluster_returns_500(service: Service) {
        service.driver.fail_connects("connection refused");
        let response = service
            .app
            .oneshot(request(Method::GET))
            .await
            .expect("router is infallible");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "connect");
    }

    #[rstest]
    #[tokio::test]
    async fn concurrent_gets_complete_independently(service: Service) {
        service.driver.delay_commands(Duration::from_millis(20));
        let first = service.app.clone().oneshot(request(Method::GET));
        let second = service.app.clone().oneshot(request(Method::GET));
        let (first, second) = tokio::join!(first, second);

        for response in [first, second] {
            let response = response.expect("router is infallible");
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            assert_eq!(body["set"], "rs0");
            assert_eq!(body["members"][0]["stateStr"], "PRIMARY");
        }
        assert_eq!(service.driver.connect_count(), 1);
        assert_eq!(service.driver.commands().len(), 2);
    }

    /// Streams `CHUNKS` chunks and counts the bytes the server pulls.
    fn counted_body() -> (Body, Arc<AtomicUsize>) {
        let consumed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&consumed);
        let chunks = futures::stream::iter((0..CHUNKS).map(move |_| {
            counter.fetch_add(CHUNK, Ordering::SeqCst);
            Ok::<_, std::io::Error>(Bytes::from(vec![0_u8; CHUNK]))
        }));
        (Body::from_stream(chunks), consumed)
    }

    #[rstest]
    #[case(Method::GET, StatusCode::OK)]
    #[case(Method::POST, StatusCode::METHOD_NOT_ALLOWED)]
    #[tokio::test]
    async fn large_request_bodies_are_drained_completely(
        service: Service,
        #[case] method: Method,
        #[case] expected: StatusCode,
    ) {
        let (body, consumed) = counted_body();
        let request = Request::builder()
            .method(method)
            .uri("/")
            .body(body)
            .expect("request should build");

        let response = service
            .app
            .oneshot(request)
            .await
            .expect("router is infallible");

        assert_eq!(response.status(), expected);
        assert_eq!(consumed.load(Ordering::SeqCst), CHUNK * CHUNKS);
    }

    #[rstest]
    #[tokio::test]
    async fn slow_exchange_hits_listener_timeout_with_json_body(service: Service) {
        service.driver.delay_commands(Duration::from_millis(500));
        let app = router(Arc::clone(&service.state), Duration::from_millis(20));

        let response = app
            .oneshot(request(Method::GET))
            .await
            .expect("router is infallible");

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "timeout");
        assert_eq!(body["status"], 408);
    }

    #[rstest]
    #[tokio::test]
    async fn serve_reports_bind_failure() {
        let occupied = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .expect("ephemeral port should bind");
        let port = occupied.local_addr().expect("local addr").port();
        let config = Config {
            port,
            ..Config::default()
        };

        let error = serve(
            Arc::new(FakeDriver::new()),
            &config,
            Arc::new(RecordingHealthReporter::default()),
            std::future::ready(()),
        )
        .await
        .expect_err("port is already taken");
        assert!(matches!(error, ServeError::Bind { .. }));
    }
}
