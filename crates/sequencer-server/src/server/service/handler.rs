//! Routes and handlers for the ID service.
//!
//! The process owns exactly one [`IdGenerator`], created at startup and shared
//! by every request through [`AppState`]. `next_id` may sleep while a
//! millisecond's sequence space is exhausted, so it always runs on the
//! blocking pool rather than on a runtime worker.
//!
//! | Route                       | Success                                      |
//! |-----------------------------|----------------------------------------------|
//! | `GET /sequencer/api/seq`    | `200`, bare JSON integer                     |
//! | `GET /sequencer/api/health` | `200`, `{"status":"serving","node_id":<n>}` |
//!
//! Failures are described in [`super::error`].

use core::time::Duration;
use std::{sync::Arc, time::Instant};

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use sequencer::{IdGenerator, SequencerId};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::server::{
    service::error::ApiError,
    telemetry::{
        increment_id_errors, increment_ids_generated, increment_requests, record_request_duration,
    },
};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    generator: Arc<dyn IdGenerator + Send + Sync>,
}

impl AppState {
    pub fn new(generator: Arc<dyn IdGenerator + Send + Sync>) -> Self {
        Self { generator }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    node_id: u64,
}

/// Builds the application with all middleware attached.
///
/// Requests outliving `request_timeout` are answered with
/// `408 Request Timeout`. The sequencer call they were waiting on still runs
/// to completion in the background.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/api/seq", get(next_id))
        .route("/api/health", get(health));

    Router::new().nest("/sequencer", api).with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::new())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                request_timeout,
            ))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
    )
}

/// `GET /sequencer/api/seq`
async fn next_id(State(state): State<AppState>) -> Result<Json<SequencerId>, ApiError> {
    increment_requests();
    let start = Instant::now();

    let generator = Arc::clone(&state.generator);
    let result = tokio::task::spawn_blocking(move || generator.next_id())
        .await
        .map_err(ApiError::from)
        .and_then(|id| id.map_err(ApiError::from));

    record_request_duration(start.elapsed().as_secs_f64() * 1000.0);

    match result {
        Ok(id) => {
            increment_ids_generated();
            tracing::debug!(%id, "issued id");
            Ok(Json(id))
        }
        Err(err) => {
            increment_id_errors(err.kind());
            tracing::warn!(error = %err, kind = err.kind(), "failed to issue id");
            Err(err)
        }
    }
}

/// `GET /sequencer/api/health`
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "serving",
        node_id: state.generator.node_id(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::Request,
        response::Response,
    };
    use sequencer::{Error, Result, Sequencer, SystemClock, TimeSource};
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use tower::ServiceExt;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct ManualTime(AtomicU64);

    impl TimeSource for ManualTime {
        fn current_millis(&self) -> Result<u64> {
            Ok(self.0.load(Ordering::SeqCst))
        }
    }

    /// Panics on its first reading, with the sequencer's lock held.
    #[cfg(not(feature = "parking-lot"))]
    struct PanicOnceTime(AtomicBool);

    #[cfg(not(feature = "parking-lot"))]
    impl TimeSource for PanicOnceTime {
        fn current_millis(&self) -> Result<u64> {
            if self.0.swap(false, Ordering::SeqCst) {
                panic!("clock failure");
            }
            Ok(1)
        }
    }

    struct SlowGenerator(Duration);

    impl IdGenerator for SlowGenerator {
        fn node_id(&self) -> u64 {
            0
        }

        fn next_id(&self) -> Result<SequencerId> {
            std::thread::sleep(self.0);
            Ok(SequencerId::from_components(1, 0, 0))
        }
    }

    struct PanickingGenerator;

    impl IdGenerator for PanickingGenerator {
        fn node_id(&self) -> u64 {
            0
        }

        fn next_id(&self) -> Result<SequencerId> {
            panic!("boom")
        }
    }

    fn manual_app(node_id: i64, start: u64) -> (Router, Arc<ManualTime>) {
        let time = Arc::new(ManualTime(AtomicU64::new(start)));
        let sequencer = Sequencer::with_node_id(node_id, Arc::clone(&time)).unwrap();
        let app = router(AppState::new(Arc::new(sequencer)), TIMEOUT);
        (app, time)
    }

    async fn get(app: &Router, uri: &str) -> Response {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn seq_returns_bare_integer() {
        let (app, _) = manual_app(5, 100);

        let response = get(&app, "/sequencer/api/seq").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(json(response).await, Value::from(419_450_880_i64));

        let response = get(&app, "/sequencer/api/seq").await;
        assert_eq!(json(response).await, Value::from(419_450_881_i64));
    }

    #[tokio::test]
    async fn clock_regression_maps_to_500() {
        let (app, time) = manual_app(2, 100);
        assert_eq!(get(&app, "/sequencer/api/seq").await.status(), StatusCode::OK);

        time.0.store(99, Ordering::SeqCst);
        let response = get(&app, "/sequencer/api/seq").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json(response).await;
        assert_eq!(body["kind"], "clock_regression");
        assert!(body["error"].as_str().unwrap().contains("clock moved backwards"));

        // The failed request left the sequencer untouched.
        time.0.store(100, Ordering::SeqCst);
        let response = get(&app, "/sequencer/api/seq").await;
        assert_eq!(response.status(), StatusCode::OK);
        let id = SequencerId::from_i64(json(response).await.as_i64().unwrap()).unwrap();
        assert_eq!(id.timestamp(), 100);
        assert_eq!(id.sequence(), 1);
    }

    #[tokio::test]
    async fn timestamp_overflow_maps_to_500() {
        let (app, _) = manual_app(1, SequencerId::max_timestamp() + 1);
        let response = get(&app, "/sequencer/api/seq").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["kind"], "timestamp_overflow");
    }

    #[tokio::test]
    async fn clock_before_epoch_maps_to_500() {
        let clock = SystemClock::with_epoch(Duration::from_millis(u64::MAX / 2));
        let sequencer = Sequencer::with_node_id(1, clock).unwrap();
        let app = router(AppState::new(Arc::new(sequencer)), TIMEOUT);

        let response = get(&app, "/sequencer/api/seq").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["kind"], "clock_before_epoch");
    }

    #[cfg(not(feature = "parking-lot"))]
    #[tokio::test]
    async fn poisoned_sequencer_maps_to_500() {
        let sequencer =
            Sequencer::with_node_id(1, PanicOnceTime(AtomicBool::new(true))).unwrap();
        let app = router(AppState::new(Arc::new(sequencer)), TIMEOUT);

        let response = get(&app, "/sequencer/api/seq").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["kind"], "internal");

        let response = get(&app, "/sequencer/api/seq").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json(response).await;
        assert_eq!(body["kind"], "lock_poisoned");
        assert_eq!(body["error"], "sequencer lock poisoned");
    }

    #[tokio::test]
    async fn health_reports_node_id() {
        let (app, _) = manual_app(42, 0);
        let response = get(&app, "/sequencer/api/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["status"], "serving");
        assert_eq!(body["node_id"], 42);
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let (app, _) = manual_app(0, 0);
        assert_eq!(get(&app, "/seq").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            get(&app, "/sequencer/api/unknown").await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn only_get_is_routed() {
        let (app, _) = manual_app(0, 0);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sequencer/api/seq")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn slow_generation_times_out() {
        let generator = Arc::new(SlowGenerator(Duration::from_millis(500)));
        let app = router(AppState::new(generator), Duration::from_millis(50));
        let response = get(&app, "/sequencer/api/seq").await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn generator_panic_maps_to_500() {
        let app = router(AppState::new(Arc::new(PanickingGenerator)), TIMEOUT);
        let response = get(&app, "/sequencer/api/seq").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["kind"], "internal");
    }

    #[tokio::test]
    async fn ids_are_unique_across_concurrent_requests() {
        let sequencer = Sequencer::with_node_id(7, SystemClock::default()).unwrap();
        let app = router(AppState::new(Arc::new(sequencer)), TIMEOUT);

        let mut tasks = Vec::new();
        for _ in 0..64 {
            let app = app.clone();
            tasks.push(tokio::spawn(async move {
                let response = get(&app, "/sequencer/api/seq").await;
                assert_eq!(response.status(), StatusCode::OK);
                json(response).await.as_i64().unwrap()
            }));
        }

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn api_error_kinds_follow_sequencer_errors() {
        let err = ApiError::from(Error::ClockRegression { last: 2, now: 1 });
        assert_eq!(err.kind(), "clock_regression");
        assert_eq!(
            err.to_string(),
            Error::ClockRegression { last: 2, now: 1 }.to_string()
        );
    }
}
