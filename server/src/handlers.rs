use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use common::{
    AllJobMetrics, ErrorResponse, GenerationRequest, JobActionResponse, JobSnapshot,
    SubmitResponse,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::state::{AppState, SubmitError};

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/jobs", get(list_jobs))
        .route("/api/v1/jobs/batch", post(submit_batch))
        .route("/api/v1/jobs/stream", post(submit_stream))
        .route("/api/v1/jobs/:id", get(get_job))
        .route("/api/v1/jobs/:id/stop", post(stop_job))
        .route("/api/v1/jobs/:id/keepalive", post(keep_alive))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

fn rejected(err: impl Into<SubmitError>) -> ApiError {
    let err = err.into();
    warn!("request rechazado: {}", err);

    // dirección de stream que no responde: 404, como un recurso inexistente
    let status = match err {
        SubmitError::Invalid(_) => StatusCode::BAD_REQUEST,
        SubmitError::AddressUnavailable { .. } => StatusCode::NOT_FOUND,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("no hay job activo con id {}", id),
        }),
    )
}

async fn submit_batch(
    State(state): State<AppState>,
    Json(req): Json<GenerationRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let job_id = state.submit_batch(req).map_err(rejected)?;
    Ok(Json(SubmitResponse { job_id }))
}

async fn submit_stream(
    State(state): State<AppState>,
    Json(req): Json<GenerationRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let job_id = state.submit_stream(req).await.map_err(rejected)?;
    Ok(Json(SubmitResponse { job_id }))
}

async fn stop_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobActionResponse>, ApiError> {
    if !state.stop(&id) {
        return Err(not_found(&id));
    }

    Ok(Json(JobActionResponse {
        job_id: id,
        found: true,
        message: "el job se va a detener".to_string(),
    }))
}

async fn keep_alive(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobActionResponse>, ApiError> {
    if !state.keep_alive(&id) {
        info!("keepalive para stream desconocido {}", id);
        return Err(not_found(&id));
    }

    Ok(Json(JobActionResponse {
        job_id: id,
        found: true,
        message: "el stream sigue".to_string(),
    }))
}

// Devuelve la foto de un job (activo o terminado)
async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobSnapshot>, StatusCode> {
    state.status(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn list_jobs(State(state): State<AppState>) -> Json<AllJobMetrics> {
    Json(state.list_all())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::MemorySink;
    use crate::state::tests::{batch_request, test_state, wait_terminal};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use common::JobStatus;
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state() -> AppState {
        test_state(
            Arc::new(MemorySink::default()),
            Duration::from_millis(20),
            Duration::from_secs(60),
        )
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json<T: DeserializeOwned>(body: &[u8]) -> T {
        serde_json::from_slice(body).unwrap()
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn empty(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn health_responde_ok() {
        let (status, body) = send(build_router(state()), empty("GET", "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn submit_batch_y_consulta_de_estado() {
        let state = state();
        let app = build_router(state.clone());

        let body = serde_json::to_string(&batch_request(3, 0.0)).unwrap();
        let (status, resp) = send(app.clone(), post_json("/api/v1/jobs/batch", body)).await;
        assert_eq!(status, StatusCode::OK);
        let submitted: SubmitResponse = json(&resp);

        wait_terminal(&state, &submitted.job_id).await;

        let uri = format!("/api/v1/jobs/{}", submitted.job_id);
        let (status, resp) = send(app.clone(), empty("GET", &uri)).await;
        assert_eq!(status, StatusCode::OK);
        let snap: JobSnapshot = json(&resp);
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.log_count, 3);

        let (status, resp) = send(app, empty("GET", "/api/v1/jobs")).await;
        assert_eq!(status, StatusCode::OK);
        let all: AllJobMetrics = json(&resp);
        assert_eq!(all.num_all_batch_jobs, 1);
    }

    #[tokio::test]
    async fn request_invalido_devuelve_400() {
        let body = r#"{
            "repeating_loglines_percent": 0.1,
            "custom_logs": [
                { "frequency": 0.8, "fields": { "a": 1 } },
                { "frequency": 0.8, "fields": { "a": 2 } }
            ],
            "batch_settings": { "number_of_logs": 5 }
        }"#;

        let (status, resp) = send(
            build_router(state()),
            post_json("/api/v1/jobs/batch", body.to_string()),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = json(&resp);
        assert!(err.error.contains("suman"));
    }

    #[tokio::test]
    async fn ids_desconocidos_devuelven_404() {
        let app = build_router(state());

        for (method, uri) in [
            ("GET", "/api/v1/jobs/nada"),
            ("POST", "/api/v1/jobs/nada/stop"),
            ("POST", "/api/v1/jobs/nada/keepalive"),
        ] {
            let (status, _) = send(app.clone(), empty(method, uri)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn stop_y_keepalive_sobre_un_stream() {
        let state = state();
        let app = build_router(state.clone());

        let body = r#"{ "stream_settings": { "log_rate": 50 } }"#.to_string();
        let (status, resp) = send(app.clone(), post_json("/api/v1/jobs/stream", body)).await;
        assert_eq!(status, StatusCode::OK);
        let id = json::<SubmitResponse>(&resp).job_id;

        let (status, resp) =
            send(app.clone(), empty("POST", &format!("/api/v1/jobs/{id}/keepalive"))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json::<JobActionResponse>(&resp).found);

        let (status, _) = send(app.clone(), empty("POST", &format!("/api/v1/jobs/{id}/stop"))).await;
        assert_eq!(status, StatusCode::OK);

        let snap = wait_terminal(&state, &id).await;
        assert_eq!(snap.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn stream_a_direccion_inalcanzable_devuelve_404() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let state = state();
        let body = format!(
            r#"{{ "stream_settings": {{ "stream_address": "http://{addr}/logs" }} }}"#
        );
        let (status, resp) = send(
            build_router(state.clone()),
            post_json("/api/v1/jobs/stream", body),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json::<ErrorResponse>(&resp).error.contains("no está disponible"));
        assert_eq!(state.list_all().num_all_stream_jobs, 0);
    }
}
