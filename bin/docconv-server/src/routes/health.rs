//! Health / heartbeat endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::schemas::convert::HealthResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health, get_health_alias), components(schemas(HealthResponse)))]
pub struct HealthApi;

/// Register health-check routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_health))
        .route("/health", get(get_health_alias))
}

/// Heartbeat endpoint.
///
/// Reports which service this process is and which engine backs it.
/// Load-balancers and monitoring systems should poll this endpoint.
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let variant = state.service.variant();
    Json(HealthResponse {
        status: "ok".into(),
        service: variant.service_name().into(),
        engine: variant.engine().into(),
    })
}

/// Same payload as `GET /`, at the path probes usually expect.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn get_health_alias(state: State<Arc<AppState>>) -> Json<HealthResponse> {
    get_health(state).await
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::routes::test_support;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use docconv_core::ServiceVariant;
    use http_body_util::BodyExt;
    use std::path::Path;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state(scratch: &Path, variant: ServiceVariant) -> Arc<AppState> {
        let cfg = test_support::config(
            scratch,
            variant,
            Path::new("libreoffice"),
            Path::new("pdf2docx"),
        );
        test_support::state(cfg, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn generic_service_reports_office_engine() {
        let tmp = tempfile::tempdir().unwrap();
        let Json(body) = get_health(State(state(tmp.path(), ServiceVariant::Generic))).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.service, "document-converter");
        assert_eq!(body.engine, "LibreOffice");
    }

    #[tokio::test]
    async fn pdf_service_reports_pdf2docx_engine() {
        let tmp = tempfile::tempdir().unwrap();
        let Json(body) = get_health(State(state(tmp.path(), ServiceVariant::PdfToDocx))).await;
        assert_eq!(body.service, "pdf-to-docx-converter");
        assert_eq!(body.engine, "pdf2docx");
    }

    #[tokio::test]
    async fn both_paths_answer_through_the_router() {
        let tmp = tempfile::tempdir().unwrap();
        let app = crate::routes::build(state(tmp.path(), ServiceVariant::Generic));

        for path in ["/", "/health"] {
            let response = app
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().contains_key("x-trace-id"));
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["status"], "ok");
        }
    }
}
