use crate::middleware::trace::X_TRACE_ID;
use crate::state::AppState;
use axum::http::{HeaderName, header};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// The upload form is usually served from another origin, so CORS is on by
/// default; `DOCCONV_CORS_ORIGINS` narrows it to an allowlist.
pub fn cors_layer(state: Arc<AppState>) -> CorsLayer {
    let origins: Vec<axum::http::HeaderValue> = state
        .config
        .cors_allowed_origins
        .as_deref()
        .map(|list| {
            list.split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default();

    // Browsers only hand the download name to scripts when it is exposed.
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .expose_headers([header::CONTENT_DISPOSITION, HeaderName::from_static(X_TRACE_ID)]);
    if origins.is_empty() {
        // Wildcard – suitable for development; set DOCCONV_CORS_ORIGINS in production.
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}
