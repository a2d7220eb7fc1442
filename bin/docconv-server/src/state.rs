//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use docconv_core::ConversionService;

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Job orchestration: scratch directory, dispatcher and converters.
    pub service: Arc<ConversionService>,
}
