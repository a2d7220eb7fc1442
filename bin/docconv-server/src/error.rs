//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a `{"detail": "..."}` JSON body with the appropriate status code.
//! Nothing escapes a handler as an unhandled fault.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docconv_core::{ConvertError, ErrorCategory, FailureCause, ServiceVariant};
use thiserror::Error;
use tracing::{error, warn};

use crate::schemas::convert::ErrorBody;

/// All errors that can occur in the docconv-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A job failed somewhere between validation and output resolution.
    #[error("{source}")]
    Conversion {
        #[source]
        source: ConvertError,
        variant: ServiceVariant,
    },

    /// The multipart body could not be read (malformed, too large, ...).
    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),
}

impl ServerError {
    pub fn conversion(source: ConvertError, variant: ServiceVariant) -> Self {
        ServerError::Conversion { source, variant }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Conversion { source, variant } => conversion_status(source, *variant),
            ServerError::Multipart(e) => e.status(),
        }
    }
}

/// Map a job failure to its HTTP status.
///
/// Tool failures are the caller's fault only on the PDF-only service, and
/// only when the tool's diagnostics implicate the uploaded PDF.
fn conversion_status(err: &ConvertError, variant: ServiceVariant) -> StatusCode {
    match err.category() {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCategory::ToolFailure => match (variant, err.failure_cause()) {
            (ServiceVariant::PdfToDocx, Some(FailureCause::Input)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        ErrorCategory::OutputNotFound | ErrorCategory::Unexpected => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = ?self, "request failed");
        } else {
            warn!(status = status.as_u16(), detail = %detail, "request rejected");
        }
        (status, Json(ErrorBody { detail })).into_response()
    }
}
