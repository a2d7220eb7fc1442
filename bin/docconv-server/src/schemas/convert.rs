use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `multipart/form-data` body of `POST /convert`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ConvertUpload {
    /// The document to convert.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Target format: one of `pdf`, `docx`, `odt`, `rtf`, `txt` (default `pdf`).
    /// Ignored by the PDF-only service, which always produces `docx`.
    #[schema(example = "pdf")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "document-converter")]
    pub service: String,
    #[schema(example = "LibreOffice")]
    pub engine: String,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "Unsupported target format: xlsx. Allowed: docx, odt, pdf, rtf, txt")]
    pub detail: String,
}
