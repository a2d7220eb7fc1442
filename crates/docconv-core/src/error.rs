//! Error taxonomy for a single conversion job.
//!
//! Every failure a job can hit maps onto one [`ErrorCategory`]; the HTTP
//! layer turns the category (plus the service variant) into a status code.
//! The `Display` strings double as the client-facing `detail` message.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Coarse classification used by the endpoint layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad filename, format or input type. Caller's fault.
    Validation,
    /// The external tool exceeded its wall-clock bound.
    Timeout,
    /// The external tool exited non-zero.
    ToolFailure,
    /// The tool reported success but no artifact could be located.
    OutputNotFound,
    /// Anything else (I/O, spawn failures, ...).
    Unexpected,
}

/// Who is most likely to blame for a tool failure.
///
/// Decided once from the tool's diagnostic output when the failure is
/// created, so callers never need to sniff error strings themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The diagnostics point at the uploaded document (malformed PDF, ...).
    Input,
    /// Nothing in the diagnostics implicates the input.
    Tool,
}

/// Markers that, when present in a tool's stderr, implicate the input file.
const INPUT_FAULT_MARKERS: &[&str] = &["pdf", "libreoffice"];

impl FailureCause {
    /// Classify a tool diagnostic. Matching is case-insensitive.
    pub fn classify(diagnostic: &str) -> Self {
        let lowered = diagnostic.to_ascii_lowercase();
        if INPUT_FAULT_MARKERS.iter().any(|m| lowered.contains(m)) {
            FailureCause::Input
        } else {
            FailureCause::Tool
        }
    }
}

/// All errors that can occur while staging, converting or locating a job.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The upload had no filename (or an empty one).
    #[error("No file provided")]
    MissingFilename,

    /// The requested target format is outside the service's allowed set.
    #[error("Unsupported target format: {format}. Allowed: {allowed}")]
    UnsupportedFormat { format: String, allowed: String },

    /// The PDF-only service received something that is not a PDF.
    #[error("Only PDF files are supported")]
    UnsupportedInput { extension: String },

    /// The external tool was killed after running past its bound.
    #[error("Conversion timeout: {tool} took too long to process the file")]
    Timeout { tool: &'static str, after: Duration },

    /// The external tool exited with a non-zero status (or was signalled).
    #[error("{tool} conversion failed: {stderr}")]
    ToolFailure {
        tool: &'static str,
        exit_code: Option<i32>,
        stderr: String,
        cause: FailureCause,
    },

    /// The external tool could not be started at all.
    #[error("Conversion failed: could not launch {tool} ({program}): {source}")]
    Spawn {
        tool: &'static str,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool succeeded but neither output candidate exists.
    #[error("Conversion output not found. Files in tmp: {recent:?}")]
    OutputNotFound {
        expected: PathBuf,
        recent: Vec<String>,
    },

    /// Filesystem failure while staging or reading job files.
    #[error("Conversion failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConvertError::MissingFilename
            | ConvertError::UnsupportedFormat { .. }
            | ConvertError::UnsupportedInput { .. } => ErrorCategory::Validation,
            ConvertError::Timeout { .. } => ErrorCategory::Timeout,
            ConvertError::ToolFailure { .. } => ErrorCategory::ToolFailure,
            ConvertError::OutputNotFound { .. } => ErrorCategory::OutputNotFound,
            ConvertError::Spawn { .. } | ConvertError::Io(_) => ErrorCategory::Unexpected,
        }
    }

    /// `Some(cause)` for tool failures, `None` for everything else.
    pub fn failure_cause(&self) -> Option<FailureCause> {
        match self {
            ConvertError::ToolFailure { cause, .. } => Some(*cause),
            _ => None,
        }
    }
}
