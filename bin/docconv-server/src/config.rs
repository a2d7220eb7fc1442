//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use docconv_core::{DEFAULT_TIMEOUT, ServiceVariant};

/// Runtime configuration for docconv-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host part of the listen address (default: `"0.0.0.0"`).
    pub host: String,

    /// Listen port (`PORT`, default: `8000`).
    pub port: u16,

    /// Scratch directory for staged uploads and tool output
    /// (`TMP_DIR`, default: `<cwd>/tmp`).
    pub tmp_dir: PathBuf,

    /// Which service this process exposes.
    pub variant: ServiceVariant,

    /// Executable of the headless office suite.
    pub office_bin: PathBuf,

    /// Executable of the PDF→DOCX tool.
    pub pdf2docx_bin: PathBuf,

    /// Hard wall-clock bound for one tool invocation.
    pub convert_timeout: Duration,

    /// Run each office conversion with its own throwaway user profile.
    pub isolate_profile: bool,

    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,

    /// How often the scratch sweeper runs; `None` disables it.
    pub sweep_interval: Option<Duration>,

    /// Scratch entries older than this are considered orphaned.
    pub sweep_max_age: Duration,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// When set, logs are also written to daily-rolling files in this directory.
    pub log_dir: Option<PathBuf>,

    /// Comma-separated CORS origin allowlist; wildcard when `None`.
    pub cors_allowed_origins: Option<String>,

    /// Mount Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,
}

/// Error raised for configuration values that have no safe fallback.
#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let variant_raw = env_or("DOCCONV_VARIANT", "generic");
        let variant = ServiceVariant::from_str(variant_raw.trim()).map_err(|e| ConfigError {
            key: "DOCCONV_VARIANT",
            value: variant_raw.clone(),
            reason: format!("{e}; expected 'generic' or 'pdf-to-docx'"),
        })?;

        let tmp_dir = lookup("TMP_DIR").map(PathBuf::from).unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("tmp")
        });

        let sweep_interval_secs: u64 = parse_env(&lookup, "DOCCONV_SWEEP_INTERVAL_SECS", 600);
        let max_upload_mb: usize = parse_env(&lookup, "DOCCONV_MAX_UPLOAD_SIZE_MB", 100);

        Ok(Self {
            host: env_or("DOCCONV_HOST", "0.0.0.0"),
            port: parse_env(&lookup, "PORT", 8000),
            tmp_dir,
            variant,
            office_bin: PathBuf::from(env_or("DOCCONV_OFFICE_BIN", "libreoffice")),
            pdf2docx_bin: PathBuf::from(env_or("DOCCONV_PDF2DOCX_BIN", "pdf2docx")),
            convert_timeout: Duration::from_secs(parse_env(
                &lookup,
                "DOCCONV_CONVERT_TIMEOUT_SECS",
                DEFAULT_TIMEOUT.as_secs(),
            )),
            isolate_profile: parse_bool(&lookup, "DOCCONV_ISOLATE_PROFILE", false),
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            sweep_interval: (sweep_interval_secs > 0)
                .then(|| Duration::from_secs(sweep_interval_secs)),
            sweep_max_age: Duration::from_secs(parse_env(
                &lookup,
                "DOCCONV_SWEEP_MAX_AGE_SECS",
                3600,
            )),
            log_level: env_or("DOCCONV_LOG", "info"),
            log_json: parse_bool(&lookup, "DOCCONV_LOG_JSON", false),
            log_dir: lookup("DOCCONV_LOG_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            cors_allowed_origins: lookup("DOCCONV_CORS_ORIGINS").filter(|v| !v.trim().is_empty()),
            enable_swagger: parse_bool(&lookup, "DOCCONV_ENABLE_SWAGGER", true),
        })
    }

    /// `host:port` for the TCP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_env<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    lookup(key)
        .map(|v| {
            let v = v.trim();
            v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
        })
        .unwrap_or(default)
}
