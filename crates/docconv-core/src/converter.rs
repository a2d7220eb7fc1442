//! The conversion capability and its two implementations.
//!
//! Both engines are black boxes reached through a command line:
//! - [`OfficeConverter`] drives a headless office suite
//!   (`<tool> --headless --convert-to <fmt> --outdir <dir> <input>`);
//! - [`PdfToDocxConverter`] drives a dedicated PDF→DOCX reconstruction tool
//!   (`<tool> convert <input.pdf> <output.docx>`).
//!
//! Each returns the path of the artifact it produced, located via
//! [`resolve_output`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::ConvertError;
use crate::format::TargetFormat;
use crate::process::ProcessInvoker;
use crate::resolve::{FsProbe, LocalFs, resolve_output};
use crate::workspace::JobId;

/// Everything a converter needs to know about one job.
#[derive(Debug, Clone, Copy)]
pub struct ConversionTask<'a> {
    pub job_id: &'a JobId,
    /// Staged upload inside the scratch directory.
    pub input: &'a Path,
    /// `<scratch>/<job>.<target>`; also fixes the output directory.
    pub expected_output: &'a Path,
    pub target: TargetFormat,
}

impl ConversionTask<'_> {
    pub fn outdir(&self) -> &Path {
        self.expected_output.parent().unwrap_or_else(|| Path::new("."))
    }
}

#[async_trait]
pub trait Converter: Send + Sync {
    /// Engine name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Convert `task.input` and return the path of the produced file.
    async fn convert(&self, task: &ConversionTask<'_>) -> Result<PathBuf, ConvertError>;
}

// ── Office suite ──────────────────────────────────────────────────────────────

/// Generic path: a headless office suite such as LibreOffice.
pub struct OfficeConverter {
    program: PathBuf,
    invoker: ProcessInvoker,
    isolate_profile: bool,
    probe: Arc<dyn FsProbe>,
}

impl OfficeConverter {
    pub fn new(program: impl Into<PathBuf>, invoker: ProcessInvoker) -> Self {
        Self {
            program: program.into(),
            invoker,
            isolate_profile: false,
            probe: Arc::new(LocalFs),
        }
    }

    /// Give every job its own user profile so concurrent instances never
    /// contend for the suite's single-instance profile lock.
    pub fn with_isolated_profile(mut self, isolate: bool) -> Self {
        self.isolate_profile = isolate;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn FsProbe>) -> Self {
        self.probe = probe;
        self
    }
}

#[async_trait]
impl Converter for OfficeConverter {
    fn name(&self) -> &'static str {
        "LibreOffice"
    }

    async fn convert(&self, task: &ConversionTask<'_>) -> Result<PathBuf, ConvertError> {
        // Removed with its contents when this call returns.
        let profile = if self.isolate_profile {
            Some(
                tempfile::Builder::new()
                    .prefix(&format!("{}.profile-", task.job_id))
                    .tempdir_in(task.outdir())?,
            )
        } else {
            None
        };

        let mut args: Vec<OsString> = Vec::with_capacity(7);
        if let Some(profile) = &profile {
            args.push(format!("-env:UserInstallation={}", file_url(profile.path())).into());
        }
        args.extend([
            "--headless".into(),
            "--convert-to".into(),
            task.target.extension().into(),
            "--outdir".into(),
            task.outdir().as_os_str().to_owned(),
            task.input.as_os_str().to_owned(),
        ]);

        let output = self.invoker.run(self.name(), &self.program, &args).await?;
        info!(
            job_id = %task.job_id,
            target = %task.target,
            elapsed_ms = output.elapsed.as_millis(),
            "office conversion finished"
        );

        if let Some(profile) = profile {
            if let Err(e) = profile.close() {
                warn!(job_id = %task.job_id, error = %e, "failed to remove office profile directory");
            }
        }

        resolve_output(&*self.probe, task.expected_output, task.input, task.target)
    }
}

/// `file://` URL for an absolute local path, as the office suite expects
/// for `-env:` bootstrap variables.
fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    if raw.starts_with('/') {
        format!("file://{raw}")
    } else {
        format!("file:///{raw}")
    }
}

// ── PDF → DOCX ────────────────────────────────────────────────────────────────

/// Specialized path: rebuilds DOCX structure from PDF content.
pub struct PdfToDocxConverter {
    program: PathBuf,
    invoker: ProcessInvoker,
    probe: Arc<dyn FsProbe>,
}

impl PdfToDocxConverter {
    pub fn new(program: impl Into<PathBuf>, invoker: ProcessInvoker) -> Self {
        Self {
            program: program.into(),
            invoker,
            probe: Arc::new(LocalFs),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn FsProbe>) -> Self {
        self.probe = probe;
        self
    }
}

#[async_trait]
impl Converter for PdfToDocxConverter {
    fn name(&self) -> &'static str {
        "pdf2docx"
    }

    async fn convert(&self, task: &ConversionTask<'_>) -> Result<PathBuf, ConvertError> {
        let args = [
            OsString::from("convert"),
            task.input.as_os_str().to_owned(),
            task.expected_output.as_os_str().to_owned(),
        ];
        let output = self.invoker.run(self.name(), &self.program, &args).await?;
        info!(
            job_id = %task.job_id,
            elapsed_ms = output.elapsed.as_millis(),
            "pdf2docx conversion finished"
        );

        resolve_output(&*self.probe, task.expected_output, task.input, task.target)
    }
}
