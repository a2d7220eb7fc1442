//! Per-request orchestration: validate → stage → dispatch → convert → resolve.

use std::path::PathBuf;
use std::time::Instant;

use tokio::io::AsyncWriteExt;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::converter::ConversionTask;
use crate::dispatch::{Dispatcher, Strategy, choose_strategy, validate, validate_input};
use crate::error::ConvertError;
use crate::format::{ServiceVariant, TargetFormat};
use crate::workspace::{JobId, ScratchDir, ScratchFile};

/// Media type of every successful download.
pub const DOWNLOAD_MEDIA_TYPE: &str = "application/octet-stream";

/// One uploaded document plus the client's requested format.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub filename: Option<String>,
    pub format: Option<String>,
    pub bytes: Vec<u8>,
}

/// An upload being written into its job's staging directory.
///
/// Only created for a filename that passed [`validate_input`]. Dropping it
/// removes everything staged so far.
#[derive(Debug)]
pub struct StagedUpload {
    file: tokio::fs::File,
    input: PathBuf,
    job_id: JobId,
    filename: String,
    size: u64,
    // Declared last so the handle above is closed before the directory goes.
    dir: ScratchFile,
}

impl StagedUpload {
    /// Append one chunk of the upload.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), ConvertError> {
        self.file.write_all(chunk).await?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// A finished job. Dropping it deletes the output file.
#[derive(Debug)]
pub struct ConvertedFile {
    pub job_id: JobId,
    pub strategy: Strategy,
    pub target: TargetFormat,
    /// Suggested client-side name, `<original stem>.<target>`.
    pub download_name: String,
    pub media_type: &'static str,
    pub output: ScratchFile,
}

/// Sequences the components for one request at a time; cheap to share.
#[derive(Debug, Clone)]
pub struct ConversionService {
    scratch: ScratchDir,
    variant: ServiceVariant,
    dispatcher: Dispatcher,
}

impl ConversionService {
    pub fn new(scratch: ScratchDir, variant: ServiceVariant, dispatcher: Dispatcher) -> Self {
        Self {
            scratch,
            variant,
            dispatcher,
        }
    }

    pub fn variant(&self) -> ServiceVariant {
        self.variant
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Run one job end to end from an upload held in memory.
    ///
    /// The staged input is removed before this returns, on every path. The
    /// output is removed here on failure, and by dropping the returned
    /// [`ConvertedFile`] on success.
    pub async fn convert(&self, upload: Upload) -> Result<ConvertedFile, ConvertError> {
        validate(
            self.variant,
            upload.filename.as_deref(),
            upload.format.as_deref(),
        )?;
        let mut staged = self.stage(upload.filename.as_deref()).await?;
        staged.write(&upload.bytes).await?;
        self.convert_staged(staged, upload.format.as_deref()).await
    }

    /// Open a fresh job and its staging file for an upload named `filename`.
    ///
    /// The filename is checked first, so a missing name (or, on the PDF-only
    /// service, a non-PDF one) is rejected before anything touches disk.
    pub async fn stage(&self, filename: Option<&str>) -> Result<StagedUpload, ConvertError> {
        let (filename, input_ext) = validate_input(self.variant, filename)?;
        let job_id = JobId::new();

        let dir = ScratchFile::new(self.scratch.input_dir_for(&job_id));
        tokio::fs::create_dir(dir.path()).await?;
        let input = self.scratch.allocate(&job_id, &input_ext);
        let file = tokio::fs::File::create(&input).await?;
        debug!(job_id = %job_id, filename = %filename, "staging upload");

        Ok(StagedUpload {
            file,
            input,
            job_id,
            filename,
            size: 0,
            dir,
        })
    }

    /// Convert a fully written upload into `format`.
    ///
    /// The staging directory is removed before this returns, on every path.
    pub async fn convert_staged(
        &self,
        staged: StagedUpload,
        format: Option<&str>,
    ) -> Result<ConvertedFile, ConvertError> {
        let StagedUpload {
            mut file,
            input,
            job_id,
            filename,
            size,
            dir: staging,
        } = staged;
        file.flush().await?;
        drop(file);

        let request = validate(self.variant, Some(&filename), format)?;
        let strategy = choose_strategy(&request.input_ext, request.target);

        let span = info_span!("job", job_id = %job_id, %strategy, target = %request.target);
        async move {
            let expected = ScratchFile::new(self.scratch.output_path_for(&job_id, request.target));
            info!(
                filename = %request.filename,
                size_bytes = size,
                "staged upload"
            );

            let converter = self.dispatcher.select(strategy);
            let started = Instant::now();
            let produced = converter
                .convert(&ConversionTask {
                    job_id: &job_id,
                    input: &input,
                    expected_output: expected.path(),
                    target: request.target,
                })
                .await
                .inspect_err(|e| warn!(engine = converter.name(), error = %e, "conversion failed"))?;

            let output = if produced == expected.path() {
                expected
            } else {
                ScratchFile::new(produced)
            };
            info!(
                engine = converter.name(),
                elapsed_ms = started.elapsed().as_millis(),
                output = %output.path().display(),
                "conversion succeeded"
            );
            drop(staging);

            Ok::<_, ConvertError>(ConvertedFile {
                job_id,
                strategy,
                target: request.target,
                download_name: request.download_name(),
                media_type: DOWNLOAD_MEDIA_TYPE,
                output,
            })
        }
        .instrument(span)
        .await
    }
}
