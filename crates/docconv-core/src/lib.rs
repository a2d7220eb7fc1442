//! docconv-core – conversion job orchestration.
//!
//! A job stages an upload in the shared scratch directory, picks a
//! [`Converter`] through the [`Dispatcher`], runs the external tool under a
//! hard timeout, locates the produced file and hands it back as a
//! [`ConvertedFile`] that deletes itself when dropped.
//!
//! ```text
//! Upload ─▶ validate ─▶ ScratchDir ─▶ Dispatcher ─▶ Converter ─▶ resolve_output ─▶ ConvertedFile
//!                                                   (ProcessInvoker)
//! ```

pub mod converter;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod process;
pub mod resolve;
pub mod service;
pub mod workspace;

pub use converter::{ConversionTask, Converter, OfficeConverter, PdfToDocxConverter};
pub use dispatch::{
    Dispatcher, Strategy, ValidatedRequest, choose_strategy, validate, validate_input,
};
pub use error::{ConvertError, ErrorCategory, FailureCause};
pub use format::{ServiceVariant, TargetFormat};
pub use process::{DEFAULT_TIMEOUT, ProcessInvoker, ProcessOutput};
pub use resolve::{FsProbe, LocalFs, resolve_output};
pub use service::{ConversionService, ConvertedFile, DOWNLOAD_MEDIA_TYPE, StagedUpload, Upload};
pub use workspace::{JobId, ScratchDir, ScratchFile};
