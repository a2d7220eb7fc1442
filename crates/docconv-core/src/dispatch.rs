//! Request validation and conversion-path selection.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use strum::Display;

use crate::converter::Converter;
use crate::error::ConvertError;
use crate::format::{ServiceVariant, TargetFormat};

/// Target format used when the client does not send one.
pub const DEFAULT_TARGET: TargetFormat = TargetFormat::Pdf;

/// Which converter handles a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Strategy {
    /// Headless office tool, target format passed on its command line.
    ExternalTool,
    /// Dedicated PDF→DOCX reconstruction.
    PdfToDocx,
}

/// A request that passed validation, with everything lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    /// Filename exactly as uploaded.
    pub filename: String,
    /// Lower-case extension without the dot; empty when the name has none.
    pub input_ext: String,
    pub target: TargetFormat,
}

impl ValidatedRequest {
    /// `<original stem>.<target>`, the name suggested to the client.
    pub fn download_name(&self) -> String {
        let stem = Path::new(&self.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename.clone());
        format!("{stem}.{}", self.target.extension())
    }
}

/// Filename checks alone, enough to decide whether an upload may be staged.
///
/// Returns the filename and its lower-case extension (no dot, empty when
/// the name has none).
pub fn validate_input(
    variant: ServiceVariant,
    filename: Option<&str>,
) -> Result<(String, String), ConvertError> {
    let filename = match filename {
        Some(name) if !name.trim().is_empty() => name.to_owned(),
        _ => return Err(ConvertError::MissingFilename),
    };
    let input_ext = Path::new(&filename)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if variant == ServiceVariant::PdfToDocx && input_ext != "pdf" {
        return Err(ConvertError::UnsupportedInput { extension: input_ext });
    }
    Ok((filename, input_ext))
}

/// Check filename and format against the variant's rules.
///
/// Performs no I/O, so a rejected request never touches the scratch
/// directory or spawns a process.
pub fn validate(
    variant: ServiceVariant,
    filename: Option<&str>,
    requested_format: Option<&str>,
) -> Result<ValidatedRequest, ConvertError> {
    let (filename, input_ext) = validate_input(variant, filename)?;

    let target = match variant {
        ServiceVariant::Generic => {
            let requested = requested_format
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| DEFAULT_TARGET.to_string());
            TargetFormat::from_str(&requested)
                .ok()
                .filter(|f| variant.allowed_formats().contains(f))
                .ok_or_else(|| ConvertError::UnsupportedFormat {
                    format: requested,
                    allowed: variant.allowed_formats_display(),
                })?
        }
        ServiceVariant::PdfToDocx => TargetFormat::Docx,
    };

    Ok(ValidatedRequest {
        filename,
        input_ext,
        target,
    })
}

/// PDF→DOCX takes the specialized path; everything else goes to the office tool.
pub fn choose_strategy(input_ext: &str, target: TargetFormat) -> Strategy {
    if input_ext.eq_ignore_ascii_case("pdf") && target == TargetFormat::Docx {
        Strategy::PdfToDocx
    } else {
        Strategy::ExternalTool
    }
}

/// Holds one converter per [`Strategy`].
#[derive(Clone)]
pub struct Dispatcher {
    external_tool: Arc<dyn Converter>,
    pdf_to_docx: Arc<dyn Converter>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("external_tool", &self.external_tool.name())
            .field("pdf_to_docx", &self.pdf_to_docx.name())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(external_tool: Arc<dyn Converter>, pdf_to_docx: Arc<dyn Converter>) -> Self {
        Self {
            external_tool,
            pdf_to_docx,
        }
    }

    pub fn select(&self, strategy: Strategy) -> &Arc<dyn Converter> {
        match strategy {
            Strategy::ExternalTool => &self.external_tool,
            Strategy::PdfToDocx => &self.pdf_to_docx,
        }
    }
}
