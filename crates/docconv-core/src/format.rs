//! Target formats and the two service variants that restrict them.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// A format the external tools can be asked to produce.
///
/// The lower-case name is both the `--convert-to` argument and the file
/// extension of the produced artifact.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Pdf,
    Docx,
    Odt,
    Rtf,
    Txt,
}

impl TargetFormat {
    pub fn extension(&self) -> &str {
        self.as_ref()
    }
}

/// Which of the two deployable services this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceVariant {
    /// Any office document to any allowed format.
    #[strum(to_string = "generic", serialize = "libreoffice")]
    Generic,
    /// PDF uploads only, always converted to DOCX.
    #[strum(to_string = "pdf-to-docx", serialize = "pdf")]
    PdfToDocx,
}

impl ServiceVariant {
    /// Target formats a client may request from this variant.
    pub fn allowed_formats(&self) -> Vec<TargetFormat> {
        match self {
            ServiceVariant::Generic => TargetFormat::iter().collect(),
            ServiceVariant::PdfToDocx => vec![TargetFormat::Docx],
        }
    }

    /// Alphabetical, comma-separated rendering of [`allowed_formats`](Self::allowed_formats).
    pub fn allowed_formats_display(&self) -> String {
        let mut names: Vec<&str> = self
            .allowed_formats()
            .into_iter()
            .map(<&'static str>::from)
            .collect();
        names.sort_unstable();
        names.join(", ")
    }

    pub fn service_name(&self) -> &'static str {
        match self {
            ServiceVariant::Generic => "document-converter",
            ServiceVariant::PdfToDocx => "pdf-to-docx-converter",
        }
    }

    pub fn engine(&self) -> &'static str {
        match self {
            ServiceVariant::Generic => "LibreOffice",
            ServiceVariant::PdfToDocx => "pdf2docx",
        }
    }
}
