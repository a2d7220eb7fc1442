//! Locating the artifact an external tool actually produced.
//!
//! Office tools name their output after the basename of the input they were
//! given, not after the path the caller expects, and may normalize that
//! basename. Resolution is therefore a two-candidate probe:
//!
//! 1. the expected `<job>.<format>` path;
//! 2. `<input stem>.<format>` next to it.
//!
//! The input itself is never accepted as output: a tool that exits 0 without
//! writing anything must not hand the upload back as the converted file.
//!
//! The filesystem is reached only through [`FsProbe`] so the probe order can
//! be unit-tested without touching disk.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::error::ConvertError;
use crate::format::TargetFormat;

/// How many scratch entries an `OutputNotFound` error lists.
pub const RECENT_ENTRY_LIMIT: usize = 5;

/// Minimal filesystem view needed by [`resolve_output`].
pub trait FsProbe: Send + Sync {
    fn is_file(&self, path: &Path) -> bool;

    /// Names of the `limit` most recently modified entries in `dir`, newest first.
    fn recent_entries(&self, dir: &Path, limit: usize) -> Vec<String>;
}

/// [`FsProbe`] backed by the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl FsProbe for LocalFs {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn recent_entries(&self, dir: &Path, limit: usize) -> Vec<String> {
        let Ok(read_dir) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut entries: Vec<(SystemTime, String)> = read_dir
            .filter_map(Result::ok)
            .map(|e| {
                let modified = e
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, e.file_name().to_string_lossy().into_owned())
            })
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        entries.into_iter().take(limit).map(|(_, name)| name).collect()
    }
}

/// Find the produced artifact or fail with [`ConvertError::OutputNotFound`].
pub fn resolve_output(
    probe: &dyn FsProbe,
    expected: &Path,
    input: &Path,
    target: TargetFormat,
) -> Result<PathBuf, ConvertError> {
    let produced = |candidate: &Path| candidate != input && probe.is_file(candidate);

    if produced(expected) {
        return Ok(expected.to_path_buf());
    }

    let outdir = expected.parent().unwrap_or_else(|| Path::new("."));
    if let Some(stem) = input.file_stem() {
        let alternative = outdir.join(format!("{}.{}", stem.to_string_lossy(), target.extension()));
        if alternative != expected && produced(&alternative) {
            debug!(
                expected = %expected.display(),
                resolved = %alternative.display(),
                "output found under input-stem name"
            );
            return Ok(alternative);
        }
    }

    let recent = probe.recent_entries(outdir, RECENT_ENTRY_LIMIT);
    warn!(expected = %expected.display(), ?recent, "conversion output not found");
    Err(ConvertError::OutputNotFound {
        expected: expected.to_path_buf(),
        recent,
    })
}
