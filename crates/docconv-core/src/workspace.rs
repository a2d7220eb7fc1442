//! Scratch directory shared by every job in the process.
//!
//! The directory is created once at startup. Jobs never lock it: each job
//! owns the paths keyed by its random [`JobId`], so concurrent jobs cannot
//! collide. Files that outlive a crashed job are removed by [`ScratchDir::sweep`].
//!
//! ```text
//! <root>/<job>.in/<job>.<ext>   staged upload
//! <root>/<job>.<format>         tool output
//! ```
//!
//! Uploads are staged one level down so the output can never land on the
//! input, even when the target format equals the upload's extension.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::format::TargetFormat;

/// Random, collision-resistant identifier of one conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Handle to the process-wide scratch directory.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Create the directory (and parents) if absent and return a handle to it.
    ///
    /// Relative roots are resolved against the current directory so the
    /// path handed to external tools does not depend on their cwd.
    pub fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = std::path::absolute(root.into())?;
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// `<root>/<job>.in`, the job's private staging directory.
    pub fn input_dir_for(&self, job: &JobId) -> PathBuf {
        self.root.join(format!("{job}.in"))
    }

    /// `<root>/<job>.in/<job>.<ext>`, or `<root>/<job>.in/<job>` when the
    /// upload had no extension.
    pub fn allocate(&self, job: &JobId, input_ext: &str) -> PathBuf {
        let dir = self.input_dir_for(job);
        if input_ext.is_empty() {
            dir.join(job.to_string())
        } else {
            dir.join(format!("{job}.{input_ext}"))
        }
    }

    /// `<root>/<job>.<format>`
    pub fn output_path_for(&self, job: &JobId, format: TargetFormat) -> PathBuf {
        self.root.join(format!("{job}.{}", format.extension()))
    }

    /// Best-effort removal of a file or a whole directory; a missing path
    /// is not an error.
    pub fn delete(path: &Path) {
        let result = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        match result {
            Ok(()) => debug!(path = %path.display(), "removed scratch file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove scratch file"),
        }
    }

    /// Remove every top-level entry whose mtime is older than `max_age`.
    ///
    /// Entries with no mtime, or one stamped more than `max_age` in the
    /// future, count as stale. Returns the number of entries removed.
    /// Per-entry failures are logged and skipped; only failing to read the
    /// directory itself is an error.
    pub fn sweep(&self, max_age: Duration) -> io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.root)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "failed to read scratch entry during sweep");
                    continue;
                }
            };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let path = entry.path();
            let age = match metadata.modified() {
                Ok(modified) => match now.duration_since(modified) {
                    Ok(age) => age,
                    // A stamp slightly ahead is a fresh entry from a skewed clock.
                    Err(ahead) if ahead.duration() <= max_age => continue,
                    Err(ahead) => {
                        debug!(
                            path = %path.display(),
                            ahead_secs = ahead.duration().as_secs(),
                            "scratch entry stamped far in the future; treating as stale"
                        );
                        max_age
                    }
                },
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "scratch entry has no mtime; treating as stale");
                    max_age
                }
            };
            if age < max_age {
                continue;
            }

            let result = if metadata.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => {
                    debug!(path = %path.display(), age_secs = age.as_secs(), "swept stale scratch entry");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to sweep scratch entry"),
            }
        }

        Ok(removed)
    }
}

/// Owns one job path and removes it on drop, whichever way the job ends.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for ScratchFile {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        ScratchDir::delete(&self.path);
    }
}
