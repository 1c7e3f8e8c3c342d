//! Writing source archive entries under a base directory.
//!
//! Extraction is driven by a per-entry callback so callers can post-process
//! files as they land. [`write_entry`] is the default callback: resolve the
//! destination with [`super::paths::resolve`], read the whole entry and write
//! it with the entry's permission bits.
//!
//! Extraction is not transactional. When a callback fails the walk stops and
//! the error names the last file that was written; earlier files stay on
//! disk.

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::paths::{Resolution, SkipReason, resolve};
use super::{ArchiveEntry, SourceArchive};
use crate::core::{UpkeepError, UpkeepResult};

/// What a callback did with one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Written(PathBuf),
    Skipped(SkipReason),
}

/// Summary of a finished extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Number of files written.
    pub written: usize,
    /// Number of entries skipped (directories included).
    pub skipped: usize,
    /// The last file written, if any.
    pub last_written: Option<PathBuf>,
}

/// Default per-entry callback.
///
/// # Errors
///
/// Returns [`UpkeepError::Extraction`] when the destination directory cannot
/// be created or the file cannot be read or written.
pub fn write_entry(entry: ArchiveEntry<'_>, base: &Path) -> UpkeepResult<EntryOutcome> {
    let destination = match resolve(&entry.path, base)? {
        Resolution::Write(destination) => destination,
        Resolution::Skip(reason) => return Ok(EntryOutcome::Skipped(reason)),
    };

    let failed = |reason: String| UpkeepError::Extraction {
        path: entry.path.clone(),
        last_written: None,
        reason,
    };

    let mut content = Vec::new();
    entry
        .content
        .read_to_end(&mut content)
        .map_err(|e| failed(format!("failed to read entry: {e}")))?;
    std::fs::write(&destination, &content)
        .map_err(|e| failed(format!("failed to write {}: {e}", destination.display())))?;

    #[cfg(unix)]
    if let Some(mode) = entry.mode {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&destination, std::fs::Permissions::from_mode(mode & 0o777))
            .map_err(|e| failed(format!("failed to set permissions: {e}")))?;
    }

    debug!("Extracted {} to {}", entry.path, destination.display());
    Ok(EntryOutcome::Written(destination))
}

/// Walks `archive` and hands every entry to `callback`.
///
/// # Errors
///
/// The first callback failure stops the walk and is returned as
/// [`UpkeepError::Extraction`] carrying the last written path. Corrupt
/// archives yield [`UpkeepError::Archive`].
pub fn extract_entries<F>(
    archive: SourceArchive,
    base: &Path,
    mut callback: F,
) -> UpkeepResult<ExtractionReport>
where
    F: FnMut(ArchiveEntry<'_>, &Path) -> UpkeepResult<EntryOutcome>,
{
    let name = archive.name().to_string();
    let mut report = ExtractionReport::default();

    archive.for_each_entry(|entry| {
        let entry_path = entry.path.clone();
        match callback(entry, base) {
            Ok(EntryOutcome::Written(path)) => {
                report.written += 1;
                report.last_written = Some(path);
                Ok(())
            }
            Ok(EntryOutcome::Skipped(_)) => {
                report.skipped += 1;
                Ok(())
            }
            Err(error) => Err(with_last_written(error, &entry_path, report.last_written.clone())),
        }
    })?;

    info!(
        "Extracted {} files from {} into {} ({} entries skipped)",
        report.written,
        name,
        base.display(),
        report.skipped
    );
    Ok(report)
}

fn with_last_written(error: UpkeepError, entry_path: &str, last: Option<PathBuf>) -> UpkeepError {
    match error {
        UpkeepError::Extraction {
            path,
            reason,
            ..
        } => UpkeepError::Extraction {
            path,
            last_written: last,
            reason,
        },
        other => UpkeepError::Extraction {
            path: entry_path.to_string(),
            last_written: last,
            reason: other.to_string(),
        },
    }
}
