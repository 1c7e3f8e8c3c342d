//! Mapping archive entry paths to destinations on disk.
//!
//! Bundles are published as source archives whose entries all live under one
//! wrapper directory (`owner-repo-abc123/`). The policy for an entry path is:
//!
//! 1. Split into directory and file name; `/` and `\` are both separators.
//! 2. Skip blank file names, dot-files and `README.md`, except the
//!    `.version` marker which is always kept.
//! 3. Drop the first directory segment (the wrapper).
//! 4. Lexically clean what remains; skip the entry if it starts with `.`
//!    (this catches `..` traversal as well as hidden directories).
//! 5. Join onto the base directory.
//!
//! Every [`Resolution::Write`] destination is a descendant of the base
//! directory. Anything that cannot be proven to be one is skipped.
//!
//! ```rust
//! use std::path::Path;
//! use upkeep_cli::archive::paths::{Resolution, SkipReason, plan};
//!
//! let base = Path::new("/srv/templates");
//! assert_eq!(
//!     plan("bundle-v1/http/cves/a.yaml", base),
//!     Resolution::Write(base.join("http/cves").join("a.yaml"))
//! );
//! assert_eq!(
//!     plan("bundle-v1/../../etc/passwd", base),
//!     Resolution::Skip(SkipReason::HiddenDirectory)
//! );
//! ```

use std::fmt;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::constants::{IGNORED_BUNDLE_FILES, VERSION_MARKER_FILE};
use crate::core::{UpkeepError, UpkeepResult};

/// Why an entry is not extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The file name is empty or whitespace (directory entries land here).
    EmptyName,
    /// The file name starts with `.`.
    HiddenFile,
    /// The file name is on the ignore list.
    IgnoredFile,
    /// The cleaned relative directory starts with `.`, including `..`.
    HiddenDirectory,
    /// A segment is not a plain name (drive prefix, root, embedded separator).
    UnsafeComponent,
    /// The destination would not be inside the base directory.
    OutsideBase,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::EmptyName => "empty file name",
            Self::HiddenFile => "hidden file",
            Self::IgnoredFile => "ignored file",
            Self::HiddenDirectory => "hidden or parent directory",
            Self::UnsafeComponent => "unsafe path component",
            Self::OutsideBase => "outside of the target directory",
        };
        f.write_str(reason)
    }
}

/// Outcome of resolving one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Write the entry to this path.
    Write(PathBuf),
    /// Leave the entry out.
    Skip(SkipReason),
}

/// Decides where an entry goes without touching the filesystem.
#[must_use]
pub fn plan(entry_path: &str, base: &Path) -> Resolution {
    let normalized = entry_path.replace('\\', "/");
    let (directory, file_name) = match normalized.rfind('/') {
        Some(index) => (&normalized[..index], &normalized[index + 1..]),
        None => ("", normalized.as_str()),
    };

    if let Some(reason) = skip_file_name(file_name) {
        return Resolution::Skip(reason);
    }

    // Everything below the wrapper directory, cleaned
    let relative = clean_segments(directory.split('/').skip(1));
    if relative.first().is_some_and(|first| first.starts_with('.')) {
        return Resolution::Skip(SkipReason::HiddenDirectory);
    }

    let mut destination = base.to_path_buf();
    for segment in &relative {
        if !is_plain_component(segment) {
            return Resolution::Skip(SkipReason::UnsafeComponent);
        }
        destination.push(segment);
    }
    if !is_plain_component(file_name) {
        return Resolution::Skip(SkipReason::UnsafeComponent);
    }
    destination.push(file_name);

    if !is_descendant(&destination, base) {
        return Resolution::Skip(SkipReason::OutsideBase);
    }
    Resolution::Write(destination)
}

/// Resolves an entry and creates its destination directory.
///
/// # Errors
///
/// Returns [`UpkeepError::Extraction`] if the directory cannot be created.
/// The error carries no last-written path; the extraction loop fills it in.
pub fn resolve(entry_path: &str, base: &Path) -> UpkeepResult<Resolution> {
    let resolution = plan(entry_path, base);
    match &resolution {
        Resolution::Write(destination) => {
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent).map_err(|e| UpkeepError::Extraction {
                    path: entry_path.to_string(),
                    last_written: None,
                    reason: format!("failed to create directory {}: {e}", parent.display()),
                })?;
            }
        }
        Resolution::Skip(reason) => debug!("Skipping archive entry {entry_path}: {reason}"),
    }
    Ok(resolution)
}

fn skip_file_name(file_name: &str) -> Option<SkipReason> {
    if file_name.eq_ignore_ascii_case(VERSION_MARKER_FILE) {
        return None;
    }
    if file_name.trim().is_empty() {
        return Some(SkipReason::EmptyName);
    }
    if file_name.starts_with('.') {
        return Some(SkipReason::HiddenFile);
    }
    if IGNORED_BUNDLE_FILES.iter().any(|ignored| file_name.eq_ignore_ascii_case(ignored)) {
        return Some(SkipReason::IgnoredFile);
    }
    None
}

/// Lexical cleaning: drops empty and `.` segments and folds `name/..` pairs.
/// Leading `..` segments that cannot be folded are kept.
fn clean_segments<'a>(segments: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut cleaned: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => match cleaned.last() {
                Some(last) if *last != ".." => {
                    cleaned.pop();
                }
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other),
        }
    }
    cleaned
}

/// Whether `segment` is exactly one normal path component on this platform.
fn is_plain_component(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == segment
    )
}

fn is_descendant(path: &Path, base: &Path) -> bool {
    path.strip_prefix(base).is_ok_and(|rest| {
        rest.components().all(|component| matches!(component, Component::Normal(_)))
    })
}
