//! Global constants used throughout the upkeep codebase.
//!
//! This module contains timeout durations, well-known file names, environment
//! variable names and other values that are shared across modules.

use std::time::Duration;

/// Default timeout for version-check and release-metadata requests (5 seconds).
pub const DEFAULT_VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for asset and source-archive downloads (30 seconds).
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Default GitHub REST API endpoint.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Owner used when a repository identifier is a bare name (e.g. `nuclei`).
pub const DEFAULT_REPO_OWNER: &str = "wjlin0";

/// User agent sent with every release-source request.
pub const USER_AGENT: &str = concat!("upkeep/", env!("CARGO_PKG_VERSION"));

/// Version marker written into extracted bundles.
///
/// This is the only dot-file that survives extraction.
pub const VERSION_MARKER_FILE: &str = ".version";

/// File names inside bundles that are never extracted (compared case-insensitively).
pub const IGNORED_BUNDLE_FILES: &[&str] = &["README.md"];

/// Application id mixed into the protected machine identifier.
pub const MACHINE_ID_APP_ID: &str = "upkeep";

/// Value reported when no machine identifier can be derived.
pub const UNKNOWN_MACHINE_ID: &str = "unknown";

/// Environment variable that disables progress bars when set.
pub const NO_PROGRESS_ENV: &str = "UPKEEP_NO_PROGRESS";

/// Environment variable holding a GitHub token (checked before `GITHUB_TOKEN`).
pub const GITHUB_TOKEN_ENV: &str = "UPKEEP_GITHUB_TOKEN";

/// Fallback GitHub token environment variable.
pub const GITHUB_TOKEN_FALLBACK_ENV: &str = "GITHUB_TOKEN";

/// Environment variable pointing at a custom configuration file.
pub const CONFIG_PATH_ENV: &str = "UPKEEP_CONFIG_PATH";

/// Suffix of the file that holds the previous executable during a swap.
pub const BACKUP_SUFFIX: &str = ".old";

/// Suffix of the staging file the new executable is written to.
pub const STAGING_SUFFIX: &str = ".new";
