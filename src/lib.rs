//! upkeep - self-update toolkit for command-line tools
//!
//! Given a tool name and its running version, upkeep finds the latest
//! published release of the tool's repository, decides whether the running
//! binary is outdated, downloads the asset for the current OS and
//! architecture, and replaces the executable in place with rollback on
//! failure. It can also unpack a release's source bundle (for example a
//! template collection) into a directory without letting any entry escape
//! it.
//!
//! # Architecture Overview
//!
//! ```text
//! tool, version, repo
//!        │
//!        ▼
//! UpdateApplier ──► ReleaseSource (GitHub REST API)
//!        │
//!        ├─► VersionComparator      outdated?
//!        ├─► select_asset           which artifact?
//!        ├─► ExecutableReplacer     stage, swap, roll back
//!        └─► extract_entries        per-entry callback + safe paths
//! ```
//!
//! # Core Modules
//!
//! - [`version`] - Lenient semantic version parsing and precedence
//! - [`release`] - Release metadata, repository identifiers, platform
//!   matching and the GitHub release source
//! - [`archive`] - Reading asset and source archives, zip-slip safe
//!   destination paths
//! - [`upgrade`] - The update orchestrator and executable replacement
//!
//! ## Supporting Modules
//!
//! - [`config`] - `~/.upkeep/config.toml` and environment overrides
//! - [`core`] - Error types and user-facing error rendering
//! - [`cli`] - The `upkeep` command-line interface
//! - [`utils`] - Progress bars
//!
//! # Configuration
//!
//! ```toml
//! hide_release_notes = false
//! hide_progress_bar = false
//! version_check_timeout_secs = 5
//! download_timeout_secs = 30
//! github_api_url = "https://api.github.com"
//! default_owner = "wjlin0"
//! ```
//!
//! # Environment Variables
//!
//! - `UPKEEP_CONFIG_PATH` - Configuration file location
//! - `UPKEEP_GITHUB_TOKEN` / `GITHUB_TOKEN` - Token for the GitHub API
//! - `UPKEEP_NO_PROGRESS` - Disable progress bars
//! - `RUST_LOG` - Log filter, overrides `--verbose`/`--quiet`

pub mod archive;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod release;
pub mod upgrade;
pub mod utils;
pub mod version;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
