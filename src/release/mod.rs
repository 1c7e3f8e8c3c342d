//! Release metadata and the sources that provide it.
//!
//! A release source answers three questions for the update core: what is the
//! latest release of a repository, what are the bytes of one of its assets,
//! and what is in its source archive. [`ReleaseSource`] is the seam; the
//! shipped implementation talks to the GitHub REST API
//! ([`github::GitHubReleaseSource`]), tests use an in-memory fake.
//!
//! Choosing *which* asset fits the running machine is a pure function of the
//! asset names and lives in [`selector`], with the OS/architecture synonym
//! table in [`platform`].

pub mod github;
pub mod platform;
pub mod selector;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::archive::SourceArchive;
use crate::core::{UpkeepError, UpkeepResult};

pub use github::GitHubReleaseSource;
pub use platform::Platform;
pub use selector::select_asset;

/// One downloadable artifact attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// File name as published (e.g. `nuclei_3.1.0_linux_amd64.zip`).
    pub name: String,
    /// Numeric asset id assigned by the release host.
    pub id: u64,
    /// URL the asset content is fetched from.
    pub download_url: String,
    /// Size in bytes if the host reported one.
    pub size: Option<u64>,
}

/// Metadata of a single published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Git tag of the release; expected to parse as a version.
    pub tag_name: String,
    /// Release notes (markdown).
    pub body: String,
    /// Attached assets in the order the host listed them.
    pub assets: Vec<ReleaseAsset>,
    /// Location of the zipped source tree, used for bundle extraction.
    pub source_archive_url: Option<String>,
}

/// A repository on the release host, as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parses a repository identifier.
    ///
    /// Accepted forms are `name`, `owner/name` and
    /// `https://github.com/owner/name` (optionally ending in `.git` or `/`).
    /// A bare name is owned by `default_owner`.
    ///
    /// ```rust
    /// use upkeep_cli::release::RepoRef;
    ///
    /// let repo = RepoRef::parse("nuclei", "wjlin0").unwrap();
    /// assert_eq!(repo.to_string(), "wjlin0/nuclei");
    ///
    /// let repo = RepoRef::parse("https://github.com/acme/tool.git", "wjlin0").unwrap();
    /// assert_eq!(repo.to_string(), "acme/tool");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::InvalidRepository`] for empty identifiers, too
    /// many path segments, or segments with characters GitHub does not allow.
    pub fn parse(identifier: &str, default_owner: &str) -> UpkeepResult<Self> {
        let invalid = |reason: &str| UpkeepError::InvalidRepository {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = identifier.trim();
        let path = ["https://github.com/", "http://github.com/", "github.com/"]
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix))
            .unwrap_or(trimmed)
            .trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        if path.is_empty() {
            return Err(invalid("repository identifier is empty"));
        }

        let segments: Vec<&str> = path.split('/').collect();
        let (owner, name) = match segments.as_slice() {
            [name] => (default_owner, *name),
            [owner, name] => (*owner, *name),
            _ => return Err(invalid("expected 'name' or 'owner/name'")),
        };

        for segment in [owner, name] {
            if !is_valid_segment(segment) {
                return Err(invalid(
                    "owner and name may only contain letters, digits, '-', '_' and '.'",
                ));
            }
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Where releases come from.
///
/// Implementations must map transport failures to [`UpkeepError::Fetch`] and
/// expired deadlines to [`UpkeepError::Timeout`]. Calls are awaited one after
/// another by the orchestrator; implementations need not be reentrant.
pub trait ReleaseSource {
    /// Fetches metadata of the latest published release.
    ///
    /// A repository without any release is a [`UpkeepError::Fetch`].
    fn fetch_latest_release(
        &self,
        repo: &RepoRef,
    ) -> impl Future<Output = UpkeepResult<ReleaseInfo>> + Send;

    /// Downloads one asset fully into memory.
    fn fetch_asset_bytes(
        &self,
        asset: &ReleaseAsset,
    ) -> impl Future<Output = UpkeepResult<Vec<u8>>> + Send;

    /// Downloads the release's source archive into a spooled temporary file.
    ///
    /// The archive is never held in memory as a whole.
    fn open_source_archive(
        &self,
        release: &ReleaseInfo,
    ) -> impl Future<Output = UpkeepResult<SourceArchive>> + Send;
}
