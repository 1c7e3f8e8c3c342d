use std::future::Future;
use std::path::Path;
use std::time::Duration;

use semver::Version;
use tracing::{debug, info, warn};

use super::replacer::ExecutableReplacer;
use crate::archive::{ArchiveEntry, EntryOutcome, ExtractionReport, extract_entries, extract_executable, write_entry};
use crate::config::UpdateConfig;
use crate::core::{UpkeepError, UpkeepResult};
use crate::release::{Platform, ReleaseInfo, ReleaseSource, RepoRef, select_asset};
use crate::version::{parse_version, precedence};

/// Final state of one executable update attempt.
#[derive(Debug, Clone)]
pub enum UpdateStatus {
    /// The running version is not older than the latest release.
    UpToDate,
    /// The new executable is in place.
    Updated,
    /// Applying failed and the previous executable was restored.
    RolledBack {
        /// The apply failure.
        error: UpkeepError,
    },
}

/// Result of [`UpdateApplier::update_executable`].
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub tool: String,
    pub current_version: Version,
    pub latest_version: Version,
    pub status: UpdateStatus,
    /// Release notes of the latest release, unless hidden by configuration
    /// or the tool was already up to date.
    pub release_notes: Option<String>,
}

impl UpdateOutcome {
    /// Version now installed: the latest after an update, otherwise the
    /// current one.
    #[must_use]
    pub fn applied_version(&self) -> &Version {
        match self.status {
            UpdateStatus::Updated => &self.latest_version,
            UpdateStatus::UpToDate | UpdateStatus::RolledBack { .. } => &self.current_version,
        }
    }

    #[must_use]
    pub const fn rolled_back(&self) -> bool {
        matches!(self.status, UpdateStatus::RolledBack { .. })
    }

    /// The apply error behind a rollback.
    #[must_use]
    pub const fn error(&self) -> Option<&UpkeepError> {
        match &self.status {
            UpdateStatus::RolledBack {
                error,
            } => Some(error),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_updated(&self) -> bool {
        matches!(self.status, UpdateStatus::Updated)
    }
}

/// Orchestrates update attempts against one release source.
///
/// Each call is one self-contained attempt: it fetches fresh release
/// metadata and shares nothing with earlier calls. Calls are sequential from
/// the caller's point of view. Two processes updating the same executable at
/// once is not guarded against; callers are expected to run as a single
/// instance.
///
/// # Examples
///
/// ```rust,no_run
/// use upkeep_cli::config::UpdateConfig;
/// use upkeep_cli::release::GitHubReleaseSource;
/// use upkeep_cli::upgrade::{BinaryReplacer, UpdateApplier};
///
/// # async fn example() -> upkeep_cli::core::UpkeepResult<()> {
/// let config = UpdateConfig::load(None).await?;
/// let source = GitHubReleaseSource::new(&config)?;
/// let applier = UpdateApplier::new(source, config);
///
/// let replacer = BinaryReplacer::for_current_exe()?;
/// let outcome = applier.update_executable("nuclei", "3.0.0", None, &replacer).await?;
/// println!("now on {}", outcome.applied_version());
/// # Ok(())
/// # }
/// ```
pub struct UpdateApplier<S> {
    source: S,
    config: UpdateConfig,
    platform: Platform,
}

impl<S: ReleaseSource> UpdateApplier<S> {
    /// Creates an applier for the platform this binary was built for.
    pub fn new(source: S, config: UpdateConfig) -> Self {
        Self {
            source,
            config,
            platform: Platform::current(),
        }
    }

    /// Targets a different platform when selecting assets.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub const fn config(&self) -> &UpdateConfig {
        &self.config
    }

    pub const fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Resolves the repository of `tool`; a missing or blank identifier
    /// means the repository is named after the tool.
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::InvalidRepository`] for malformed identifiers.
    pub fn resolve_repo(&self, tool: &str, repo: Option<&str>) -> UpkeepResult<RepoRef> {
        let identifier = repo.map(str::trim).filter(|r| !r.is_empty()).unwrap_or(tool);
        RepoRef::parse(identifier, &self.config.default_owner)
    }

    /// Fetches the latest release of `tool`'s repository.
    ///
    /// # Errors
    ///
    /// [`UpkeepError::Fetch`] when the source is unreachable or has no
    /// release, [`UpkeepError::Timeout`] past the version-check timeout.
    pub async fn fetch_release(&self, tool: &str, repo: Option<&str>) -> UpkeepResult<ReleaseInfo> {
        let repo = self.resolve_repo(tool, repo)?;
        let operation = format!("fetch latest release of {repo}");
        with_timeout(
            &operation,
            self.config.version_check_timeout(),
            self.source.fetch_latest_release(&repo),
        )
        .await
    }

    /// Latest published version of `tool`, without updating anything.
    ///
    /// # Errors
    ///
    /// Fetch errors as for [`fetch_release`](Self::fetch_release), and
    /// [`UpkeepError::VersionParse`] if the release tag is not a version.
    pub async fn latest_version(&self, tool: &str, repo: Option<&str>) -> UpkeepResult<Version> {
        let release = self.fetch_release(tool, repo).await?;
        parse_version(&release.tag_name)
    }

    /// Replaces the executable managed by `replacer` with the latest release.
    ///
    /// Steps, in order: parse `current_version`; fetch the latest release;
    /// compare versions (not outdated ends here with
    /// [`UpdateStatus::UpToDate`]); check permissions; select and download
    /// the platform asset; pull the executable out of it; apply. Nothing is
    /// written before the permission check passes.
    ///
    /// A failed apply is rolled back. A successful rollback is reported as
    /// [`UpdateStatus::RolledBack`] rather than as an error.
    ///
    /// # Errors
    ///
    /// - [`UpkeepError::VersionParse`] for an invalid current version or tag
    /// - [`UpkeepError::PermissionDenied`] before anything is downloaded
    /// - [`UpkeepError::Fetch`], [`UpkeepError::Timeout`],
    ///   [`UpkeepError::AssetNotFound`], [`UpkeepError::ExecutableNotFound`]
    ///   before anything is written
    /// - [`UpkeepError::Rollback`] when the rollback itself failed
    pub async fn update_executable<R: ExecutableReplacer>(
        &self,
        tool: &str,
        current_version: &str,
        repo: Option<&str>,
        replacer: &R,
    ) -> UpkeepResult<UpdateOutcome> {
        let current_version = parse_version(current_version)?;
        let release = self.fetch_release(tool, repo).await?;
        let latest_version = parse_version(&release.tag_name)?;

        let mut outcome = UpdateOutcome {
            tool: tool.to_string(),
            current_version,
            latest_version,
            status: UpdateStatus::UpToDate,
            release_notes: None,
        };

        if precedence(&outcome.current_version, &outcome.latest_version).is_ge() {
            info!("{} {} is already up to date", tool, outcome.current_version);
            return Ok(outcome);
        }
        info!("Update available for {}: {} -> {}", tool, outcome.current_version, outcome.latest_version);

        replacer.check_permissions().await?;

        let asset = select_asset(&release.assets, Some(tool), &self.platform)?;
        info!("Selected asset {} for {}", asset.name, self.platform);
        let operation = format!("download asset {}", asset.name);
        let bytes = with_timeout(
            &operation,
            self.config.download_timeout(),
            self.source.fetch_asset_bytes(asset),
        )
        .await?;
        let executable = extract_executable(&asset.name, bytes, tool)?;

        match replacer.apply(&executable).await {
            Ok(()) => {
                info!("Updated {} {} -> {}", tool, outcome.current_version, outcome.latest_version);
                outcome.status = UpdateStatus::Updated;
            }
            Err(apply_error) => {
                let apply_error = match apply_error {
                    error @ UpkeepError::Apply { .. } => error,
                    other => UpkeepError::apply(replacer.target(), other),
                };
                warn!("Update of {} failed, rolling back: {}", tool, apply_error);

                if let Err(rollback_error) = replacer.rollback().await {
                    return Err(UpkeepError::Rollback {
                        path: replacer.target().display().to_string(),
                        apply_error: apply_error.to_string(),
                        reason: rollback_error.to_string(),
                    });
                }
                info!("Rolled back {} to {}", tool, outcome.current_version);
                outcome.status = UpdateStatus::RolledBack {
                    error: apply_error,
                };
            }
        }

        if outcome.is_updated() && !self.config.hide_release_notes && !release.body.trim().is_empty() {
            outcome.release_notes = Some(release.body);
        }
        Ok(outcome)
    }

    /// Extracts the latest release's source archive into `base` with the
    /// default writer.
    ///
    /// # Errors
    ///
    /// As for [`extract_to_dir_with`](Self::extract_to_dir_with).
    pub async fn extract_to_dir(
        &self,
        tool: &str,
        repo: Option<&str>,
        base: &Path,
    ) -> UpkeepResult<ExtractionReport> {
        self.extract_to_dir_with(tool, repo, base, write_entry).await
    }

    /// Extracts the latest release's source archive, handing every entry to
    /// `callback`.
    ///
    /// No version comparison happens here. The archive is spooled to a
    /// temporary file, then walked synchronously on the calling task; the
    /// walk has no cancellation point.
    ///
    /// # Errors
    ///
    /// Fetch and timeout errors before anything is written;
    /// [`UpkeepError::Extraction`] with the last written path when a
    /// callback fails part way.
    pub async fn extract_to_dir_with<F>(
        &self,
        tool: &str,
        repo: Option<&str>,
        base: &Path,
        callback: F,
    ) -> UpkeepResult<ExtractionReport>
    where
        F: FnMut(ArchiveEntry<'_>, &Path) -> UpkeepResult<EntryOutcome>,
    {
        let release = self.fetch_release(tool, repo).await?;
        let operation = format!("download source archive of {}", release.tag_name);
        let archive = with_timeout(
            &operation,
            self.config.download_timeout(),
            self.source.open_source_archive(&release),
        )
        .await?;

        debug!("Extracting {} into {}", archive.name(), base.display());
        extract_entries(archive, base, callback)
    }
}

async fn with_timeout<T>(
    operation: &str,
    timeout: Duration,
    future: impl Future<Output = UpkeepResult<T>>,
) -> UpkeepResult<T> {
    tokio::time::timeout(timeout, future).await.map_err(|_| UpkeepError::Timeout {
        operation: operation.to_string(),
        timeout,
    })?
}
