use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::fs;
use tracing::{debug, info, warn};

use super::verification::ChecksumVerifier;
use crate::constants::{BACKUP_SUFFIX, STAGING_SUFFIX};
use crate::core::{UpkeepError, UpkeepResult};

/// Replaces an executable on disk and undoes the replacement on failure.
///
/// The orchestrator calls [`check_permissions`](Self::check_permissions)
/// before downloading anything, then [`apply`](Self::apply) with the new
/// executable. If `apply` fails it calls [`rollback`](Self::rollback), which
/// must leave the previous executable in place or report why it could not.
pub trait ExecutableReplacer {
    /// Path of the executable being replaced.
    fn target(&self) -> &Path;

    /// Fails with [`UpkeepError::PermissionDenied`] if the executable cannot
    /// be replaced. Must not modify anything.
    fn check_permissions(&self) -> impl Future<Output = UpkeepResult<()>> + Send;

    /// Puts `content` in place of the executable.
    fn apply(&self, content: &[u8]) -> impl Future<Output = UpkeepResult<()>> + Send;

    /// Restores the executable that was in place before [`apply`](Self::apply).
    fn rollback(&self) -> impl Future<Output = UpkeepResult<()>> + Send;
}

/// Replaces an executable through a staged file and a side backup.
///
/// Given `/usr/local/bin/tool`, the new content is written to
/// `/usr/local/bin/.tool.new`, the running executable is renamed to
/// `/usr/local/bin/.tool.old`, and the staged file is renamed into place.
/// Both helper files live in the executable's directory so every rename
/// stays on one filesystem. Renaming works on Windows even while the
/// executable is running; deleting it does not, so a leftover `.old` file is
/// only logged.
///
/// The replacer remembers how far the last [`apply`](ExecutableReplacer::apply)
/// got. [`rollback`](ExecutableReplacer::rollback) restores from the backup
/// only if that attempt moved the executable aside; a `.old` file left by an
/// earlier run is never put back.
///
/// # Examples
///
/// ```rust,no_run
/// use upkeep_cli::upgrade::{BinaryReplacer, ExecutableReplacer};
///
/// # async fn example(new_binary: Vec<u8>) -> upkeep_cli::core::UpkeepResult<()> {
/// let replacer = BinaryReplacer::for_current_exe()?;
/// replacer.check_permissions().await?;
/// if let Err(e) = replacer.apply(&new_binary).await {
///     replacer.rollback().await?;
///     return Err(e);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BinaryReplacer {
    target: PathBuf,
    backup_path: PathBuf,
    staging_path: PathBuf,
    phase: AtomicU8,
}

/// How far the current swap has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum SwapPhase {
    /// Nothing on disk has changed.
    Idle = 0,
    /// The new executable sits at the staging path.
    Staged = 1,
    /// The executable was renamed to the backup path.
    MovedAside = 2,
    /// The staged file is at the target path.
    Swapped = 3,
}

impl SwapPhase {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Staged,
            2 => Self::MovedAside,
            3 => Self::Swapped,
            _ => Self::Idle,
        }
    }
}

impl BinaryReplacer {
    /// Creates a replacer for the executable at `target`.
    #[must_use]
    pub fn new(target: PathBuf) -> Self {
        let file_name = target.file_name().unwrap_or_default().to_string_lossy().into_owned();
        let backup_path = target.with_file_name(format!(".{file_name}{BACKUP_SUFFIX}"));
        let staging_path = target.with_file_name(format!(".{file_name}{STAGING_SUFFIX}"));

        Self {
            target,
            backup_path,
            staging_path,
            phase: AtomicU8::new(SwapPhase::Idle as u8),
        }
    }

    /// Creates a replacer for the running executable, following symlinks.
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::Io`] if the executable path cannot be determined.
    pub fn for_current_exe() -> UpkeepResult<Self> {
        let exe = std::env::current_exe()?;
        let exe = std::fs::canonicalize(&exe).unwrap_or(exe);
        Ok(Self::new(exe))
    }

    /// Where the previous executable is kept during a swap.
    #[must_use]
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Where the new executable is staged before the swap.
    #[must_use]
    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    fn phase(&self) -> SwapPhase {
        SwapPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: SwapPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    fn directory(&self) -> &Path {
        self.target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."))
    }

    async fn stage(&self, content: &[u8], expected: &str) -> UpkeepResult<()> {
        fs::write(&self.staging_path, content)
            .await
            .map_err(|e| UpkeepError::apply(&self.staging_path, format!("failed to stage: {e}")))?;
        self.set_phase(SwapPhase::Staged);

        // Keep the executable's permissions
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let permissions = match fs::metadata(&self.target).await {
                Ok(metadata) => metadata.permissions(),
                Err(_) => std::fs::Permissions::from_mode(0o755),
            };
            fs::set_permissions(&self.staging_path, permissions).await.map_err(|e| {
                UpkeepError::apply(&self.staging_path, format!("failed to set permissions: {e}"))
            })?;
        }

        ChecksumVerifier::verify_checksum(&self.staging_path, expected).await
    }

    async fn swap(&self) -> UpkeepResult<()> {
        if fs::try_exists(&self.backup_path).await.unwrap_or(false) {
            debug!("Removing stale backup at {}", self.backup_path.display());
            fs::remove_file(&self.backup_path).await.map_err(|e| {
                UpkeepError::apply(&self.backup_path, format!("failed to remove stale backup: {e}"))
            })?;
        }

        fs::rename(&self.target, &self.backup_path).await.map_err(|e| {
            UpkeepError::apply(&self.target, format!("failed to move current executable aside: {e}"))
        })?;
        self.set_phase(SwapPhase::MovedAside);
        fs::rename(&self.staging_path, &self.target).await.map_err(|e| {
            UpkeepError::apply(&self.target, format!("failed to move new executable into place: {e}"))
        })?;
        self.set_phase(SwapPhase::Swapped);
        Ok(())
    }

    async fn remove_staging(&self) {
        if !fs::try_exists(&self.staging_path).await.unwrap_or(false) {
            return;
        }
        if let Err(e) = fs::remove_file(&self.staging_path).await {
            warn!("Could not remove staged file {}: {}", self.staging_path.display(), e);
        }
    }

    async fn attempt_restore(&self) -> UpkeepResult<()> {
        if fs::try_exists(&self.target).await.unwrap_or(false) {
            fs::remove_file(&self.target).await?;
        }
        fs::rename(&self.backup_path, &self.target).await?;
        Ok(())
    }
}

impl ExecutableReplacer for BinaryReplacer {
    fn target(&self) -> &Path {
        &self.target
    }

    async fn check_permissions(&self) -> UpkeepResult<()> {
        let metadata = fs::metadata(&self.target)
            .await
            .map_err(|e| UpkeepError::permission(&self.target, format!("cannot inspect executable: {e}")))?;
        if metadata.permissions().readonly() {
            return Err(UpkeepError::permission(&self.target, "executable is read-only"));
        }

        // Renames need write access to the directory itself
        let directory = self.directory().to_path_buf();
        let probe_dir = directory.clone();
        tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(".upkeep-permission-check").tempfile_in(&probe_dir).map(drop)
        })
        .await
        .map_err(|e| UpkeepError::permission(&directory, e))?
        .map_err(|e| UpkeepError::permission(&directory, e))?;

        debug!("Permission check passed for {}", self.target.display());
        Ok(())
    }

    async fn apply(&self, content: &[u8]) -> UpkeepResult<()> {
        let expected = ChecksumVerifier::digest(content);
        info!("Installing new executable at {} ({})", self.target.display(), expected);

        self.set_phase(SwapPhase::Idle);
        self.stage(content, &expected).await?;
        self.swap().await?;
        ChecksumVerifier::verify_checksum(&self.target, &expected).await?;

        if let Err(e) = fs::remove_file(&self.backup_path).await {
            // Expected on Windows while the old executable is still running
            warn!("Could not remove backup {}: {}", self.backup_path.display(), e);
        }
        self.set_phase(SwapPhase::Idle);
        info!("Executable at {} replaced", self.target.display());
        Ok(())
    }

    async fn rollback(&self) -> UpkeepResult<()> {
        self.remove_staging().await;

        if matches!(self.phase(), SwapPhase::Idle | SwapPhase::Staged) {
            // The executable was never moved, any backup on disk predates this attempt
            return if fs::try_exists(&self.target).await.unwrap_or(false) {
                debug!("Nothing to roll back for {}", self.target.display());
                Ok(())
            } else {
                Err(UpkeepError::Other {
                    message: format!(
                        "neither {} nor its backup {} exists",
                        self.target.display(),
                        self.backup_path.display()
                    ),
                })
            };
        }

        warn!("Restoring previous executable from {}", self.backup_path.display());

        // Windows may hold the file briefly after a failed rename
        const MAX_ATTEMPTS: u32 = 3;
        let mut attempt = 1;
        loop {
            match self.attempt_restore().await {
                Ok(()) => {
                    self.set_phase(SwapPhase::Idle);
                    info!("Restored previous executable at {}", self.target.display());
                    return Ok(());
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!("Restore attempt {} failed: {}. Retrying...", attempt, e);
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
