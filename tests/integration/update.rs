use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use semver::Version;
use tempfile::TempDir;
use tokio::fs;
use upkeep_cli::config::UpdateConfig;
use upkeep_cli::core::{UpkeepError, UpkeepResult};
use upkeep_cli::release::Platform;
use upkeep_cli::test_utils::{FakeReleaseSource, fake_asset, init_test_logging, tar_gz_bytes, zip_bytes};
use upkeep_cli::upgrade::{BinaryReplacer, ExecutableReplacer, UpdateApplier, UpdateStatus};

fn linux_amd64(source: FakeReleaseSource) -> UpdateApplier<FakeReleaseSource> {
    UpdateApplier::new(source, UpdateConfig::default()).with_platform(Platform::new("linux", "amd64"))
}

fn nuclei_release(tag: &str) -> FakeReleaseSource {
    FakeReleaseSource::new(tag, "- faster template loading\n")
        .with_asset(fake_asset(10, "nuclei_3.1.0_checksums.txt"), b"abc  nuclei_3.1.0_linux_amd64.zip".to_vec())
        .with_asset(
            fake_asset(11, "nuclei_3.1.0_linux_amd64.zip"),
            zip_bytes(&[("README.md", b"docs"), ("nuclei", b"nuclei 3.1.0 linux")]),
        )
        .with_asset(
            fake_asset(12, "nuclei_3.1.0_linux_arm64.zip"),
            zip_bytes(&[("nuclei", b"nuclei 3.1.0 arm")]),
        )
        .with_asset(
            fake_asset(13, "nuclei_3.1.0_windows_amd64.tar.gz"),
            tar_gz_bytes(&[("nuclei.exe", b"nuclei 3.1.0 windows")]),
        )
}

async fn install(dir: &TempDir, content: &[u8]) -> Result<PathBuf> {
    let path = dir.path().join("nuclei");
    fs::write(&path, content).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).await?;
    }
    Ok(path)
}

async fn dir_entries(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Moves the executable aside and leaves garbage in its place, like a
/// process killed half way through a swap.
struct InterruptedReplacer {
    inner: BinaryReplacer,
    lose_backup: bool,
}

impl ExecutableReplacer for InterruptedReplacer {
    fn target(&self) -> &Path {
        self.inner.target()
    }

    async fn check_permissions(&self) -> UpkeepResult<()> {
        self.inner.check_permissions().await
    }

    async fn apply(&self, _content: &[u8]) -> UpkeepResult<()> {
        fs::rename(self.inner.target(), self.inner.backup_path()).await?;
        if self.lose_backup {
            fs::remove_file(self.inner.backup_path()).await?;
        } else {
            fs::write(self.inner.target(), b"truncated").await?;
        }
        Err(UpkeepError::Other {
            message: "swap interrupted".to_string(),
        })
    }

    async fn rollback(&self) -> UpkeepResult<()> {
        // The swap bypassed the inner replacer, which therefore has nothing to undo
        fs::rename(self.inner.backup_path(), self.inner.target()).await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_update_replaces_executable() -> Result<()> {
    init_test_logging(None);
    let temp = TempDir::new()?;
    let target = install(&temp, b"nuclei 3.0.0").await?;
    let replacer = BinaryReplacer::new(target.clone());

    let outcome = linux_amd64(nuclei_release("v3.1.0")).update_executable("nuclei", "v3.0.0", None, &replacer).await?;

    assert!(matches!(outcome.status, UpdateStatus::Updated));
    assert_eq!(outcome.applied_version(), &Version::new(3, 1, 0));
    assert_eq!(outcome.release_notes.as_deref(), Some("- faster template loading\n"));
    assert_eq!(fs::read(&target).await?, b"nuclei 3.1.0 linux");
    // no staging or backup files left behind
    assert_eq!(dir_entries(temp.path()).await?, vec!["nuclei".to_string()]);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&target)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
    Ok(())
}

#[tokio::test]
async fn test_windows_asset_from_tarball() -> Result<()> {
    let temp = TempDir::new()?;
    let target = install(&temp, b"old").await?;
    let replacer = BinaryReplacer::new(target.clone());

    let applier = UpdateApplier::new(nuclei_release("v3.1.0"), UpdateConfig::default())
        .with_platform(Platform::new("windows", "x86_64"));
    let outcome = applier.update_executable("nuclei", "3.0.0", None, &replacer).await?;

    assert!(outcome.is_updated());
    assert_eq!(fs::read(&target).await?, b"nuclei 3.1.0 windows");
    Ok(())
}

#[tokio::test]
async fn test_up_to_date_leaves_executable_alone() -> Result<()> {
    let temp = TempDir::new()?;
    let target = install(&temp, b"nuclei 3.1.0").await?;
    let replacer = BinaryReplacer::new(target.clone());

    let outcome = linux_amd64(nuclei_release("v3.1.0")).update_executable("nuclei", "3.1.0", None, &replacer).await?;

    assert!(matches!(outcome.status, UpdateStatus::UpToDate));
    assert_eq!(outcome.applied_version(), &Version::new(3, 1, 0));
    assert_eq!(fs::read(&target).await?, b"nuclei 3.1.0");
    Ok(())
}

#[tokio::test]
async fn test_prerelease_is_older_than_release() -> Result<()> {
    let temp = TempDir::new()?;
    let target = install(&temp, b"rc").await?;
    let replacer = BinaryReplacer::new(target.clone());

    let outcome =
        linux_amd64(nuclei_release("v3.1.0")).update_executable("nuclei", "3.1.0-rc.1", None, &replacer).await?;

    assert!(outcome.is_updated());
    assert_eq!(fs::read(&target).await?, b"nuclei 3.1.0 linux");
    Ok(())
}

#[tokio::test]
async fn test_interrupted_swap_is_rolled_back() -> Result<()> {
    let temp = TempDir::new()?;
    let target = install(&temp, b"nuclei 3.0.0").await?;
    let replacer = InterruptedReplacer {
        inner: BinaryReplacer::new(target.clone()),
        lose_backup: false,
    };

    let outcome = linux_amd64(nuclei_release("v3.1.0")).update_executable("nuclei", "3.0.0", None, &replacer).await?;

    assert!(outcome.rolled_back());
    assert_eq!(outcome.applied_version(), &Version::new(3, 0, 0));
    match outcome.error() {
        Some(UpkeepError::Apply {
            reason,
            ..
        }) => assert!(reason.contains("swap interrupted")),
        other => panic!("expected Apply error, got {other:?}"),
    }
    assert_eq!(fs::read(&target).await?, b"nuclei 3.0.0");
    assert_eq!(dir_entries(temp.path()).await?, vec!["nuclei".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_failed_rollback_is_reported_as_unrecoverable() -> Result<()> {
    let temp = TempDir::new()?;
    let target = install(&temp, b"nuclei 3.0.0").await?;
    let replacer = InterruptedReplacer {
        inner: BinaryReplacer::new(target.clone()),
        lose_backup: true,
    };

    let result = linux_amd64(nuclei_release("v3.1.0")).update_executable("nuclei", "3.0.0", None, &replacer).await;

    match result {
        Err(
            error @ UpkeepError::Rollback {
                ..
            },
        ) => {
            assert!(error.is_unrecoverable());
            let message = error.to_string();
            assert!(message.contains(&target.display().to_string()));
            assert!(message.contains("swap interrupted"));
        }
        other => panic!("expected Rollback error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_failed_staging_keeps_current_executable_despite_old_backup() -> Result<()> {
    let temp = TempDir::new()?;
    let target = install(&temp, b"nuclei 3.0.0").await?;
    let replacer = BinaryReplacer::new(target.clone());
    // left behind by an earlier update, and a directory where the new file must go
    fs::write(replacer.backup_path(), b"nuclei 2.9.0").await?;
    fs::create_dir(replacer.staging_path()).await?;

    let outcome = linux_amd64(nuclei_release("v3.1.0")).update_executable("nuclei", "3.0.0", None, &replacer).await?;

    assert!(outcome.rolled_back());
    assert_eq!(outcome.applied_version(), &Version::new(3, 0, 0));
    assert_eq!(fs::read(&target).await?, b"nuclei 3.0.0");
    assert_eq!(fs::read(replacer.backup_path()).await?, b"nuclei 2.9.0");
    Ok(())
}

#[tokio::test]
async fn test_missing_executable_fails_before_download() -> Result<()> {
    let temp = TempDir::new()?;
    let replacer = BinaryReplacer::new(temp.path().join("nuclei"));

    let result = linux_amd64(nuclei_release("v3.1.0")).update_executable("nuclei", "3.0.0", None, &replacer).await;

    assert!(matches!(result, Err(UpkeepError::PermissionDenied { .. })));
    assert!(dir_entries(temp.path()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_no_asset_for_platform() -> Result<()> {
    let temp = TempDir::new()?;
    let target = install(&temp, b"nuclei 3.0.0").await?;
    let replacer = BinaryReplacer::new(target.clone());

    let applier = UpdateApplier::new(nuclei_release("v3.1.0"), UpdateConfig::default())
        .with_platform(Platform::new("freebsd", "riscv64"));
    let result = applier.update_executable("nuclei", "3.0.0", None, &replacer).await;

    match result {
        Err(UpkeepError::AssetNotFound {
            tool,
            os,
            arch,
        }) => {
            assert_eq!(tool, "nuclei");
            assert_eq!(os, "freebsd");
            assert_eq!(arch, "riscv64");
        }
        other => panic!("expected AssetNotFound, got {other:?}"),
    }
    assert_eq!(fs::read(&target).await?, b"nuclei 3.0.0");
    Ok(())
}

#[tokio::test]
async fn test_metadata_timeout() -> Result<()> {
    let config = UpdateConfig {
        version_check_timeout_secs: 1,
        ..UpdateConfig::default()
    };
    let source = nuclei_release("v3.1.0").with_latency(Duration::from_secs(3));
    let applier = UpdateApplier::new(source, config);

    let result = applier.latest_version("nuclei", Some("projectdiscovery/nuclei")).await;
    assert!(matches!(result, Err(UpkeepError::Timeout { .. })));
    Ok(())
}

#[tokio::test]
async fn test_invalid_repository_identifier() -> Result<()> {
    let applier = linux_amd64(nuclei_release("v3.1.0"));
    let result = applier.latest_version("nuclei", Some("a/b/c")).await;
    assert!(matches!(result, Err(UpkeepError::InvalidRepository { .. })));
    Ok(())
}
