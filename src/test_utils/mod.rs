//! Test utilities for upkeep
//!
//! Helpers shared by unit and integration tests:
//! - in-memory `.zip` and `.tar.gz` builders
//! - [`FakeReleaseSource`], a scripted release host
//! - [`RecordingReplacer`], an executable replacer that records calls and
//!   fails on request
//!
//! # Example
//!
//! ```rust,no_run
//! use upkeep_cli::config::UpdateConfig;
//! use upkeep_cli::test_utils::{FakeReleaseSource, RecordingReplacer, fake_asset, zip_bytes};
//! use upkeep_cli::upgrade::UpdateApplier;
//!
//! # async fn example() {
//! let source = FakeReleaseSource::new("v2.0.0", "notes")
//!     .with_asset(fake_asset(1, "tool_linux_amd64.zip"), zip_bytes(&[("tool", b"v2")]));
//! let applier = UpdateApplier::new(source, UpdateConfig::default());
//! let replacer = RecordingReplacer::default();
//! let outcome = applier.update_executable("tool", "1.0.0", None, &replacer).await;
//! # }
//! ```

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::archive::SourceArchive;
use crate::core::{UpkeepError, UpkeepResult};
use crate::release::{ReleaseAsset, ReleaseInfo, ReleaseSource, RepoRef};
use crate::upgrade::ExecutableReplacer;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging
/// stays off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Builds a zip archive of regular files with mode `0o644`.
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let entries: Vec<(&str, &[u8], u32)> = files.iter().map(|(name, content)| (*name, *content, 0o644)).collect();
    zip_bytes_with_modes(&entries)
}

/// Builds a zip archive with explicit unix modes. Names ending in `/` become
/// directory entries.
pub fn zip_bytes_with_modes(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content, mode) in entries {
        let options = SimpleFileOptions::default().unix_permissions(*mode);
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Builds a gzipped tarball of regular files with mode `0o644`.
pub fn tar_gz_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// A release asset with a fake download URL.
pub fn fake_asset(id: u64, name: &str) -> ReleaseAsset {
    ReleaseAsset {
        name: name.to_string(),
        id,
        download_url: format!("https://fake.invalid/assets/{id}"),
        size: None,
    }
}

/// Release host serving one scripted release.
#[derive(Debug)]
pub struct FakeReleaseSource {
    release: ReleaseInfo,
    asset_content: HashMap<u64, Vec<u8>>,
    source_archive: Option<Vec<u8>>,
    latency: Option<Duration>,
    reachable: bool,
    asset_downloads: AtomicUsize,
}

impl FakeReleaseSource {
    pub fn new(tag: &str, body: &str) -> Self {
        Self {
            release: ReleaseInfo {
                tag_name: tag.to_string(),
                body: body.to_string(),
                assets: Vec::new(),
                source_archive_url: None,
            },
            asset_content: HashMap::new(),
            source_archive: None,
            latency: None,
            reachable: true,
            asset_downloads: AtomicUsize::new(0),
        }
    }

    /// A host whose every request fails.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new("v0.0.0", "")
        }
    }

    pub fn with_asset(mut self, asset: ReleaseAsset, content: Vec<u8>) -> Self {
        self.asset_content.insert(asset.id, content);
        self.release.assets.push(asset);
        self
    }

    /// Serves `archive` as the release's source archive.
    pub fn with_source_archive(mut self, archive: Vec<u8>) -> Self {
        self.release.source_archive_url = Some(format!("https://fake.invalid/zipball/{}", self.release.tag_name));
        self.source_archive = Some(archive);
        self
    }

    /// Delays every response.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of asset downloads served so far.
    pub fn asset_downloads(&self) -> usize {
        self.asset_downloads.load(Ordering::SeqCst)
    }

    async fn respond(&self, operation: &str) -> UpkeepResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.reachable {
            Ok(())
        } else {
            Err(UpkeepError::fetch(operation, "connection refused"))
        }
    }
}

impl ReleaseSource for FakeReleaseSource {
    async fn fetch_latest_release(&self, repo: &RepoRef) -> UpkeepResult<ReleaseInfo> {
        self.respond(&format!("fetch latest release of {repo}")).await?;
        Ok(self.release.clone())
    }

    async fn fetch_asset_bytes(&self, asset: &ReleaseAsset) -> UpkeepResult<Vec<u8>> {
        let operation = format!("download asset {}", asset.name);
        self.respond(&operation).await?;
        self.asset_downloads.fetch_add(1, Ordering::SeqCst);
        self.asset_content
            .get(&asset.id)
            .cloned()
            .ok_or_else(|| UpkeepError::fetch(&operation, "HTTP 404 Not Found"))
    }

    async fn open_source_archive(&self, release: &ReleaseInfo) -> UpkeepResult<SourceArchive> {
        let operation = format!("download source archive of {}", release.tag_name);
        self.respond(&operation).await?;
        let bytes =
            self.source_archive.as_deref().ok_or_else(|| UpkeepError::fetch(&operation, "release has no source archive"))?;
        SourceArchive::from_bytes(format!("{}.zip", release.tag_name), bytes)
    }
}

/// Executable replacer that records what the orchestrator asked of it.
#[derive(Debug)]
pub struct RecordingReplacer {
    target: PathBuf,
    deny_permissions: bool,
    fail_apply: bool,
    fail_rollback: bool,
    calls: Mutex<Vec<&'static str>>,
    applied: Mutex<Option<Vec<u8>>>,
}

impl Default for RecordingReplacer {
    fn default() -> Self {
        Self {
            target: PathBuf::from("/opt/fake/bin/tool"),
            deny_permissions: false,
            fail_apply: false,
            fail_rollback: false,
            calls: Mutex::new(Vec::new()),
            applied: Mutex::new(None),
        }
    }
}

impl RecordingReplacer {
    pub fn deny_permissions(mut self) -> Self {
        self.deny_permissions = true;
        self
    }

    pub fn fail_apply(mut self) -> Self {
        self.fail_apply = true;
        self
    }

    pub fn fail_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    /// Calls received, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Content handed to the last successful `apply`.
    pub fn applied_content(&self) -> Option<Vec<u8>> {
        self.applied.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ExecutableReplacer for RecordingReplacer {
    fn target(&self) -> &Path {
        &self.target
    }

    async fn check_permissions(&self) -> UpkeepResult<()> {
        self.record("check_permissions");
        if self.deny_permissions {
            return Err(UpkeepError::permission(&self.target, "read-only file system"));
        }
        Ok(())
    }

    async fn apply(&self, content: &[u8]) -> UpkeepResult<()> {
        self.record("apply");
        if self.fail_apply {
            return Err(UpkeepError::apply(&self.target, "staged checksum mismatch"));
        }
        *self.applied.lock().unwrap() = Some(content.to_vec());
        Ok(())
    }

    async fn rollback(&self) -> UpkeepResult<()> {
        self.record("rollback");
        if self.fail_rollback {
            return Err(UpkeepError::Io(std::io::Error::other("backup vanished")));
        }
        Ok(())
    }
}
