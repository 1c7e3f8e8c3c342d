use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::core::{UpkeepError, UpkeepResult};

/// SHA-256 integrity checks for executables written during an update.
///
/// The replacer hashes the downloaded content once, then checks the staged
/// file before the swap and the installed file after it. A mismatch at
/// either point fails the apply step and triggers a rollback.
///
/// Checksums are rendered as `sha256:<hex>`.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Checksum of an in-memory buffer.
    ///
    /// ```rust
    /// use upkeep_cli::upgrade::verification::ChecksumVerifier;
    ///
    /// assert_eq!(
    ///     ChecksumVerifier::digest(b"Hello, World!"),
    ///     "sha256:dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
    /// );
    /// ```
    #[must_use]
    pub fn digest(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    /// Checksum of a file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::Io`] if the file cannot be read.
    pub async fn compute_sha256(file_path: &Path) -> UpkeepResult<String> {
        debug!("Computing SHA256 checksum for: {}", file_path.display());
        let contents = fs::read(file_path).await?;
        Ok(Self::digest(&contents))
    }

    /// Verifies `file_path` against `expected` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::Apply`] on mismatch, [`UpkeepError::Io`] if the
    /// file cannot be read.
    pub async fn verify_checksum(file_path: &Path, expected: &str) -> UpkeepResult<()> {
        let actual = Self::compute_sha256(file_path).await?;

        if !actual.eq_ignore_ascii_case(expected) {
            return Err(UpkeepError::apply(
                file_path,
                format!("checksum mismatch (expected {expected}, found {actual})"),
            ));
        }

        debug!("Checksum verified for {}", file_path.display());
        Ok(())
    }
}
