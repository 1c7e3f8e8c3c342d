//! Self-update of managed executables.
//!
//! Lets a tool replace its own executable with the latest published release,
//! or lay down the files of a release's source bundle.
//!
//! # Architecture Overview
//!
//! - **[`UpdateApplier`]**: orchestrates one update attempt against a
//!   [`ReleaseSource`](crate::release::ReleaseSource)
//! - **[`ExecutableReplacer`]** / **[`BinaryReplacer`]**: stage, swap and
//!   roll back the executable on disk
//! - **[`ChecksumVerifier`]**: SHA-256 integrity checks of written files
//! - **[`telemetry`]**: optional version-check parameters
//!
//! ## Update Process Flow
//!
//! ```text
//! 1. Version Check
//!    ├── Fetch the latest release metadata
//!    └── Stop if the running version is not older
//!
//! 2. Preconditions
//!    └── Confirm the executable and its directory are writable
//!
//! 3. Download
//!    ├── Select the asset for this OS and architecture
//!    └── Pull the executable out of the archive
//!
//! 4. Apply
//!    ├── Stage next to the target and verify its checksum
//!    ├── Move the target aside and swap the staged file in
//!    └── Verify, then drop the backup
//!
//! 5. On failure
//!    └── Restore the backup (rollback)
//! ```
//!
//! # Safety Mechanisms
//!
//! - Nothing is written before the permission check passes
//! - The previous executable is kept until the new one is verified
//! - A failed apply is always followed by a rollback; if that also fails the
//!   error names the executable so it can be reinstalled manually
//! - Bundle extraction never writes outside the destination directory
//!
//! # Examples
//!
//! ```rust,no_run
//! use upkeep_cli::config::UpdateConfig;
//! use upkeep_cli::release::GitHubReleaseSource;
//! use upkeep_cli::upgrade::UpdateApplier;
//!
//! # async fn example() -> upkeep_cli::core::UpkeepResult<()> {
//! let config = UpdateConfig::default();
//! let applier = UpdateApplier::new(GitHubReleaseSource::new(&config)?, config);
//!
//! let report = applier
//!     .extract_to_dir("nuclei-templates", Some("projectdiscovery/nuclei-templates"), "templates".as_ref())
//!     .await?;
//! println!("{} files written", report.written);
//! # Ok(())
//! # }
//! ```

pub mod applier;
pub mod replacer;
pub mod telemetry;
pub mod verification;

pub use applier::{UpdateApplier, UpdateOutcome, UpdateStatus};
pub use replacer::{BinaryReplacer, ExecutableReplacer};
pub use verification::ChecksumVerifier;
