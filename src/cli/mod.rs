//! Command-line interface for upkeep.
//!
//! # Commands
//!
//! - `update` - Replace a tool's executable with its latest release
//! - `check` - Show the latest release of a tool without installing it
//! - `extract` - Unpack a release's source bundle into a directory
//!
//! # Global Options
//!
//! - `--verbose` - Enable debug output
//! - `--quiet` - Suppress all output except errors
//! - `--config` - Path to a custom configuration file
//! - `--no-progress` - Disable download progress bars
//! - `--hide-release-notes` - Do not print release notes after an update
//!
//! # Examples
//!
//! ```bash
//! upkeep update nuclei --current-version 3.0.0 --target /usr/local/bin/nuclei
//! upkeep check subfinder --repo projectdiscovery/subfinder
//! upkeep --no-progress extract nuclei-templates --dir ~/nuclei-templates
//! ```

mod check;
mod extract;
mod update;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::UpdateConfig;
use crate::release::{GitHubReleaseSource, Platform};
use crate::upgrade::UpdateApplier;
use crate::upgrade::telemetry::VersionCheckParams;

pub use check::CheckCommand;
pub use extract::ExtractCommand;
pub use update::UpdateCommand;

/// Settings derived from the global flags.
///
/// ```rust,ignore
/// let cli = Cli::parse_from(["upkeep", "--verbose", "check", "nuclei"]);
/// let config = cli.build_config();
/// assert_eq!(config.log_level.as_deref(), Some("debug"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Log level for the subscriber; `None` disables logging.
    pub log_level: Option<String>,

    /// Hide download progress bars.
    pub no_progress: bool,

    /// Hide release notes after a successful update.
    pub hide_release_notes: bool,

    /// Custom configuration file.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the update configuration and applies the flag overrides.
    ///
    /// Flags only ever switch output off; a flag that is not given leaves
    /// the file or environment setting alone.
    ///
    /// # Errors
    ///
    /// Fails when the configuration file exists but cannot be parsed or is
    /// invalid.
    pub async fn load_update_config(&self) -> Result<UpdateConfig> {
        let mut config = UpdateConfig::load(self.config_path.as_deref())
            .await
            .context("Failed to load configuration")?;
        if self.no_progress {
            config.hide_progress_bar = true;
        }
        if self.hide_release_notes {
            config.hide_release_notes = true;
        }
        Ok(config)
    }
}

/// Self-update toolkit for command-line tools
#[derive(Parser, Debug)]
#[command(
    name = "upkeep",
    about = "Keep command-line tools up to date from their GitHub releases",
    version,
    long_about = "upkeep replaces a tool's executable with the latest published release, \
                  rolling back on failure, or unpacks a release's source bundle into a directory."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output for debugging.
    ///
    /// Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress log output; results and errors are still printed.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a custom configuration file.
    ///
    /// Overrides `UPKEEP_CONFIG_PATH` and the default location
    /// (`~/.upkeep/config.toml`).
    ///
    /// ```bash
    /// upkeep --config ./ci-upkeep.toml check nuclei
    /// ```
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable download progress bars.
    ///
    /// Equivalent to setting `UPKEEP_NO_PROGRESS`.
    #[arg(long, global = true)]
    no_progress: bool,

    /// Do not print release notes after a successful update.
    #[arg(long, global = true)]
    hide_release_notes: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Replace a tool's executable with its latest release
    Update(UpdateCommand),

    /// Show the latest release of a tool
    Check(CheckCommand),

    /// Extract a release's source bundle into a directory
    Extract(ExtractCommand),
}

impl Cli {
    /// Runs the selected command.
    ///
    /// # Errors
    ///
    /// Returns the command's error, with the underlying [`UpkeepError`]
    /// preserved in the chain for [`user_friendly_error`].
    ///
    /// [`UpkeepError`]: crate::core::UpkeepError
    /// [`user_friendly_error`]: crate::core::user_friendly_error
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translates the global flags into a [`CliConfig`].
    ///
    /// `--verbose` maps to `debug`, `--quiet` to no logging, and the default
    /// is `info`.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
            hide_release_notes: self.hide_release_notes,
            config_path: self.config.clone(),
        }
    }

    /// Runs the selected command with an explicit configuration.
    ///
    /// # Errors
    ///
    /// As for [`execute`](Self::execute).
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let update_config = config.load_update_config().await?;

        match self.command {
            Commands::Update(cmd) => cmd.execute(update_config).await,
            Commands::Check(cmd) => cmd.execute(update_config).await,
            Commands::Extract(cmd) => cmd.execute(update_config).await,
        }
    }
}

/// Builds an applier over the GitHub release source.
///
/// Version-check parameters are attached only when enabled in the
/// configuration and the running version of the tool is known.
fn github_applier(config: UpdateConfig, tool_version: Option<&str>) -> Result<UpdateApplier<GitHubReleaseSource>> {
    let mut source = GitHubReleaseSource::new(&config)?;
    if config.send_version_params
        && let Some(version) = tool_version
    {
        source = source.with_version_params(VersionCheckParams::collect(version, &Platform::current()));
    }
    Ok(UpdateApplier::new(source, config))
}
