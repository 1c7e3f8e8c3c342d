//! Replace a tool's executable with its latest release.
//!
//! The flow mirrors what a tool's own `--update` flag would do:
//!
//! 1. Compare `--current-version` with the latest release tag
//! 2. Check the target is writable
//! 3. Download the asset for this platform and extract the executable
//! 4. Swap it in, rolling back on failure
//!
//! # Examples
//!
//! ```bash
//! # Update the executable on PATH
//! upkeep update nuclei --current-version 3.0.0 --target "$(which nuclei)"
//!
//! # Repository not named after the tool
//! upkeep update pd --current-version v1.2.0 --repo projectdiscovery/pdtm
//! ```
//!
//! Without `--target` the running `upkeep` executable is replaced.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;

use super::github_applier;
use crate::config::UpdateConfig;
use crate::upgrade::{BinaryReplacer, UpdateOutcome, UpdateStatus};

/// Arguments of `upkeep update`.
#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// Name of the tool; also the repository name unless `--repo` is given.
    #[arg(value_name = "TOOL")]
    pub tool: String,

    /// Version currently installed (e.g. "3.0.0" or "v3.0.0").
    #[arg(long, value_name = "VERSION")]
    pub current_version: String,

    /// Repository as `name`, `owner/name` or a GitHub URL.
    #[arg(long, value_name = "REPO")]
    pub repo: Option<String>,

    /// Executable to replace; defaults to the running executable.
    #[arg(long, value_name = "PATH")]
    pub target: Option<PathBuf>,
}

impl UpdateCommand {
    /// Runs the update.
    ///
    /// # Errors
    ///
    /// Fails on any error before the swap, when the apply step failed and was
    /// rolled back, and when the rollback itself failed.
    pub async fn execute(self, config: UpdateConfig) -> Result<()> {
        let replacer = match &self.target {
            Some(target) => BinaryReplacer::new(target.clone()),
            None => BinaryReplacer::for_current_exe().context("Failed to locate the running executable")?,
        };
        let applier = github_applier(config, Some(&self.current_version))?;

        println!("{}", format!("Checking for updates to {}...", self.tool).cyan());
        let outcome = applier
            .update_executable(&self.tool, &self.current_version, self.repo.as_deref(), &replacer)
            .await?;

        report(&outcome)
    }
}

fn report(outcome: &UpdateOutcome) -> Result<()> {
    match &outcome.status {
        UpdateStatus::UpToDate => {
            println!(
                "{}",
                format!("{} is already on the latest version ({})", outcome.tool, outcome.current_version).green()
            );
        }
        UpdateStatus::Updated => {
            println!(
                "{}",
                format!("Updated {} {} -> {}", outcome.tool, outcome.current_version, outcome.latest_version).green()
            );
            if let Some(notes) = &outcome.release_notes {
                println!();
                println!("{}", format!("Release notes for {}:", outcome.latest_version).bold());
                println!("{}", notes.trim_end());
            }
        }
        UpdateStatus::RolledBack {
            error,
        } => {
            eprintln!(
                "{}",
                format!("Update failed. {} was restored to {}", outcome.tool, outcome.current_version).yellow()
            );
            bail!(error.clone());
        }
    }
    Ok(())
}
