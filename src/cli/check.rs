//! Show the latest release of a tool.
//!
//! ```bash
//! upkeep check nuclei
//! upkeep check nuclei --current-version 3.0.0
//! ```
//!
//! With `--current-version` the command also tells whether an update is
//! available. Nothing is downloaded besides the release metadata.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use semver::Version;

use super::github_applier;
use crate::config::UpdateConfig;
use crate::version::{parse_version, precedence};

/// Arguments of `upkeep check`.
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Name of the tool; also the repository name unless `--repo` is given.
    #[arg(value_name = "TOOL")]
    pub tool: String,

    /// Repository as `name`, `owner/name` or a GitHub URL.
    #[arg(long, value_name = "REPO")]
    pub repo: Option<String>,

    /// Version currently installed, to compare against.
    #[arg(long, value_name = "VERSION")]
    pub current_version: Option<String>,
}

impl CheckCommand {
    /// Fetches and prints the latest version.
    ///
    /// # Errors
    ///
    /// Fails if the current version is invalid, the release cannot be
    /// fetched, or its tag is not a version.
    pub async fn execute(self, config: UpdateConfig) -> Result<()> {
        let current = self.current_version.as_deref().map(parse_version).transpose()?;
        let applier = github_applier(config, self.current_version.as_deref())?;

        println!("{}", format!("Checking for updates to {}...", self.tool).cyan());
        let latest = applier.latest_version(&self.tool, self.repo.as_deref()).await?;

        println!("{}", status_line(&self.tool, current.as_ref(), &latest));
        Ok(())
    }
}

fn status_line(tool: &str, current: Option<&Version>, latest: &Version) -> String {
    match current {
        Some(current) if precedence(current, latest).is_lt() => {
            format!("Update available for {tool}: {current} -> {latest}").yellow().to_string()
        }
        Some(current) => format!("{tool} is on the latest version ({current})").green().to_string(),
        None => format!("Latest version of {tool}: {latest}").green().to_string(),
    }
}
