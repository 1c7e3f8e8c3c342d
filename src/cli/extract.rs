//! Extract a release's source bundle into a directory.
//!
//! The archive's top-level folder is stripped, hidden files and folders are
//! skipped (except the `.version` marker), and no entry may land outside
//! `--dir`.
//!
//! ```bash
//! upkeep extract nuclei-templates --repo projectdiscovery/nuclei-templates --dir ~/nuclei-templates
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::github_applier;
use crate::archive::ExtractionReport;
use crate::config::UpdateConfig;

/// Arguments of `upkeep extract`.
#[derive(Args, Debug)]
pub struct ExtractCommand {
    /// Name of the tool or bundle; also the repository name unless `--repo`
    /// is given.
    #[arg(value_name = "TOOL")]
    pub tool: String,

    /// Destination directory; created if missing.
    #[arg(long, value_name = "DIR")]
    pub dir: PathBuf,

    /// Repository as `name`, `owner/name` or a GitHub URL.
    #[arg(long, value_name = "REPO")]
    pub repo: Option<String>,
}

impl ExtractCommand {
    /// Downloads and extracts the bundle.
    ///
    /// # Errors
    ///
    /// Fails if the release cannot be fetched or extraction stops part way;
    /// files written before the failure are left in place.
    pub async fn execute(self, config: UpdateConfig) -> Result<()> {
        let applier = github_applier(config, None)?;

        println!("{}", format!("Extracting latest release of {} into {}...", self.tool, self.dir.display()).cyan());
        let report = applier.extract_to_dir(&self.tool, self.repo.as_deref(), &self.dir).await?;

        println!("{}", summary(&report).green());
        Ok(())
    }
}

fn summary(report: &ExtractionReport) -> String {
    format!("Extracted {} files ({} entries skipped)", report.written, report.skipped)
}
