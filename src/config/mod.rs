//! Configuration for upkeep.
//!
//! All settings of an update attempt live in one [`UpdateConfig`] value that
//! is passed explicitly to the orchestrator; nothing is read from globals
//! during an update.
//!
//! # Location
//!
//! - **Unix/macOS**: `~/.upkeep/config.toml`
//! - **Windows**: `%LOCALAPPDATA%\upkeep\config.toml`
//!
//! The location can be overridden with `UPKEEP_CONFIG_PATH` or `--config`.
//! A missing file means defaults.
//!
//! # File Format
//!
//! ```toml
//! hide_release_notes = false
//! hide_progress_bar = false
//! version_check_timeout_secs = 5
//! download_timeout_secs = 30
//! github_api_url = "https://api.github.com"
//! default_owner = "wjlin0"
//! send_version_params = false
//! # github_token = "ghp_..."   # prefer UPKEEP_GITHUB_TOKEN / GITHUB_TOKEN
//! ```
//!
//! # Environment
//!
//! - `UPKEEP_GITHUB_TOKEN`, then `GITHUB_TOKEN`: API token (overrides the file)
//! - `UPKEEP_NO_PROGRESS`: hides progress bars

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::constants::{
    CONFIG_PATH_ENV, DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_GITHUB_API_URL, DEFAULT_REPO_OWNER,
    DEFAULT_VERSION_CHECK_TIMEOUT, GITHUB_TOKEN_ENV, GITHUB_TOKEN_FALLBACK_ENV, NO_PROGRESS_ENV,
};
use crate::core::{UpkeepError, UpkeepResult};

/// Settings of the update core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Do not print release notes after a successful update.
    #[serde(default)]
    pub hide_release_notes: bool,

    /// Do not render download progress bars.
    #[serde(default)]
    pub hide_progress_bar: bool,

    /// Timeout for release-metadata requests, in seconds.
    #[serde(default = "default_version_check_timeout_secs")]
    pub version_check_timeout_secs: u64,

    /// Timeout for asset and source-archive downloads, in seconds.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Base URL of the GitHub REST API.
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// Owner assumed for bare repository names.
    #[serde(default = "default_owner")]
    pub default_owner: String,

    /// Token sent as a bearer credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    /// Attach platform and machine-id parameters to version checks.
    #[serde(default)]
    pub send_version_params: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            hide_release_notes: false,
            hide_progress_bar: false,
            version_check_timeout_secs: default_version_check_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            github_api_url: default_github_api_url(),
            default_owner: default_owner(),
            github_token: None,
            send_version_params: false,
        }
    }
}

fn default_version_check_timeout_secs() -> u64 {
    DEFAULT_VERSION_CHECK_TIMEOUT.as_secs()
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT.as_secs()
}

fn default_github_api_url() -> String {
    DEFAULT_GITHUB_API_URL.to_string()
}

fn default_owner() -> String {
    DEFAULT_REPO_OWNER.to_string()
}

impl UpdateConfig {
    /// Timeout for version checks and release metadata.
    #[must_use]
    pub const fn version_check_timeout(&self) -> Duration {
        Duration::from_secs(self.version_check_timeout_secs)
    }

    /// Timeout for downloads.
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Default configuration file path for this platform.
    ///
    /// # Errors
    ///
    /// Fails when the home (or local data) directory cannot be determined.
    pub fn default_path() -> UpkeepResult<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| UpkeepError::Config {
                    message: "unable to determine local data directory".to_string(),
                })?
                .join("upkeep")
        } else {
            dirs::home_dir()
                .ok_or_else(|| UpkeepError::Config {
                    message: "unable to determine home directory".to_string(),
                })?
                .join(".upkeep")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Loads configuration from `path`, or from `UPKEEP_CONFIG_PATH`, or from
    /// the default location, then applies environment overrides.
    ///
    /// A missing file yields defaults.
    ///
    /// ```rust,no_run
    /// use upkeep_cli::config::UpdateConfig;
    ///
    /// # async fn example() -> upkeep_cli::core::UpkeepResult<()> {
    /// let config = UpdateConfig::load(None).await?;
    /// println!("downloads time out after {:?}", config.download_timeout());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::Config`] if the file exists but cannot be read,
    /// parsed, or validated.
    pub async fn load(path: Option<&Path>) -> UpkeepResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(CONFIG_PATH_ENV) {
                Some(path) => PathBuf::from(path),
                None => Self::default_path()?,
            },
        };

        let mut config = if path.exists() {
            Self::load_from(&path).await?
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses the configuration file at `path` without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::Config`] on read or parse failure.
    pub async fn load_from(path: &Path) -> UpkeepResult<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| UpkeepError::Config {
            message: format!("failed to read {}: {e}", path.display()),
        })?;

        toml::from_str(&content).map_err(|e| UpkeepError::Config {
            message: format!("failed to parse {}: {e}", path.display()),
        })
    }

    /// Writes the configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::Config`] on serialization or write failure.
    pub async fn save_to(&self, path: &Path) -> UpkeepResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| UpkeepError::Config {
            message: format!("failed to serialize configuration: {e}"),
        })?;
        fs::write(path, content).await.map_err(|e| UpkeepError::Config {
            message: format!("failed to write {}: {e}", path.display()),
        })
    }

    /// Applies `UPKEEP_GITHUB_TOKEN`/`GITHUB_TOKEN` and `UPKEEP_NO_PROGRESS`.
    pub fn apply_env_overrides(&mut self) {
        let token = [GITHUB_TOKEN_ENV, GITHUB_TOKEN_FALLBACK_ENV]
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|value| !value.trim().is_empty()));
        if let Some(token) = token {
            self.github_token = Some(token);
        }

        if std::env::var_os(NO_PROGRESS_ENV).is_some() {
            self.hide_progress_bar = true;
        }
    }

    /// Rejects settings that would make every update fail.
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::Config`] naming the offending setting.
    pub fn validate(&self) -> UpkeepResult<()> {
        if self.version_check_timeout_secs == 0 {
            return Err(UpkeepError::Config {
                message: "version_check_timeout_secs must be greater than zero".to_string(),
            });
        }
        if self.download_timeout_secs == 0 {
            return Err(UpkeepError::Config {
                message: "download_timeout_secs must be greater than zero".to_string(),
            });
        }
        if let Err(e) = reqwest::Url::parse(&self.github_api_url) {
            return Err(UpkeepError::Config {
                message: format!("github_api_url '{}' is not a valid URL: {e}", self.github_api_url),
            });
        }
        if self.default_owner.trim().is_empty() {
            return Err(UpkeepError::Config {
                message: "default_owner must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
