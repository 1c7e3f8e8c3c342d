//! GitHub REST API release source.
//!
//! - Latest release: `GET {api}/repos/{owner}/{repo}/releases/latest`
//! - Asset content: `GET {asset.url}` with `Accept: application/octet-stream`
//! - Source archive: the release's `zipball_url`
//!
//! A token from the configuration is sent as a bearer credential, which
//! raises the rate limit and gives access to private repositories.

use std::io::Write;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info};

use super::{ReleaseAsset, ReleaseInfo, ReleaseSource, RepoRef};
use crate::archive::SourceArchive;
use crate::config::UpdateConfig;
use crate::constants::USER_AGENT;
use crate::core::{UpkeepError, UpkeepResult};
use crate::upgrade::telemetry::VersionCheckParams;
use crate::utils::progress::ProgressBar;

const GITHUB_JSON: &str = "application/vnd.github+json";
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
    #[serde(default)]
    zipball_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    id: u64,
    name: String,
    /// API URL; serves the content with `Accept: application/octet-stream`
    url: String,
    #[serde(default)]
    size: Option<u64>,
}

impl From<GitHubRelease> for ReleaseInfo {
    fn from(release: GitHubRelease) -> Self {
        Self {
            tag_name: release.tag_name,
            body: release.body.unwrap_or_default(),
            assets: release
                .assets
                .into_iter()
                .map(|asset| ReleaseAsset {
                    name: asset.name,
                    id: asset.id,
                    download_url: asset.url,
                    size: asset.size,
                })
                .collect(),
            source_archive_url: release.zipball_url,
        }
    }
}

/// Release source backed by the GitHub REST API.
///
/// ```rust,no_run
/// use upkeep_cli::config::UpdateConfig;
/// use upkeep_cli::release::{GitHubReleaseSource, ReleaseSource, RepoRef};
///
/// # async fn example() -> upkeep_cli::core::UpkeepResult<()> {
/// let source = GitHubReleaseSource::new(&UpdateConfig::default())?;
/// let repo = RepoRef::parse("projectdiscovery/nuclei", "wjlin0")?;
/// let release = source.fetch_latest_release(&repo).await?;
/// println!("{} has {} assets", release.tag_name, release.assets.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GitHubReleaseSource {
    client: Client,
    api_url: String,
    token: Option<String>,
    hide_progress: bool,
    connect_timeout: Duration,
    version_params: Option<VersionCheckParams>,
}

impl GitHubReleaseSource {
    /// Builds a source from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::Fetch`] if the HTTP client cannot be built.
    pub fn new(config: &UpdateConfig) -> UpkeepResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-github-api-version"),
            HeaderValue::from_static("2022-11-28"),
        );

        let connect_timeout = config.version_check_timeout();
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| UpkeepError::fetch("build HTTP client", e))?;

        Ok(Self {
            client,
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
            token: config.github_token.clone(),
            hide_progress: config.hide_progress_bar,
            connect_timeout,
            version_params: None,
        })
    }

    /// Attaches version-check parameters to latest-release requests.
    #[must_use]
    pub fn with_version_params(mut self, params: VersionCheckParams) -> Self {
        self.version_params = Some(params);
        self
    }

    /// URL of the latest-release endpoint for `repo`.
    ///
    /// # Errors
    ///
    /// Returns [`UpkeepError::Config`] if the configured API URL is invalid.
    pub fn latest_release_url(&self, repo: &RepoRef) -> UpkeepResult<Url> {
        let raw = format!("{}/repos/{}/{}/releases/latest", self.api_url, repo.owner, repo.name);
        let mut url = Url::parse(&raw).map_err(|e| UpkeepError::Config {
            message: format!("invalid GitHub API URL '{raw}': {e}"),
        })?;
        if let Some(params) = &self.version_params {
            params.append_to(&mut url);
        }
        Ok(url)
    }

    fn get(&self, url: &str, accept: &'static str) -> RequestBuilder {
        let request = self.client.get(url).header(ACCEPT, accept);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn transport_error(&self, operation: &str, error: reqwest::Error) -> UpkeepError {
        if error.is_timeout() {
            UpkeepError::Timeout {
                operation: operation.to_string(),
                timeout: self.connect_timeout,
            }
        } else {
            UpkeepError::fetch(operation, error)
        }
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> UpkeepResult<reqwest::Response> {
        let response = request.send().await.map_err(|e| self.transport_error(operation, e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(UpkeepError::fetch(operation, "no release found (HTTP 404)"));
        }
        if !status.is_success() {
            return Err(UpkeepError::fetch(operation, format!("HTTP {status}")));
        }
        Ok(response)
    }

    /// Streams a response body into `sink`, advancing a progress bar.
    async fn stream_body<W: Write>(
        &self,
        response: reqwest::Response,
        label: &str,
        operation: &str,
        sink: &mut W,
    ) -> UpkeepResult<u64> {
        let progress = ProgressBar::download(response.content_length(), self.hide_progress);
        progress.set_prefix(label);

        let mut stream = response.bytes_stream();
        let mut total = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.transport_error(operation, e))?;
            sink.write_all(&chunk)?;
            total += chunk.len() as u64;
            progress.inc(chunk.len() as u64);
        }
        progress.finish_and_clear();
        Ok(total)
    }
}

impl ReleaseSource for GitHubReleaseSource {
    async fn fetch_latest_release(&self, repo: &RepoRef) -> UpkeepResult<ReleaseInfo> {
        let operation = format!("fetch latest release of {repo}");
        let url = self.latest_release_url(repo)?;
        debug!("Fetching {}", url);

        let response = self.send(self.get(url.as_str(), GITHUB_JSON), &operation).await?;
        let release: GitHubRelease =
            response.json().await.map_err(|e| self.transport_error(&operation, e))?;

        info!("Latest release of {} is {} ({} assets)", repo, release.tag_name, release.assets.len());
        Ok(release.into())
    }

    async fn fetch_asset_bytes(&self, asset: &ReleaseAsset) -> UpkeepResult<Vec<u8>> {
        let operation = format!("download asset {}", asset.name);
        let response = self.send(self.get(&asset.download_url, OCTET_STREAM), &operation).await?;

        let capacity = asset.size.or(response.content_length()).unwrap_or(0);
        let mut bytes = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));
        let total = self.stream_body(response, &asset.name, &operation, &mut bytes).await?;

        debug!("Downloaded {} ({} bytes)", asset.name, total);
        Ok(bytes)
    }

    async fn open_source_archive(&self, release: &ReleaseInfo) -> UpkeepResult<SourceArchive> {
        let operation = format!("download source archive of {}", release.tag_name);
        let url = release
            .source_archive_url
            .as_deref()
            .ok_or_else(|| UpkeepError::fetch(&operation, "release has no source archive"))?;
        let response = self.send(self.get(url, OCTET_STREAM), &operation).await?;

        let name = format!("{}.zip", release.tag_name);
        let mut file = tempfile::tempfile()?;
        let total = self.stream_body(response, &name, &operation, &mut file).await?;
        file.flush()?;

        debug!("Spooled {} ({} bytes) to a temporary file", name, total);
        SourceArchive::from_file(name, file)
    }
}
