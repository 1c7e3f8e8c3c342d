//! Version-check query parameters.
//!
//! When enabled, the latest-release request carries a few query parameters
//! describing the caller: `os`, `arch`, `tool_runtime_version`, `v` (the
//! running tool version) and `machine_id`. The machine id is never sent raw;
//! it is an HMAC-SHA256 of the application id keyed by the platform machine
//! identifier, so it is stable per machine but not reversible to the
//! underlying id.

use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;
use tracing::debug;

use crate::constants::{MACHINE_ID_APP_ID, UNKNOWN_MACHINE_ID};
use crate::release::Platform;

type HmacSha256 = Hmac<Sha256>;

/// Parameters attached to version-check requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCheckParams {
    pub os: String,
    pub arch: String,
    /// Toolchain the tool was built with, or `unknown`.
    pub tool_runtime_version: String,
    /// Version of the running tool.
    pub v: String,
    /// Protected machine id, or `unknown`.
    pub machine_id: String,
}

impl VersionCheckParams {
    /// Collects parameters for the running machine.
    #[must_use]
    pub fn collect(tool_version: &str, platform: &Platform) -> Self {
        Self {
            os: platform.os.clone(),
            arch: platform.arch.clone(),
            tool_runtime_version: runtime_version().to_string(),
            v: tool_version.to_string(),
            machine_id: machine_id(),
        }
    }

    /// Appends the parameters to `url`'s query string.
    ///
    /// ```rust
    /// use reqwest::Url;
    /// use upkeep_cli::upgrade::telemetry::VersionCheckParams;
    ///
    /// let params = VersionCheckParams {
    ///     os: "linux".to_string(),
    ///     arch: "amd64".to_string(),
    ///     tool_runtime_version: "1.85.0".to_string(),
    ///     v: "3.1.0".to_string(),
    ///     machine_id: "unknown".to_string(),
    /// };
    /// let mut url = Url::parse("https://api.github.com/repos/a/b/releases/latest").unwrap();
    /// params.append_to(&mut url);
    /// assert_eq!(
    ///     url.query(),
    ///     Some("os=linux&arch=amd64&tool_runtime_version=1.85.0&v=3.1.0&machine_id=unknown")
    /// );
    /// ```
    pub fn append_to(&self, url: &mut Url) {
        url.query_pairs_mut()
            .append_pair("os", &self.os)
            .append_pair("arch", &self.arch)
            .append_pair("tool_runtime_version", &self.tool_runtime_version)
            .append_pair("v", &self.v)
            .append_pair("machine_id", &self.machine_id);
    }
}

fn runtime_version() -> &'static str {
    option_env!("CARGO_PKG_RUST_VERSION").filter(|v| !v.is_empty()).unwrap_or("unknown")
}

/// Protected identifier of this machine, or `unknown` when none is available.
#[must_use]
pub fn machine_id() -> String {
    match raw_machine_id() {
        Some(raw) => protect(&raw, MACHINE_ID_APP_ID),
        None => {
            debug!("No machine id available, reporting '{}'", UNKNOWN_MACHINE_ID);
            UNKNOWN_MACHINE_ID.to_string()
        }
    }
}

/// HMAC-SHA256 of `app_id` keyed by `raw_id`, hex encoded.
#[must_use]
pub fn protect(raw_id: &str, app_id: &str) -> String {
    // HMAC accepts keys of any length
    let Ok(mut mac) = HmacSha256::new_from_slice(raw_id.as_bytes()) else {
        return UNKNOWN_MACHINE_ID.to_string();
    };
    mac.update(app_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(target_os = "linux")]
fn raw_machine_id() -> Option<String> {
    ["/etc/machine-id", "/var/lib/dbus/machine-id"].iter().find_map(|path| {
        std::fs::read_to_string(path)
            .ok()
            .map(|content| content.trim().to_string())
            .filter(|id| !id.is_empty())
    })
}

#[cfg(target_os = "macos")]
fn raw_machine_id() -> Option<String> {
    let output = std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()
        .ok()?;
    parse_ioreg_uuid(&String::from_utf8_lossy(&output.stdout))
}

#[cfg(windows)]
fn raw_machine_id() -> Option<String> {
    let output = std::process::Command::new("reg")
        .args([
            "query",
            r"HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Cryptography",
            "/v",
            "MachineGuid",
        ])
        .output()
        .ok()?;
    parse_reg_machine_guid(&String::from_utf8_lossy(&output.stdout))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
fn raw_machine_id() -> Option<String> {
    None
}

/// Extracts the value of `"IOPlatformUUID" = "..."` from `ioreg` output.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_ioreg_uuid(output: &str) -> Option<String> {
    output.lines().find(|line| line.contains("IOPlatformUUID")).and_then(|line| {
        let value = line.split('=').nth(1)?.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Extracts the `MachineGuid` value from `reg query` output.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_reg_machine_guid(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.contains("MachineGuid"))
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}
