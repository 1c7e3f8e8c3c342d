//! Picking the release asset built for the running platform.
//!
//! An asset is a candidate when its lowercased name mentions the target OS,
//! the target architecture (any synonym from [`super::platform`]) and, if
//! given, the tool name hint. Each of those tokens scores 2 when it stands
//! on its own between separators (`_linux_`, `-amd64.`) and 1 when it is
//! only a substring; the highest total wins and ties go to the asset listed
//! first.
//!
//! OS and architecture are looked up with the tool name cut out of the asset
//! name, so `win` in `twingate` never counts as Windows. An asset that names
//! a different OS of [`OS_ALIASES`] between separators is never a candidate.

use tracing::debug;

use super::ReleaseAsset;
use super::platform::{ARCH_ALIASES, OS_ALIASES, Platform, PlatformAlias, alias_for};
use crate::core::{UpkeepError, UpkeepResult};

/// Suffixes of checksum, signature and SBOM side files.
const SIDE_FILE_SUFFIXES: &[&str] =
    &[".sha256", ".sha512", ".md5", ".sig", ".asc", ".pem", ".sbom", "checksums.txt"];

const BOUNDARY_SCORE: u32 = 2;
const SUBSTRING_SCORE: u32 = 1;

/// Selects the asset for `platform` from `assets`.
///
/// ```rust
/// use upkeep_cli::release::{Platform, ReleaseAsset, select_asset};
///
/// let assets: Vec<ReleaseAsset> = ["tool_linux_amd64.zip", "tool_darwin_arm64.zip"]
///     .iter()
///     .enumerate()
///     .map(|(id, name)| ReleaseAsset {
///         name: name.to_string(),
///         id: id as u64,
///         download_url: format!("https://example.invalid/{name}"),
///         size: None,
///     })
///     .collect();
///
/// let asset = select_asset(&assets, Some("tool"), &Platform::new("macos", "aarch64")).unwrap();
/// assert_eq!(asset.name, "tool_darwin_arm64.zip");
/// ```
///
/// # Errors
///
/// Returns [`UpkeepError::AssetNotFound`] when no asset qualifies.
pub fn select_asset<'a>(
    assets: &'a [ReleaseAsset],
    tool_hint: Option<&str>,
    platform: &Platform,
) -> UpkeepResult<&'a ReleaseAsset> {
    let tool_hint = tool_hint.map(str::to_ascii_lowercase).filter(|hint| !hint.is_empty());
    let os_alias = alias_for(OS_ALIASES, &platform.os);
    let arch_alias = alias_for(ARCH_ALIASES, &platform.arch);

    let mut best: Option<(u32, &ReleaseAsset)> = None;
    for asset in assets {
        let name = asset.name.to_ascii_lowercase();
        if is_side_file(&name) {
            continue;
        }

        let (hint_score, rest) = match &tool_hint {
            Some(hint) => match token_score(&name, hint) {
                0 => continue,
                score => (score, without_token(&name, hint)),
            },
            None => (0, name.clone()),
        };

        if names_other_os(&rest, os_alias, &platform.os) {
            continue;
        }
        let Some(os_score) = platform_score(&rest, os_alias, &platform.os) else {
            continue;
        };
        let Some(arch_score) = platform_score(&rest, arch_alias, &platform.arch) else {
            continue;
        };

        let score = os_score + arch_score + hint_score;
        debug!("Asset {} is a candidate for {} (score {})", asset.name, platform, score);
        if best.is_none_or(|(best_score, _)| score > best_score) {
            best = Some((score, asset));
        }
    }

    best.map(|(_, asset)| asset).ok_or_else(|| UpkeepError::AssetNotFound {
        tool: tool_hint.unwrap_or_else(|| "<any>".to_string()),
        os: platform.os.clone(),
        arch: platform.arch.clone(),
    })
}

fn is_side_file(name: &str) -> bool {
    SIDE_FILE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Best score of any synonym, or `None` if nothing matches or a conflicting
/// token is present.
fn platform_score(name: &str, alias: Option<&PlatformAlias>, fallback: &str) -> Option<u32> {
    let (synonyms, conflicts): (&[&str], &[&str]) = match alias {
        Some(alias) => (alias.synonyms, alias.conflicts),
        None => (std::slice::from_ref(&fallback), &[]),
    };

    if conflicts.iter().any(|conflict| name.contains(conflict)) {
        return None;
    }

    let score = synonyms.iter().map(|synonym| token_score(name, synonym)).max().unwrap_or(0);
    (score > 0).then_some(score)
}

/// Whether `name` carries a boundary token of an OS other than the target.
fn names_other_os(name: &str, target: Option<&PlatformAlias>, fallback: &str) -> bool {
    OS_ALIASES
        .iter()
        .filter(|alias| match target {
            Some(target) => alias.canonical != target.canonical,
            None => alias.canonical != fallback,
        })
        .flat_map(|alias| alias.synonyms)
        .any(|synonym| token_score(name, synonym) == BOUNDARY_SCORE)
}

/// Scores one token: boundary match, substring match, or 0.
fn token_score(name: &str, token: &str) -> u32 {
    if token.is_empty() {
        return 0;
    }

    let mut found = false;
    for (start, _) in name.match_indices(token) {
        found = true;
        if is_boundary_match(name, start, token.len()) {
            return BOUNDARY_SCORE;
        }
    }

    if found { SUBSTRING_SCORE } else { 0 }
}

/// `name` with the occurrence of `token` credited by [`token_score`] replaced
/// by a separator.
fn without_token(name: &str, token: &str) -> String {
    let start = name
        .match_indices(token)
        .map(|(start, _)| start)
        .find(|&start| is_boundary_match(name, start, token.len()))
        .or_else(|| name.find(token));
    match start {
        Some(start) => format!("{}_{}", &name[..start], &name[start + token.len()..]),
        None => name.to_string(),
    }
}

fn is_boundary_match(name: &str, start: usize, len: usize) -> bool {
    let before = name[..start].chars().next_back();
    let after = name[start + len..].chars().next();
    let is_separator = |c: Option<char>| c.is_none_or(|c| !c.is_ascii_alphanumeric());
    is_separator(before) && is_separator(after)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assets(names: &[&str]) -> Vec<ReleaseAsset> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ReleaseAsset {
                name: (*name).to_string(),
                id: i as u64 + 1,
                download_url: format!("https://example.invalid/{name}"),
                size: Some(1024),
            })
            .collect()
    }

    #[test]
    fn test_basic_platform_matrix() {
        let list = assets(&["tool_linux_amd64.zip", "tool_darwin_arm64.zip", "tool_windows_amd64.zip"]);

        let linux = select_asset(&list, None, &Platform::new("linux", "amd64")).unwrap();
        assert_eq!(linux.name, "tool_linux_amd64.zip");

        let mac = select_asset(&list, None, &Platform::new("darwin", "arm64")).unwrap();
        assert_eq!(mac.name, "tool_darwin_arm64.zip");

        let windows = select_asset(&list, Some("tool"), &Platform::new("windows", "amd64")).unwrap();
        assert_eq!(windows.name, "tool_windows_amd64.zip");

        let missing = select_asset(&list, None, &Platform::new("linux", "arm64"));
        match missing {
            Err(UpkeepError::AssetNotFound {
                os,
                arch,
                ..
            }) => {
                assert_eq!(os, "linux");
                assert_eq!(arch, "arm64");
            }
            other => panic!("expected AssetNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_synonyms_match() {
        let list = assets(&["Tool-macOS-x86_64.tar.gz", "Tool-Linux-aarch64.tar.gz"]);

        let mac = select_asset(&list, Some("tool"), &Platform::new("darwin", "amd64")).unwrap();
        assert_eq!(mac.name, "Tool-macOS-x86_64.tar.gz");

        let linux = select_asset(&list, Some("TOOL"), &Platform::new("linux", "arm64")).unwrap();
        assert_eq!(linux.name, "Tool-Linux-aarch64.tar.gz");
    }

    #[test]
    fn test_conflicting_tokens_disqualify() {
        let list = assets(&["tool_linux_arm64.zip", "tool_darwin_amd64.zip", "tool_linux_x86_64.zip"]);

        // arm must not match inside arm64
        assert!(select_asset(&list, None, &Platform::new("linux", "arm")).is_err());
        // win must not match inside darwin
        assert!(select_asset(&list, None, &Platform::new("windows", "amd64")).is_err());
        // x86 must not match inside x86_64
        assert!(select_asset(&list, None, &Platform::new("linux", "386")).is_err());
    }

    #[test]
    fn test_side_files_are_ignored() {
        let list = assets(&[
            "tool_linux_amd64.zip.sha256",
            "tool_linux_amd64.zip.sig",
            "tool_1.0.0_checksums.txt",
            "tool_linux_amd64.zip",
        ]);
        let asset = select_asset(&list, None, &Platform::new("linux", "amd64")).unwrap();
        assert_eq!(asset.name, "tool_linux_amd64.zip");
    }

    #[test]
    fn test_boundary_match_beats_substring() {
        let list = assets(&["toolkit_linuxamd64.zip", "tool_linux_amd64.zip"]);
        let asset = select_asset(&list, Some("tool"), &Platform::new("linux", "amd64")).unwrap();
        assert_eq!(asset.name, "tool_linux_amd64.zip");
    }

    #[test]
    fn test_ties_go_to_first_listed() {
        let list = assets(&["tool_linux_amd64.zip", "tool_linux_amd64.tar.gz"]);
        let asset = select_asset(&list, None, &Platform::new("linux", "amd64")).unwrap();
        assert_eq!(asset.id, 1);
    }

    #[test]
    fn test_hint_is_required_when_given() {
        let list = assets(&["other_linux_amd64.zip"]);
        let result = select_asset(&list, Some("tool"), &Platform::new("linux", "amd64"));
        assert!(matches!(result, Err(UpkeepError::AssetNotFound { tool, .. }) if tool == "tool"));
    }

    #[test]
    fn test_tool_name_never_stands_in_for_platform() {
        let list = assets(&["twingate_linux_amd64.zip"]);
        let result = select_asset(&list, Some("twingate"), &Platform::new("windows", "amd64"));
        assert!(matches!(result, Err(UpkeepError::AssetNotFound { .. })));
        let linux = select_asset(&list, Some("twingate"), &Platform::new("linux", "amd64")).unwrap();
        assert_eq!(linux.name, "twingate_linux_amd64.zip");

        let list = assets(&["pineapple_linux_amd64.zip", "boxsx_linux_amd64.zip"]);
        assert!(select_asset(&list, Some("pineapple"), &Platform::new("darwin", "amd64")).is_err());
        assert!(select_asset(&list, Some("boxsx"), &Platform::new("darwin", "amd64")).is_err());
    }

    #[test]
    fn test_other_os_token_disqualifies() {
        // "apple" is only a substring here, while linux stands on its own
        let list = assets(&["pineapple_linux_amd64.zip"]);
        assert!(select_asset(&list, None, &Platform::new("darwin", "amd64")).is_err());

        let list = assets(&["twingate_linux_amd64.zip", "twingate_windows_amd64.zip"]);
        let windows = select_asset(&list, Some("twingate"), &Platform::new("windows", "x86_64")).unwrap();
        assert_eq!(windows.name, "twingate_windows_amd64.zip");
    }

    #[test]
    fn test_without_token() {
        assert_eq!(without_token("twingate_linux_amd64.zip", "twingate"), "__linux_amd64.zip");
        assert_eq!(without_token("toolkit_tool_linux", "tool"), "toolkit___linux");
        assert_eq!(without_token("mytool.zip", "tool"), "my_.zip");
    }

    #[test]
    fn test_token_score() {
        assert_eq!(token_score("tool_linux_amd64.zip", "linux"), BOUNDARY_SCORE);
        assert_eq!(token_score("toollinux.zip", "linux"), SUBSTRING_SCORE);
        assert_eq!(token_score("tool.zip", "linux"), 0);
        // a later boundary occurrence still counts
        assert_eq!(token_score("linuxish_linux", "linux"), BOUNDARY_SCORE);
    }
}
