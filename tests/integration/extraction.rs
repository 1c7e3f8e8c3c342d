use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;
use upkeep_cli::archive::{EntryOutcome, SkipReason, write_entry};
use upkeep_cli::config::UpdateConfig;
use upkeep_cli::core::UpkeepError;
use upkeep_cli::test_utils::{FakeReleaseSource, zip_bytes_with_modes};
use upkeep_cli::upgrade::UpdateApplier;

fn templates_release() -> FakeReleaseSource {
    let bundle = zip_bytes_with_modes(&[
        ("projectdiscovery-nuclei-templates-7e2f1a9/", b"", 0o755),
        ("projectdiscovery-nuclei-templates-7e2f1a9/.version", b"v10.1.2", 0o644),
        ("projectdiscovery-nuclei-templates-7e2f1a9/README.md", b"# templates", 0o644),
        ("projectdiscovery-nuclei-templates-7e2f1a9/.github/workflows/ci.yml", b"on: push", 0o644),
        ("projectdiscovery-nuclei-templates-7e2f1a9/.gitignore", b"*.tmp", 0o644),
        ("projectdiscovery-nuclei-templates-7e2f1a9/http/cves/2024/CVE-2024-0001.yaml", b"id: CVE-2024-0001", 0o644),
        ("projectdiscovery-nuclei-templates-7e2f1a9/dns/a-record.yaml", b"id: a-record", 0o644),
        ("projectdiscovery-nuclei-templates-7e2f1a9/../../../tmp/evil.yaml", b"evil", 0o644),
        ("projectdiscovery-nuclei-templates-7e2f1a9/network/../../outside.yaml", b"evil", 0o644),
        ("projectdiscovery-nuclei-templates-7e2f1a9/network/ssh.yaml", b"id: ssh", 0o644),
    ]);
    FakeReleaseSource::new("v10.1.2", "weekly templates").with_source_archive(bundle)
}

fn applier() -> UpdateApplier<FakeReleaseSource> {
    UpdateApplier::new(templates_release(), UpdateConfig::default())
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_extract_bundle_into_directory() -> Result<()> {
    let temp = TempDir::new()?;
    let base = temp.path().join("nuclei-templates");

    let report =
        applier().extract_to_dir("nuclei-templates", Some("projectdiscovery/nuclei-templates"), &base).await?;

    assert_eq!(read(&base.join(".version")), "v10.1.2");
    assert_eq!(read(&base.join("http/cves/2024/CVE-2024-0001.yaml")), "id: CVE-2024-0001");
    assert_eq!(read(&base.join("dns/a-record.yaml")), "id: a-record");
    assert_eq!(read(&base.join("network/ssh.yaml")), "id: ssh");
    assert!(!base.join("README.md").exists());
    assert!(!base.join(".github").exists());
    assert!(!base.join(".gitignore").exists());

    assert_eq!(report.written, 4);
    assert_eq!(report.skipped, 6);
    assert_eq!(report.last_written, Some(base.join("network").join("ssh.yaml")));
    Ok(())
}

#[tokio::test]
async fn test_traversal_entries_never_escape() -> Result<()> {
    let temp = TempDir::new()?;
    let base = temp.path().join("a").join("b").join("templates");

    applier().extract_to_dir("nuclei-templates", None, &base).await?;

    assert!(!temp.path().join("a/b/outside.yaml").exists());
    assert!(!temp.path().join("a/outside.yaml").exists());
    assert!(!temp.path().join("tmp/evil.yaml").exists());
    assert!(!temp.path().join("a/tmp/evil.yaml").exists());
    Ok(())
}

#[tokio::test]
async fn test_custom_callback_sees_every_entry() -> Result<()> {
    let temp = TempDir::new()?;
    let base = temp.path().to_path_buf();
    let mut yaml_files = Vec::new();
    let mut skipped = Vec::new();

    let report = applier()
        .extract_to_dir_with("nuclei-templates", None, &base, |entry, base| {
            let is_yaml = entry.path.ends_with(".yaml");
            let path = entry.path.clone();
            let outcome = write_entry(entry, base)?;
            match &outcome {
                EntryOutcome::Written(destination) if is_yaml => yaml_files.push(destination.clone()),
                EntryOutcome::Written(_) => {}
                EntryOutcome::Skipped(reason) => skipped.push((path, *reason)),
            }
            Ok(outcome)
        })
        .await?;

    assert_eq!(report.written, 4);
    assert_eq!(
        yaml_files,
        vec![
            base.join("http").join("cves").join("2024").join("CVE-2024-0001.yaml"),
            base.join("dns").join("a-record.yaml"),
            base.join("network").join("ssh.yaml"),
        ]
    );
    assert!(skipped.iter().any(|(path, reason)| path.ends_with("/README.md") && *reason == SkipReason::IgnoredFile));
    assert!(skipped.iter().any(|(path, reason)| path.ends_with("evil.yaml") && *reason == SkipReason::HiddenDirectory));
    Ok(())
}

#[tokio::test]
async fn test_callback_failure_keeps_earlier_files() -> Result<()> {
    let temp = TempDir::new()?;
    let base = temp.path().to_path_buf();

    let result = applier()
        .extract_to_dir_with("nuclei-templates", None, &base, |entry, base| {
            if entry.path.ends_with("ssh.yaml") {
                return Err(UpkeepError::Other {
                    message: "template failed validation".to_string(),
                });
            }
            write_entry(entry, base)
        })
        .await;

    match result {
        Err(UpkeepError::Extraction {
            last_written,
            reason,
            ..
        }) => {
            assert_eq!(last_written, Some(base.join("dns").join("a-record.yaml")));
            assert!(reason.contains("template failed validation"));
        }
        other => panic!("expected Extraction error, got {other:?}"),
    }
    assert!(base.join(".version").exists());
    assert!(!base.join("network/ssh.yaml").exists());
    Ok(())
}

#[tokio::test]
async fn test_release_without_source_archive() -> Result<()> {
    let temp = TempDir::new()?;
    let applier = UpdateApplier::new(FakeReleaseSource::new("v1.0.0", ""), UpdateConfig::default());

    let result = applier.extract_to_dir("nuclei-templates", None, temp.path()).await;
    assert!(matches!(result, Err(UpkeepError::Fetch { .. })));
    Ok(())
}
