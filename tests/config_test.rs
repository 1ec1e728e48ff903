//! Tests for settings and descriptor loading.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use repocache::cache::{CacheKind, Ownership, WritePolicy};
use repocache::{CacheSettings, RepositoriesDescriptor};
use tempfile::NamedTempFile;

fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

// =========================================================================
// CacheSettings
// =========================================================================

#[test]
fn settings_from_file() {
    let file = write_temp(
        ".toml",
        r#"
[caches.item_info]
idle_time_secs = 600
max_size = 50000

[caches.locks]
ownership = "strong"

[sweeper]
enabled = true
interval_secs = 30
"#,
    );

    let settings = CacheSettings::load(Some(file.path())).unwrap();
    let item_info = settings.definition_for(CacheKind::ItemInfo);
    assert_eq!(item_info.idle_time, Duration::from_secs(600));
    assert_eq!(item_info.max_size, 50_000);
    assert_eq!(item_info.write_policy, WritePolicy::PutIfAbsentMerge);
    assert!(item_info.reset_idle_on_read);

    let locks = settings.definition_for(CacheKind::Locks);
    assert_eq!(locks.ownership, Ownership::Strong);

    assert!(settings.sweeper.enabled);
    assert_eq!(settings.sweeper.interval(), Duration::from_secs(30));
}

#[test]
fn empty_settings_use_builtin_definitions() {
    let settings = CacheSettings::from_toml_str("").unwrap();
    for kind in CacheKind::ALL {
        assert_eq!(settings.definition_for(kind), kind.default_definition());
    }
    assert!(!settings.sweeper.enabled);
    assert_eq!(settings.sweeper.interval(), Duration::from_secs(60));
}

#[test]
fn missing_explicit_path_is_an_error() {
    let err = CacheSettings::load(Some(Path::new("/nonexistent/repocache.toml"))).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("not found"));
}

#[test]
fn unknown_cache_kind_is_rejected() {
    let err = CacheSettings::from_toml_str("[caches.bogus]\nmax_size = 1\n").unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn malformed_file_is_a_configuration_error() {
    let file = write_temp(".toml", "[caches.acl\nmax_size = ");
    let err = CacheSettings::load_from_file(file.path()).unwrap_err();
    assert!(err.is_configuration());
}

// =========================================================================
// RepositoriesDescriptor
// =========================================================================

const DESCRIPTOR_TOML: &str = r#"
local_repositories = ["libs-release", "libs-snapshot"]
virtual_repositories = ["all"]

[[remote_repositories]]
key = "central"
missed_retrieval_cache_period_secs = 600
max_cached_entries = 1000

[remote_repositories.caches.folder_listings]
idle_time_secs = 120

[[remote_repositories]]
key = "jcenter"
"#;

#[test]
fn descriptor_from_toml() {
    let descriptor = RepositoriesDescriptor::from_toml_str(DESCRIPTOR_TOML).unwrap();
    assert_eq!(descriptor.len(), 5);
    assert_eq!(descriptor.local_repositories, vec!["libs-release", "libs-snapshot"]);

    let central = descriptor.remote_by_key("central").unwrap();
    assert_eq!(central.missed_retrieval_cache_period_secs, 600);
    assert_eq!(central.retrieval_cache_period(), Duration::from_secs(7200));
    assert_eq!(
        central.tunables(CacheKind::FolderListings).idle_time_secs,
        Some(120)
    );
    assert_eq!(central.tunables(CacheKind::MissedRetrievals).max_size, Some(1000));

    let jcenter = descriptor.remote_by_key("jcenter").unwrap();
    assert_eq!(jcenter.failed_retrieval_cache_period_secs, 30);
    assert!(jcenter.caches.is_empty());
}

#[test]
fn descriptor_from_json_file() {
    let file = write_temp(
        ".json",
        r#"{
            "local_repositories": ["libs-release"],
            "remote_repositories": [
                {"key": "central", "caches": {"missed_retrievals": {"max_size": 10}}}
            ]
        }"#,
    );

    let descriptor = RepositoriesDescriptor::load(file.path()).unwrap();
    assert_eq!(descriptor.len(), 2);
    assert!(descriptor.virtual_repositories.is_empty());
    let central = descriptor.remote_by_key("central").unwrap();
    assert_eq!(central.tunables(CacheKind::MissedRetrievals).max_size, Some(10));
    assert_eq!(
        central.tunables(CacheKind::MissedRetrievals).idle_time_secs,
        Some(7200)
    );
}

#[test]
fn descriptor_file_extension_selects_format() {
    let file = write_temp(".toml", DESCRIPTOR_TOML);
    let descriptor = RepositoriesDescriptor::load(file.path()).unwrap();
    assert_eq!(descriptor.remote_repositories.len(), 2);

    let bad_json = write_temp(".json", DESCRIPTOR_TOML);
    assert!(RepositoriesDescriptor::load(bad_json.path()).is_err());
}
