//! Tests for [`CacheRegistry`] partitioning, lifecycle and reload.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use repocache::cache::{CacheKind, CacheScope, CacheTunables, WritePolicy};
use repocache::{
    CacheRegistry, CacheSettings, RemoteRepoDescriptor, RepoCacheError, RepositoriesDescriptor,
};
use tokio_util::sync::CancellationToken;

fn sample_descriptor() -> RepositoriesDescriptor {
    RepositoriesDescriptor::new()
        .local("libs-release")
        .remote(RemoteRepoDescriptor::new("central"))
        .virtual_repo("all")
}

fn initialised(descriptor: RepositoriesDescriptor) -> CacheRegistry {
    let registry = CacheRegistry::new(Arc::new(descriptor));
    registry.init().expect("init failed");
    registry
}

// =========================================================================
// Partitioning
// =========================================================================

#[test]
fn partitions_for_every_repository_type() {
    let registry = initialised(sample_descriptor());

    assert_eq!(
        registry.repo_keys().unwrap(),
        vec!["all", "central", "central-cache", "libs-release", "repo"]
    );

    for kind in CacheKind::in_scope(CacheScope::StoringRepo) {
        for key in ["libs-release", "central", "central-cache", "all", "repo"] {
            assert!(
                registry.get_repository_cache(key, kind).is_ok(),
                "{key} should have {kind}"
            );
        }
    }
    for kind in CacheKind::in_scope(CacheScope::RemoteRepo) {
        assert!(registry.get_repository_cache("central", kind).is_ok());
        assert!(registry.get_repository_cache("libs-release", kind).is_err());
        assert!(registry.get_repository_cache("all", kind).is_err());
    }
    for kind in CacheKind::in_scope(CacheScope::Global) {
        assert!(registry.get_cache(kind).is_ok());
    }
}

#[test]
fn remote_partition_lists_both_scopes() {
    let registry = initialised(sample_descriptor());
    let kinds = registry.repository_kinds("central").unwrap();
    assert_eq!(kinds.len(), 6);
    assert!(kinds.contains(&CacheKind::ItemInfo));
    assert!(kinds.contains(&CacheKind::MissedRetrievals));

    assert_eq!(registry.repository_kinds("libs-release").unwrap().len(), 3);
}

#[test]
fn lookup_errors_are_distinct() {
    let registry = initialised(sample_descriptor());

    let err = registry.get_cache(CacheKind::ItemInfo).unwrap_err();
    assert!(matches!(
        err,
        RepoCacheError::CacheKindNotFound {
            kind: CacheKind::ItemInfo
        }
    ));

    let err = registry
        .get_repository_cache("nope", CacheKind::ItemInfo)
        .unwrap_err();
    assert!(matches!(err, RepoCacheError::RepositoryNotFound { ref repo_key } if repo_key == "nope"));

    let err = registry
        .get_repository_cache("libs-release", CacheKind::MissedRetrievals)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoCacheError::CacheKindNotInRepository {
            kind: CacheKind::MissedRetrievals,
            ..
        }
    ));
    assert!(err.is_configuration());
}

#[test]
fn partitions_are_isolated() {
    let registry = initialised(sample_descriptor());
    let release = registry
        .get_repository_cache("libs-release", CacheKind::MavenMetadata)
        .unwrap();
    let all = registry
        .get_repository_cache("all", CacheKind::MavenMetadata)
        .unwrap();

    let value = Arc::new("metadata".to_string());
    release.put("org/acme".into(), value.clone());
    assert!(release.get("org/acme").is_some());
    assert!(all.get("org/acme").is_none());
}

#[test]
fn colliding_repository_keys_fail_init() {
    let registry = CacheRegistry::new(Arc::new(
        RepositoriesDescriptor::new()
            .local("central-cache")
            .remote(RemoteRepoDescriptor::new("central")),
    ));
    let err = registry.init().unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("central-cache"));
    assert!(registry.repo_keys().unwrap().is_empty());

    let registry = CacheRegistry::new(Arc::new(
        RepositoriesDescriptor::new().local("libs").virtual_repo("libs"),
    ));
    assert!(registry.init().unwrap_err().is_configuration());
}

#[test]
fn failed_reload_keeps_previous_partitions() {
    let provider = Arc::new(RwLock::new(sample_descriptor()));
    let registry = CacheRegistry::new(provider.clone());
    registry.init().unwrap();

    let old = provider.read().unwrap().clone();
    *provider.write().unwrap() = old.clone().local("central-cache");
    assert!(registry.reload(&old).unwrap_err().is_configuration());

    assert_eq!(
        registry.repo_keys().unwrap(),
        vec!["all", "central", "central-cache", "libs-release", "repo"]
    );
}

#[test]
fn remote_caches_take_idle_time_from_descriptor() {
    let registry = initialised(
        RepositoriesDescriptor::new()
            .remote(
                RemoteRepoDescriptor::new("fast")
                    .with_missed_retrieval_cache_period(Duration::from_secs(60)),
            )
            .remote(
                RemoteRepoDescriptor::new("slow")
                    .with_missed_retrieval_cache_period(Duration::from_secs(3600)),
            ),
    );

    let fast = registry
        .get_repository_cache("fast", CacheKind::MissedRetrievals)
        .unwrap();
    let slow = registry
        .get_repository_cache("slow", CacheKind::MissedRetrievals)
        .unwrap();
    assert_eq!(fast.definition().idle_time, Duration::from_secs(60));
    assert_eq!(slow.definition().idle_time, Duration::from_secs(3600));
}

#[test]
fn remote_descriptor_caps_cache_size() {
    let registry = initialised(
        RepositoriesDescriptor::new()
            .remote(RemoteRepoDescriptor::new("central").with_max_cached_entries(2)),
    );
    let missed = registry
        .get_repository_cache("central", CacheKind::MissedRetrievals)
        .unwrap();
    for path in ["a", "b", "c"] {
        missed.put(path.to_string(), Arc::new(true));
    }
    assert_eq!(missed.size(), 2);
}

#[test]
fn settings_override_builtin_definition() {
    let settings = CacheSettings::default().with_override(
        CacheKind::Acl,
        CacheTunables {
            idle_time_secs: Some(30),
            write_policy: Some(WritePolicy::PutIfAbsentMerge),
            ..Default::default()
        },
    );
    let registry = CacheRegistry::with_settings(Arc::new(RepositoriesDescriptor::new()), settings);
    registry.init().unwrap();

    let acl = registry.get_cache(CacheKind::Acl).unwrap();
    assert_eq!(acl.definition().idle_time, Duration::from_secs(30));
    assert_eq!(acl.definition().write_policy, WritePolicy::PutIfAbsentMerge);
}

// =========================================================================
// Lifecycle
// =========================================================================

#[test]
fn destroy_clears_every_cache() {
    let registry = initialised(sample_descriptor());
    let acl = registry.get_cache(CacheKind::Acl).unwrap();
    let missed = registry
        .get_repository_cache("central", CacheKind::MissedRetrievals)
        .unwrap();
    acl.put("admin".into(), Arc::new(1u8));
    missed.put("org/acme.pom".into(), Arc::new(true));

    registry.destroy().unwrap();
    assert_eq!(acl.size(), 0);
    assert_eq!(missed.size(), 0);

    // A second destroy is harmless.
    registry.destroy().unwrap();
    assert_eq!(acl.size(), 0);
}

#[test]
fn invalidate_repository_leaves_others_alone() {
    let registry = initialised(sample_descriptor());
    let release = registry
        .get_repository_cache("libs-release", CacheKind::MavenMetadata)
        .unwrap();
    let all = registry
        .get_repository_cache("all", CacheKind::MavenMetadata)
        .unwrap();
    let keep = Arc::new("x".to_string());
    release.put("p".into(), keep.clone());
    all.put("p".into(), keep.clone());

    registry.invalidate_repository("libs-release").unwrap();
    assert!(release.get("p").is_none());
    assert!(all.get("p").is_some());

    assert!(registry.invalidate_repository("missing").is_err());
}

#[test]
fn reload_picks_up_new_repositories() {
    let provider = Arc::new(RwLock::new(sample_descriptor()));
    let registry = CacheRegistry::new(provider.clone());
    registry.init().unwrap();

    let acl_before = registry.get_cache(CacheKind::Acl).unwrap();
    acl_before.put("admin".into(), Arc::new(1u8));
    assert!(registry.get_repository_cache("jcenter", CacheKind::FolderListings).is_err());

    let old = provider.read().unwrap().clone();
    {
        let mut current = provider.write().unwrap();
        *current = current
            .clone()
            .remote(RemoteRepoDescriptor::new("jcenter"));
    }
    registry.reload(&old).unwrap();

    assert!(registry.get_repository_cache("jcenter", CacheKind::FolderListings).is_ok());
    assert!(registry.get_repository_cache("jcenter-cache", CacheKind::Locks).is_ok());

    let acl_after = registry.get_cache(CacheKind::Acl).unwrap();
    assert!(Arc::ptr_eq(&acl_before, &acl_after));
    assert_eq!(acl_after.size(), 0);
}

#[test]
fn reload_drops_removed_repositories() {
    let provider = Arc::new(RwLock::new(sample_descriptor()));
    let registry = CacheRegistry::new(provider.clone());
    registry.init().unwrap();

    let old = provider.read().unwrap().clone();
    *provider.write().unwrap() = RepositoriesDescriptor::new().local("libs-release");
    registry.reload(&old).unwrap();

    assert!(matches!(
        registry.get_repository_cache("central", CacheKind::ItemInfo),
        Err(RepoCacheError::RepositoryNotFound { .. })
    ));
    assert_eq!(registry.repo_keys().unwrap(), vec!["libs-release", "repo"]);
}

#[test]
fn concurrent_lookups_during_reload() {
    let provider = Arc::new(RwLock::new(sample_descriptor()));
    let registry = Arc::new(CacheRegistry::new(provider.clone()));
    registry.init().unwrap();
    let old = provider.read().unwrap().clone();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    registry
                        .get_repository_cache("libs-release", CacheKind::ItemInfo)
                        .expect("partition vanished during reload");
                }
            })
        })
        .collect();
    for _ in 0..20 {
        registry.reload(&old).unwrap();
    }
    for r in readers {
        r.join().expect("reader panicked");
    }
}

// =========================================================================
// Sweeper
// =========================================================================

#[tokio::test]
async fn sweeper_removes_released_entries() {
    let registry = Arc::new(initialised(sample_descriptor()));
    let item_info = registry
        .get_repository_cache("libs-release", CacheKind::ItemInfo)
        .unwrap();
    item_info.put("org/acme".into(), Arc::new(42u32));
    item_info.release_reclaimable();

    let cancel = CancellationToken::new();
    let handle = registry.spawn_sweeper(Duration::from_millis(10), cancel.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    handle.await.expect("sweeper panicked");

    assert_eq!(registry.sweep_all().unwrap(), 0);
    assert!(item_info.get("org/acme").is_none());
}

#[tokio::test]
async fn configured_sweeper_disabled_by_default() {
    let registry = Arc::new(initialised(sample_descriptor()));
    assert!(
        registry
            .start_configured_sweeper(CancellationToken::new())
            .is_none()
    );

    let mut settings = CacheSettings::default();
    settings.sweeper.enabled = true;
    settings.sweeper.interval_secs = 1;
    let registry = Arc::new(CacheRegistry::with_settings(
        Arc::new(sample_descriptor()),
        settings,
    ));
    registry.init().unwrap();
    let cancel = CancellationToken::new();
    let handle = registry
        .start_configured_sweeper(cancel.clone())
        .expect("sweeper should start");
    cancel.cancel();
    handle.await.expect("sweeper panicked");
}
