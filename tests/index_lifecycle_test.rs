//! End-to-end lifecycle: build, reuse, invalidate, degrade, retrieve.

mod common;

use std::sync::Arc;

use common::{WordEmbedder, Workspace, remove};
use libdesk::documents::ChunkingConfig;
use libdesk::indexing::{Freshness, StaleReason};
use libdesk::{IndexError, IndexStatus, ManifestStore, RetrievalError, RetrievalService};

fn library_notices(ws: &Workspace) {
    ws.write_notices(&[
        ("a", "Opening hours", "The library is open from 9 to 18 on weekdays."),
        ("b", "Parking", "Visitor parking costs 2000 won per hour."),
    ]);
}

#[test]
fn test_first_open_builds_and_answers_queries() {
    let ws = Workspace::new();
    library_notices(&ws);
    let embedder = Arc::new(WordEmbedder::new(64));

    let cache = ws.cache(embedder.clone());
    let handle = cache.open().unwrap();
    assert_eq!(handle.status(), &IndexStatus::Rebuilt);
    assert_eq!(handle.index().len(), 2);

    let location = ws.location();
    assert!(location.vectors_path().exists());
    assert!(location.chunks_path().exists());
    let manifest = ManifestStore::new(&location).load().unwrap();
    assert_eq!(manifest.build_id, handle.build_id());
    assert_eq!(manifest.fingerprint.chunk_size, 800);
    assert_eq!(manifest.fingerprint.chunk_overlap, 200);
    assert_eq!(manifest.fingerprint.model_name, "word-hash");

    let service = RetrievalService::new(handle, embedder.clone());
    let hits = service.query("library hours", 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source_id, "a");
    assert_eq!(hits[0].meta.title(), "Opening hours");
}

#[test]
fn test_single_untitled_notice_is_one_chunk() {
    let ws = Workspace::new();
    ws.write_notices(&[("a", "", "Library hours are 9 to 6, Monday through Friday.")]);
    let embedder = Arc::new(WordEmbedder::new(64));

    let handle = ws
        .cache_with(embedder.clone(), ChunkingConfig::new(800, 200))
        .open()
        .unwrap();
    assert_eq!(handle.index().len(), 1);

    let service = RetrievalService::new(handle, embedder);
    let hits = service.query("library hours", 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source_id, "a");
    assert_eq!(hits[0].content, "Library hours are 9 to 6, Monday through Friday.");
}

#[test]
fn test_unchanged_inputs_reuse_index_without_embedding() {
    let ws = Workspace::new();
    library_notices(&ws);

    let first = ws.cache(Arc::new(WordEmbedder::new(64))).open().unwrap();

    let embedder = Arc::new(WordEmbedder::new(64));
    let cache = ws.cache(embedder.clone());
    assert_eq!(cache.freshness(), Freshness::Fresh);

    let second = cache.open().unwrap();
    assert_eq!(second.status(), &IndexStatus::Fresh);
    assert_eq!(second.build_id(), first.build_id());
    assert_eq!(embedder.calls(), 0, "fresh open must not embed");

    // Cached handle is returned as-is
    let again = cache.open().unwrap();
    assert_eq!(again.build_id(), second.build_id());
}

#[test]
fn test_modified_feed_triggers_rebuild() {
    let ws = Workspace::new();
    library_notices(&ws);
    let first = ws.cache(Arc::new(WordEmbedder::new(64))).open().unwrap();

    ws.write_notices(&[
        ("a", "Opening hours", "The library is open from 9 to 21 during exams."),
        ("b", "Parking", "Visitor parking costs 2000 won per hour."),
    ]);

    let cache = ws.cache(Arc::new(WordEmbedder::new(64)));
    match cache.freshness() {
        Freshness::Stale(StaleReason::Changed(diff)) => {
            assert_eq!(diff.modified.len(), 1);
            assert!(diff.added.is_empty());
        }
        other => panic!("expected changed inputs, got {other:?}"),
    }

    let handle = cache.open().unwrap();
    assert_eq!(handle.status(), &IndexStatus::Rebuilt);
    assert_ne!(handle.build_id(), first.build_id());
}

#[test]
fn test_chunking_change_triggers_rebuild() {
    let ws = Workspace::new();
    library_notices(&ws);
    ws.cache(Arc::new(WordEmbedder::new(64))).open().unwrap();

    let cache = ws.cache_with(
        Arc::new(WordEmbedder::new(64)),
        ChunkingConfig::new(400, 100),
    );
    match cache.freshness() {
        Freshness::Stale(StaleReason::Changed(diff)) => {
            assert!(diff.settings.iter().any(|s| s.contains("chunk_size")));
        }
        other => panic!("expected settings change, got {other:?}"),
    }
    assert_eq!(cache.open().unwrap().status(), &IndexStatus::Rebuilt);
}

#[test]
fn test_artifacts_without_manifest_are_rebuilt() {
    let ws = Workspace::new();
    library_notices(&ws);
    let first = ws.cache(Arc::new(WordEmbedder::new(64))).open().unwrap();

    remove(&ws.location().manifest_path());

    let cache = ws.cache(Arc::new(WordEmbedder::new(64)));
    assert_eq!(cache.freshness(), Freshness::Stale(StaleReason::NoManifest));
    let handle = cache.open().unwrap();
    assert_eq!(handle.status(), &IndexStatus::Rebuilt);
    assert_ne!(handle.build_id(), first.build_id());
    assert!(ws.location().manifest_path().exists());
}

#[test]
fn test_manifest_for_another_build_is_not_trusted() {
    let ws = Workspace::new();
    library_notices(&ws);
    ws.cache(Arc::new(WordEmbedder::new(64))).open().unwrap();

    let location = ws.location();
    let store = ManifestStore::new(&location);
    let mut manifest = store.load().unwrap();
    let forged = uuid::Uuid::new_v4().to_string();
    manifest.build_id = forged.clone();
    store.save(&manifest).unwrap();

    let cache = ws.cache(Arc::new(WordEmbedder::new(64)));
    assert!(matches!(
        cache.freshness(),
        Freshness::Stale(StaleReason::BuildMismatch { .. })
    ));

    let handle = cache.open().unwrap();
    assert_eq!(handle.status(), &IndexStatus::Rebuilt);
    assert_ne!(handle.build_id(), forged);
    assert_eq!(store.load().unwrap().build_id, handle.build_id());
}

#[test]
fn test_provider_dimension_change_triggers_rebuild() {
    let ws = Workspace::new();
    library_notices(&ws);
    ws.cache(Arc::new(WordEmbedder::new(64))).open().unwrap();

    let cache = ws.cache(Arc::new(WordEmbedder::new(32)));
    assert_eq!(
        cache.freshness(),
        Freshness::Stale(StaleReason::DimensionMismatch {
            index: 64,
            provider: 32
        })
    );
    let handle = cache.open().unwrap();
    assert_eq!(handle.status(), &IndexStatus::Rebuilt);
    assert_eq!(handle.index().dimension(), 32);
}

#[test]
fn test_top_k_over_ten_chunks() {
    let ws = Workspace::new();
    let bodies: Vec<(String, String)> = (0..10)
        .map(|i| {
            (
                format!("n{i}"),
                format!("Notice {i} about study room {i} reservations and rules."),
            )
        })
        .collect();
    let notices: Vec<(&str, &str, &str)> = bodies
        .iter()
        .map(|(id, body)| (id.as_str(), "", body.as_str()))
        .collect();
    ws.write_notices(&notices);

    let embedder = Arc::new(WordEmbedder::new(128));
    let handle = ws.cache(embedder.clone()).open().unwrap();
    assert_eq!(handle.index().len(), 10);

    let service = RetrievalService::new(handle, embedder);
    let hits = service.query("study room reservations", 5).unwrap();
    assert_eq!(hits.len(), 5);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score, "scores must not increase");
    }

    let all = service.query("study room reservations", 50).unwrap();
    assert_eq!(all.len(), 10);
}

#[test]
fn test_zero_k_is_rejected() {
    let ws = Workspace::new();
    library_notices(&ws);
    let embedder = Arc::new(WordEmbedder::new(64));
    let handle = ws.cache(embedder.clone()).open().unwrap();

    let service = RetrievalService::new(handle, embedder);
    assert!(matches!(
        service.query("library", 0),
        Err(RetrievalError::InvalidK)
    ));
}

#[test]
fn test_failed_rebuild_serves_previous_index() {
    let ws = Workspace::new();
    library_notices(&ws);
    let first = ws.cache(Arc::new(WordEmbedder::new(64))).open().unwrap();

    ws.write_notices(&[
        ("a", "Opening hours", "The library is open from 9 to 18 on weekdays."),
        ("c", "Outage", "The poison notice breaks the embedding model."),
    ]);

    let embedder = Arc::new(WordEmbedder::new(64).failing_on("poison"));
    let cache = ws.cache(embedder.clone());
    let handle = cache.open().unwrap();
    assert!(handle.is_degraded());
    assert_eq!(handle.build_id(), first.build_id());

    // The previous manifest still vouches for the previous artifacts
    let manifest = ManifestStore::new(&ws.location()).load().unwrap();
    assert_eq!(manifest.build_id, first.build_id());

    let service = RetrievalService::new(handle, embedder);
    let hits = service.query("parking hour", 1).unwrap();
    assert_eq!(hits[0].source_id, "b");
}

#[test]
fn test_cold_start_build_failure_is_unavailable() {
    let ws = Workspace::new();
    library_notices(&ws);

    let cache = ws.cache(Arc::new(WordEmbedder::new(64).failing_on("library")));
    match cache.open() {
        Err(IndexError::IndexUnavailable { cause }) => {
            assert!(matches!(*cause, IndexError::BuildFailed(_)));
        }
        other => panic!("expected IndexUnavailable, got {other:?}"),
    }
    assert!(cache.current().is_none());
    assert!(!ws.location().manifest_path().exists());
}

#[test]
fn test_missing_feed_degrades_to_previous_index() {
    let ws = Workspace::new();
    library_notices(&ws);
    let first = ws.cache(Arc::new(WordEmbedder::new(64))).open().unwrap();

    remove(&ws.feed);

    let cache = ws.cache(Arc::new(WordEmbedder::new(64)));
    assert!(matches!(
        cache.freshness(),
        Freshness::Stale(StaleReason::SourceUnavailable(_))
    ));
    let handle = cache.open().unwrap();
    assert!(handle.is_degraded());
    assert_eq!(handle.build_id(), first.build_id());
}

#[test]
fn test_missing_feed_on_cold_start_is_unavailable() {
    let ws = Workspace::new();
    let cache = ws.cache(Arc::new(WordEmbedder::new(64)));
    assert!(matches!(
        cache.open(),
        Err(IndexError::IndexUnavailable { .. })
    ));
}

#[test]
fn test_forced_rebuild_failure_keeps_current_handle() {
    let ws = Workspace::new();
    library_notices(&ws);
    let cache = ws.cache(Arc::new(WordEmbedder::new(64)));
    let handle = cache.open().unwrap();

    remove(&ws.feed);
    assert!(matches!(
        cache.force_rebuild(),
        Err(IndexError::BuildFailed(_))
    ));
    assert_eq!(cache.current().unwrap().build_id(), handle.build_id());
}

#[test]
fn test_orphaned_lock_is_healed() {
    let ws = Workspace::new();
    library_notices(&ws);
    let location = ws.location();
    location.ensure_exists().unwrap();
    std::fs::write(
        location.lock_path(),
        r#"{"token":"crashed-builder","pid":1,"created_at":0}"#,
    )
    .unwrap();

    let handle = ws.cache(Arc::new(WordEmbedder::new(64))).open().unwrap();
    assert_eq!(handle.status(), &IndexStatus::Rebuilt);
    assert!(!location.lock_path().exists());
}

#[test]
fn test_live_foreign_lock_is_left_alone() {
    let ws = Workspace::new();
    library_notices(&ws);
    let location = ws.location();
    location.ensure_exists().unwrap();
    let now = libdesk::utils::get_utc_timestamp();
    let marker = format!(r#"{{"token":"other-builder","pid":1,"created_at":{now}}}"#);
    std::fs::write(location.lock_path(), &marker).unwrap();

    // Contention delays the build but never blocks it
    let handle = ws.cache(Arc::new(WordEmbedder::new(64))).open().unwrap();
    assert_eq!(handle.status(), &IndexStatus::Rebuilt);
    assert_eq!(std::fs::read_to_string(location.lock_path()).unwrap(), marker);
}

#[test]
fn test_handle_outlives_rebuild() {
    let ws = Workspace::new();
    library_notices(&ws);
    let embedder = Arc::new(WordEmbedder::new(64));
    let old = ws.cache(embedder.clone()).open().unwrap();

    ws.write_notices(&[("z", "Closed", "The library is closed for renovation.")]);
    let new = ws.cache(embedder.clone()).force_rebuild().unwrap();
    assert_ne!(new.build_id(), old.build_id());

    let service = RetrievalService::new(old, embedder);
    let hits = service.query("parking", 1).unwrap();
    assert_eq!(hits[0].source_id, "b");
}
