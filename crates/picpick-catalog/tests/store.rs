//! Catalog store and coordinator behavior

use picpick_archive::{ArchivePipeline, BlobStore};
use picpick_catalog::{ArchiveState, CatalogError, CatalogStore};
use picpick_resource::{ContentHash, ResourceKey};
use picpick_test_utils::{jpeg_bytes, png_bytes, record, ScriptedBuilder, StaticFetcher};
use pretty_assertions::assert_eq;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

fn key(uri: &str) -> ResourceKey {
    ResourceKey::new(uri)
}

#[tokio::test]
async fn nothing_selected_never_loads() {
    let (catalog, _task) = CatalogStore::spawn(Arc::new(ScriptedBuilder::new(BlobStore::new())));
    let ticket = catalog.request_archive(None).await.unwrap();
    assert_eq!(ticket.wait().await, Err(CatalogError::NothingSelected));

    let snapshot = catalog.snapshot();
    assert_eq!(snapshot.archive, ArchiveState::Idle);
    assert_eq!(snapshot.last_request, 0);
}

#[tokio::test]
async fn selection_resolves_keys_in_order() {
    let (catalog, _task) = CatalogStore::spawn(Arc::new(ScriptedBuilder::new(BlobStore::new())));
    catalog.set_address("https://example.com/").await.unwrap();
    catalog
        .add_records(vec![record("https://example.com/a.png", "a.png"), record("https://example.com/b.png", "b.png")])
        .await
        .unwrap();
    catalog
        .set_selection(vec![key("https://example.com/b.png"), key("https://example.com/nope.png"), key("https://example.com/a.png")])
        .await
        .unwrap();

    let names: Vec<_> = catalog.snapshot().selection.iter().map(|r| r.filename.clone()).collect();
    assert_eq!(names, ["b.png", "a.png"]);
}

#[tokio::test]
async fn last_request_wins() {
    let blobs = BlobStore::new();
    let builder = Arc::new(
        ScriptedBuilder::new(blobs.clone())
            .then(Duration::from_millis(300), true)
            .then(Duration::from_millis(10), true),
    );
    let (catalog, _task) = CatalogStore::spawn(builder.clone());
    catalog.add_records(vec![record("https://example.com/a.png", "a.png")]).await.unwrap();
    catalog.set_selection(vec![key("https://example.com/a.png")]).await.unwrap();

    let slow = catalog.request_archive(None).await.unwrap();
    let fast = catalog.request_archive(None).await.unwrap();

    let receipt = fast.wait().await.unwrap();
    assert_eq!(receipt.seq, 2);
    assert_eq!(slow.wait().await, Err(CatalogError::Superseded));

    let snapshot = catalog.snapshot();
    assert_eq!(snapshot.archive.output(), Some(receipt.output));
    assert_eq!(snapshot.last_request, 2);
    // The stale output was released
    assert_eq!(blobs.len(), 1);
    assert_eq!(builder.calls().len(), 2);
}

#[tokio::test]
async fn selection_change_revokes_output() {
    let blobs = BlobStore::new();
    let (catalog, _task) = CatalogStore::spawn(Arc::new(ScriptedBuilder::new(blobs.clone())));
    catalog.add_records(vec![record("https://example.com/a.png", "a.png")]).await.unwrap();
    catalog.set_selection(vec![key("https://example.com/a.png")]).await.unwrap();

    let receipt = catalog.request_archive(None).await.unwrap().wait().await.unwrap();
    assert!(catalog.output_bytes(&receipt.output).is_some());

    catalog.set_selection(Vec::new()).await.unwrap();
    assert!(catalog.output_bytes(&receipt.output).is_none());
    assert!(catalog.snapshot().archive.is_idle());
}

#[tokio::test]
async fn clear_archive_output_revokes() {
    let (catalog, _task) = CatalogStore::spawn(Arc::new(ScriptedBuilder::new(BlobStore::new())));
    catalog.add_records(vec![record("https://example.com/a.png", "a.png")]).await.unwrap();
    catalog.set_selection(vec![key("https://example.com/a.png")]).await.unwrap();
    let receipt = catalog.request_archive(None).await.unwrap().wait().await.unwrap();

    catalog.clear_archive_output().await.unwrap();
    assert!(catalog.output_bytes(&receipt.output).is_none());
    assert!(catalog.snapshot().archive.is_idle());
}

#[tokio::test]
async fn failed_build_returns_to_idle_and_marks_bad() {
    let builder = Arc::new(ScriptedBuilder::new(BlobStore::new()).then(Duration::ZERO, false));
    let (catalog, _task) = CatalogStore::spawn(builder);
    catalog.set_address("https://example.com/").await.unwrap();
    catalog.add_records(vec![record("https://example.com/a.png", "a.png")]).await.unwrap();
    catalog.set_selection(vec![key("https://example.com/a.png")]).await.unwrap();

    let ticket = catalog.request_archive(None).await.unwrap();
    assert_eq!(ticket.wait().await, Err(CatalogError::NothingSelected));

    let snapshot = catalog.snapshot();
    assert!(snapshot.archive.is_idle());
    assert!(snapshot.bad_uris.contains(&key("https://example.com/a.png")));
    assert!(snapshot.items.is_empty());
}

#[tokio::test]
async fn panicking_build_resolves_ticket_and_idles() {
    let builder = Arc::new(ScriptedBuilder::new(BlobStore::new()).then_panic());
    let (catalog, _task) = CatalogStore::spawn(builder);
    catalog.add_records(vec![record("https://example.com/a.png", "a.png")]).await.unwrap();
    catalog.set_selection(vec![key("https://example.com/a.png")]).await.unwrap();

    let ticket = catalog.request_archive(None).await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), ticket.wait()).await.unwrap();
    match result {
        Err(CatalogError::Pipeline(reason)) => assert!(reason.contains("scripted build panic")),
        other => panic!("unexpected result {other:?}"),
    }
    assert!(catalog.snapshot().archive.is_idle());

    // The next request still goes through
    let receipt = catalog.request_archive(None).await.unwrap().wait().await.unwrap();
    assert_eq!(receipt.entries, ["a.png"]);
}

#[tokio::test]
async fn rename_of_absent_key_changes_nothing() {
    let (catalog, _task) = CatalogStore::spawn(Arc::new(ScriptedBuilder::new(BlobStore::new())));
    catalog.add_records(vec![record("https://example.com/a.png", "a.png")]).await.unwrap();
    let before = catalog.snapshot();
    catalog.rename_record(key("https://example.com/zzz.png"), "x.png").await.unwrap();
    assert_eq!(*catalog.snapshot(), *before);
}

#[tokio::test]
async fn password_protected_archive_of_two_records() {
    let fetcher = StaticFetcher::new()
        .with("https://example.com/a.png", png_bytes(3, 3, [0, 255, 0, 255]), Some("image/png"))
        .with("https://example.com/b", jpeg_bytes(2, 2), Some("image/jpeg"));
    let pipeline = ArchivePipeline::new(Arc::new(fetcher), BlobStore::new());
    let (catalog, _task) = CatalogStore::spawn(Arc::new(pipeline));

    catalog
        .add_records(vec![record("https://example.com/a.png", "a.png"), record("https://example.com/b", "b")])
        .await
        .unwrap();
    catalog
        .set_selection(vec![key("https://example.com/a.png"), key("https://example.com/b")])
        .await
        .unwrap();
    catalog.set_password("open sesame").await.unwrap();

    let receipt = catalog.request_archive(None).await.unwrap().wait().await.unwrap();
    assert_eq!(receipt.entries, ["a.png", "b.jpg"]);

    let bytes = catalog.output_bytes(&receipt.output).unwrap();
    assert_eq!(receipt.digest, ContentHash::compute(&bytes));
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 2);
    assert!(archive.by_index(1).is_err());
    let mut entry = archive.by_index_decrypt(1, b"open sesame").unwrap();
    let mut content = Vec::new();
    entry.read_to_end(&mut content).unwrap();
    assert_eq!(content, jpeg_bytes(2, 2));
}

#[tokio::test]
async fn store_stops_when_handles_drop() {
    let (catalog, task) = CatalogStore::spawn(Arc::new(ScriptedBuilder::new(BlobStore::new())));
    drop(catalog);
    tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}
