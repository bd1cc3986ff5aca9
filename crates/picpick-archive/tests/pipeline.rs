//! End-to-end archive builds against an in-memory fetcher

use picpick_archive::{
    acquire, ArchiveBuilder, ArchivePipeline, BlobStore, BuildRequest, PipelineError, TargetFormat,
};
use picpick_resource::{ContentHash, ImageKind, Payload};
use picpick_test_utils::{gif_bytes, jpeg_bytes, png_bytes, record, StaticFetcher};
use pretty_assertions::assert_eq;
use std::io::{Cursor, Read};
use std::sync::Arc;

fn fetcher() -> StaticFetcher {
    StaticFetcher::new()
        .with("https://example.com/pic.png", png_bytes(4, 4, [255, 0, 0, 255]), Some("image/png"))
        .with("https://example.com/photo", jpeg_bytes(6, 2), Some("image/jpeg"))
        .with("https://example.com/anim.gif", gif_bytes(2, 2), None)
        .with("https://example.com/page.html", b"<html></html>".to_vec(), Some("text/html"))
        .with("https://example.com/broken.png", b"\x89PNG\r\n\x1a\nbroken".to_vec(), Some("image/png"))
}

fn pipeline(fetcher: StaticFetcher) -> ArchivePipeline {
    ArchivePipeline::new(Arc::new(fetcher), BlobStore::new())
}

fn entries(bytes: &[u8], password: Option<&[u8]>) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = match password {
                Some(pw) => archive.by_index_decrypt(i, pw).unwrap(),
                None => archive.by_index(i).unwrap(),
            };
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            (file.name().to_string(), content)
        })
        .collect()
}

#[tokio::test]
async fn acquire_fixes_extension_and_keeps_payload() {
    let fetcher = fetcher();
    let (acquired, kind) = acquire(&fetcher, record("https://example.com/photo", "photo"))
        .await
        .unwrap();
    assert_eq!(kind, ImageKind::Jpeg);
    assert_eq!(acquired.filename, "photo.jpg");
    assert!(acquired.is_resolved());
    assert_eq!(acquired.filesize, Some(jpeg_bytes(6, 2).len() as u64));

    // Already-resolved records are not fetched again
    let again = acquire(&fetcher, acquired).await.unwrap();
    assert_eq!(again.0.filename, "photo.jpg");
    assert_eq!(fetcher.hits("https://example.com/photo"), 1);
}

#[tokio::test]
async fn bad_and_unclassifiable_records_are_reported() {
    let pipeline = pipeline(fetcher());
    let outcome = pipeline
        .build(BuildRequest {
            records: vec![
                record("https://example.com/pic.png", "pic.png"),
                record("https://example.com/missing.png", "missing.png"),
                record("https://example.com/page.html", "page.html"),
            ],
            ..BuildRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(outcome.entries, ["pic.png"]);
    let bad: Vec<_> = outcome.bad_uris.iter().map(|k| k.as_str()).collect();
    assert_eq!(bad, ["https://example.com/missing.png", "https://example.com/page.html"]);
    assert!(pipeline.blobs().get(&outcome.output).is_some());
}

#[tokio::test]
async fn conversion_rewrites_extensions_and_excludes_failures() {
    let pipeline = pipeline(fetcher());
    let outcome = pipeline
        .build(BuildRequest {
            records: vec![
                record("https://example.com/pic.png", "pic.png"),
                record("https://example.com/anim.gif", "anim.gif"),
                record("https://example.com/broken.png", "broken.png"),
            ],
            target: Some(TargetFormat::Jpeg),
            password: String::new(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.entries, ["pic.jpg", "anim.jpg"]);
    let excluded: Vec<_> = outcome.excluded.iter().map(|k| k.as_str()).collect();
    assert_eq!(excluded, ["https://example.com/broken.png"]);

    let bytes = pipeline.blobs().get(&outcome.output).unwrap();
    assert_eq!(outcome.digest, ContentHash::compute(&bytes));
    for (_, content) in entries(&bytes, None) {
        assert_eq!(image::guess_format(&content).unwrap(), image::ImageFormat::Jpeg);
    }
}

#[tokio::test]
async fn matching_target_passes_bytes_through() {
    let original = png_bytes(4, 4, [255, 0, 0, 255]);
    let pipeline = pipeline(fetcher());
    let outcome = pipeline
        .build(BuildRequest {
            records: vec![record("https://example.com/pic.png", "pic.png")],
            target: Some(TargetFormat::Png),
            password: String::new(),
        })
        .await
        .unwrap();
    let bytes = pipeline.blobs().get(&outcome.output).unwrap();
    assert_eq!(entries(&bytes, None), [("pic.png".to_string(), original)]);
}

#[tokio::test]
async fn names_are_sanitized_and_unique() {
    let pipeline = pipeline(fetcher());
    let outcome = pipeline
        .build(BuildRequest {
            records: vec![
                record("https://example.com/pic.png", "a:b.png"),
                record("https://example.com/anim.gif", "dup.gif"),
                record("https://example.com/photo", "dup.gif").with_payload(Payload::new(gif_bytes(1, 1), None)),
            ],
            ..BuildRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.entries, ["a%3ab.png", "dup.gif", "dup (2).gif"]);
}

#[tokio::test]
async fn password_protects_every_entry() {
    let pipeline = pipeline(fetcher());
    let outcome = pipeline
        .build(BuildRequest {
            records: vec![
                record("https://example.com/pic.png", "pic.png"),
                record("https://example.com/photo", "photo.jpg"),
            ],
            target: None,
            password: "s3cret".to_string(),
        })
        .await
        .unwrap();

    let bytes = pipeline.blobs().get(&outcome.output).unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 2);
    for i in 0..archive.len() {
        assert!(archive.by_index(i).is_err());
    }
    let files = entries(&bytes, Some(b"s3cret"));
    assert_eq!(files[0].1, png_bytes(4, 4, [255, 0, 0, 255]));
}

#[tokio::test]
async fn same_input_same_archive() {
    let pipeline = pipeline(fetcher());
    let request = BuildRequest {
        records: vec![
            record("https://example.com/pic.png", "pic.png"),
            record("https://example.com/anim.gif", "anim.gif"),
        ],
        target: Some(TargetFormat::Webp),
        password: String::new(),
    };
    let first = pipeline.build(request.clone()).await.unwrap();
    let second = pipeline.build(request).await.unwrap();

    assert_ne!(first.output, second.output);
    let a = pipeline.blobs().get(&first.output).unwrap();
    let b = pipeline.blobs().get(&second.output).unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn encrypted_archives_have_equal_entries() {
    let pipeline = pipeline(fetcher());
    let request = BuildRequest {
        records: vec![record("https://example.com/pic.png", "pic.png")],
        target: None,
        password: "pw".to_string(),
    };
    let first = pipeline.build(request.clone()).await.unwrap();
    let second = pipeline.build(request).await.unwrap();
    let a = pipeline.blobs().get(&first.output).unwrap();
    let b = pipeline.blobs().get(&second.output).unwrap();
    assert_eq!(entries(&a, Some(b"pw")), entries(&b, Some(b"pw")));
}

#[tokio::test]
async fn empty_or_fully_failed_selection_is_nothing_selected() {
    let pipeline = pipeline(fetcher());
    assert!(matches!(
        pipeline.build(BuildRequest::default()).await,
        Err(PipelineError::NothingSelected { .. })
    ));

    let result = pipeline
        .build(BuildRequest {
            records: vec![record("https://example.com/missing.png", "missing.png")],
            ..BuildRequest::default()
        })
        .await;
    match result {
        Err(PipelineError::NothingSelected { bad_uris, excluded }) => {
            assert_eq!(bad_uris.len(), 1);
            assert!(excluded.is_empty());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(pipeline.blobs().is_empty());
}
