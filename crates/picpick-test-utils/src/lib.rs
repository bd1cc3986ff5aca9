//! Testing utilities for picpick workspace
//!
//! Shared fixtures: sample pages, an in-memory [`StaticFetcher`], a
//! [`ScriptedBuilder`] with controllable timing and image byte generators.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use picpick_archive::{
    ArchiveBuilder, BlobStore, BuildOutcome, BuildRequest, FetchError, Fetched, Fetcher, PipelineError,
};
use picpick_resource::{ContentHash, ResourceKey, ResourceRecord, Selector};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::time::Duration;

/// A page with one image element and one CSS background
pub const GALLERY_HTML: &str = r#"<!doctype html>
<html>
  <head><style>.hero { background-image: url(bg.jpg) }</style></head>
  <body>
    <img src="pic.png" alt="picture">
    <div class="hero"></div>
  </body>
</html>"#;

/// Base URL the sample pages are served from
pub const GALLERY_URL: &str = "https://example.com/gallery/";

/// Solid-color PNG
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    encode(
        image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(width, height, image::Rgba(rgba))),
        image::ImageFormat::Png,
    )
}

/// Solid-color JPEG
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(
        image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb([40, 80, 120]))),
        image::ImageFormat::Jpeg,
    )
}

/// Solid-color GIF
pub fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(
        image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 255, 255]))),
        image::ImageFormat::Gif,
    )
}

fn encode(image: image::DynamicImage, format: image::ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// Payload-less record as a scan would produce it
pub fn record(uri: &str, filename: &str) -> ResourceRecord {
    let marker = format!("picpickdl{}", filename.len());
    ResourceRecord::new(
        ResourceKey::new(uri),
        filename,
        Selector::from_marker(&marker),
        "html>body>img>img",
    )
}

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    content_type: Option<String>,
    delay: Duration,
}

/// In-memory fetcher; unknown URIs answer 404
#[derive(Debug, Default)]
pub struct StaticFetcher {
    entries: HashMap<String, Entry>,
    hits: Mutex<HashMap<String, usize>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` at `uri`
    pub fn with(mut self, uri: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        self.entries.insert(
            uri.to_string(),
            Entry {
                bytes,
                content_type: content_type.map(str::to_string),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Delay responses for `uri`
    pub fn with_delay(mut self, uri: &str, delay: Duration) -> Self {
        if let Some(entry) = self.entries.get_mut(uri) {
            entry.delay = delay;
        }
        self
    }

    /// Number of fetches of `uri` so far
    pub fn hits(&self, uri: &str) -> usize {
        self.hits.lock().get(uri).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, key: &ResourceKey) -> Result<Fetched, FetchError> {
        *self.hits.lock().entry(key.as_str().to_string()).or_default() += 1;
        let Some(entry) = self.entries.get(key.as_str()).cloned() else {
            return Err(FetchError::Status {
                uri: key.to_string(),
                status: 404,
            });
        };
        if !entry.delay.is_zero() {
            tokio::time::sleep(entry.delay).await;
        }
        Ok(Fetched {
            bytes: entry.bytes,
            content_type: entry.content_type,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Succeed,
    Fail,
    Panic,
}

/// Archive builder with scripted delays, failures and panics
///
/// Each call pops the next script step (default: no delay, success). A
/// successful build registers a small blob listing the record filenames.
#[derive(Debug, Default)]
pub struct ScriptedBuilder {
    blobs: BlobStore,
    script: Mutex<VecDeque<(Duration, Step)>>,
    calls: Mutex<Vec<BuildRequest>>,
}

impl ScriptedBuilder {
    pub fn new(blobs: BlobStore) -> Self {
        Self {
            blobs,
            ..Self::default()
        }
    }

    /// Queue a step: wait `delay`, then succeed or fail
    pub fn then(self, delay: Duration, succeed: bool) -> Self {
        let step = if succeed { Step::Succeed } else { Step::Fail };
        self.script.lock().push_back((delay, step));
        self
    }

    /// Queue a step that panics inside the build
    pub fn then_panic(self) -> Self {
        self.script.lock().push_back((Duration::ZERO, Step::Panic));
        self
    }

    /// Requests seen so far
    pub fn calls(&self) -> Vec<BuildRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ArchiveBuilder for ScriptedBuilder {
    async fn build(&self, request: BuildRequest) -> Result<BuildOutcome, PipelineError> {
        let (delay, step) = self.script.lock().pop_front().unwrap_or((Duration::ZERO, Step::Succeed));
        self.calls.lock().push(request.clone());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if step == Step::Panic {
            panic!("scripted build panic");
        }
        if step == Step::Fail || request.records.is_empty() {
            return Err(PipelineError::NothingSelected {
                bad_uris: request.records.iter().map(|r| r.uri.clone()).collect(),
                excluded: Vec::new(),
            });
        }
        let entries: Vec<String> = request.records.iter().map(|r| r.filename.clone()).collect();
        let bytes = entries.join("\n").into_bytes();
        let digest = ContentHash::compute(&bytes);
        let output = self.blobs.register(bytes);
        Ok(BuildOutcome {
            output,
            entries,
            bad_uris: Vec::new(),
            excluded: Vec::new(),
            digest,
            generated: chrono::Utc::now(),
        })
    }

    fn blobs(&self) -> &BlobStore {
        &self.blobs
    }
}
