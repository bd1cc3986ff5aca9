//! Archive build pipeline
//!
//! Each record moves through acquire and optional convert on its own; a
//! failure only drops that record. Packing starts after every record has
//! reached a terminal state.

use crate::blob::{BlobStore, OutputHandle};
use crate::convert::{convert, TargetFormat};
use crate::error::{AcquireError, ConvertError, PackError, PipelineError};
use crate::fetch::Fetcher;
use crate::pack::{pack, PackOptions};
use crate::sniff::sniff_kind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use picpick_resource::{filename, ContentHash, ImageKind, Payload, ResourceKey, ResourceRecord};
use std::collections::HashSet;
use std::sync::Arc;

/// Default number of records processed at once
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Fetch a record's payload if missing, classify it and fix its extension
///
/// # Errors
/// - `AcquireError::Fetch` if the payload cannot be fetched
/// - `AcquireError::Unclassifiable` if no image kind can be determined
pub async fn acquire(
    fetcher: &dyn Fetcher,
    record: ResourceRecord,
) -> Result<(ResourceRecord, ImageKind), AcquireError> {
    let mut record = match record.payload {
        Some(_) => record,
        None => {
            let fetched = fetcher.fetch(&record.uri).await?;
            record.with_payload(Payload::new(fetched.bytes, fetched.content_type))
        }
    };
    let kind = record
        .payload
        .as_ref()
        .and_then(|payload| sniff_kind(payload.bytes(), payload.declared_type()))
        .ok_or_else(|| AcquireError::Unclassifiable(record.uri.clone()))?;
    record.filename = filename::ensure_extension(&record.filename, kind);
    Ok((record, kind))
}

/// Inputs of one archive build
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Records in selection order
    pub records: Vec<ResourceRecord>,
    /// Conversion target, `None` to keep source formats
    pub target: Option<TargetFormat>,
    /// Entry password, empty for none
    pub password: String,
}

/// Result of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub output: OutputHandle,
    /// Entry names in archive order
    pub entries: Vec<String>,
    /// Records dropped as unreachable or unclassifiable
    pub bad_uris: Vec<ResourceKey>,
    /// Records dropped because conversion failed
    pub excluded: Vec<ResourceKey>,
    /// Blake3 digest of the archive bytes
    pub digest: ContentHash,
    pub generated: DateTime<Utc>,
}

/// Anything that can turn a selection into an archive
#[async_trait]
pub trait ArchiveBuilder: Send + Sync {
    /// Build one archive
    async fn build(&self, request: BuildRequest) -> Result<BuildOutcome, PipelineError>;

    /// Store the built archives live in
    fn blobs(&self) -> &BlobStore;
}

enum RecordOutcome {
    Packed { name: String, bytes: Vec<u8> },
    Bad(ResourceKey),
    Excluded(ResourceKey),
}

/// Fetch, convert and pack
#[derive(Clone)]
pub struct ArchivePipeline {
    fetcher: Arc<dyn Fetcher>,
    blobs: BlobStore,
    max_concurrent: usize,
    compression_level: Option<i64>,
}

impl std::fmt::Debug for ArchivePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchivePipeline")
            .field("blobs", &self.blobs.len())
            .field("max_concurrent", &self.max_concurrent)
            .field("compression_level", &self.compression_level)
            .finish_non_exhaustive()
    }
}

impl ArchivePipeline {
    /// Create a pipeline fetching through `fetcher` and storing into `blobs`
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, blobs: BlobStore) -> Self {
        Self {
            fetcher,
            blobs,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            compression_level: None,
        }
    }

    /// Builder: records processed at once
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Builder: deflate level
    #[must_use]
    pub fn with_compression_level(mut self, level: Option<i64>) -> Self {
        self.compression_level = level;
        self
    }

    async fn process(&self, record: ResourceRecord, target: Option<TargetFormat>) -> RecordOutcome {
        let key = record.uri.clone();
        let (record, kind) = match acquire(self.fetcher.as_ref(), record).await {
            Ok(acquired) => acquired,
            Err(e) => {
                tracing::warn!(%key, error = %e, "record dropped");
                return RecordOutcome::Bad(key);
            }
        };
        let Some(payload) = record.payload else {
            return RecordOutcome::Bad(key);
        };

        match target {
            Some(target) if target.kind() != kind => {
                let converted = tokio::task::spawn_blocking(move || convert(payload.bytes(), kind, target))
                    .await
                    .map_err(|e| ConvertError::Worker(e.to_string()))
                    .and_then(|result| result);
                match converted {
                    Ok(bytes) => RecordOutcome::Packed {
                        name: filename::replace_extension(&record.filename, target.kind()),
                        bytes,
                    },
                    Err(e) => {
                        tracing::warn!(%key, error = %e, "record excluded");
                        RecordOutcome::Excluded(key)
                    }
                }
            }
            _ => RecordOutcome::Packed {
                name: record.filename,
                bytes: payload.bytes().to_vec(),
            },
        }
    }
}

#[async_trait]
impl ArchiveBuilder for ArchivePipeline {
    async fn build(&self, request: BuildRequest) -> Result<BuildOutcome, PipelineError> {
        let BuildRequest {
            records,
            target,
            password,
        } = request;
        let requested = records.len();

        let outcomes: Vec<RecordOutcome> = stream::iter(records)
            .map(|record| self.process(record, target))
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut taken = HashSet::new();
        let mut files = Vec::new();
        let mut bad_uris = Vec::new();
        let mut excluded = Vec::new();
        for outcome in outcomes {
            match outcome {
                RecordOutcome::Packed { name, bytes } => {
                    let name = filename::disambiguate(&filename::sanitize_archive_name(&name), &mut taken);
                    files.push((name, bytes));
                }
                RecordOutcome::Bad(key) => bad_uris.push(key),
                RecordOutcome::Excluded(key) => excluded.push(key),
            }
        }

        if files.is_empty() {
            return Err(PipelineError::NothingSelected { bad_uris, excluded });
        }

        let options = PackOptions {
            password,
            compression_level: self.compression_level,
        };
        let packed = tokio::task::spawn_blocking(move || pack(&files, &options))
            .await
            .map_err(|e| PackError::Worker(e.to_string()))??;

        let digest = ContentHash::compute(&packed.bytes);
        let output = self.blobs.register(packed.bytes);
        tracing::info!(
            %output,
            digest = %digest.short(),
            requested,
            packed = packed.entries.len(),
            bad = bad_uris.len(),
            excluded = excluded.len(),
            "archive built"
        );
        Ok(BuildOutcome {
            output,
            entries: packed.entries,
            bad_uris,
            excluded,
            digest,
            generated: Utc::now(),
        })
    }

    fn blobs(&self) -> &BlobStore {
        &self.blobs
    }
}
