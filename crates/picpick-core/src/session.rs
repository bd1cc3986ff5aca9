//! Session orchestrator
//!
//! A session owns three tasks wired by channels:
//!
//! ```text
//! ScanContext --putImgList--> Ingestor --events--> CatalogStore --jobs--> ArchivePipeline
//! ```
//!
//! The live document is shared with the host, which may mutate it between
//! scans.

use crate::config::HarvestConfig;
use crate::error::SessionError;
use crate::ingest::Ingestor;
use crate::loader::{load_document, resolve_source};
use parking_lot::RwLock;
use picpick_archive::{ArchivePipeline, BlobStore, Fetcher, NetFetcher, TargetFormat};
use picpick_catalog::{ArchiveReceipt, CatalogHandle, CatalogStore};
use picpick_dom::Document;
use picpick_harvest::{IdentityRegistry, LiveDocument, ScanContext, ScanHandle};
use picpick_resource::{ResourceKey, ResourceRecord};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Scan messages buffered between the scanner and ingestion
const SCAN_BUFFER: usize = 16;

/// A running harvest over one document
#[derive(Debug)]
pub struct Session {
    document: LiveDocument,
    scanner: ScanHandle,
    catalog: CatalogHandle,
    ingested: watch::Receiver<u64>,
    config: HarvestConfig,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Start scanning `document`, fetching payloads through `fetcher`
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(document: Document, config: HarvestConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let document: LiveDocument = Arc::new(RwLock::new(document));
        let (outbound, inbound) = mpsc::channel(SCAN_BUFFER);

        let registry = IdentityRegistry::new(config.marker_prefix.clone());
        let (scanner, scan_task) =
            ScanContext::new(Arc::clone(&document), registry, config.scan_interval(), outbound).spawn();

        let pipeline = ArchivePipeline::new(Arc::clone(&fetcher), BlobStore::new())
            .with_max_concurrent(config.fetch.max_concurrent)
            .with_compression_level(config.archive.compression_level);
        let (catalog, store_task) = CatalogStore::spawn(Arc::new(pipeline));

        let (ingestor, ingested) = Ingestor::new(catalog.clone(), fetcher, config.fetch.max_concurrent);
        let ingest_task = tokio::spawn(ingestor.run(inbound));

        tracing::info!(url = %document.read().url(), "session started");
        Self {
            document,
            scanner,
            catalog,
            ingested,
            config,
            tasks: vec![scan_task, ingest_task, store_task],
        }
    }

    /// Load `source` (path or URL) over the network stack and start a session
    ///
    /// # Errors
    /// Returns error if the source is invalid or the page cannot be loaded
    pub async fn open(source: &str, config: HarvestConfig) -> Result<Self, SessionError> {
        let url = resolve_source(source)?;
        let fetcher: Arc<dyn Fetcher> = Arc::new(NetFetcher::new(&config.fetch.settings())?);
        let document = load_document(url, fetcher.as_ref()).await?;
        Ok(Self::start(document, config, fetcher))
    }

    #[inline]
    #[must_use]
    pub fn document(&self) -> &LiveDocument {
        &self.document
    }

    #[inline]
    #[must_use]
    pub fn scanner(&self) -> &ScanHandle {
        &self.scanner
    }

    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Scan now and wait until the catalog has ingested the result
    ///
    /// # Errors
    /// Returns error if any of the session tasks has stopped
    pub async fn refresh(&self) -> Result<u64, SessionError> {
        let scan_id = self.scanner.request_scan().await?;
        self.wait_ingested(scan_id).await?;
        Ok(scan_id)
    }

    /// Wait until scan `scan_id` (or a later one) is in the catalog
    ///
    /// # Errors
    /// Returns `SessionError::IngestClosed` if ingestion stopped first
    pub async fn wait_ingested(&self, scan_id: u64) -> Result<(), SessionError> {
        let mut progress = self.ingested.clone();
        progress
            .wait_for(|&seen| seen >= scan_id)
            .await
            .map_err(|_| SessionError::IngestClosed)?;
        Ok(())
    }

    /// Select every catalog entry matching `predicate`, in catalog order
    ///
    /// # Errors
    /// Returns `SessionError::Catalog` if the catalog store has stopped
    pub async fn select_where(&self, predicate: impl Fn(&ResourceRecord) -> bool) -> Result<usize, SessionError> {
        let keys: Vec<ResourceKey> = self
            .catalog
            .snapshot()
            .items
            .values()
            .filter(|record| predicate(record))
            .map(|record| record.uri.clone())
            .collect();
        let count = keys.len();
        self.catalog.set_selection(keys).await?;
        Ok(count)
    }

    /// Highlight the node a catalog entry was found on
    ///
    /// # Errors
    /// Returns `SessionError::Scan` if the scanning context has stopped
    pub async fn highlight(&self, key: &ResourceKey) -> Result<bool, SessionError> {
        let Some(selector) = self.catalog.snapshot().items.get(key).map(|r| r.selector.clone()) else {
            return Ok(false);
        };
        Ok(self.scanner.select(selector).await?)
    }

    /// Build an archive of the current selection
    ///
    /// `target` overrides the configured conversion target.
    ///
    /// # Errors
    /// Returns `SessionError::Catalog` for an empty selection, a superseded
    /// request or a failed build
    pub async fn build_archive(&self, target: Option<TargetFormat>) -> Result<ArchiveReceipt, SessionError> {
        let ticket = self
            .catalog
            .request_archive(target.or(self.config.archive.target))
            .await?;
        Ok(ticket.wait().await?)
    }

    /// Bytes of a built archive, while it is still held
    #[must_use]
    pub fn archive_bytes(&self, receipt: &ArchiveReceipt) -> Option<Arc<[u8]>> {
        self.catalog.output_bytes(&receipt.output)
    }

    /// Stop every task and wait for them
    pub async fn shutdown(self) {
        self.scanner.shutdown().await;
        self.catalog.shutdown().await;
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "session task failed");
            }
        }
        tracing::info!("session stopped");
    }
}
