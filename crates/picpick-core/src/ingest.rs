//! Scan ingestion
//!
//! Bridges the scanning context to the catalog. For every `putImgList` it
//! sets the address, fetches the payloads of keys the catalog has not seen
//! yet and dispatches the resolved records and the bad keys.

use crate::error::SessionError;
use futures::stream::{self, StreamExt};
use picpick_archive::{acquire, Fetcher};
use picpick_catalog::CatalogHandle;
use picpick_harvest::ContentMessage;
use picpick_resource::{ImgList, ResourceKey, ResourceRecord};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Consumer of scan messages
pub struct Ingestor {
    catalog: CatalogHandle,
    fetcher: Arc<dyn Fetcher>,
    max_concurrent: usize,
    ingested: watch::Sender<u64>,
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("max_concurrent", &self.max_concurrent)
            .field("ingested", &*self.ingested.borrow())
            .finish_non_exhaustive()
    }
}

impl Ingestor {
    /// Create an ingestor; the receiver reports the last ingested scan id
    #[must_use]
    pub fn new(
        catalog: CatalogHandle,
        fetcher: Arc<dyn Fetcher>,
        max_concurrent: usize,
    ) -> (Self, watch::Receiver<u64>) {
        let (ingested, progress) = watch::channel(0);
        let ingestor = Self {
            catalog,
            fetcher,
            max_concurrent: max_concurrent.max(1),
            ingested,
        };
        (ingestor, progress)
    }

    /// Consume scan messages until the scanning side or the catalog stops
    pub async fn run(self, mut inbound: mpsc::Receiver<ContentMessage>) {
        while let Some(message) = inbound.recv().await {
            let ContentMessage::PutImgList { url, imglist, scan_id } = message else {
                tracing::debug!("non-list message ignored by ingestion");
                continue;
            };
            match self.ingest(url, imglist).await {
                Ok(()) => {
                    self.ingested.send_replace(scan_id);
                }
                Err(e) => {
                    tracing::info!(error = %e, "catalog gone, ingestion stopped");
                    break;
                }
            }
        }
    }

    /// Apply one scan to the catalog
    ///
    /// # Errors
    /// Returns `SessionError::Catalog` if the catalog store has stopped
    pub async fn ingest(&self, url: String, imglist: ImgList) -> Result<(), SessionError> {
        self.catalog.set_address(url).await?;

        let known = self.catalog.snapshot();
        let fresh: Vec<ResourceRecord> = imglist
            .into_values()
            .filter(|record| !known.knows(&record.uri))
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }

        let fetcher = self.fetcher.as_ref();
        let outcomes: Vec<Result<ResourceRecord, ResourceKey>> = stream::iter(fresh)
            .map(|record| async move {
                let key = record.uri.clone();
                acquire(fetcher, record).await.map(|(record, _)| record).map_err(|e| {
                    tracing::debug!(%key, error = %e, "resource unreachable");
                    key
                })
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut resolved = Vec::new();
        let mut bad = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(record) => resolved.push(record),
                Err(key) => bad.push(key),
            }
        }
        tracing::debug!(resolved = resolved.len(), bad = bad.len(), "scan ingested");

        if !resolved.is_empty() {
            self.catalog.add_records(resolved).await?;
        }
        if !bad.is_empty() {
            self.catalog.mark_bad_uris(bad).await?;
        }
        Ok(())
    }
}
