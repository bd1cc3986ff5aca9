//! Catalog store actor
//!
//! Owns the [`CatalogState`] and applies every event through the reducer,
//! one command at a time. Snapshots are published on a watch channel after
//! each command.

use crate::coordinator::{BuildJob, Coordinator};
use crate::error::CatalogError;
use crate::event::CatalogEvent;
use crate::reducer::apply;
use crate::state::CatalogState;
use chrono::{DateTime, Utc};
use picpick_archive::{ArchiveBuilder, BlobStore, BuildOutcome, BuildRequest, OutputHandle, PipelineError, TargetFormat};
use picpick_resource::{ContentHash, ResourceKey, ResourceRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Command queue depth
const COMMAND_BUFFER: usize = 256;

type TicketReply = oneshot::Sender<Result<ArchiveReceipt, CatalogError>>;

pub(crate) enum StoreCommand {
    Dispatch {
        event: CatalogEvent,
        ack: oneshot::Sender<()>,
    },
    Select {
        keys: Vec<ResourceKey>,
        ack: oneshot::Sender<()>,
    },
    RequestArchive {
        target: Option<TargetFormat>,
        reply: TicketReply,
    },
    BuildFinished {
        seq: u64,
        result: Result<BuildOutcome, PipelineError>,
    },
    Shutdown,
}

impl std::fmt::Debug for StoreCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dispatch { event, .. } => write!(f, "Dispatch({})", event.name()),
            Self::Select { keys, .. } => write!(f, "Select({} keys)", keys.len()),
            Self::RequestArchive { target, .. } => write!(f, "RequestArchive({target:?})"),
            Self::BuildFinished { seq, .. } => write!(f, "BuildFinished({seq})"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// A finished archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReceipt {
    /// Request sequence number
    pub seq: u64,
    pub output: OutputHandle,
    /// Entry names in archive order
    pub entries: Vec<String>,
    /// Blake3 digest of the archive bytes
    pub digest: ContentHash,
    pub generated: DateTime<Utc>,
}

/// Pending answer to an archive request
#[derive(Debug)]
pub struct ArchiveTicket {
    reply: oneshot::Receiver<Result<ArchiveReceipt, CatalogError>>,
}

impl ArchiveTicket {
    /// Wait for the request's outcome
    ///
    /// # Errors
    /// - `CatalogError::NothingSelected` for an empty or fully failed selection
    /// - `CatalogError::Superseded` if a newer request or selection change won
    /// - `CatalogError::Pipeline` if the build failed
    pub async fn wait(self) -> Result<ArchiveReceipt, CatalogError> {
        self.reply.await.unwrap_or(Err(CatalogError::Closed))
    }
}

/// Handle to a running catalog store
#[derive(Debug, Clone)]
pub struct CatalogHandle {
    sender: mpsc::Sender<StoreCommand>,
    snapshots: watch::Receiver<Arc<CatalogState>>,
    blobs: BlobStore,
}

impl CatalogHandle {
    async fn dispatch(&self, event: CatalogEvent) -> Result<(), CatalogError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(StoreCommand::Dispatch { event, ack })
            .await
            .map_err(|_| CatalogError::Closed)?;
        done.await.map_err(|_| CatalogError::Closed)
    }

    /// Track a document address
    ///
    /// # Errors
    /// Returns `CatalogError::Closed` if the store has stopped
    pub async fn set_address(&self, url: impl Into<String>) -> Result<(), CatalogError> {
        self.dispatch(CatalogEvent::SetAddress(url.into())).await
    }

    /// Merge one scan's resolved records
    ///
    /// # Errors
    /// Returns `CatalogError::Closed` if the store has stopped
    pub async fn add_records(&self, records: Vec<ResourceRecord>) -> Result<(), CatalogError> {
        self.dispatch(CatalogEvent::AddRecords(records)).await
    }

    /// Rename a record; unknown keys are ignored
    ///
    /// # Errors
    /// Returns `CatalogError::Closed` if the store has stopped
    pub async fn rename_record(&self, key: ResourceKey, filename: impl Into<String>) -> Result<(), CatalogError> {
        self.dispatch(CatalogEvent::RenameRecord {
            key,
            filename: filename.into(),
        })
        .await
    }

    /// Record unresolvable keys
    ///
    /// # Errors
    /// Returns `CatalogError::Closed` if the store has stopped
    pub async fn mark_bad_uris(&self, keys: Vec<ResourceKey>) -> Result<(), CatalogError> {
        self.dispatch(CatalogEvent::MarkBadUris(keys)).await
    }

    /// Select catalog records by key, in the given order
    ///
    /// Keys not in the catalog are skipped.
    ///
    /// # Errors
    /// Returns `CatalogError::Closed` if the store has stopped
    pub async fn set_selection(&self, keys: Vec<ResourceKey>) -> Result<(), CatalogError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(StoreCommand::Select { keys, ack })
            .await
            .map_err(|_| CatalogError::Closed)?;
        done.await.map_err(|_| CatalogError::Closed)
    }

    /// Set the archive password
    ///
    /// # Errors
    /// Returns `CatalogError::Closed` if the store has stopped
    pub async fn set_password(&self, password: impl Into<String>) -> Result<(), CatalogError> {
        self.dispatch(CatalogEvent::SetPassword(password.into())).await
    }

    /// Request an archive of the current selection
    ///
    /// # Errors
    /// Returns `CatalogError::Closed` if the store has stopped
    pub async fn request_archive(&self, target: Option<TargetFormat>) -> Result<ArchiveTicket, CatalogError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(StoreCommand::RequestArchive { target, reply })
            .await
            .map_err(|_| CatalogError::Closed)?;
        Ok(ArchiveTicket { reply: rx })
    }

    /// Drop the held archive
    ///
    /// # Errors
    /// Returns `CatalogError::Closed` if the store has stopped
    pub async fn clear_archive_output(&self) -> Result<(), CatalogError> {
        self.dispatch(CatalogEvent::ClearArchiveOutput).await
    }

    /// Current state
    #[must_use]
    pub fn snapshot(&self) -> Arc<CatalogState> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Watch state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<CatalogState>> {
        self.snapshots.clone()
    }

    /// Bytes of a live archive output
    #[must_use]
    pub fn output_bytes(&self, output: &OutputHandle) -> Option<Arc<[u8]>> {
        self.blobs.get(output)
    }

    /// Stop the store
    pub async fn shutdown(&self) {
        let _ = self.sender.send(StoreCommand::Shutdown).await;
    }
}

struct PendingRequest {
    reply: TicketReply,
    url: Option<String>,
}

/// Single-writer owner of the catalog state
pub struct CatalogStore {
    state: CatalogState,
    snapshots: watch::Sender<Arc<CatalogState>>,
    jobs: mpsc::UnboundedSender<BuildJob>,
    blobs: BlobStore,
    pending: HashMap<u64, PendingRequest>,
    next_seq: u64,
}

impl CatalogStore {
    /// Start the store and its archive coordinator
    #[must_use]
    pub fn spawn(builder: Arc<dyn ArchiveBuilder>) -> (CatalogHandle, JoinHandle<()>) {
        let (sender, commands) = mpsc::channel(COMMAND_BUFFER);
        let (jobs, job_queue) = mpsc::unbounded_channel();
        let (snapshots, snapshot_rx) = watch::channel(Arc::new(CatalogState::default()));
        let blobs = builder.blobs().clone();

        let coordinator = Coordinator::new(builder, sender.downgrade());
        tokio::spawn(coordinator.run(job_queue));

        let store = Self {
            state: CatalogState::default(),
            snapshots,
            jobs,
            blobs: blobs.clone(),
            pending: HashMap::new(),
            next_seq: 0,
        };
        let task = tokio::spawn(store.run(commands));
        let handle = CatalogHandle {
            sender,
            snapshots: snapshot_rx,
            blobs,
        };
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<StoreCommand>) {
        tracing::info!("catalog store started");
        while let Some(command) = commands.recv().await {
            match command {
                StoreCommand::Dispatch { event, ack } => {
                    self.apply(event);
                    let _ = ack.send(());
                }
                StoreCommand::Select { keys, ack } => {
                    let records = keys
                        .iter()
                        .filter_map(|key| self.state.items.get(key).cloned())
                        .collect();
                    self.apply(CatalogEvent::SetSelection(records));
                    let _ = ack.send(());
                }
                StoreCommand::RequestArchive { target, reply } => self.request_archive(target, reply),
                StoreCommand::BuildFinished { seq, result } => self.finish_build(seq, result),
                StoreCommand::Shutdown => break,
            }
            self.publish();
        }
        for (_, pending) in self.pending.drain() {
            let _ = pending.reply.send(Err(CatalogError::Closed));
        }
        tracing::info!(items = self.state.items.len(), "catalog store stopped");
    }

    fn apply(&mut self, event: CatalogEvent) {
        tracing::debug!(event = event.name(), "applying");
        let transition = apply(std::mem::take(&mut self.state), event);
        self.state = transition.state;
        for output in transition.released {
            self.blobs.revoke(&output);
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(Arc::new(self.state.clone()));
    }

    fn request_archive(&mut self, target: Option<TargetFormat>, reply: TicketReply) {
        if self.state.selection.is_empty() {
            let _ = reply.send(Err(CatalogError::NothingSelected));
            return;
        }
        self.next_seq += 1;
        let seq = self.next_seq;
        self.apply(CatalogEvent::RequestArchive { seq });

        let request = BuildRequest {
            records: self.state.selection.clone(),
            target,
            password: self.state.password.clone(),
        };
        if self.jobs.send(BuildJob { seq, request }).is_err() {
            self.apply(CatalogEvent::ArchiveAborted { seq });
            let _ = reply.send(Err(CatalogError::Closed));
            return;
        }
        self.pending.insert(
            seq,
            PendingRequest {
                reply,
                url: self.state.url.clone(),
            },
        );
        tracing::info!(seq, records = self.state.selection.len(), "archive requested");
    }

    fn finish_build(&mut self, seq: u64, result: Result<BuildOutcome, PipelineError>) {
        let pending = self.pending.remove(&seq);
        let current = self.state.archive.is_loading(seq);
        let same_page = pending.as_ref().is_some_and(|p| p.url == self.state.url);

        let (bad_uris, answer) = match result {
            Ok(outcome) => {
                self.apply(CatalogEvent::ArchiveReady {
                    seq,
                    output: outcome.output,
                    generated: outcome.generated,
                });
                let answer = if current {
                    tracing::info!(seq, entries = outcome.entries.len(), "archive ready");
                    Ok(ArchiveReceipt {
                        seq,
                        output: outcome.output,
                        entries: outcome.entries,
                        digest: outcome.digest,
                        generated: outcome.generated,
                    })
                } else {
                    tracing::debug!(seq, "stale archive discarded");
                    Err(CatalogError::Superseded)
                };
                (outcome.bad_uris, answer)
            }
            Err(PipelineError::NothingSelected { bad_uris, .. }) => {
                self.apply(CatalogEvent::ArchiveAborted { seq });
                let answer = if current {
                    Err(CatalogError::NothingSelected)
                } else {
                    Err(CatalogError::Superseded)
                };
                (bad_uris, answer)
            }
            Err(e) => {
                tracing::warn!(seq, error = %e, "archive build failed");
                self.apply(CatalogEvent::ArchiveAborted { seq });
                let answer = if current {
                    Err(CatalogError::Pipeline(e.to_string()))
                } else {
                    Err(CatalogError::Superseded)
                };
                (Vec::new(), answer)
            }
        };

        if same_page && !bad_uris.is_empty() {
            self.apply(CatalogEvent::MarkBadUris(bad_uris));
        }
        if let Some(pending) = pending {
            let _ = pending.reply.send(answer);
        }
    }
}
