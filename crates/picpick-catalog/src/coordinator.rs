//! Archive coordinator
//!
//! Receives build jobs from the store, runs each on its own task and posts
//! the result back. It holds only a weak sender to the store so that the
//! store stops once its last handle is dropped. A build that panics is
//! reported as [`PipelineError::Aborted`].

use crate::store::StoreCommand;
use futures::FutureExt;
use picpick_archive::{ArchiveBuilder, BuildRequest, PipelineError};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One requested build
#[derive(Debug)]
pub(crate) struct BuildJob {
    pub(crate) seq: u64,
    pub(crate) request: BuildRequest,
}

pub(crate) struct Coordinator {
    builder: Arc<dyn ArchiveBuilder>,
    store: mpsc::WeakSender<StoreCommand>,
}

impl Coordinator {
    pub(crate) fn new(builder: Arc<dyn ArchiveBuilder>, store: mpsc::WeakSender<StoreCommand>) -> Self {
        Self { builder, store }
    }

    pub(crate) async fn run(self, mut jobs: mpsc::UnboundedReceiver<BuildJob>) {
        while let Some(job) = jobs.recv().await {
            let builder = Arc::clone(&self.builder);
            let store = self.store.clone();
            tracing::debug!(seq = job.seq, records = job.request.records.len(), "build started");
            tokio::spawn(async move {
                let result = AssertUnwindSafe(builder.build(job.request))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let reason = panic_message(panic.as_ref());
                        tracing::error!(seq = job.seq, %reason, "archive build panicked");
                        Err(PipelineError::Aborted(reason))
                    });
                let delivered = match store.upgrade() {
                    Some(store) => store
                        .send(StoreCommand::BuildFinished { seq: job.seq, result })
                        .await
                        .map_err(|e| e.0),
                    None => Err(StoreCommand::BuildFinished { seq: job.seq, result }),
                };
                // Nobody left to hold the output
                if let Err(StoreCommand::BuildFinished { result: Ok(outcome), .. }) = delivered {
                    builder.blobs().revoke(&outcome.output);
                }
            });
        }
        tracing::debug!("coordinator stopped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
