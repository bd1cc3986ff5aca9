//! Scanning context
//!
//! A single task owns the identity registry and scans the shared live
//! document:
//! - once on start (the load scan), then on every interval tick
//! - on demand, with queued requests coalesced into one scan
//! - never overlapping, since commands are handled one at a time
//!
//! Every scan publishes a [`ContentMessage::PutImgList`] on the outbound
//! channel.

use crate::error::ScanError;
use crate::extract::harvest;
use crate::identity::IdentityRegistry;
use crate::message::ContentMessage;
use parking_lot::RwLock;
use picpick_dom::{Document, NodeId};
use picpick_resource::Selector;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use url::Url;

/// Document shared between its host and the scanning context
pub type LiveDocument = Arc<RwLock<Document>>;

/// Command queue depth
const COMMAND_BUFFER: usize = 64;

enum ScanCommand {
    Scan { reply: Option<oneshot::Sender<u64>> },
    Select { selector: Selector, reply: oneshot::Sender<bool> },
    Highlighted { reply: oneshot::Sender<Option<Selector>> },
    Shutdown,
}

/// Handle for talking to a running [`ScanContext`]
#[derive(Debug, Clone)]
pub struct ScanHandle {
    sender: mpsc::Sender<ScanCommand>,
}

impl std::fmt::Debug for ScanCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scan { .. } => f.write_str("Scan"),
            Self::Select { selector, .. } => write!(f, "Select({selector})"),
            Self::Highlighted { .. } => f.write_str("Highlighted"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl ScanHandle {
    async fn send(&self, command: ScanCommand) -> Result<(), ScanError> {
        self.sender.send(command).await.map_err(|_| ScanError::Closed)
    }

    /// Scan now and wait for the scan's id
    ///
    /// # Errors
    /// Returns `ScanError::Closed` if the context has stopped
    pub async fn request_scan(&self) -> Result<u64, ScanError> {
        let (reply, rx) = oneshot::channel();
        self.send(ScanCommand::Scan { reply: Some(reply) }).await?;
        rx.await.map_err(|_| ScanError::Closed)
    }

    /// Highlight the node behind `selector`; returns whether it matched
    ///
    /// A selector that no longer matches clears the current highlight.
    ///
    /// # Errors
    /// Returns `ScanError::Closed` if the context has stopped
    pub async fn select(&self, selector: Selector) -> Result<bool, ScanError> {
        let (reply, rx) = oneshot::channel();
        self.send(ScanCommand::Select { selector, reply }).await?;
        rx.await.map_err(|_| ScanError::Closed)
    }

    /// Selector of the currently highlighted node
    ///
    /// # Errors
    /// Returns `ScanError::Closed` if the context has stopped
    pub async fn highlighted(&self) -> Result<Option<Selector>, ScanError> {
        let (reply, rx) = oneshot::channel();
        self.send(ScanCommand::Highlighted { reply }).await?;
        rx.await.map_err(|_| ScanError::Closed)
    }

    /// Dispatch an inbound protocol message
    ///
    /// `putImgList` is outbound only and is ignored here.
    ///
    /// # Errors
    /// Returns `ScanError::Closed` if the context has stopped
    pub async fn deliver(&self, message: ContentMessage) -> Result<(), ScanError> {
        match message {
            ContentMessage::RequestImgList => self.send(ScanCommand::Scan { reply: None }).await,
            ContentMessage::SelectDomElement { selector } => self.select(selector).await.map(|_| ()),
            ContentMessage::PutImgList { .. } => {
                tracing::warn!("putImgList delivered to the scanning context, ignoring");
                Ok(())
            }
        }
    }

    /// Stop the context
    pub async fn shutdown(&self) {
        let _ = self.sender.send(ScanCommand::Shutdown).await;
    }
}

/// Scanning task state
#[derive(Debug)]
pub struct ScanContext {
    document: LiveDocument,
    registry: IdentityRegistry,
    interval: Duration,
    outbound: mpsc::Sender<ContentMessage>,
    highlighted: Option<(NodeId, Selector)>,
    last_url: Option<Url>,
    scans: u64,
}

impl ScanContext {
    /// Create a context scanning `document` every `interval`
    #[must_use]
    pub fn new(
        document: LiveDocument,
        registry: IdentityRegistry,
        interval: Duration,
        outbound: mpsc::Sender<ContentMessage>,
    ) -> Self {
        Self {
            document,
            registry,
            interval,
            outbound,
            highlighted: None,
            last_url: None,
            scans: 0,
        }
    }

    /// Start the scanning task
    #[must_use]
    pub fn spawn(self) -> (ScanHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(self.run(receiver));
        (ScanHandle { sender }, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<ScanCommand>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval = ?self.interval, "scan context started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.scan().await.is_err() {
                        break;
                    }
                }
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    let mut queue = VecDeque::from([command]);
                    // Drain what is already queued so pending scan requests share one scan
                    while let Ok(next) = commands.try_recv() {
                        queue.push_back(next);
                    }
                    if !self.handle_batch(queue).await {
                        break;
                    }
                }
            }
        }
        tracing::info!(scans = self.scans, "scan context stopped");
    }

    /// Returns `false` when the context should stop
    async fn handle_batch(&mut self, mut queue: VecDeque<ScanCommand>) -> bool {
        let mut scan_replies = Vec::new();
        let mut scan_requested = false;
        let mut others = Vec::new();
        while let Some(command) = queue.pop_front() {
            match command {
                ScanCommand::Scan { reply } => {
                    scan_requested = true;
                    scan_replies.extend(reply);
                }
                other => others.push(other),
            }
        }

        if scan_requested {
            let Ok(scan_id) = self.scan().await else {
                return false;
            };
            for reply in scan_replies {
                let _ = reply.send(scan_id);
            }
        }

        for command in others {
            match command {
                ScanCommand::Select { selector, reply } => {
                    let _ = reply.send(self.select(selector));
                }
                ScanCommand::Highlighted { reply } => {
                    let _ = reply.send(self.highlighted.as_ref().map(|(_, s)| s.clone()));
                }
                ScanCommand::Shutdown => return false,
                ScanCommand::Scan { .. } => {}
            }
        }
        true
    }

    /// Run one harvest and publish it
    async fn scan(&mut self) -> Result<u64, ScanError> {
        let message = {
            let mut doc = self.document.write();
            if self.last_url.as_ref() != Some(doc.url()) {
                tracing::debug!(url = %doc.url(), "document address changed");
                self.registry.clear();
                self.highlighted = None;
                self.last_url = Some(doc.url().clone());
            }
            self.scans += 1;
            let imglist = harvest(&mut doc, &mut self.registry);
            tracing::debug!(scan_id = self.scans, resources = imglist.len(), "scan finished");
            ContentMessage::PutImgList {
                url: doc.url().to_string(),
                imglist,
                scan_id: self.scans,
            }
        };

        self.outbound.send(message).await.map_err(|_| {
            tracing::info!("scan consumer gone");
            ScanError::Closed
        })?;
        Ok(self.scans)
    }

    fn select(&mut self, selector: Selector) -> bool {
        let doc = self.document.read();
        match self.registry.locate(&doc, &selector) {
            Some(node) => {
                self.highlighted = Some((node, selector));
                true
            }
            None => {
                self.highlighted = None;
                false
            }
        }
    }
}
