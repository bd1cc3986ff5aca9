//! Catalog events

use chrono::{DateTime, Utc};
use picpick_archive::OutputHandle;
use picpick_resource::{ResourceKey, ResourceRecord};

/// Every way the catalog state can change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    /// Track a document address; a different address resets the catalog
    SetAddress(String),
    /// Merge one scan's records, first-seen wins
    AddRecords(Vec<ResourceRecord>),
    /// Change a record's display filename
    RenameRecord { key: ResourceKey, filename: String },
    /// Record keys as unresolvable
    MarkBadUris(Vec<ResourceKey>),
    /// Replace the selection
    SetSelection(Vec<ResourceRecord>),
    SetPassword(String),
    /// Start archive request `seq`
    RequestArchive { seq: u64 },
    /// Build for request `seq` finished
    ArchiveReady {
        seq: u64,
        output: OutputHandle,
        generated: DateTime<Utc>,
    },
    /// Build for request `seq` failed
    ArchiveAborted { seq: u64 },
    /// Drop the held archive
    ClearArchiveOutput,
}

impl CatalogEvent {
    /// Short name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetAddress(_) => "set-address",
            Self::AddRecords(_) => "add-records",
            Self::RenameRecord { .. } => "rename-record",
            Self::MarkBadUris(_) => "mark-bad-uris",
            Self::SetSelection(_) => "set-selection",
            Self::SetPassword(_) => "set-password",
            Self::RequestArchive { .. } => "request-archive",
            Self::ArchiveReady { .. } => "archive-ready",
            Self::ArchiveAborted { .. } => "archive-aborted",
            Self::ClearArchiveOutput => "clear-archive-output",
        }
    }
}
