//! Catalog state

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use picpick_archive::OutputHandle;
use picpick_resource::{ImgList, ResourceKey, ResourceRecord};

/// Archive lifecycle
///
/// `Loading` and `Ready` carry the request sequence number they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ArchiveState {
    #[default]
    Idle,
    Loading {
        seq: u64,
    },
    Ready {
        seq: u64,
        output: OutputHandle,
        generated: DateTime<Utc>,
    },
}

impl ArchiveState {
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check whether request `seq` is the one in flight
    #[inline]
    #[must_use]
    pub fn is_loading(&self, seq: u64) -> bool {
        matches!(self, Self::Loading { seq: current } if *current == seq)
    }

    /// Output held by a `Ready` state
    #[inline]
    #[must_use]
    pub fn output(&self) -> Option<OutputHandle> {
        match self {
            Self::Ready { output, .. } => Some(*output),
            _ => None,
        }
    }
}

/// Everything the presentation layer observes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogState {
    /// Address of the tracked document
    pub url: Option<String>,
    /// Records by key, in discovery order
    pub items: ImgList,
    /// Records chosen for the archive, in order
    pub selection: Vec<ResourceRecord>,
    /// Keys known not to resolve; disjoint from `items`
    pub bad_uris: IndexSet<ResourceKey>,
    pub password: String,
    pub archive: ArchiveState,
    /// Sequence number of the latest archive request
    pub last_request: u64,
}

impl CatalogState {
    /// Check whether a key is in the catalog or the bad set
    #[must_use]
    pub fn knows(&self, key: &ResourceKey) -> bool {
        self.items.contains_key(key) || self.bad_uris.contains(key)
    }
}
