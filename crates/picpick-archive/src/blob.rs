//! In-memory store for generated archives

use dashmap::DashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Retrievable reference to a generated archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputHandle(Uuid);

impl OutputHandle {
    fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for OutputHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "blob:picpick/{}", self.0)
    }
}

/// Shared map from output handles to archive bytes
///
/// Clones share the same storage. Handles stay resolvable until revoked.
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    blobs: Arc<DashMap<OutputHandle, Arc<[u8]>>>,
}

impl BlobStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes under a fresh handle
    pub fn register(&self, bytes: impl Into<Arc<[u8]>>) -> OutputHandle {
        let handle = OutputHandle::mint();
        self.blobs.insert(handle, bytes.into());
        handle
    }

    /// Bytes behind a handle, if it has not been revoked
    #[must_use]
    pub fn get(&self, handle: &OutputHandle) -> Option<Arc<[u8]>> {
        self.blobs.get(handle).map(|entry| Arc::clone(entry.value()))
    }

    /// Release a handle; returns whether it was live
    pub fn revoke(&self, handle: &OutputHandle) -> bool {
        let live = self.blobs.remove(handle).is_some();
        if live {
            tracing::debug!(%handle, "output released");
        }
        live
    }

    /// Number of live handles
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Check if no handles are live
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_get_revoke() {
        let store = BlobStore::new();
        let handle = store.register(vec![1u8, 2, 3]);
        assert!(handle.to_string().starts_with("blob:picpick/"));
        assert_eq!(store.get(&handle).as_deref(), Some(&[1u8, 2, 3][..]));

        let shared = store.clone();
        assert!(shared.revoke(&handle));
        assert!(!store.revoke(&handle));
        assert!(store.get(&handle).is_none());
        assert!(store.is_empty());
    }
}
