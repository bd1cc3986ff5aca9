//! Resource records and payloads
//!
//! A [`ResourceRecord`] is created by the extractor without a payload. The
//! ingestion step fills [`Payload`] in before the record reaches the
//! catalog; the archive pipeline fills it for any record still lacking one.

use crate::key::{ResourceKey, Selector};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Records of one scan, keyed by resolved URI
pub type ImgList = IndexMap<ResourceKey, ResourceRecord>;

/// Fetched bytes plus the content type the source declared for them
///
/// Cheap to clone; the bytes are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    bytes: Arc<[u8]>,
    declared_type: Option<String>,
}

impl Payload {
    /// Create a payload from bytes and an optional declared content type
    #[inline]
    #[must_use]
    pub fn new(bytes: impl Into<Arc<[u8]>>, declared_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            declared_type,
        }
    }

    /// Payload bytes
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Content type declared by the source (HTTP header, data URI media type)
    #[inline]
    #[must_use]
    pub fn declared_type(&self) -> Option<&str> {
        self.declared_type.as_deref()
    }

    /// Byte length
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One discovered image resource
///
/// The payload never crosses the wire: serialization skips it, so the
/// serialized form is the record-without-payload of the scan messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Resolved absolute URI, the catalog key
    pub uri: ResourceKey,
    /// Fetched content, absent until resolved
    #[serde(skip)]
    pub payload: Option<Payload>,
    /// Payload size in bytes, absent until known
    pub filesize: Option<u64>,
    /// Display filename (user-editable)
    pub filename: String,
    /// Selector of the DOM node the resource was found on
    pub selector: Selector,
    /// Cached ancestor-chain description plus source suffix
    pub treeinfo: String,
}

impl ResourceRecord {
    /// Create a payload-less record as produced by a scan
    #[must_use]
    pub fn new(
        uri: ResourceKey,
        filename: impl Into<String>,
        selector: Selector,
        treeinfo: impl Into<String>,
    ) -> Self {
        Self {
            uri,
            payload: None,
            filesize: None,
            filename: filename.into(),
            selector,
            treeinfo: treeinfo.into(),
        }
    }

    /// Attach a payload, recording its size
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.filesize = Some(payload.len() as u64);
        self.payload = Some(payload);
        self
    }

    /// Check if the payload has been fetched
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.payload.is_some()
    }
}
