//! Node identity registry
//!
//! A node's identity is a marker class (`<prefix><uuid>`) stored on the node
//! itself, so it survives any number of rescans and is lost only when the
//! node is replaced. The registry also caches each handle's ancestor path
//! description the first time it is computed.

use picpick_dom::{Document, DomError, NodeId};
use picpick_resource::{Selector, SourceKind};
use std::collections::HashMap;
use uuid::Uuid;

/// Reserved class prefix for identity markers
pub const DEFAULT_MARKER_PREFIX: &str = "picpickdl";

/// Handle for one DOM node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    selector: Selector,
    memoized: bool,
}

impl ResourceHandle {
    /// Class selector for the node
    #[inline]
    #[must_use]
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Check whether the handle is attached to its node
    ///
    /// Synthetic handles for unmarkable nodes are not, and a later scan will
    /// issue a different one.
    #[inline]
    #[must_use]
    pub fn is_memoized(&self) -> bool {
        self.memoized
    }
}

/// Assigns and remembers node identities
#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    prefix: String,
    paths: HashMap<Selector, String>,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_PREFIX)
    }
}

impl IdentityRegistry {
    /// Create a registry using `prefix` for marker classes
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            paths: HashMap::new(),
        }
    }

    /// Marker class prefix
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Check whether a class name is an identity marker
    #[must_use]
    pub fn is_marker(&self, class: &str) -> bool {
        class.len() > self.prefix.len() && class.starts_with(&self.prefix)
    }

    /// Number of cached path descriptions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if no path descriptions are cached
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Drop cached descriptions (the document was replaced)
    pub fn clear(&mut self) {
        self.paths.clear();
    }

    /// Get or assign the handle of a node
    ///
    /// Returns the handle and whether it was minted by this call. At most one
    /// marker is added; existing classes are never removed. Nodes that refuse
    /// markers get a fresh synthetic handle on every call.
    pub fn identify(&self, doc: &mut Document, node: NodeId) -> (ResourceHandle, bool) {
        if let Some(existing) = doc
            .element(node)
            .and_then(|el| el.classes().iter().find(|c| self.is_marker(c)))
        {
            let handle = ResourceHandle {
                selector: Selector::from_marker(existing),
                memoized: true,
            };
            return (handle, false);
        }

        let marker = self.mint();
        let memoized = match doc.add_class(node, marker.clone()) {
            Ok(()) => true,
            Err(DomError::Sealed(_) | DomError::UnknownNode(_)) => {
                tracing::debug!(?node, "node refuses markers, issuing synthetic handle");
                false
            }
            Err(e) => {
                tracing::warn!(?node, error = %e, "unexpected marker failure");
                false
            }
        };
        let handle = ResourceHandle {
            selector: Selector::from_marker(&marker),
            memoized,
        };
        (handle, true)
    }

    /// Path description of a node, suffixed with the extraction source
    ///
    /// The ancestor chain is walked only on the first call for a memoized
    /// handle; later calls reuse the cached text even if the tree changed.
    pub fn describe(
        &mut self,
        handle: &ResourceHandle,
        doc: &Document,
        node: NodeId,
        source: SourceKind,
    ) -> String {
        let base = match self.paths.get(&handle.selector) {
            Some(cached) => cached.clone(),
            None => {
                let path = self.ancestor_path(doc, node);
                if handle.memoized {
                    self.paths.insert(handle.selector.clone(), path.clone());
                }
                path
            }
        };
        format!("{base}>{}", source.tag())
    }

    /// Find the node carrying a previously issued selector
    #[must_use]
    pub fn locate(&self, doc: &Document, selector: &Selector) -> Option<NodeId> {
        if !self.is_marker(selector.marker()) {
            return None;
        }
        doc.find_by_class(selector.marker())
    }

    fn mint(&self) -> String {
        format!("{}{}", self.prefix, Uuid::new_v4().hyphenated())
    }

    /// `tag.cls1.cls2#id` per level, root first, joined by `>`
    fn ancestor_path(&self, doc: &Document, node: NodeId) -> String {
        let mut levels = Vec::new();
        let mut current = doc.element(node).map(|_| node);
        while let Some(id) = current {
            if let Some(element) = doc.element(id) {
                let mut level = element.name().to_ascii_lowercase();
                for class in element.classes().iter().filter(|c| !self.is_marker(c)) {
                    level.push('.');
                    level.push_str(class);
                }
                if !element.id().is_empty() {
                    level.push('#');
                    level.push_str(element.id());
                }
                levels.push(level);
            }
            current = doc.parent_element(id);
        }
        levels.reverse();
        levels.join(">")
    }
}
