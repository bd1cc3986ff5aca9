//! Arena-backed document tree
//!
//! Nodes live in a `Vec` and refer to each other by [`NodeId`]. Removing a
//! node only detaches it from its parent, so ids stay valid for the life of
//! the document; traversals start at the root and never visit detached
//! subtrees.

use crate::canvas::CanvasBuffer;
use crate::error::DomError;
use crate::serialize;
use crate::style::{self, Stylesheet};
use std::collections::HashMap;
use url::Url;

/// Default canvas dimensions when `width`/`height` attributes are absent
const DEFAULT_CANVAS_SIZE: (u32, u32) = (300, 150);

/// Upper bound for canvas dimensions taken from attributes
const MAX_CANVAS_DIMENSION: u32 = 8192;

/// Index of a node inside its [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Node payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// The document root
    Document,
    /// An element
    Element(Element),
    /// Character data
    Text(String),
    /// Comment
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// An element: tag name, attributes and class list
///
/// The class list is kept apart from the other attributes because it is the
/// surface identity markers are attached to. A sealed element refuses new
/// classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    classes: Vec<String>,
    sealed: bool,
}

impl Element {
    /// Create an element with a (lowercased) tag name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            classes: Vec::new(),
            sealed: false,
        }
    }

    /// Builder: set an attribute (`class` is split into the class list)
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder: add a class
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    fn from_parsed(parsed: &scraper::node::Element) -> Self {
        let mut element = Self::new(parsed.name());
        for (name, value) in parsed.attrs() {
            element.set_attr(name, value);
        }
        element
    }

    /// Lowercased tag name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value (`class` is served from the class list)
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Attributes other than `class`, in source order
    #[inline]
    #[must_use]
    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    /// Set or replace an attribute
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if name.eq_ignore_ascii_case("class") {
            self.classes = value.split_whitespace().map(str::to_string).collect();
            return;
        }
        match self.attrs.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    /// `id` attribute, empty when absent
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        self.attr("id").unwrap_or("")
    }

    /// Class list in order
    #[inline]
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Check for a class
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Check whether new classes can be attached
    #[inline]
    #[must_use]
    pub fn is_markable(&self) -> bool {
        !self.sealed
    }

    /// Attach a class; returns `false` for sealed elements
    pub(crate) fn add_class(&mut self, class: impl Into<String>) -> bool {
        if self.sealed {
            return false;
        }
        let class = class.into();
        if !self.has_class(&class) {
            self.classes.push(class);
        }
        true
    }
}

/// A parsed document
#[derive(Debug, Clone)]
pub struct Document {
    url: Url,
    nodes: Vec<Node>,
    stylesheet: Stylesheet,
    canvases: HashMap<NodeId, CanvasBuffer>,
    frames: HashMap<NodeId, Box<Document>>,
}

impl Document {
    /// Create an empty document at `url`
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
            stylesheet: Stylesheet::default(),
            canvases: HashMap::new(),
            frames: HashMap::new(),
        }
    }

    /// Parse HTML into a document at `url`
    ///
    /// Embedded `<style>` sheets are collected and `<iframe srcdoc>` contents
    /// are parsed as same-origin sub-documents.
    #[must_use]
    pub fn parse(html: &str, url: Url) -> Self {
        let parsed = scraper::Html::parse_document(html);
        let mut doc = Self::new(url);
        let mut ids = HashMap::new();

        for node in parsed.tree.root().descendants() {
            let data = match node.value() {
                scraper::Node::Document | scraper::Node::Fragment => {
                    ids.insert(node.id(), doc.root());
                    continue;
                }
                scraper::Node::Element(element) => NodeData::Element(Element::from_parsed(element)),
                scraper::Node::Text(text) => NodeData::Text(text.to_string()),
                scraper::Node::Comment(comment) => NodeData::Comment(comment.to_string()),
                _ => continue,
            };
            let Some(parent) = node.parent().and_then(|p| ids.get(&p.id()).copied()) else {
                continue;
            };
            let id = doc.push(Some(parent), data);
            ids.insert(node.id(), id);
        }

        for style_node in doc.elements_by_tag("style") {
            let css = doc.text_content(style_node);
            doc.stylesheet.extend(&css);
        }

        for frame in doc.frame_ids() {
            let srcdoc = doc
                .element(frame)
                .and_then(|el| el.attr("srcdoc"))
                .map(str::to_string);
            if let Some(srcdoc) = srcdoc {
                let child = Self::parse(&srcdoc, doc.url.clone());
                doc.frames.insert(frame, Box::new(child));
            }
        }

        tracing::debug!(url = %doc.url, nodes = doc.nodes.len(), "parsed document");
        doc
    }

    fn push(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            data,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    /// Document address
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Change the document address (navigation)
    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    /// Root node
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Node payload
    #[must_use]
    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).map(|n| &n.data)
    }

    /// Element at `id`, if it is one
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.data(id)? {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Mutable element at `id`, if it is one
    #[must_use]
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Child node ids
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map_or(&[], |n| n.children.as_slice())
    }

    /// Element children only
    #[must_use]
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
            .collect()
    }

    /// Nearest ancestor that is an element
    #[must_use]
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get(id.0)?.parent?;
        self.element(parent).map(|_| parent)
    }

    /// Check whether the node is reachable from the root
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root() {
                return true;
            }
            current = self.nodes.get(node.0).and_then(|n| n.parent);
        }
        false
    }

    /// All attached elements in document order
    #[must_use]
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            if self.element(id).is_some() {
                out.push(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Attached elements with the given tag name (case-insensitive)
    #[must_use]
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|&id| self.element(id).is_some_and(|el| el.name().eq_ignore_ascii_case(tag)))
            .collect()
    }

    /// First attached element carrying `class`
    #[must_use]
    pub fn find_by_class(&self, class: &str) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|&id| self.element(id).is_some_and(|el| el.has_class(class)))
    }

    /// Concatenated text of all descendant text nodes
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(NodeData::Text(text)) = self.data(node) {
                out.push_str(text);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Append a new element under `parent`
    ///
    /// # Errors
    /// Returns error if `parent` is not part of this document
    pub fn append_element(&mut self, parent: NodeId, element: Element) -> Result<NodeId, DomError> {
        if parent.0 >= self.nodes.len() {
            return Err(DomError::UnknownNode(parent));
        }
        Ok(self.push(Some(parent), NodeData::Element(element)))
    }

    /// Append a text node under `parent`
    ///
    /// # Errors
    /// Returns error if `parent` is not part of this document
    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> Result<NodeId, DomError> {
        if parent.0 >= self.nodes.len() {
            return Err(DomError::UnknownNode(parent));
        }
        Ok(self.push(Some(parent), NodeData::Text(text.into())))
    }

    /// Detach a node (and its subtree) from the tree
    ///
    /// # Errors
    /// Returns error if `id` is not part of this document
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        let parent = self
            .nodes
            .get_mut(id.0)
            .ok_or(DomError::UnknownNode(id))?
            .parent
            .take();
        if let Some(parent) = parent {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
        Ok(())
    }

    /// Replace `old` with a fresh element in the same position
    ///
    /// # Errors
    /// Returns error if `old` is unknown or detached
    pub fn replace_element(&mut self, old: NodeId, element: Element) -> Result<NodeId, DomError> {
        let parent = self
            .nodes
            .get(old.0)
            .ok_or(DomError::UnknownNode(old))?
            .parent
            .ok_or(DomError::UnknownNode(old))?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            data: NodeData::Element(element),
        });
        let siblings = &mut self.nodes[parent.0].children;
        if let Some(slot) = siblings.iter_mut().find(|c| **c == old) {
            *slot = id;
        }
        self.nodes[old.0].parent = None;
        Ok(id)
    }

    /// Forbid further markers on an element
    ///
    /// # Errors
    /// Returns error if `id` is not an element
    pub fn seal(&mut self, id: NodeId) -> Result<(), DomError> {
        let element = self.element_mut(id).ok_or(DomError::UnknownNode(id))?;
        element.sealed = true;
        Ok(())
    }

    /// Attach a class to an element
    ///
    /// # Errors
    /// - `DomError::UnknownNode` if `id` is not an element
    /// - `DomError::Sealed` if the element refuses new classes
    pub fn add_class(&mut self, id: NodeId, class: impl Into<String>) -> Result<(), DomError> {
        let element = self.element_mut(id).ok_or(DomError::UnknownNode(id))?;
        if element.add_class(class) {
            Ok(())
        } else {
            Err(DomError::Sealed(id))
        }
    }

    /// Add rules to the embedded stylesheet
    pub fn add_stylesheet(&mut self, css: &str) {
        self.stylesheet.extend(css);
    }

    /// Computed `background-image` of an element
    ///
    /// Cascades embedded sheets and the inline `style` attribute for the
    /// `background-image` and `background` properties. `url(...)` tokens are
    /// absolutized against the document address. Returns `None` when the
    /// value is absent or `none`.
    #[must_use]
    pub fn computed_background_image(&self, id: NodeId) -> Option<String> {
        let (property, value) = style::cascade(self, id, &self.stylesheet)?;
        let value = if property == "background" {
            let urls = style::url_bodies(&value);
            if urls.is_empty() {
                return None;
            }
            urls.iter().map(|url| style::quoted_url(url)).collect::<Vec<_>>().join(", ")
        } else {
            value
        };
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            return None;
        }
        Some(style::absolutize_urls(&value, &self.url))
    }

    /// Absolute addresses named by the computed `background-image`
    ///
    /// Bodies are unescaped, so quoted `data:` URIs keep their whitespace.
    #[must_use]
    pub fn background_image_urls(&self, id: NodeId) -> Vec<String> {
        self.computed_background_image(id)
            .map(|value| style::url_bodies(&value))
            .unwrap_or_default()
    }

    /// Serialize an element subtree as XML markup
    ///
    /// Classes rejected by `keep_class` are left out of the output.
    #[must_use]
    pub fn serialize(&self, id: NodeId, keep_class: &dyn Fn(&str) -> bool) -> String {
        serialize::subtree(self, id, keep_class)
    }

    /// Pixel buffer behind a `<canvas>`, created on first access
    ///
    /// # Errors
    /// Returns error if `id` is not a canvas element
    pub fn canvas_mut(&mut self, id: NodeId) -> Result<&mut CanvasBuffer, DomError> {
        let (width, height) = self.canvas_size(id)?;
        Ok(self
            .canvases
            .entry(id)
            .or_insert_with(|| CanvasBuffer::new(width, height)))
    }

    /// Export a canvas as a PNG data URL
    ///
    /// # Errors
    /// - `DomError::TaintedCanvas` if the canvas holds cross-origin pixels
    /// - `DomError::WrongElement` if `id` is not a canvas
    pub fn export_canvas(&self, id: NodeId) -> Result<String, DomError> {
        match self.canvases.get(&id) {
            Some(buffer) if buffer.is_tainted() => Err(DomError::TaintedCanvas(id)),
            Some(buffer) => buffer.to_data_url(),
            None => {
                let (width, height) = self.canvas_size(id)?;
                CanvasBuffer::new(width, height).to_data_url()
            }
        }
    }

    fn canvas_size(&self, id: NodeId) -> Result<(u32, u32), DomError> {
        let element = self
            .element(id)
            .filter(|el| el.name() == "canvas")
            .ok_or(DomError::WrongElement {
                node: id,
                expected: "canvas",
            })?;
        let dim = |name: &str, default: u32| {
            element
                .attr(name)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .map_or(default, |v| v.min(MAX_CANVAS_DIMENSION))
        };
        Ok((dim("width", DEFAULT_CANVAS_SIZE.0), dim("height", DEFAULT_CANVAS_SIZE.1)))
    }

    /// Attached `<iframe>` and `<frame>` elements in document order
    #[must_use]
    pub fn frame_ids(&self) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|&id| self.element(id).is_some_and(|el| matches!(el.name(), "iframe" | "frame")))
            .collect()
    }

    /// Attach a loaded sub-document to a frame element
    ///
    /// # Errors
    /// Returns error if `frame` is not an `<iframe>`/`<frame>`
    pub fn attach_frame(&mut self, frame: NodeId, document: Document) -> Result<(), DomError> {
        let is_frame = self
            .element(frame)
            .is_some_and(|el| matches!(el.name(), "iframe" | "frame"));
        if !is_frame {
            return Err(DomError::WrongElement {
                node: frame,
                expected: "iframe",
            });
        }
        self.frames.insert(frame, Box::new(document));
        Ok(())
    }

    /// Sub-document of a frame as seen from a script running at `accessor`
    ///
    /// Returns `Ok(None)` when nothing is loaded in the frame.
    ///
    /// # Errors
    /// Returns `DomError::CrossOrigin` when the frame's origin differs
    pub fn frame_document_mut(
        &mut self,
        frame: NodeId,
        accessor: &Url,
    ) -> Result<Option<&mut Document>, DomError> {
        let Some(child) = self.frames.get_mut(&frame) else {
            return Ok(None);
        };
        if !same_origin(&child.url, accessor) {
            return Err(DomError::CrossOrigin {
                frame: child.url.to_string(),
                accessor: accessor.to_string(),
            });
        }
        Ok(Some(child.as_mut()))
    }

    /// Read-only counterpart of [`Document::frame_document_mut`]
    ///
    /// # Errors
    /// Returns `DomError::CrossOrigin` when the frame's origin differs
    pub fn frame_document(&self, frame: NodeId, accessor: &Url) -> Result<Option<&Document>, DomError> {
        let Some(child) = self.frames.get(&frame) else {
            return Ok(None);
        };
        if !same_origin(&child.url, accessor) {
            return Err(DomError::CrossOrigin {
                frame: child.url.to_string(),
                accessor: accessor.to_string(),
            });
        }
        Ok(Some(child.as_ref()))
    }
}

/// Origin comparison; local files are treated as one origin
#[must_use]
pub fn same_origin(a: &Url, b: &Url) -> bool {
    if a.scheme() == "file" && b.scheme() == "file" {
        return true;
    }
    a.origin() == b.origin()
}
