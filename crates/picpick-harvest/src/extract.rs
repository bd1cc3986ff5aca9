//! Resource extraction
//!
//! Four sub-scans run in order over every attached element:
//! - `<img>` elements with a `src`
//! - computed `background-image` values, one candidate per `url(...)` body
//! - `<svg>` elements with visible children, serialized into a data URI
//! - `<canvas>` elements, exported as PNG data URIs (tainted ones skipped)
//!
//! [`harvest`] resolves candidates into records and follows same-origin
//! frames to any depth.

use crate::identity::{IdentityRegistry, ResourceHandle};
use base64::Engine as _;
use once_cell::sync::Lazy;
use picpick_dom::{Document, NodeId};
use picpick_resource::{filename, ImgList, ResourceKey, ResourceRecord, SourceKind};
use regex::Regex;
use url::Url;

/// Background URLs the scan keeps: data URIs and network or file addresses
static URI_SCHEME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:data:|(?:(?:https?|file):)?//)")
        .unwrap_or_else(|err| panic!("invalid uri scheme regex: {err}"))
});

/// One raw extraction result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// URI as found, before resolution
    pub raw_uri: String,
    /// Identity of the owning node
    pub handle: ResourceHandle,
    /// Ancestor path plus source suffix
    pub path: String,
    /// Which sub-scan produced it
    pub source: SourceKind,
}

/// Run the four sub-scans over one document (frames excluded)
pub fn extract(doc: &mut Document, registry: &mut IdentityRegistry) -> Vec<Candidate> {
    let mut out = Vec::new();
    scan_images(doc, registry, &mut out);
    scan_backgrounds(doc, registry, &mut out);
    scan_vectors(doc, registry, &mut out);
    scan_canvases(doc, registry, &mut out);
    out
}

/// Extract a document and its same-origin frames into an image list
///
/// Keys are resolved against the document each candidate came from. Within
/// one harvest the first occurrence of a key wins.
pub fn harvest(doc: &mut Document, registry: &mut IdentityRegistry) -> ImgList {
    let top = doc.url().clone();
    let mut list = ImgList::new();
    harvest_into(doc, &top, registry, &mut list);
    tracing::debug!(url = %top, resources = list.len(), "harvest complete");
    list
}

fn harvest_into(doc: &mut Document, top: &Url, registry: &mut IdentityRegistry, list: &mut ImgList) {
    let base = doc.url().clone();
    for candidate in extract(doc, registry) {
        let Some(key) = resolve(&candidate.raw_uri, &base) else {
            tracing::debug!(raw = %candidate.raw_uri, "unresolvable candidate skipped");
            continue;
        };
        if list.contains_key(&key) {
            continue;
        }
        let name = filename::infer_filename(key.as_str());
        let record = ResourceRecord::new(key.clone(), name, candidate.handle.selector().clone(), candidate.path);
        list.insert(key, record);
    }

    for frame in doc.frame_ids() {
        match doc.frame_document_mut(frame, top) {
            Ok(Some(child)) => harvest_into(child, top, registry, list),
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "frame skipped"),
        }
    }
}

/// Resolve a raw URI to a catalog key; data URIs pass through untouched
///
/// An empty reference resolves to the document itself.
fn resolve(raw: &str, base: &Url) -> Option<ResourceKey> {
    let raw = raw.trim();
    if raw.starts_with("data:") {
        return Some(ResourceKey::new(raw));
    }
    base.join(raw).ok().map(|url| ResourceKey::new(String::from(url)))
}

fn push(
    doc: &mut Document,
    registry: &mut IdentityRegistry,
    node: NodeId,
    source: SourceKind,
    raw_uri: String,
    out: &mut Vec<Candidate>,
) {
    let (handle, _) = registry.identify(doc, node);
    let path = registry.describe(&handle, doc, node, source);
    out.push(Candidate {
        raw_uri,
        handle,
        path,
        source,
    });
}

fn scan_images(doc: &mut Document, registry: &mut IdentityRegistry, out: &mut Vec<Candidate>) {
    for node in doc.elements_by_tag("img") {
        let Some(src) = doc.element(node).and_then(|el| el.attr("src")).map(str::to_string) else {
            continue;
        };
        push(doc, registry, node, SourceKind::Image, src, out);
    }
}

fn scan_backgrounds(doc: &mut Document, registry: &mut IdentityRegistry, out: &mut Vec<Candidate>) {
    for node in doc.elements() {
        for url in doc.background_image_urls(node) {
            if URI_SCHEME.is_match(&url) {
                push(doc, registry, node, SourceKind::Css, url, out);
            }
        }
    }
}

fn scan_vectors(doc: &mut Document, registry: &mut IdentityRegistry, out: &mut Vec<Candidate>) {
    for node in doc.elements_by_tag("svg") {
        let visible = doc
            .element_children(node)
            .into_iter()
            .any(|child| doc.element(child).is_some_and(|el| el.name() != "defs"));
        if !visible {
            continue;
        }
        let markup = doc.serialize(node, &|class| !registry.is_marker(class));
        let encoded = base64::engine::general_purpose::STANDARD.encode(markup.as_bytes());
        push(
            doc,
            registry,
            node,
            SourceKind::Svg,
            format!("data:image/svg+xml;base64,{encoded}"),
            out,
        );
    }
}

fn scan_canvases(doc: &mut Document, registry: &mut IdentityRegistry, out: &mut Vec<Candidate>) {
    for node in doc.elements_by_tag("canvas") {
        match doc.export_canvas(node) {
            Ok(data_url) => push(doc, registry, node, SourceKind::Canvas, data_url, out),
            Err(e) => tracing::debug!(error = %e, "canvas skipped"),
        }
    }
}
