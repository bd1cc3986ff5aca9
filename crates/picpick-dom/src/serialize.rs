//! XML serialization of element subtrees

use crate::document::{Document, NodeData, NodeId};
use std::fmt::Write;

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Serialize `root` and its descendants
///
/// An `<svg>` root gains the SVG namespace when it does not declare one, so
/// the output stands alone as an SVG file.
pub(crate) fn subtree(doc: &Document, root: NodeId, keep_class: &dyn Fn(&str) -> bool) -> String {
    let mut out = String::new();
    write_node(doc, root, keep_class, true, &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, keep_class: &dyn Fn(&str) -> bool, is_root: bool, out: &mut String) {
    match doc.data(id) {
        Some(NodeData::Element(element)) => {
            out.push('<');
            out.push_str(element.name());

            let classes: Vec<&str> = element
                .classes()
                .iter()
                .map(String::as_str)
                .filter(|c| keep_class(c))
                .collect();
            if !classes.is_empty() {
                let _ = write!(out, " class=\"{}\"", escape(&classes.join(" "), true));
            }
            for (name, value) in element.attrs() {
                let _ = write!(out, " {name}=\"{}\"", escape(value, true));
            }
            if is_root && element.name() == "svg" && element.attr("xmlns").is_none() {
                let _ = write!(out, " xmlns=\"{SVG_NAMESPACE}\"");
            }

            let children = doc.children(id);
            if children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for &child in children {
                write_node(doc, child, keep_class, false, out);
            }
            let _ = write!(out, "</{}>", element.name());
        }
        Some(NodeData::Text(text)) => out.push_str(&escape(text, false)),
        Some(NodeData::Comment(comment)) => {
            let _ = write!(out, "<!--{comment}-->");
        }
        Some(NodeData::Document) => {
            for &child in doc.children(id) {
                write_node(doc, child, keep_class, false, out);
            }
        }
        None => {}
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
