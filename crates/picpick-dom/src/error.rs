//! Error types for the document model

use crate::document::NodeId;

/// Document model errors
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    /// Canvas holds cross-origin pixels and refuses export
    #[error("canvas {0:?} is tainted by cross-origin data")]
    TaintedCanvas(NodeId),

    /// Frame content belongs to another origin
    #[error("blocked access to cross-origin frame {frame} from {accessor}")]
    CrossOrigin { frame: String, accessor: String },

    /// Node is not an element of the expected kind
    #[error("node {node:?} is not a <{expected}> element")]
    WrongElement { node: NodeId, expected: &'static str },

    /// Node id does not belong to this document
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// Element's class list cannot be modified
    #[error("element {0:?} does not accept markers")]
    Sealed(NodeId),

    /// Canvas pixels could not be encoded
    #[error("canvas encoding failed: {0}")]
    CanvasEncode(String),
}
