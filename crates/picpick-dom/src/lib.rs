//! picpick Document Model
//!
//! A small, mutable DOM standing in for a live browser document:
//!
//! - [`Document`]: arena of nodes parsed from HTML, mutable by its host
//! - [`Element`]: tag, attributes and a class list that doubles as the
//!   marker surface for identity tracking
//! - [`CanvasBuffer`]: RGBA pixels behind a `<canvas>`, exportable as a PNG
//!   data URL unless tainted
//! - Sub-documents attached to `<iframe>` elements, guarded by an origin check
//! - Computed `background-image` from inline styles and embedded `<style>`
//!   sheets, parsed with `cssparser` and matched with `selectors`
//!
//! # Example
//!
//! ```rust
//! use picpick_dom::Document;
//! use url::Url;
//!
//! let url = Url::parse("https://example.com/gallery/").unwrap();
//! let doc = Document::parse(r#"<div style="background-image: url(bg.jpg)"></div>"#, url);
//! let div = doc.elements_by_tag("div")[0];
//! assert_eq!(
//!     doc.computed_background_image(div).as_deref(),
//!     Some(r#"url("https://example.com/gallery/bg.jpg")"#)
//! );
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod canvas;
mod document;
mod error;
mod serialize;
mod style;

pub use canvas::CanvasBuffer;
pub use document::{same_origin, Document, Element, NodeData, NodeId};
pub use error::DomError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
