//! picpick Harvesting
//!
//! Finds image resources in a live document and keeps node identities stable
//! across scans:
//!
//! - [`IdentityRegistry`]: marker-class handles for DOM nodes plus cached
//!   ancestor path descriptions
//! - [`extract`] / [`harvest`]: the four sub-scans (`<img>`, CSS backgrounds,
//!   inline `<svg>`, `<canvas>`), with recursion into same-origin frames
//! - [`ScanContext`]: the scanning task, answering on-demand scan requests,
//!   rescanning on an interval and publishing `putImgList` messages
//! - [`ContentMessage`]: the JSON message set exchanged with the catalog side
//!
//! # Example
//!
//! ```rust
//! use picpick_dom::Document;
//! use picpick_harvest::{harvest, IdentityRegistry};
//! use url::Url;
//!
//! let url = Url::parse("https://example.com/").unwrap();
//! let mut doc = Document::parse(r#"<img src="/cat.png">"#, url);
//! let mut registry = IdentityRegistry::default();
//!
//! let list = harvest(&mut doc, &mut registry);
//! let record = list.values().next().unwrap();
//! assert_eq!(record.filename, "cat.png");
//! assert!(record.treeinfo.ends_with(">img"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod context;
mod error;
mod extract;
mod identity;
mod message;

pub use context::{LiveDocument, ScanContext, ScanHandle};
pub use error::ScanError;
pub use extract::{extract, harvest, Candidate};
pub use identity::{IdentityRegistry, ResourceHandle, DEFAULT_MARKER_PREFIX};
pub use message::ContentMessage;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use picpick_dom::Document;
    use url::Url;

    #[test]
    fn img_and_background_yield_two_keys() {
        let url = Url::parse("https://example.com/gallery/").unwrap();
        let mut doc = Document::parse(
            r#"<img src="pic.png"><div style="background-image: url(bg.jpg)"></div>"#,
            url,
        );
        let mut registry = IdentityRegistry::default();
        let list = harvest(&mut doc, &mut registry);

        let names: Vec<_> = list.values().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, ["pic.png", "bg.jpg"]);
        let keys: Vec<_> = list.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            [
                "https://example.com/gallery/pic.png",
                "https://example.com/gallery/bg.jpg"
            ]
        );
    }
}
