//! picpick Resource Model
//!
//! Shared data model for harvested image resources.
//!
//! # Core Concepts
//!
//! - [`ResourceKey`]: Normalized absolute URI, the catalog key
//! - [`ResourceRecord`]: One discovered resource plus its (optional) payload
//! - [`Payload`]: Fetched bytes and their declared content type
//! - [`ImageKind`]: MIME-derived image classification and file extension
//! - [`Selector`]: Class selector bound to one marked DOM node
//! - [`ContentHash`]: Blake3 digest reported for built archives
//!
//! # Example
//!
//! ```rust
//! use picpick_resource::{filename, ImageKind, ResourceKey};
//!
//! let key = ResourceKey::new("https://example.com/img/pic.png?size=large");
//! assert_eq!(filename::infer_filename(key.as_str()), "pic.png");
//! assert_eq!(ImageKind::from_mime("image/jpeg"), Some(ImageKind::Jpeg));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod filename;
mod hash;
mod key;
mod kind;
mod record;

pub use hash::ContentHash;
pub use key::{ResourceKey, Selector, SelectorError, SourceKind};
pub use kind::ImageKind;
pub use record::{ImgList, Payload, ResourceRecord};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
