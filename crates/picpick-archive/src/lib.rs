//! picpick Archive Pipeline
//!
//! Turns a selection of resource records into one zip:
//!
//! 1. **Acquire**: fetch missing payloads ([`Fetcher`]), classify them by
//!    magic bytes or declared type, normalize the filename extension
//! 2. **Convert** (optional): decode and re-encode into a [`TargetFormat`]
//! 3. **Name**: escape reserved characters and make names unique
//! 4. **Pack**: deflate, optionally AES-256 encrypt, register the bytes in a
//!    [`BlobStore`] and hand back an [`OutputHandle`]
//!
//! Records fail independently; unreachable or unclassifiable ones come back
//! as bad URIs, undecodable ones as exclusions.
//!
//! # Example
//!
//! ```rust
//! use picpick_archive::{sniff_kind, TargetFormat};
//! use picpick_resource::ImageKind;
//!
//! let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];
//! assert_eq!(sniff_kind(&png, None), Some(ImageKind::Png));
//! assert_eq!("webp".parse::<TargetFormat>().unwrap(), TargetFormat::Webp);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod blob;
mod convert;
mod data_url;
mod error;
mod fetch;
mod pack;
mod pipeline;
mod sniff;

pub use blob::{BlobStore, OutputHandle};
pub use convert::{convert, TargetFormat};
pub use data_url::decode_data_url;
pub use error::{AcquireError, ConvertError, FetchError, PackError, PipelineError};
pub use fetch::{FetchSettings, Fetched, Fetcher, NetFetcher};
pub use pack::{pack, PackOptions, PackedArchive, DEFAULT_ARCHIVE_NAME};
pub use pipeline::{acquire, ArchiveBuilder, ArchivePipeline, BuildOutcome, BuildRequest};
pub use sniff::sniff_kind;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
