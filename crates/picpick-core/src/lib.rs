//! picpick Core
//!
//! Wires the harvesting, catalog and archive crates into a running session:
//!
//! - [`HarvestConfig`]: TOML-backed settings with defaults for every key
//! - [`load_document`]: page and same-origin frame loading
//! - [`Ingestor`]: turns scan messages into catalog events, fetching
//!   payloads on the way
//! - [`Session`]: starts the scanning, ingestion and catalog tasks and
//!   exposes refresh, selection and archive building
//!
//! # Example
//!
//! ```rust
//! use picpick_core::HarvestConfig;
//! use std::time::Duration;
//!
//! let config = HarvestConfig::from_toml_str("scan_interval_ms = 1000").unwrap();
//! assert_eq!(config.scan_interval(), Duration::from_secs(1));
//! assert_eq!(config.archive.file_name(), "generated_zip_file.zip");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod error;
mod ingest;
mod loader;
mod session;

pub use config::{ArchiveConfig, FetchConfig, HarvestConfig};
pub use error::{ConfigError, SessionError};
pub use ingest::Ingestor;
pub use loader::{load_document, resolve_source};
pub use session::Session;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
