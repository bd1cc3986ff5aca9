//! picpick Catalog
//!
//! The catalog side of a harvesting session:
//!
//! - [`CatalogState`] / [`ArchiveState`]: keyed records, selection, bad URIs,
//!   password and the archive lifecycle (`Idle -> Loading -> Ready`)
//! - [`apply`]: the pure reducer; every mutation is a [`CatalogEvent`]
//! - [`CatalogStore`]: single-writer actor owning the state, published to
//!   observers through a watch channel
//! - Archive coordinator: runs builds for requested archives and feeds the
//!   results back as events; only the latest request can land
//!
//! # Example
//!
//! ```rust
//! use picpick_catalog::{apply, CatalogEvent, CatalogState};
//!
//! let state = CatalogState::default();
//! let next = apply(state, CatalogEvent::SetAddress("https://example.com/".into()));
//! assert_eq!(next.state.url.as_deref(), Some("https://example.com/"));
//! assert!(next.released.is_empty());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod coordinator;
mod error;
mod event;
mod reducer;
mod state;
mod store;

pub use error::CatalogError;
pub use event::CatalogEvent;
pub use reducer::{apply, Transition};
pub use state::{ArchiveState, CatalogState};
pub use store::{ArchiveReceipt, ArchiveTicket, CatalogHandle, CatalogStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
