//! Error types for the catalog

/// Catalog errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Archive requested with an empty selection, or every record failed
    #[error("nothing selected")]
    NothingSelected,

    /// A newer request or a selection change made this result stale
    #[error("archive request superseded")]
    Superseded,

    /// The build failed as a whole
    #[error("archive pipeline failed: {0}")]
    Pipeline(String),

    /// The store has stopped
    #[error("catalog store is closed")]
    Closed,
}
