//! Error types for picpick-core

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid source {0:?}: expected a path or an http(s) URL")]
    InvalidSource(String),

    #[error("failed to load document: {0}")]
    Load(#[from] picpick_archive::FetchError),

    #[error("scanning context: {0}")]
    Scan(#[from] picpick_harvest::ScanError),

    #[error("catalog: {0}")]
    Catalog(#[from] picpick_catalog::CatalogError),

    #[error("ingestion stopped")]
    IngestClosed,
}
