//! Error types for the archive pipeline

use picpick_resource::ResourceKey;

/// Payload fetch errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// URI scheme has no fetch strategy
    #[error("unsupported scheme in {0}")]
    UnsupportedScheme(String),

    /// URI could not be parsed
    #[error("invalid uri {0}")]
    InvalidUri(String),

    /// Server answered with a non-success status
    #[error("{uri} answered {status}")]
    Status { uri: String, status: u16 },

    /// Network failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local file could not be read
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed `data:` URI
    #[error("invalid data url: {0}")]
    InvalidDataUrl(String),
}

/// Failure to turn a record into a classified payload
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    /// Payload could not be fetched
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Neither the bytes nor the declared type name an image kind
    #[error("unclassifiable payload for {0}")]
    Unclassifiable(ResourceKey),
}

/// Image conversion errors
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Source bytes could not be decoded
    #[error("decode failed: {0}")]
    Decode(String),

    /// Raster could not be encoded into the target format
    #[error("encode failed: {0}")]
    Encode(String),

    /// Vector source could not be rasterized
    #[error("svg rasterization failed: {0}")]
    Svg(String),

    /// Blocking worker died
    #[error("conversion worker failed: {0}")]
    Worker(String),
}

/// Zip packing errors
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// Zip writer failure
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Write failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking worker died
    #[error("packing worker failed: {0}")]
    Worker(String),
}

/// Whole-build failures
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Selection was empty, or every record failed
    #[error("nothing selected ({} bad, {} excluded)", .bad_uris.len(), .excluded.len())]
    NothingSelected {
        bad_uris: Vec<ResourceKey>,
        excluded: Vec<ResourceKey>,
    },

    /// Packing failed
    #[error("packing failed: {0}")]
    Pack(#[from] PackError),

    /// The build panicked before producing a result
    #[error("build aborted: {0}")]
    Aborted(String),
}
