//! Zip packing
//!
//! Entries are deflated with a fixed 1980-01-01 timestamp, so the same input
//! always yields the same bytes when no password is set. A non-empty
//! password turns on WinZip AES-256 for every entry.

use crate::error::PackError;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod, DateTime, ZipWriter};

/// Archive name used when none is configured
pub const DEFAULT_ARCHIVE_NAME: &str = "generated_zip_file";

/// Packing options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackOptions {
    /// Entry password; empty means no encryption
    pub password: String,
    /// Deflate level, `None` for the library default
    pub compression_level: Option<i64>,
}

/// A packed archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArchive {
    pub bytes: Vec<u8>,
    /// Entry names in archive order
    pub entries: Vec<String>,
}

/// Write `(name, bytes)` pairs into one zip
///
/// Names are used as given; callers sanitize and deduplicate them.
///
/// # Errors
/// Returns error if the zip writer fails
pub fn pack<N, B>(files: &[(N, B)], options: &PackOptions) -> Result<PackedArchive, PackError>
where
    N: AsRef<str>,
    B: AsRef<[u8]>,
{
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let fixed_time = DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0).unwrap_or_default();
    let base = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(options.compression_level)
        .last_modified_time(fixed_time);

    let mut entries = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        let name = name.as_ref();
        if options.password.is_empty() {
            zip.start_file(name, base)?;
        } else {
            zip.start_file(name, base.with_aes_encryption(AesMode::Aes256, &options.password))?;
        }
        zip.write_all(bytes.as_ref())?;
        entries.push(name.to_string());
    }

    let bytes = zip.finish()?.into_inner();
    tracing::debug!(entries = entries.len(), size = bytes.len(), encrypted = !options.password.is_empty(), "archive packed");
    Ok(PackedArchive { bytes, entries })
}
