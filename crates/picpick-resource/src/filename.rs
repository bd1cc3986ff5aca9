//! Filename heuristics
//!
//! Best-effort helpers, not a full URI grammar:
//! - [`infer_filename`]: final path segment of a URI, with a placeholder fallback
//! - [`ensure_extension`] / [`replace_extension`]: extension normalization
//! - [`sanitize_archive_name`]: escaping for names stored inside an archive
//! - [`disambiguate`]: unique names within one archive

use crate::kind::ImageKind;
use std::collections::HashSet;

/// Placeholder used when no filename can be derived from a URI
pub const FALLBACK_FILENAME: &str = "anyfile";

/// Filename given to inline `data:` resources
pub const DATA_URI_FILENAME: &str = "data-uri";

/// Characters that may not appear verbatim in archive entry names
pub const RESERVED_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Derive a display filename from a resolved URI
///
/// Takes the final path segment before any `?`, `#` or `;`. Data URIs map to
/// [`DATA_URI_FILENAME`]; URIs whose path ends in `/` (or has no path) map to
/// [`FALLBACK_FILENAME`].
#[must_use]
pub fn infer_filename(uri: &str) -> String {
    if uri.starts_with("data:") {
        return DATA_URI_FILENAME.to_string();
    }

    let without_tail = uri.split(['?', '#']).next().unwrap_or("");
    let after_scheme = without_tail
        .split_once("://")
        .map_or(without_tail, |(_, rest)| rest);

    // Authority alone is not a filename
    let Some((_, path)) = after_scheme.split_once('/') else {
        return FALLBACK_FILENAME.to_string();
    };

    let segment = path.rsplit('/').next().unwrap_or("");
    let segment = segment.split(';').next().unwrap_or("");
    if segment.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        segment.to_string()
    }
}

/// Append the kind's extension unless the name already carries it
#[must_use]
pub fn ensure_extension(filename: &str, kind: ImageKind) -> String {
    if kind.matches_filename(filename) {
        filename.to_string()
    } else {
        format!("{filename}{}", kind.extension())
    }
}

/// Replace the current extension (if any) with the kind's canonical one
#[must_use]
pub fn replace_extension(filename: &str, kind: ImageKind) -> String {
    if kind.matches_filename(filename) {
        return filename.to_string();
    }
    format!("{}{}", stem(filename), kind.extension())
}

/// Filename without a trailing short alphanumeric extension
#[must_use]
pub fn stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(dot) if dot > 0 => {
            let ext = &filename[dot + 1..];
            if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                &filename[..dot]
            } else {
                filename
            }
        }
        _ => filename,
    }
}

/// Percent-encode reserved characters for storage inside an archive
///
/// Each of `\ / : * ? " < > |` becomes `%` followed by its lowercase hex code.
#[must_use]
pub fn sanitize_archive_name(filename: &str) -> String {
    let mut out = String::with_capacity(filename.len());
    for c in filename.chars() {
        if RESERVED_CHARS.contains(&c) {
            out.push_str(&format!("%{:x}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Make `filename` unique against `taken`, recording the result
///
/// Collisions get ` (2)`, ` (3)`, ... inserted before the extension.
pub fn disambiguate(filename: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(filename.to_string()) {
        return filename.to_string();
    }
    let base = stem(filename);
    let ext = &filename[base.len()..];
    let mut n = 2usize;
    loop {
        let candidate = format!("{base} ({n}){ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
