//! `data:` URI decoding (RFC 2397)

use crate::error::FetchError;
use crate::fetch::Fetched;
use base64::Engine as _;

const DATA_URL_PREFIX: &str = "data:";
const DEFAULT_MEDIA_TYPE: &str = "text/plain;charset=US-ASCII";

/// Decode a `data:` URI into bytes and its declared content type
///
/// # Errors
/// Returns `FetchError::InvalidDataUrl` for a missing prefix or comma, bad
/// base64, or broken percent escapes
pub fn decode_data_url(uri: &str) -> Result<Fetched, FetchError> {
    let rest = uri
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or_else(|| FetchError::InvalidDataUrl("missing data: prefix".to_string()))?;
    let (metadata, data) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::InvalidDataUrl("missing comma".to_string()))?;

    let mut parts = metadata.split(';');
    let media_type = parts.next().unwrap_or("").trim();
    let mut is_base64 = false;
    let mut params = Vec::new();
    for param in parts.map(str::trim).filter(|p| !p.is_empty()) {
        if param.eq_ignore_ascii_case("base64") {
            is_base64 = true;
        } else {
            params.push(param);
        }
    }

    let content_type = if media_type.is_empty() {
        DEFAULT_MEDIA_TYPE.to_string()
    } else if params.is_empty() {
        media_type.to_string()
    } else {
        format!("{media_type};{}", params.join(";"))
    };

    let bytes = if is_base64 {
        let cleaned: Vec<u8> = data.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| FetchError::InvalidDataUrl(format!("invalid base64: {e}")))?
    } else {
        percent_decode(data)?
    };

    Ok(Fetched {
        bytes,
        content_type: Some(content_type),
    })
}

/// Percent-decode without treating `+` specially
fn percent_decode(input: &str) -> Result<Vec<u8>, FetchError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|pair| std::str::from_utf8(pair).ok())
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
            .ok_or_else(|| FetchError::InvalidDataUrl("invalid percent-escape".to_string()))?;
        out.push(hex);
        i += 3;
    }
    Ok(out)
}
