//! Keys and locators for harvested resources
//!
//! - [`ResourceKey`]: the catalog key (normalized absolute URI)
//! - [`Selector`]: class selector that finds a marked DOM node again
//! - [`SourceKind`]: which extraction pass produced a resource

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Normalized absolute URI identifying one resource
///
/// Data URIs are kept verbatim; everything else is the serialized form of a
/// URL resolved against the owning document's address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Wrap an already-resolved URI
    #[inline]
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Borrow the URI text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the key is an inline `data:` URI
    #[inline]
    #[must_use]
    pub fn is_data_uri(&self) -> bool {
        self.0.starts_with("data:")
    }

    /// Consume into the URI text
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for ResourceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // data URIs can be megabytes long
        match self.0.char_indices().nth(64) {
            Some((cut, _)) if self.is_data_uri() => write!(f, "{}...", &self.0[..cut]),
            _ => f.write_str(&self.0),
        }
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceKey {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for ResourceKey {
    fn from(uri: String) -> Self {
        Self::new(uri)
    }
}

/// CSS class selector for one marked DOM node
///
/// Always of the form `.` + marker class, e.g. `.picpickdl0f8c...`.
/// Deserialization rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector(String);

impl Selector {
    /// Build the selector for a marker class name
    #[inline]
    #[must_use]
    pub fn from_marker(marker: &str) -> Self {
        Self(format!(".{marker}"))
    }

    /// Parse a selector string, accepting only the single-class form
    #[must_use]
    pub fn parse(selector: &str) -> Option<Self> {
        let marker = selector.strip_prefix('.')?;
        let valid = !marker.is_empty()
            && marker
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| Self(selector.to_string()))
    }

    /// Marker class name (selector without the leading dot)
    #[inline]
    #[must_use]
    pub fn marker(&self) -> &str {
        self.0.strip_prefix('.').unwrap_or(&self.0)
    }

    /// Full selector text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Selector {
    type Error = SelectorError;

    fn try_from(selector: String) -> Result<Self, Self::Error> {
        Self::parse(&selector).ok_or(SelectorError(selector))
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.0
    }
}

/// Text that is not a single-class selector
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a single-class selector: {0:?}")]
pub struct SelectorError(pub String);

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extraction pass that produced a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// `<img src>`
    Image,
    /// Computed `background-image`
    Css,
    /// Inline `<svg>` markup
    Svg,
    /// `<canvas>` pixel buffer
    Canvas,
}

impl SourceKind {
    /// All kinds in extraction order
    pub const ALL: [SourceKind; 4] = [Self::Image, Self::Css, Self::Svg, Self::Canvas];

    /// Suffix appended to path descriptions
    #[inline]
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Image => "img",
            Self::Css => "css",
            Self::Svg => "svg",
            Self::Canvas => "canvas",
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_detects_data_uri() {
        assert!(ResourceKey::new("data:image/png;base64,AAAA").is_data_uri());
        assert!(!ResourceKey::new("https://example.com/a.png").is_data_uri());
    }

    #[test]
    fn key_display_truncates_long_data_uris() {
        let long = format!("data:image/png;base64,{}", "A".repeat(500));
        let shown = ResourceKey::new(long).to_string();
        assert!(shown.len() < 80);
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn selector_roundtrips_marker() {
        let selector = Selector::from_marker("picpickdl1234");
        assert_eq!(selector.as_str(), ".picpickdl1234");
        assert_eq!(selector.marker(), "picpickdl1234");
        assert_eq!(Selector::parse(".picpickdl1234"), Some(selector));
    }

    #[test]
    fn selector_rejects_compound_forms() {
        assert!(Selector::parse("div.a").is_none());
        assert!(Selector::parse(".a .b").is_none());
        assert!(Selector::parse(".").is_none());
    }

    #[test]
    fn selector_deserialization_is_validated() {
        let ok: Selector = serde_json::from_str(r#"".picpickdl1""#).unwrap();
        assert_eq!(ok.marker(), "picpickdl1");
        for bad in [r#""""#, r#"".""#, r#""img""#, r#"".a .b""#] {
            assert!(serde_json::from_str::<Selector>(bad).is_err(), "{bad} accepted");
        }
        assert_eq!(serde_json::to_string(&ok).unwrap(), r#"".picpickdl1""#);
    }

    #[test]
    fn source_kind_tags() {
        let tags: Vec<_> = SourceKind::ALL.iter().map(|k| k.tag()).collect();
        assert_eq!(tags, ["img", "css", "svg", "canvas"]);
    }
}
