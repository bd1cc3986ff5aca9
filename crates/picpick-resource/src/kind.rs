//! MIME-derived image classification
//!
//! Maps content types to canonical file extensions. Classification from raw
//! bytes lives in the archive crate, which owns the image codecs.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Image content kinds the pipeline recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
    Ico,
    Svg,
    Avif,
    Tiff,
}

impl ImageKind {
    /// Canonical MIME type
    #[inline]
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
            Self::Ico => "image/x-icon",
            Self::Svg => "image/svg+xml",
            Self::Avif => "image/avif",
            Self::Tiff => "image/tiff",
        }
    }

    /// Canonical extension, including the leading dot
    #[inline]
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => ".png",
            Self::Jpeg => ".jpg",
            Self::Gif => ".gif",
            Self::Webp => ".webp",
            Self::Bmp => ".bmp",
            Self::Ico => ".ico",
            Self::Svg => ".svg",
            Self::Avif => ".avif",
            Self::Tiff => ".tiff",
        }
    }

    /// Extensions accepted as already matching this kind
    #[must_use]
    pub const fn accepted_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Jpeg => &[".jpg", ".jpeg", ".jpe", ".jfif"],
            Self::Tiff => &[".tiff", ".tif"],
            Self::Png => &[".png"],
            Self::Gif => &[".gif"],
            Self::Webp => &[".webp"],
            Self::Bmp => &[".bmp"],
            Self::Ico => &[".ico"],
            Self::Svg => &[".svg"],
            Self::Avif => &[".avif"],
        }
    }

    /// Classify a declared content type
    ///
    /// Parameters (`; charset=...`) and case are ignored. Returns `None` for
    /// anything that is not a recognized image type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let kind = match essence.as_str() {
            "image/png" | "image/apng" => Self::Png,
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Self::Jpeg,
            "image/gif" => Self::Gif,
            "image/webp" => Self::Webp,
            "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => Self::Bmp,
            "image/x-icon" | "image/vnd.microsoft.icon" => Self::Ico,
            "image/svg+xml" => Self::Svg,
            "image/avif" => Self::Avif,
            "image/tiff" => Self::Tiff,
            _ => return None,
        };
        Some(kind)
    }

    /// Check whether a filename already ends with an accepted extension
    #[must_use]
    pub fn matches_filename(self, filename: &str) -> bool {
        let lower = filename.to_ascii_lowercase();
        self.accepted_extensions()
            .iter()
            .any(|ext| lower.len() > ext.len() && lower.ends_with(ext))
    }
}

impl Display for ImageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_mime_ignores_parameters_and_case() {
        assert_eq!(ImageKind::from_mime("IMAGE/PNG"), Some(ImageKind::Png));
        assert_eq!(
            ImageKind::from_mime("image/svg+xml; charset=utf-8"),
            Some(ImageKind::Svg)
        );
        assert_eq!(ImageKind::from_mime("text/html"), None);
        assert_eq!(ImageKind::from_mime(""), None);
    }

    #[test]
    fn jpeg_accepts_alternate_extensions() {
        assert!(ImageKind::Jpeg.matches_filename("photo.JPEG"));
        assert!(ImageKind::Jpeg.matches_filename("photo.jpg"));
        assert!(!ImageKind::Jpeg.matches_filename("photo.png"));
    }

    #[test]
    fn bare_extension_is_not_a_match() {
        assert!(!ImageKind::Png.matches_filename(".png"));
    }

    #[test]
    fn mime_roundtrip() {
        for kind in [
            ImageKind::Png,
            ImageKind::Jpeg,
            ImageKind::Gif,
            ImageKind::Webp,
            ImageKind::Bmp,
            ImageKind::Ico,
            ImageKind::Svg,
            ImageKind::Avif,
            ImageKind::Tiff,
        ] {
            assert_eq!(ImageKind::from_mime(kind.mime()), Some(kind));
            assert!(kind.matches_filename(&format!("x{}", kind.extension())));
        }
    }
}
