//! Raster conversion between image formats

use crate::error::ConvertError;
use crate::sniff::image_format;
use image::DynamicImage;
use picpick_resource::ImageKind;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::io::Cursor;
use std::str::FromStr;

/// Formats an archive can be converted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Png,
    Jpeg,
    /// Lossless WebP
    Webp,
    Gif,
    Bmp,
}

impl TargetFormat {
    /// All targets
    pub const ALL: [TargetFormat; 5] = [Self::Png, Self::Jpeg, Self::Webp, Self::Gif, Self::Bmp];

    /// Image kind produced by this target
    #[inline]
    #[must_use]
    pub const fn kind(self) -> ImageKind {
        match self {
            Self::Png => ImageKind::Png,
            Self::Jpeg => ImageKind::Jpeg,
            Self::Webp => ImageKind::Webp,
            Self::Gif => ImageKind::Gif,
            Self::Bmp => ImageKind::Bmp,
        }
    }

    /// Lowercase name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }

    fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Webp => image::ImageFormat::WebP,
            Self::Gif => image::ImageFormat::Gif,
            Self::Bmp => image::ImageFormat::Bmp,
        }
    }
}

impl Display for TargetFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            "gif" => Ok(Self::Gif),
            "bmp" => Ok(Self::Bmp),
            other => Err(format!("unknown target format '{other}'")),
        }
    }
}

/// Decode `bytes` of `kind` and re-encode them as `target`
///
/// SVG sources are rasterized at their intrinsic size. JPEG output drops the
/// alpha channel.
///
/// # Errors
/// - `ConvertError::Decode` / `ConvertError::Svg` if the source is unreadable
/// - `ConvertError::Encode` if the target encoder fails
pub fn convert(bytes: &[u8], kind: ImageKind, target: TargetFormat) -> Result<Vec<u8>, ConvertError> {
    let raster = decode(bytes, kind)?;
    let raster = match target {
        TargetFormat::Png => raster,
        TargetFormat::Jpeg => DynamicImage::ImageRgb8(raster.to_rgb8()),
        TargetFormat::Webp | TargetFormat::Gif | TargetFormat::Bmp => DynamicImage::ImageRgba8(raster.to_rgba8()),
    };
    let mut out = Cursor::new(Vec::new());
    raster
        .write_to(&mut out, target.image_format())
        .map_err(|e| ConvertError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

fn decode(bytes: &[u8], kind: ImageKind) -> Result<DynamicImage, ConvertError> {
    if kind == ImageKind::Svg {
        let png = rasterize_svg(bytes)?;
        return image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .map_err(|e| ConvertError::Decode(e.to_string()));
    }
    let format = image_format(kind).ok_or_else(|| ConvertError::Decode(format!("no decoder for {kind}")))?;
    image::load_from_memory_with_format(bytes, format).map_err(|e| ConvertError::Decode(e.to_string()))
}

fn rasterize_svg(bytes: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let options = resvg::usvg::Options::default();
    let tree = resvg::usvg::Tree::from_data(bytes, &options).map_err(|e| ConvertError::Svg(e.to_string()))?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| ConvertError::Svg("zero-sized drawing".to_string()))?;
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap.as_mut());
    pixmap.encode_png().map_err(|e| ConvertError::Svg(e.to_string()))
}
