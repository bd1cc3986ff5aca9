//! Payload classification

use picpick_resource::ImageKind;

/// How far into a text payload to look for an `<svg` root
const SVG_SNIFF_WINDOW: usize = 1024;

/// Classify payload bytes
///
/// Magic numbers win, then an SVG markup check, then the declared content
/// type. Returns `None` when nothing identifies an image.
#[must_use]
pub fn sniff_kind(bytes: &[u8], declared: Option<&str>) -> Option<ImageKind> {
    if let Ok(format) = image::guess_format(bytes) {
        let kind = match format {
            image::ImageFormat::Png => Some(ImageKind::Png),
            image::ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            image::ImageFormat::Gif => Some(ImageKind::Gif),
            image::ImageFormat::WebP => Some(ImageKind::Webp),
            image::ImageFormat::Bmp => Some(ImageKind::Bmp),
            image::ImageFormat::Ico => Some(ImageKind::Ico),
            image::ImageFormat::Avif => Some(ImageKind::Avif),
            image::ImageFormat::Tiff => Some(ImageKind::Tiff),
            _ => None,
        };
        if kind.is_some() {
            return kind;
        }
    }
    if looks_like_svg(bytes) {
        return Some(ImageKind::Svg);
    }
    declared.and_then(ImageKind::from_mime)
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(SVG_SNIFF_WINDOW)];
    let Ok(text) = std::str::from_utf8(window) else {
        // Window may have cut a multibyte character
        return String::from_utf8_lossy(window).contains("<svg");
    };
    let text = text.trim_start_matches('\u{feff}').trim_start();
    (text.starts_with("<svg") || text.starts_with("<?xml") || text.starts_with("<!--")) && text.contains("<svg")
}

/// Map a kind to the decoder format, when one exists
pub(crate) fn image_format(kind: ImageKind) -> Option<image::ImageFormat> {
    match kind {
        ImageKind::Png => Some(image::ImageFormat::Png),
        ImageKind::Jpeg => Some(image::ImageFormat::Jpeg),
        ImageKind::Gif => Some(image::ImageFormat::Gif),
        ImageKind::Webp => Some(image::ImageFormat::WebP),
        ImageKind::Bmp => Some(image::ImageFormat::Bmp),
        ImageKind::Ico => Some(image::ImageFormat::Ico),
        ImageKind::Avif => Some(image::ImageFormat::Avif),
        ImageKind::Tiff => Some(image::ImageFormat::Tiff),
        ImageKind::Svg => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_beats_declared_type() {
        let gif = b"GIF89a\x01\x00\x01\x00";
        assert_eq!(sniff_kind(gif, Some("image/png")), Some(ImageKind::Gif));
    }

    #[test]
    fn svg_markup_is_recognized() {
        assert_eq!(sniff_kind(b"  <svg xmlns='http://www.w3.org/2000/svg'/>", None), Some(ImageKind::Svg));
        assert_eq!(
            sniff_kind(b"<?xml version=\"1.0\"?>\n<svg/>", Some("text/plain")),
            Some(ImageKind::Svg)
        );
    }

    #[test]
    fn declared_type_is_the_fallback() {
        assert_eq!(sniff_kind(b"????", Some("image/webp")), Some(ImageKind::Webp));
        assert_eq!(sniff_kind(b"<html></html>", Some("text/html")), None);
        assert_eq!(sniff_kind(b"", None), None);
    }
}
