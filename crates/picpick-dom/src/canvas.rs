//! Pixel buffers behind `<canvas>` elements

use crate::error::DomError;
use base64::Engine as _;
use std::io::Cursor;

/// RGBA pixel buffer with a taint flag
///
/// Drawing cross-origin content taints the buffer; a tainted buffer refuses
/// export the way a browser canvas does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    tainted: bool,
}

impl CanvasBuffer {
    /// Transparent buffer of the given size
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 4;
        Self {
            width,
            height,
            pixels: vec![0; len],
            tainted: false,
        }
    }

    /// Width in pixels
    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fill the whole buffer with one color
    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Set one pixel; out-of-bounds writes are ignored
    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[offset..offset + 4].copy_from_slice(&rgba);
    }

    /// Mark the buffer as holding cross-origin pixels
    pub fn taint(&mut self) {
        self.tainted = true;
    }

    /// Check the taint flag
    #[inline]
    #[must_use]
    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    /// Encode as a `data:image/png;base64,...` URL
    ///
    /// A zero-sized canvas exports as `data:,`.
    ///
    /// # Errors
    /// Returns error if PNG encoding fails
    pub fn to_data_url(&self) -> Result<String, DomError> {
        if self.width == 0 || self.height == 0 {
            return Ok("data:,".to_string());
        }
        let image = image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| DomError::CanvasEncode("pixel buffer size mismatch".to_string()))?;
        let mut png = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut png, image::ImageFormat::Png)
            .map_err(|e| DomError::CanvasEncode(e.to_string()))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(png.into_inner());
        Ok(format!("data:image/png;base64,{encoded}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[test]
    fn export_is_decodable_png() {
        let mut canvas = CanvasBuffer::new(3, 2);
        canvas.fill([255, 0, 0, 255]);
        canvas.put_pixel(1, 1, [0, 0, 255, 255]);
        canvas.put_pixel(99, 99, [0, 0, 0, 0]);

        let url = canvas.to_data_url().unwrap();
        let b64 = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(1, 1).0, [0, 0, 255, 255]);
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn empty_canvas_exports_blank_url() {
        assert_eq!(CanvasBuffer::new(0, 10).to_data_url().unwrap(), "data:,");
    }

    #[test]
    fn same_pixels_same_url() {
        let a = CanvasBuffer::new(4, 4).to_data_url().unwrap();
        let b = CanvasBuffer::new(4, 4).to_data_url().unwrap();
        assert_eq!(a, b);
    }
}
