//! Pixel bitmap used as back buffer and blit source.
//!
//! Pixels are stored in the byte order the panel expects on the wire, so a
//! whole bitmap can be handed to a region write without conversion.

use crate::{Color, Error, Result};

/// A width by height block of pixels at 8 or 16 bits per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u16,
    height: u16,
    depth: u8,
    /// RGB565 big-endian at depth 16, RGB332 at depth 8.
    data: Vec<u8>,
}

impl Bitmap {
    /// Creates a bitmap initialized to black.
    pub fn new(width: u16, height: u16, depth: u8) -> Self {
        let size = Self::buffer_size(width, height, depth);
        Self {
            width,
            height,
            depth,
            data: vec![0; size],
        }
    }

    /// Wraps existing pixel data.
    pub fn from_vec(width: u16, height: u16, depth: u8, data: Vec<u8>) -> Result<Self> {
        let expected = Self::buffer_size(width, height, depth);
        if data.len() != expected {
            return Err(Error::BitmapSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            depth,
            data,
        })
    }

    /// Bytes needed for a bitmap of the given size.
    pub fn buffer_size(width: u16, height: u16, depth: u8) -> usize {
        width as usize * height as usize * (depth as usize / 8)
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.depth as usize / 8
    }

    /// Returns the raw pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the raw pixel bytes mutably.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Gives back the pixel storage.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Bytes of row `y`.
    pub fn row(&self, y: u16) -> &[u8] {
        let stride = self.width as usize * self.bytes_per_pixel();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    fn index(&self, x: i16, y: i16) -> Option<usize> {
        if x < 0 || y < 0 || x as u16 >= self.width || y as u16 >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * self.bytes_per_pixel())
    }

    /// Sets a pixel. Coordinates outside the bitmap are ignored.
    pub fn put_pixel(&mut self, x: i16, y: i16, color: Color) {
        if let Some(idx) = self.index(x, y) {
            let (bytes, len) = encode_color(color, self.depth);
            self.data[idx..idx + len].copy_from_slice(&bytes[..len]);
        }
    }

    /// Gets a pixel, or `None` outside the bitmap.
    pub fn get_pixel(&self, x: i16, y: i16) -> Option<Color> {
        let idx = self.index(x, y)?;
        if self.depth == 16 {
            Some(u16::from_be_bytes([self.data[idx], self.data[idx + 1]]))
        } else {
            Some(self.data[idx] as Color)
        }
    }

    /// Draws a horizontal line of `width` pixels starting at `(x, y)`.
    pub fn hline(&mut self, x: i16, y: i16, width: u16, color: Color) {
        self.fill_rect(x, y, width, 1, color);
    }

    /// Draws a vertical line of `height` pixels starting at `(x, y)`.
    pub fn vline(&mut self, x: i16, y: i16, height: u16, color: Color) {
        self.fill_rect(x, y, 1, height, color);
    }

    /// Fills a rectangle, clipped to the bitmap.
    pub fn fill_rect(&mut self, x: i16, y: i16, width: u16, height: u16, color: Color) {
        let Some((x0, y0, w, h)) = clip(x, y, width, height, self.width, self.height) else {
            return;
        };

        let (bytes, len) = encode_color(color, self.depth);
        let stride = self.width as usize * len;
        for row in y0..y0 + h {
            let start = row as usize * stride + x0 as usize * len;
            let end = start + w as usize * len;
            for pixel in self.data[start..end].chunks_exact_mut(len) {
                pixel.copy_from_slice(&bytes[..len]);
            }
        }
    }

    /// Clears the bitmap to a solid color.
    pub fn clear(&mut self, color: Color) {
        self.fill_rect(0, 0, self.width, self.height, color);
    }

    /// Copies `src` with its top left corner at `(x, y)`, clipped.
    pub fn blit(&mut self, x: i16, y: i16, src: &Bitmap) {
        if src.depth == self.depth {
            let Some((x0, y0, w, h)) = clip(x, y, src.width, src.height, self.width, self.height)
            else {
                return;
            };
            let bpp = self.bytes_per_pixel();
            let sx = (x0 as i32 - x as i32) as usize;
            let sy = (y0 as i32 - y as i32) as usize;
            for row in 0..h as usize {
                let src_start = ((sy + row) * src.width as usize + sx) * bpp;
                let dst_start = ((y0 as usize + row) * self.width as usize + x0 as usize) * bpp;
                let len = w as usize * bpp;
                self.data[dst_start..dst_start + len]
                    .copy_from_slice(&src.data[src_start..src_start + len]);
            }
            return;
        }

        for sy in 0..src.height as i16 {
            for sx in 0..src.width as i16 {
                if let Some(color) = src.get_pixel(sx, sy) {
                    let color = convert_color(color, src.depth, self.depth);
                    self.put_pixel(x.saturating_add(sx), y.saturating_add(sy), color);
                }
            }
        }
    }

    /// Copies `src` scaled to `width` by `height` at `(x, y)`, nearest neighbour.
    pub fn scale_blit(&mut self, x: i16, y: i16, width: u16, height: u16, src: &Bitmap) {
        if src.width == 0 || src.height == 0 {
            return;
        }

        for dy in 0..height {
            let sy = (dy as u32 * src.height as u32 / height as u32) as i16;
            for dx in 0..width {
                let sx = (dx as u32 * src.width as u32 / width as u32) as i16;
                if let Some(color) = src.get_pixel(sx, sy) {
                    let color = convert_color(color, src.depth, self.depth);
                    self.put_pixel(
                        x.saturating_add(dx as i16),
                        y.saturating_add(dy as i16),
                        color,
                    );
                }
            }
        }
    }
}

/// Encodes a color the way it is sent to the panel.
///
/// Returns the bytes and how many of them are used at `depth`.
pub fn encode_color(color: Color, depth: u8) -> ([u8; 2], usize) {
    if depth == 16 {
        (color.to_be_bytes(), 2)
    } else {
        ([color as u8, 0], 1)
    }
}

/// Intersects a rectangle with `(0, 0)..(width, height)`.
///
/// Returns the visible part as `(x, y, w, h)`, or `None` if nothing is left.
pub fn clip(x: i16, y: i16, w: u16, h: u16, width: u16, height: u16) -> Option<(u16, u16, u16, u16)> {
    let x0 = (x as i32).max(0);
    let y0 = (y as i32).max(0);
    let x1 = (x as i32 + w as i32).min(width as i32);
    let y1 = (y as i32 + h as i32).min(height as i32);

    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0 as u16, y0 as u16, (x1 - x0) as u16, (y1 - y0) as u16))
}

/// Converts RGB888 to RGB565.
#[inline]
pub fn rgb888_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    let r5 = (r >> 3) as u16;
    let g6 = (g >> 2) as u16;
    let b5 = (b >> 3) as u16;
    (r5 << 11) | (g6 << 5) | b5
}

/// Converts RGB565 to RGB888.
#[inline]
pub fn rgb565_to_rgb888(pixel: u16) -> (u8, u8, u8) {
    let r = ((pixel >> 11) & 0x1F) as u8;
    let g = ((pixel >> 5) & 0x3F) as u8;
    let b = (pixel & 0x1F) as u8;
    // Expand to 8-bit
    let r8 = (r << 3) | (r >> 2);
    let g8 = (g << 2) | (g >> 4);
    let b8 = (b << 3) | (b >> 2);
    (r8, g8, b8)
}

/// Converts RGB888 to RGB332.
#[inline]
pub fn rgb888_to_rgb332(r: u8, g: u8, b: u8) -> u8 {
    (r & 0xE0) | ((g & 0xE0) >> 3) | (b >> 6)
}

/// Converts RGB332 to RGB888.
#[inline]
pub fn rgb332_to_rgb888(pixel: u8) -> (u8, u8, u8) {
    let r = pixel >> 5;
    let g = (pixel >> 2) & 0x07;
    let b = pixel & 0x03;
    let r8 = (r << 5) | (r << 2) | (r >> 1);
    let g8 = (g << 5) | (g << 2) | (g >> 1);
    let b8 = (b << 6) | (b << 4) | (b << 2) | b;
    (r8, g8, b8)
}

/// Converts a color between RGB332 and RGB565.
pub fn convert_color(color: Color, from: u8, to: u8) -> Color {
    match (from, to) {
        (16, 8) => {
            let (r, g, b) = rgb565_to_rgb888(color);
            rgb888_to_rgb332(r, g, b) as Color
        }
        (8, 16) => {
            let (r, g, b) = rgb332_to_rgb888(color as u8);
            rgb888_to_rgb565(r, g, b)
        }
        _ => color,
    }
}

/// Parses a `#RRGGBB` string into a color for the given depth.
pub fn parse_hex_color(hex: &str, depth: u8) -> Option<Color> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
    let g = u8::from_str_radix(hex.get(2..4)?, 16).ok()?;
    let b = u8::from_str_radix(hex.get(4..6)?, 16).ok()?;
    if depth == 8 {
        Some(rgb888_to_rgb332(r, g, b) as Color)
    } else {
        Some(rgb888_to_rgb565(r, g, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb565_conversion() {
        assert_eq!(rgb888_to_rgb565(255, 0, 0), 0xF800);
        assert_eq!(rgb888_to_rgb565(0, 255, 0), 0x07E0);
        assert_eq!(rgb888_to_rgb565(0, 0, 255), 0x001F);
        assert_eq!(rgb565_to_rgb888(0xFFFF), (255, 255, 255));
        assert_eq!(rgb565_to_rgb888(0x0000), (0, 0, 0));
    }

    #[test]
    fn test_rgb332_conversion() {
        assert_eq!(rgb888_to_rgb332(255, 0, 0), 0xE0);
        assert_eq!(rgb888_to_rgb332(0, 255, 0), 0x1C);
        assert_eq!(rgb888_to_rgb332(0, 0, 255), 0x03);
        assert_eq!(rgb332_to_rgb888(0xFF), (255, 255, 255));
        assert_eq!(rgb332_to_rgb888(0xE0), (255, 0, 0));
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF0000", 16), Some(0xF800));
        assert_eq!(parse_hex_color("00FF00", 16), Some(0x07E0));
        assert_eq!(parse_hex_color("#00FF00", 8), Some(0x1C));
        assert_eq!(parse_hex_color("invalid", 16), None);
        assert_eq!(parse_hex_color("#ÿÿÿ", 16), None);
    }

    #[test]
    fn test_wire_order() {
        let mut bitmap = Bitmap::new(2, 1, 16);
        bitmap.put_pixel(1, 0, 0xF81F);
        assert_eq!(bitmap.data(), &[0x00, 0x00, 0xF8, 0x1F]);

        let mut bitmap = Bitmap::new(2, 1, 8);
        bitmap.put_pixel(0, 0, 0x01E0);
        assert_eq!(bitmap.data(), &[0xE0, 0x00]);
        assert_eq!(bitmap.get_pixel(0, 0), Some(0xE0));
    }

    #[test]
    fn test_clipping() {
        let mut bitmap = Bitmap::new(4, 4, 16);
        bitmap.put_pixel(-1, 0, 0xFFFF);
        bitmap.put_pixel(4, 0, 0xFFFF);
        assert!(bitmap.data().iter().all(|&b| b == 0));
        assert_eq!(bitmap.get_pixel(0, -1), None);

        bitmap.hline(-2, 1, 4, 0x1234);
        assert_eq!(bitmap.get_pixel(0, 1), Some(0x1234));
        assert_eq!(bitmap.get_pixel(1, 1), Some(0x1234));
        assert_eq!(bitmap.get_pixel(2, 1), Some(0));

        bitmap.vline(3, 2, 10, 0x5678);
        assert_eq!(bitmap.get_pixel(3, 3), Some(0x5678));
        assert_eq!(bitmap.get_pixel(3, 1), Some(0));
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip(-2, -2, 4, 4, 10, 10), Some((0, 0, 2, 2)));
        assert_eq!(clip(8, 8, 4, 4, 10, 10), Some((8, 8, 2, 2)));
        assert_eq!(clip(10, 0, 4, 4, 10, 10), None);
        assert_eq!(clip(0, 0, 0, 4, 10, 10), None);
    }

    #[test]
    fn test_blit_clips_source() {
        let mut src = Bitmap::new(2, 2, 16);
        src.clear(0xAAAA);
        src.put_pixel(1, 1, 0xBBBB);

        let mut dst = Bitmap::new(3, 3, 16);
        dst.blit(2, 2, &src);
        assert_eq!(dst.get_pixel(2, 2), Some(0xAAAA));
        assert_eq!(dst.get_pixel(1, 1), Some(0));

        dst.blit(-1, -1, &src);
        assert_eq!(dst.get_pixel(0, 0), Some(0xBBBB));
    }

    #[test]
    fn test_blit_converts_depth() {
        let mut src = Bitmap::new(2, 1, 16);
        src.put_pixel(0, 0, 0xF800);
        src.put_pixel(1, 0, 0x001F);
        let mut dst = Bitmap::new(2, 2, 8);
        dst.blit(0, 1, &src);
        assert_eq!(dst.get_pixel(0, 1), Some(0xE0));
        assert_eq!(dst.get_pixel(1, 1), Some(0x03));

        let mut src = Bitmap::new(1, 1, 8);
        src.put_pixel(0, 0, 0x1C);
        let mut dst = Bitmap::new(2, 2, 16);
        dst.scale_blit(0, 0, 2, 2, &src);
        assert_eq!(dst.get_pixel(1, 1), Some(0x07E0));
    }

    #[test]
    fn test_scale_blit_nearest() {
        let mut src = Bitmap::new(2, 1, 16);
        src.put_pixel(0, 0, 0x1111);
        src.put_pixel(1, 0, 0x2222);

        let mut dst = Bitmap::new(4, 2, 16);
        dst.scale_blit(0, 0, 4, 2, &src);
        assert_eq!(dst.row(0), dst.row(1));
        assert_eq!(dst.get_pixel(0, 0), Some(0x1111));
        assert_eq!(dst.get_pixel(1, 1), Some(0x1111));
        assert_eq!(dst.get_pixel(2, 0), Some(0x2222));
        assert_eq!(dst.get_pixel(3, 1), Some(0x2222));
    }

    #[test]
    fn test_from_vec_checks_size() {
        assert!(Bitmap::from_vec(2, 2, 16, vec![0; 8]).is_ok());
        assert_eq!(
            Bitmap::from_vec(2, 2, 16, vec![0; 4]),
            Err(Error::BitmapSize {
                expected: 8,
                actual: 4
            })
        );
    }
}
