//! Single buffering: controller RAM is the only frame buffer.

use super::{Backend, Buffering};
use crate::bitmap::{clip, encode_color, Bitmap};
use crate::display::MipiDisplay;
use crate::hal::{DmaChannel, Gpio, SpiBus};
use crate::Color;

/// Backend that writes every drawing operation straight to the panel.
pub struct SingleBuffer<B, G, D> {
    display: MipiDisplay<B, G, D>,
}

impl<B: SpiBus, G: Gpio, D: DmaChannel> SingleBuffer<B, G, D> {
    /// Wraps an initialised display.
    pub fn new(display: MipiDisplay<B, G, D>) -> Self {
        Self { display }
    }

    fn clip(&self, x: i16, y: i16, width: u16, height: u16) -> Option<(u16, u16, u16, u16)> {
        let config = self.display.config();
        clip(x, y, width, height, config.width, config.height)
    }

    /// Fills a clipped rectangle with one color.
    fn fill(&mut self, x: u16, y: u16, width: u16, height: u16, color: Color) {
        let depth = self.display.config().depth;
        if depth == 16 {
            self.display.fill_region(x, y, width, height, color);
            return;
        }

        let (bytes, len) = encode_color(color, depth);
        let pixels = bytes[..len].repeat(width as usize * height as usize);
        self.display.write_region(x, y, width, height, &pixels);
    }

    /// Sends `src` at `(x, y)`, clipped to the panel.
    fn send(&mut self, x: i16, y: i16, src: &Bitmap) {
        let Some((cx, cy, cw, ch)) = self.clip(x, y, src.width(), src.height()) else {
            return;
        };

        let depth = self.display.config().depth;
        let unclipped = (cx as i32, cy as i32, cw, ch) == (x as i32, y as i32, src.width(), src.height());
        if unclipped && src.depth() == depth {
            self.display.write_region(cx, cy, cw, ch, src.data());
            return;
        }

        let mut visible = Bitmap::new(cw, ch, depth);
        visible.blit(
            (x as i32 - cx as i32) as i16,
            (y as i32 - cy as i32) as i16,
            src,
        );
        self.display.write_region(cx, cy, cw, ch, visible.data());
    }
}

impl<B: SpiBus, G: Gpio, D: DmaChannel> Backend for SingleBuffer<B, G, D> {
    fn width(&self) -> u16 {
        self.display.config().width
    }

    fn height(&self) -> u16 {
        self.display.config().height
    }

    fn depth(&self) -> u8 {
        self.display.config().depth
    }

    fn buffering(&self) -> Buffering {
        Buffering::Single
    }

    fn put_pixel(&mut self, x: i16, y: i16, color: Color) {
        if let Some((x, y, _, _)) = self.clip(x, y, 1, 1) {
            let (bytes, len) = encode_color(color, self.depth());
            self.display.write_point(x, y, &bytes[..len]);
        }
    }

    fn get_pixel(&self, _x: i16, _y: i16) -> Option<Color> {
        None
    }

    fn hline(&mut self, x: i16, y: i16, width: u16, color: Color) {
        if let Some((x, y, w, h)) = self.clip(x, y, width, 1) {
            self.fill(x, y, w, h, color);
        }
    }

    fn vline(&mut self, x: i16, y: i16, height: u16, color: Color) {
        if let Some((x, y, w, h)) = self.clip(x, y, 1, height) {
            self.fill(x, y, w, h, color);
        }
    }

    fn blit(&mut self, x: i16, y: i16, src: &Bitmap) {
        self.send(x, y, src);
    }

    fn scale_blit(&mut self, x: i16, y: i16, width: u16, height: u16, src: &Bitmap) {
        let mut scaled = Bitmap::new(width, height, self.depth());
        scaled.scale_blit(0, 0, width, height, src);
        self.send(x, y, &scaled);
    }

    fn flush(&mut self) -> usize {
        0
    }

    fn close(&mut self) {
        self.display.close();
    }
}
