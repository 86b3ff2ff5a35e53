//! Double buffering: draw into memory, send the frame on flush.
//!
//! The controller RAM is the front buffer, the bitmap owned here is the back
//! buffer.

use super::{Backend, Buffering, FrameSender};
use crate::bitmap::Bitmap;
use crate::display::MipiDisplay;
use crate::hal::{DmaChannel, Gpio, SpiBus};
use crate::Color;

pub struct DoubleBuffer<B, G, D> {
    display: MipiDisplay<B, G, D>,
    bitmap: Bitmap,
    sender: FrameSender,
}

impl<B: SpiBus, G: Gpio, D: DmaChannel> DoubleBuffer<B, G, D> {
    /// Wraps an initialised display and its back buffer.
    pub fn new(display: MipiDisplay<B, G, D>, bitmap: Bitmap, pixel_size: u8) -> Self {
        Self {
            display,
            bitmap,
            sender: FrameSender::new(pixel_size),
        }
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }
}

impl<B: SpiBus, G: Gpio, D: DmaChannel> Backend for DoubleBuffer<B, G, D> {
    fn width(&self) -> u16 {
        self.bitmap.width()
    }

    fn height(&self) -> u16 {
        self.bitmap.height()
    }

    fn depth(&self) -> u8 {
        self.bitmap.depth()
    }

    fn buffering(&self) -> Buffering {
        Buffering::Double
    }

    fn put_pixel(&mut self, x: i16, y: i16, color: Color) {
        self.display.wait_for_dma();
        self.bitmap.put_pixel(x, y, color);
    }

    fn get_pixel(&self, x: i16, y: i16) -> Option<Color> {
        self.bitmap.get_pixel(x, y)
    }

    fn hline(&mut self, x: i16, y: i16, width: u16, color: Color) {
        self.display.wait_for_dma();
        self.bitmap.hline(x, y, width, color);
    }

    fn vline(&mut self, x: i16, y: i16, height: u16, color: Color) {
        self.display.wait_for_dma();
        self.bitmap.vline(x, y, height, color);
    }

    fn blit(&mut self, x: i16, y: i16, src: &Bitmap) {
        self.display.wait_for_dma();
        self.bitmap.blit(x, y, src);
    }

    fn scale_blit(&mut self, x: i16, y: i16, width: u16, height: u16, src: &Bitmap) {
        self.display.wait_for_dma();
        self.bitmap.scale_blit(x, y, width, height, src);
    }

    fn flush(&mut self) -> usize {
        self.sender.send(&mut self.display, &self.bitmap)
    }

    fn close(&mut self) {
        self.display.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimPanel;
    use crate::DisplayConfig;

    fn double() -> (SimPanel, DoubleBuffer<crate::sim::SimBus, crate::sim::SimGpio, crate::NoDma>) {
        let config = DisplayConfig {
            width: 8,
            height: 4,
            offset_x: 0,
            offset_y: 0,
            ..Default::default()
        };
        let panel = SimPanel::new(&config);
        let mut display = MipiDisplay::new(config, panel.bus(), panel.gpio());
        display.init(&mut panel.delay(), Buffering::Double);
        panel.clear_events();
        (panel, DoubleBuffer::new(display, Bitmap::new(8, 4, 16), 1))
    }

    #[test]
    fn test_drawing_waits_for_dma_flush() {
        let config = DisplayConfig {
            width: 4,
            height: 4,
            offset_x: 0,
            offset_y: 0,
            ..Default::default()
        };
        let panel = SimPanel::new(&config);
        let mut display =
            MipiDisplay::new(config, panel.bus(), panel.gpio()).with_dma(panel.dma());
        display.init(&mut panel.delay(), Buffering::Double);
        let mut backend = DoubleBuffer::new(display, Bitmap::new(4, 4, 16), 1);

        backend.flush();
        let stats = panel.dma_stats();
        assert!(stats.in_flight);
        assert_eq!(panel.dma_sources(), vec![backend.bitmap().data().as_ptr() as usize]);

        // The first draw blocks until the frame has been read out.
        backend.put_pixel(0, 0, 0xF800);
        assert!(!panel.dma_stats().in_flight);
        assert_eq!(panel.dma_stats().waits, stats.waits + 1);

        backend.hline(0, 1, 4, 0x07E0);
        assert_eq!(panel.dma_stats().waits, stats.waits + 1);

        backend.flush();
        assert_eq!(panel.pixel(0, 0), Some(0xF800));
        assert_eq!(panel.dma_stats().overlaps, 0);
    }

    #[test]
    fn test_drawing_stays_in_memory() {
        let (panel, mut backend) = double();
        backend.put_pixel(1, 1, 0xF800);
        backend.hline(0, 3, 8, 0x07E0);
        backend.vline(7, 0, 4, 0x001F);

        assert!(panel.events().is_empty());
        assert_eq!(backend.get_pixel(1, 1), Some(0xF800));
        assert_eq!(backend.get_pixel(7, 3), Some(0x001F));
        assert_eq!(backend.get_pixel(8, 0), None);
    }

    #[test]
    fn test_flush_sends_frame() {
        let (panel, mut backend) = double();
        backend.put_pixel(1, 1, 0xF800);
        let mut sprite = Bitmap::new(2, 2, 16);
        sprite.clear(0xFFFF);
        backend.blit(6, 2, &sprite);

        assert_eq!(backend.flush(), 8 * 4 * 2);
        assert_eq!(panel.pixel(1, 1), Some(0xF800));
        assert_eq!(panel.pixel(7, 3), Some(0xFFFF));
        assert_eq!(panel.pixel(0, 0), Some(0));

        // Buffer survives the flush.
        assert_eq!(backend.bitmap().get_pixel(1, 1), Some(0xF800));
    }
}
