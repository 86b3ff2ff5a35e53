//! Triple buffering: two back buffers that trade places on every flush.
//!
//! Drawing continues in one buffer while the other may still be read by a
//! DMA transfer. Buffers are not copied on swap, so the new drawing buffer
//! holds the frame from two flushes ago.

use super::{Backend, Buffering, FrameSender};
use crate::bitmap::Bitmap;
use crate::display::MipiDisplay;
use crate::hal::{DmaChannel, Gpio, SpiBus};
use crate::Color;

pub struct TripleBuffer<B, G, D> {
    display: MipiDisplay<B, G, D>,
    buffers: [Bitmap; 2],
    /// Index of the buffer being drawn into.
    current: usize,
    sender: FrameSender,
}

impl<B: SpiBus, G: Gpio, D: DmaChannel> TripleBuffer<B, G, D> {
    pub fn new(display: MipiDisplay<B, G, D>, buffers: [Bitmap; 2], pixel_size: u8) -> Self {
        Self {
            display,
            buffers,
            current: 0,
            sender: FrameSender::new(pixel_size),
        }
    }

    /// The buffer drawing operations currently target.
    pub fn current(&self) -> &Bitmap {
        &self.buffers[self.current]
    }

    fn draw(&mut self) -> &mut Bitmap {
        &mut self.buffers[self.current]
    }
}

impl<B: SpiBus, G: Gpio, D: DmaChannel> Backend for TripleBuffer<B, G, D> {
    fn width(&self) -> u16 {
        self.current().width()
    }

    fn height(&self) -> u16 {
        self.current().height()
    }

    fn depth(&self) -> u8 {
        self.current().depth()
    }

    fn buffering(&self) -> Buffering {
        Buffering::Triple
    }

    fn put_pixel(&mut self, x: i16, y: i16, color: Color) {
        self.draw().put_pixel(x, y, color);
    }

    fn get_pixel(&self, x: i16, y: i16) -> Option<Color> {
        self.current().get_pixel(x, y)
    }

    fn hline(&mut self, x: i16, y: i16, width: u16, color: Color) {
        self.draw().hline(x, y, width, color);
    }

    fn vline(&mut self, x: i16, y: i16, height: u16, color: Color) {
        self.draw().vline(x, y, height, color);
    }

    fn blit(&mut self, x: i16, y: i16, src: &Bitmap) {
        self.draw().blit(x, y, src);
    }

    fn scale_blit(&mut self, x: i16, y: i16, width: u16, height: u16, src: &Bitmap) {
        self.draw().scale_blit(x, y, width, height, src);
    }

    fn flush(&mut self) -> usize {
        let sent = self
            .sender
            .send(&mut self.display, &self.buffers[self.current]);
        self.current ^= 1;
        sent
    }

    fn close(&mut self) {
        self.display.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{init, BackendConfig};
    use crate::sim::SimPanel;
    use crate::DisplayConfig;

    fn triple(dma: bool) -> (SimPanel, Box<dyn Backend>) {
        let display = DisplayConfig {
            width: 4,
            height: 4,
            offset_x: 0,
            offset_y: 0,
            ..Default::default()
        };
        let panel = SimPanel::new(&display);
        let config = BackendConfig {
            buffering: Buffering::Triple,
            dma,
            pixel_size: 1,
        };
        let mipi = MipiDisplay::new(display, panel.bus(), panel.gpio());
        let backend = if dma {
            init(mipi.with_dma(panel.dma()), &config, &mut panel.delay(), None)
        } else {
            init(mipi, &config, &mut panel.delay(), None)
        }
        .unwrap();
        panel.clear_events();
        (panel, backend)
    }

    #[test]
    fn test_flush_swaps_buffers() {
        let (panel, mut backend) = triple(false);

        backend.put_pixel(0, 0, 0xF800);
        assert_eq!(backend.flush(), 32);
        assert_eq!(panel.pixel(0, 0), Some(0xF800));

        // Drawing moved on to the second buffer, which is still blank.
        assert_eq!(backend.get_pixel(0, 0), Some(0));
        backend.put_pixel(1, 0, 0x07E0);
        backend.flush();
        assert_eq!(panel.pixel(0, 0), Some(0));
        assert_eq!(panel.pixel(1, 0), Some(0x07E0));

        // Back to the first buffer, untouched since its flush.
        assert_eq!(backend.get_pixel(0, 0), Some(0xF800));
        assert_eq!(backend.get_pixel(1, 0), Some(0));
    }

    #[test]
    fn test_dma_flushes_wait_for_each_other() {
        let (panel, mut backend) = triple(true);

        for _ in 0..3 {
            backend.flush();
        }

        let stats = panel.dma_stats();
        assert_eq!(stats.transfers, 3);
        assert_eq!(stats.waits, 3);
        assert_eq!(stats.overlaps, 0);
        assert!(stats.in_flight);
    }
}
