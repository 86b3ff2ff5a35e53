//! Graphics library backends.
//!
//! A backend exposes pixel drawing operations plus `flush`. Single buffering
//! writes straight to the panel; double and triple buffering draw into
//! memory and send whole frames on flush.

mod double;
mod single;
mod triple;

pub use double::DoubleBuffer;
pub use single::SingleBuffer;
pub use triple::TripleBuffer;

use crate::bitmap::Bitmap;
use crate::config::DisplayConfig;
use crate::display::MipiDisplay;
use crate::hal::{DmaChannel, Gpio, SpiBus};
use crate::{Color, Error, Result};
use embedded_hal::delay::DelayNs;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Drawing surface handed to the graphics library.
///
/// Coordinates are logical pixels. Anything outside the surface is clipped.
pub trait Backend {
    fn width(&self) -> u16;

    fn height(&self) -> u16;

    fn depth(&self) -> u8;

    fn buffering(&self) -> Buffering;

    fn put_pixel(&mut self, x: i16, y: i16, color: Color);

    /// Reads a pixel back. Only buffered backends can do this.
    fn get_pixel(&self, x: i16, y: i16) -> Option<Color>;

    fn hline(&mut self, x: i16, y: i16, width: u16, color: Color);

    fn vline(&mut self, x: i16, y: i16, height: u16, color: Color);

    fn blit(&mut self, x: i16, y: i16, src: &Bitmap);

    fn scale_blit(&mut self, x: i16, y: i16, width: u16, height: u16, src: &Bitmap);

    /// Sends the current frame to the panel. Returns the pixel bytes sent.
    fn flush(&mut self) -> usize;

    /// Releases the bus.
    fn close(&mut self);
}

/// Buffering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Buffering {
    /// Draw directly into controller RAM.
    #[default]
    Single,
    /// One back buffer in memory.
    Double,
    /// Two back buffers in memory, alternating on flush.
    Triple,
}

impl Buffering {
    /// True if drawing goes to memory and reaches the panel on flush.
    pub fn has_back_buffer(&self) -> bool {
        !matches!(self, Buffering::Single)
    }
}

impl FromStr for Buffering {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "single" => Ok(Buffering::Single),
            "double" => Ok(Buffering::Double),
            "triple" => Ok(Buffering::Triple),
            _ => Err(Error::InvalidBuffering(s.to_string())),
        }
    }
}

impl std::fmt::Display for Buffering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Buffering::Single => write!(f, "single"),
            Buffering::Double => write!(f, "double"),
            Buffering::Triple => write!(f, "triple"),
        }
    }
}

/// Backend options, checked once when the backend is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub buffering: Buffering,

    /// Flush back buffers through the display's DMA channel
    #[serde(default)]
    pub dma: bool,

    /// Physical pixels per logical pixel along each axis, 1 or 2
    #[serde(default = "default_pixel_size")]
    pub pixel_size: u8,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            buffering: Buffering::default(),
            dma: false,
            pixel_size: default_pixel_size(),
        }
    }
}

fn default_pixel_size() -> u8 {
    1
}

impl BackendConfig {
    /// Rejects option combinations the backends cannot honour.
    pub fn validate(&self, display: &DisplayConfig, has_dma_channel: bool) -> Result<()> {
        display.validate()?;

        if !matches!(self.pixel_size, 1 | 2) {
            return Err(Error::InvalidPixelSize(self.pixel_size));
        }

        if self.pixel_size > 1 && !self.buffering.has_back_buffer() {
            return Err(Error::ScaledSingleBuffer(self.pixel_size));
        }

        let scale = self.pixel_size as u16;
        if display.width % scale != 0 || display.height % scale != 0 {
            return Err(Error::IndivisibleSize {
                width: display.width,
                height: display.height,
                pixel_size: self.pixel_size,
            });
        }

        if self.dma {
            if !self.buffering.has_back_buffer() {
                return Err(Error::DmaWithoutBackBuffer);
            }
            if !has_dma_channel {
                return Err(Error::MissingDmaChannel);
            }
        } else if has_dma_channel {
            return Err(Error::UnusedDmaChannel);
        }

        Ok(())
    }

    /// Drawing surface size for a panel of the given size.
    pub fn logical_size(&self, display: &DisplayConfig) -> (u16, u16) {
        let scale = self.pixel_size.max(1) as u16;
        (display.width / scale, display.height / scale)
    }
}

/// Builds a backend and brings the panel up.
///
/// The configuration is checked before the bus is touched. A caller supplied
/// `buffer` becomes the (first) back buffer and must match the logical frame
/// size; without one the backend allocates its own.
pub fn init<B, G, D, T>(
    mut display: MipiDisplay<B, G, D>,
    config: &BackendConfig,
    delay: &mut T,
    buffer: Option<Vec<u8>>,
) -> Result<Box<dyn Backend>>
where
    B: SpiBus + 'static,
    G: Gpio + 'static,
    D: DmaChannel + 'static,
    T: DelayNs,
{
    config.validate(display.config(), display.has_dma_channel())?;

    let (width, height) = config.logical_size(display.config());
    let depth = display.config().depth;

    let back_buffer = match buffer {
        Some(_) if !config.buffering.has_back_buffer() => {
            warn!("Ignoring provided buffer, single buffering draws to the panel.");
            None
        }
        Some(buffer) => {
            let bitmap = Bitmap::from_vec(width, height, depth, buffer).map_err(|e| match e {
                Error::BitmapSize { expected, actual } => Error::BackBufferSize { expected, actual },
                e => e,
            })?;
            debug!("Using provided back buffer of {} bytes.", bitmap.data().len());
            Some(bitmap)
        }
        None => None,
    };

    display.init(delay, config.buffering);

    let allocate = || {
        let bitmap = Bitmap::new(width, height, depth);
        debug!("Allocated back buffer of {} bytes.", bitmap.data().len());
        bitmap
    };

    let dma = if display.dma_active() { ", DMA" } else { "" };
    info!(
        "Using {} buffered backend, {}x{} at {} bpp, pixel size {}{}.",
        config.buffering, width, height, depth, config.pixel_size, dma
    );

    let backend: Box<dyn Backend> = match config.buffering {
        Buffering::Single => Box::new(SingleBuffer::new(display)),
        Buffering::Double => {
            let bitmap = back_buffer.unwrap_or_else(allocate);
            Box::new(DoubleBuffer::new(display, bitmap, config.pixel_size))
        }
        Buffering::Triple => {
            let front = back_buffer.unwrap_or_else(allocate);
            let back = allocate();
            Box::new(TripleBuffer::new(display, [front, back], config.pixel_size))
        }
    };

    Ok(backend)
}

/// Sends a back buffer to the panel.
///
/// Keeps two scanline buffers for pixel size 2. A scanline is only rewritten
/// after the transfer of the other one has been started, which waits for
/// any DMA transfer still reading it. The buffers alternate across flushes
/// too, so an odd row count does not reuse the line still in flight.
pub(crate) struct FrameSender {
    pixel_size: u8,
    scanlines: [Vec<u8>; 2],
    /// Scanline buffer the next row is expanded into.
    next: usize,
}

impl FrameSender {
    pub(crate) fn new(pixel_size: u8) -> Self {
        Self {
            pixel_size,
            scanlines: [Vec::new(), Vec::new()],
            next: 0,
        }
    }

    /// Waits for vsync if wired, then sends `bitmap`. Returns the bytes sent.
    pub(crate) fn send<B, G, D>(&mut self, display: &mut MipiDisplay<B, G, D>, bitmap: &Bitmap) -> usize
    where
        B: SpiBus,
        G: Gpio,
        D: DmaChannel,
    {
        display.wait_for_vsync();

        if self.pixel_size == 1 {
            return display.write_region(0, 0, bitmap.width(), bitmap.height(), bitmap.data());
        }

        let width = bitmap.width() * 2;
        let bpp = bitmap.bytes_per_pixel();
        let mut sent = 0;

        for y in 0..bitmap.height() {
            let line = &mut self.scanlines[self.next];
            self.next ^= 1;
            line.clear();
            for pixel in bitmap.row(y).chunks_exact(bpp) {
                line.extend_from_slice(pixel);
                line.extend_from_slice(pixel);
            }

            sent += display.write_region(0, y * 2, width, 1, &line[..]);
            sent += display.write_region(0, y * 2 + 1, width, 1, &line[..]);
        }

        sent
    }
}
