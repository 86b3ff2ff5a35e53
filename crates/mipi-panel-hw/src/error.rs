//! Error types for the MIPI panel hardware library.
//!
//! Protocol operations never fail; these errors come from validating a
//! configuration before anything touches the bus.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up a display or backend.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Color depth other than 8 or 16 bits.
    #[error("Unsupported color depth (must be 8 or 16): {0}")]
    InvalidDepth(u8),

    /// Panel width or height of zero.
    #[error("Invalid display dimensions: {width}x{height}")]
    InvalidDimensions { width: u16, height: u16 },

    /// Pixel size scaling factor other than 1 or 2.
    #[error("Unsupported pixel size (must be 1 or 2): {0}")]
    InvalidPixelSize(u8),

    /// DMA transfers only make sense when flushing a back buffer.
    #[error("DMA requires a double or triple buffered backend")]
    DmaWithoutBackBuffer,

    /// DMA enabled in the backend config but the display has no channel.
    #[error("DMA enabled but no DMA channel was given to the display")]
    MissingDmaChannel,

    /// Display owns a DMA channel the backend config does not enable.
    #[error("Display has a DMA channel but DMA is disabled in the backend config")]
    UnusedDmaChannel,

    /// Pixel scaling needs a back buffer to expand from.
    #[error("Pixel size {0} requires a double or triple buffered backend")]
    ScaledSingleBuffer(u8),

    /// Panel dimensions cannot be divided evenly by the pixel size.
    #[error("Display size {width}x{height} is not divisible by pixel size {pixel_size}")]
    IndivisibleSize {
        width: u16,
        height: u16,
        pixel_size: u8,
    },

    /// Caller supplied back buffer has the wrong length.
    #[error("Back buffer size mismatch: expected {expected}, got {actual}")]
    BackBufferSize { expected: usize, actual: usize },

    /// Bitmap data does not match its dimensions.
    #[error("Bitmap size mismatch: expected {expected}, got {actual}")]
    BitmapSize { expected: usize, actual: usize },

    /// Unknown buffering strategy name.
    #[error("Invalid buffering mode: {0}")]
    InvalidBuffering(String),

    /// Unknown orientation name.
    #[error("Invalid orientation: {0}")]
    InvalidOrientation(String),
}
