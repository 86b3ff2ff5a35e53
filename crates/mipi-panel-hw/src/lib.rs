//! MIPI DCS Panel Hardware Library
//!
//! Drives a MIPI DCS compatible SPI display controller and presents a
//! pixel-buffer backend to a graphics library. The crate is split into the
//! bus-level transport, an optional DMA path, the address-window cache, the
//! protocol sequencer and the buffering backends built on top of it.

pub mod backend;
pub mod bitmap;
pub mod config;
pub mod dcs;
pub mod display;
pub mod dma;
pub mod error;
pub mod hal;
pub mod orientation;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod transport;
pub mod window;

pub use backend::{Backend, BackendConfig, Buffering};
pub use bitmap::Bitmap;
pub use config::DisplayConfig;
pub use display::MipiDisplay;
pub use dma::NoDma;
pub use error::{Error, Result};
pub use orientation::Orientation;
pub use window::AddressWindow;

/// Pixel color as handed around by the graphics library.
///
/// RGB565 at depth 16; at depth 8 only the low byte (RGB332) is used.
pub type Color = u16;
