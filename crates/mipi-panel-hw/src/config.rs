//! Panel configuration.
//!
//! Defaults match the Waveshare RP2040-LCD-0.96 (ST7735S, 160x80). Optional
//! pins default to unconnected since TOML has no way to spell "none".

use crate::dcs;
use crate::orientation::Orientation;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Description of one physical panel and how it is wired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// SPI clock in Hz
    #[serde(default = "default_spi_frequency")]
    pub spi_frequency: u32,

    /// Chip-select pin (active low)
    #[serde(default = "default_pin_cs")]
    pub pin_cs: u8,

    /// Data/command select pin
    #[serde(default = "default_pin_dc")]
    pub pin_dc: u8,

    /// SPI clock pin
    #[serde(default = "default_pin_clk")]
    pub pin_clk: u8,

    /// SPI data out pin
    #[serde(default = "default_pin_mosi")]
    pub pin_mosi: u8,

    /// SPI data in pin
    #[serde(default)]
    pub pin_miso: Option<u8>,

    /// Hardware reset pin
    #[serde(default)]
    pub pin_rst: Option<u8>,

    /// Backlight enable pin
    #[serde(default)]
    pub pin_bl: Option<u8>,

    /// Panel power enable pin
    #[serde(default)]
    pub pin_power: Option<u8>,

    /// Tearing effect (vsync) input pin
    #[serde(default)]
    pub pin_te: Option<u8>,

    /// `SET_PIXEL_FORMAT` parameter
    #[serde(default = "default_pixel_format")]
    pub pixel_format: u8,

    /// `SET_ADDRESS_MODE` parameter
    #[serde(default = "default_address_mode")]
    pub address_mode: u8,

    #[serde(default = "default_width")]
    pub width: u16,

    #[serde(default = "default_height")]
    pub height: u16,

    /// Column offset of the visible area in controller RAM
    #[serde(default = "default_offset_x")]
    pub offset_x: u16,

    /// Row offset of the visible area in controller RAM
    #[serde(default = "default_offset_y")]
    pub offset_y: u16,

    /// Bits per pixel, 8 or 16
    #[serde(default = "default_depth")]
    pub depth: u8,

    /// Enter color inversion mode at init
    #[serde(default = "default_invert")]
    pub invert: bool,

    /// Configure the SPI peripheral at init. Disable when the bus is shared
    /// and already set up by someone else.
    #[serde(default = "default_init_spi")]
    pub init_spi: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            spi_frequency: default_spi_frequency(),
            pin_cs: default_pin_cs(),
            pin_dc: default_pin_dc(),
            pin_clk: default_pin_clk(),
            pin_mosi: default_pin_mosi(),
            pin_miso: None,
            pin_rst: None,
            pin_bl: None,
            pin_power: None,
            pin_te: None,
            pixel_format: default_pixel_format(),
            address_mode: default_address_mode(),
            width: default_width(),
            height: default_height(),
            offset_x: default_offset_x(),
            offset_y: default_offset_y(),
            depth: default_depth(),
            invert: default_invert(),
            init_spi: default_init_spi(),
        }
    }
}

impl DisplayConfig {
    /// Bytes sent per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        self.depth as usize / 8
    }

    /// Size in bytes of a full-screen pixel buffer.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel()
    }

    /// Rotates a config that describes the panel in its native scan direction.
    ///
    /// The color order bit of the address mode is kept.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        let color_order = self.address_mode & dcs::address_mode::BGR;
        self.address_mode = orientation.address_mode() | color_order;
        (self.width, self.height) = orientation.dimensions(self.width, self.height);
        (self.offset_x, self.offset_y) = orientation.dimensions(self.offset_x, self.offset_y);
        self
    }

    /// Checks the fields the protocol layer relies on.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        match self.depth {
            8 | 16 => Ok(()),
            depth => Err(Error::InvalidDepth(depth)),
        }
    }
}

// Default value functions
fn default_spi_frequency() -> u32 {
    62_500_000
}

fn default_pin_cs() -> u8 {
    9
}

fn default_pin_dc() -> u8 {
    8
}

fn default_pin_clk() -> u8 {
    10
}

fn default_pin_mosi() -> u8 {
    11
}

fn default_pixel_format() -> u8 {
    dcs::pixel_format::RGB565
}

fn default_address_mode() -> u8 {
    // Landscape, BGR
    dcs::address_mode::MX | dcs::address_mode::MV | dcs::address_mode::BGR
}

fn default_width() -> u16 {
    160
}

fn default_height() -> u16 {
    80
}

fn default_offset_x() -> u16 {
    1
}

fn default_offset_y() -> u16 {
    26
}

fn default_depth() -> u8 {
    16
}

fn default_invert() -> bool {
    true
}

fn default_init_spi() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DisplayConfig::default();
        assert_eq!(config.address_mode, 0x68);
        assert_eq!(config.pixel_format, 0x55);
        assert_eq!(config.frame_size(), 160 * 80 * 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: DisplayConfig = toml::from_str(
            r#"
            width = 240
            height = 240
            offset_x = 0
            offset_y = 0
            pin_te = 22
            pin_rst = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.width, 240);
        assert_eq!(config.pin_te, Some(22));
        assert_eq!(config.pin_rst, Some(7));
        assert_eq!(config.pin_bl, None);
        assert_eq!(config.pin_power, None);
        assert!(config.init_spi);
    }

    #[test]
    fn test_with_orientation() {
        let native = DisplayConfig {
            width: 80,
            height: 160,
            offset_x: 26,
            offset_y: 1,
            address_mode: dcs::address_mode::BGR,
            ..Default::default()
        };

        let landscape = native.clone().with_orientation(Orientation::Landscape);
        assert_eq!((landscape.width, landscape.height), (160, 80));
        assert_eq!((landscape.offset_x, landscape.offset_y), (1, 26));
        assert_eq!(landscape.address_mode, DisplayConfig::default().address_mode);

        let flipped = native.with_orientation(Orientation::PortraitFlipped);
        assert_eq!((flipped.width, flipped.height), (80, 160));
        assert_eq!(flipped.address_mode, 0xC8);
    }

    #[test]
    fn test_invalid_depth() {
        let config = DisplayConfig {
            depth: 24,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(Error::InvalidDepth(24)));
    }

    #[test]
    fn test_zero_dimensions() {
        let config = DisplayConfig {
            width: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(Error::InvalidDimensions {
                width: 0,
                height: 80
            })
        );

        let config = DisplayConfig {
            height: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
