//! Display orientation support.
//!
//! Orientation is done in the controller through the address mode (MADCTL)
//! register. Rotating by 90° swaps the page and column axes, so the panel's
//! logical width and height swap as well.

use crate::dcs::address_mode::{MV, MX, MY};
use crate::{Error, Result};
use std::str::FromStr;

/// Display orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Native scan direction.
    #[default]
    Portrait,
    /// Rotated 90° clockwise.
    Landscape,
    /// Rotated 180°.
    PortraitFlipped,
    /// Rotated 270° clockwise.
    LandscapeFlipped,
}

impl Orientation {
    /// Returns the address mode bits for this orientation, without color order.
    pub fn address_mode(&self) -> u8 {
        match self {
            Orientation::Portrait => 0x00,
            Orientation::Landscape => MX | MV,
            Orientation::PortraitFlipped => MX | MY,
            Orientation::LandscapeFlipped => MY | MV,
        }
    }

    /// Returns true if this orientation exchanges rows and columns.
    pub fn swaps_axes(&self) -> bool {
        matches!(
            self,
            Orientation::Landscape | Orientation::LandscapeFlipped
        )
    }

    /// Returns logical dimensions for a panel with the given native size.
    pub fn dimensions(&self, native_width: u16, native_height: u16) -> (u16, u16) {
        if self.swaps_axes() {
            (native_height, native_width)
        } else {
            (native_width, native_height)
        }
    }
}

impl FromStr for Orientation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            "portrait-flipped" | "portrait_flipped" => Ok(Orientation::PortraitFlipped),
            "landscape-flipped" | "landscape_flipped" => Ok(Orientation::LandscapeFlipped),
            _ => Err(Error::InvalidOrientation(s.to_string())),
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Portrait => write!(f, "portrait"),
            Orientation::Landscape => write!(f, "landscape"),
            Orientation::PortraitFlipped => write!(f, "portrait-flipped"),
            Orientation::LandscapeFlipped => write!(f, "landscape-flipped"),
        }
    }
}
