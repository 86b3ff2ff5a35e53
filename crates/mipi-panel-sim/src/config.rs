//! Configuration management.

use anyhow::{Context, Result};
use mipi_panel_hw::{BackendConfig, DisplayConfig, Orientation};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Panel wiring and controller setup
    #[serde(default)]
    pub display: DisplayConfig,

    /// Buffering, DMA and pixel size
    #[serde(default)]
    pub backend: BackendConfig,

    /// Simulation run options
    #[serde(default)]
    pub sim: SimConfig,
}

/// Simulation run options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Number of frames to draw and flush
    #[serde(default = "default_frames")]
    pub frames: u32,

    /// Low reads of the tearing line before each vsync
    #[serde(default)]
    pub tearing_period: usize,

    /// Background color as `#RRGGBB`
    #[serde(default = "default_background")]
    pub background: String,

    /// PNG file receiving the final panel contents
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Orientation applied to a natively described panel
    #[serde(default)]
    pub orientation: Option<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            frames: default_frames(),
            tearing_period: 0,
            background: default_background(),
            output: default_output(),
            orientation: None,
        }
    }
}

// Default value functions
fn default_frames() -> u32 {
    3
}

fn default_background() -> String {
    "#000000".to_string()
}

fn default_output() -> PathBuf {
    PathBuf::from("screenshot.png")
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Display config with the configured orientation applied.
    pub fn display_config(&self) -> Result<DisplayConfig> {
        let display = self.display.clone();
        let Some(name) = &self.sim.orientation else {
            return Ok(display);
        };

        let orientation: Orientation = name.parse().context("Invalid orientation in [sim]")?;
        Ok(display.with_orientation(orientation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mipi_panel_hw::Buffering;

    #[test]
    fn test_default_config_file() {
        let config: Config = toml::from_str(include_str!("../config/default.toml")).unwrap();
        assert_eq!(
            config.display,
            DisplayConfig {
                pin_rst: Some(12),
                pin_bl: Some(25),
                ..Default::default()
            }
        );
        assert_eq!(config.backend.buffering, Buffering::Double);
        assert_eq!(config.sim.frames, 3);
        assert_eq!(config.sim.orientation, None);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.display, DisplayConfig::default());
        assert_eq!(config.backend, BackendConfig::default());
        assert_eq!(config.sim.output, PathBuf::from("screenshot.png"));
    }

    #[test]
    fn test_orientation_is_applied() {
        let config: Config = toml::from_str(
            r#"
            [display]
            width = 80
            height = 160
            offset_x = 26
            offset_y = 1

            [sim]
            orientation = "landscape"
            "#,
        )
        .unwrap();

        let display = config.display_config().unwrap();
        assert_eq!((display.width, display.height), (160, 80));
        assert_eq!((display.offset_x, display.offset_y), (1, 26));
    }

    #[test]
    fn test_bad_orientation() {
        let mut config = Config::default();
        config.sim.orientation = Some("diagonal".to_string());
        assert!(config.display_config().is_err());
    }
}
