//! MIPI Panel Simulator
//!
//! Runs the panel backend against a simulated SPI display, draws a test
//! pattern and writes what ended up in controller RAM to a PNG file.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use mipi_panel_hw::backend::{self, Backend};
use mipi_panel_hw::bitmap::{parse_hex_color, rgb888_to_rgb332, rgb888_to_rgb565};
use mipi_panel_hw::sim::SimPanel;
use mipi_panel_hw::{Bitmap, Buffering, Color, MipiDisplay};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::Config;

#[derive(Parser)]
#[command(name = "mipi-panel-sim")]
#[command(about = "Run the MIPI DCS panel backend against a simulated display")]
#[command(version)]
struct Cli {
    /// Configuration file
    config: Option<PathBuf>,

    /// PNG file to write the final panel contents to
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Buffering strategy (single, double, triple)
    #[arg(short, long)]
    buffering: Option<Buffering>,

    /// Number of frames to draw
    #[arg(short, long)]
    frames: Option<u32>,

    /// Flush back buffers through DMA
    #[arg(long)]
    dma: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive("info".parse()?)
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path).context("Failed to load configuration")?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => Config::default(),
    };

    if let Some(output) = cli.output {
        config.sim.output = output;
    }
    if let Some(buffering) = cli.buffering {
        config.backend.buffering = buffering;
    }
    if let Some(frames) = cli.frames {
        config.sim.frames = frames;
    }
    if cli.dma {
        config.backend.dma = true;
    }

    let display = config.display_config()?;
    let panel = SimPanel::new(&display);
    panel.set_tearing_period(config.sim.tearing_period);

    let mipi = MipiDisplay::new(display, panel.bus(), panel.gpio());
    let mut delay = panel.delay();
    let backend = if config.backend.dma {
        backend::init(mipi.with_dma(panel.dma()), &config.backend, &mut delay, None)
    } else {
        backend::init(mipi, &config.backend, &mut delay, None)
    }
    .context("Failed to initialise backend")?;
    info!("Panel up after {} ms of settle delays", panel.elapsed_ms());

    run(&panel, backend, &config)?;
    write_png(&panel, &config.sim.output)
}

/// Draws and flushes the configured number of frames, then closes the backend.
fn run(panel: &SimPanel, mut backend: Box<dyn Backend>, config: &Config) -> Result<()> {
    let depth = backend.depth();
    let background = parse_hex_color(&config.sim.background, depth)
        .with_context(|| format!("Invalid background color: {}", config.sim.background))?;
    let sprite = sprite(depth);

    panel.clear_events();

    let mut flushed = 0;
    for frame in 0..config.sim.frames {
        draw_frame(backend.as_mut(), frame, background, &sprite);
        let sent = backend.flush();
        debug!("Frame {} flushed, {} bytes", frame, sent);
        flushed += sent;
    }

    info!(
        "{} {} buffered frames: {} bytes flushed, {} pixel bytes on the wire, {} commands",
        config.sim.frames,
        backend.buffering(),
        flushed,
        panel.pixel_bytes(),
        panel.commands().len()
    );
    if panel.tearing_polls() > 0 {
        info!("Tearing line polled {} times", panel.tearing_polls());
    }
    let dma = panel.dma_stats();
    if dma.transfers > 0 {
        info!(
            "DMA: {} transfers, {} bytes, {} waits",
            dma.transfers, dma.bytes, dma.waits
        );
    }

    backend.close();
    Ok(())
}

/// Converts an RGB888 triple to a color at the given depth.
fn color(depth: u8, r: u8, g: u8, b: u8) -> Color {
    if depth == 8 {
        rgb888_to_rgb332(r, g, b) as Color
    } else {
        rgb888_to_rgb565(r, g, b)
    }
}

/// An 8x8 ring used for the blit and scaled blit.
fn sprite(depth: u8) -> Bitmap {
    let mut sprite = Bitmap::new(8, 8, depth);
    let ring = color(depth, 255, 200, 0);
    let center = color(depth, 255, 255, 255);
    sprite.fill_rect(1, 1, 6, 6, ring);
    sprite.fill_rect(3, 3, 2, 2, center);
    sprite
}

/// Color bars, a border, a diagonal and two sprites that move with `frame`.
fn draw_frame(backend: &mut dyn Backend, frame: u32, background: Color, sprite: &Bitmap) {
    let depth = backend.depth();
    let width = backend.width();
    let height = backend.height();
    let w = width as i16;
    let h = height as i16;

    for y in 0..h {
        backend.hline(0, y, width, background);
    }

    let bars = [
        color(depth, 255, 255, 255),
        color(depth, 255, 255, 0),
        color(depth, 0, 255, 255),
        color(depth, 0, 255, 0),
        color(depth, 255, 0, 255),
        color(depth, 255, 0, 0),
        color(depth, 0, 0, 255),
        color(depth, 0, 0, 0),
    ];
    let bar_width = (width / bars.len() as u16).max(1);
    for (i, &bar) in bars.iter().enumerate() {
        let x = (i as u16 * bar_width) as i16;
        for y in 0..h / 2 {
            backend.hline(x, y, bar_width, bar);
        }
    }

    let border = color(depth, 255, 255, 255);
    backend.hline(0, 0, width, border);
    backend.hline(0, h - 1, width, border);
    backend.vline(0, 0, height, border);
    backend.vline(w - 1, 0, height, border);

    let diagonal = color(depth, 255, 0, 0);
    for x in 0..w {
        let y = (x as i32 * (h as i32 - 1) / (w as i32 - 1).max(1)) as i16;
        backend.put_pixel(x, y, diagonal);
    }

    let offset = (frame.wrapping_mul(4) % width.max(1) as u32) as i16;
    backend.blit(offset, h / 2 + 2, sprite);
    backend.scale_blit(w - 20 - offset, h / 2 + 2, 16, 16, sprite);
}

/// Writes the visible part of the simulated GRAM as an RGBA PNG.
fn write_png(panel: &SimPanel, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut encoder = png::Encoder::new(
        BufWriter::new(file),
        panel.width() as u32,
        panel.height() as u32,
    );
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&panel.to_rgba8())?;

    info!("Wrote panel contents to {}", path.display());
    Ok(())
}
