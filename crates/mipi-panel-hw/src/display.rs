//! MIPI DCS protocol sequencer.
//!
//! Owns the panel description, the transport, the optional DMA path and the
//! address-window cache. Coordinates handed to it are assumed to be clipped
//! already; nothing here bounds-checks.

use crate::backend::Buffering;
use crate::config::DisplayConfig;
use crate::dcs;
use crate::dma::{DmaPath, NoDma};
use crate::hal::{Direction, DmaChannel, Gpio, PinFunction, SpiBus};
use crate::transport::Transport;
use crate::window::AddressWindow;
use crate::Color;
use embedded_hal::delay::DelayNs;
use tracing::{debug, info};

/// Settle time after bus init and around the reset pulse.
const RESET_DELAY_MS: u32 = 100;

/// Settle time after soft reset, sleep exit and display on.
const COMMAND_DELAY_MS: u32 = 200;

/// A MIPI DCS display controller on an SPI bus.
pub struct MipiDisplay<B, G, D = NoDma> {
    config: DisplayConfig,
    transport: Transport<B, G>,
    dma: Option<DmaPath<D>>,
    window: AddressWindow,
    closed: bool,
}

impl<B: SpiBus, G: Gpio> MipiDisplay<B, G, NoDma> {
    /// Creates a display using synchronous transfers only.
    pub fn new(config: DisplayConfig, bus: B, gpio: G) -> Self {
        let transport = Transport::new(bus, gpio, config.pin_cs, config.pin_dc);
        Self {
            config,
            transport,
            dma: None,
            window: AddressWindow::unknown(),
            closed: false,
        }
    }

    /// Hands the display a DMA channel for back buffer flushes.
    pub fn with_dma<D: DmaChannel>(self, channel: D) -> MipiDisplay<B, G, D> {
        MipiDisplay {
            config: self.config,
            transport: self.transport,
            dma: Some(DmaPath::new(channel)),
            window: self.window,
            closed: self.closed,
        }
    }
}

impl<B: SpiBus, G: Gpio, D: DmaChannel> MipiDisplay<B, G, D> {
    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Last window programmed into the controller.
    pub fn window(&self) -> AddressWindow {
        self.window
    }

    /// True if a DMA channel was supplied.
    pub fn has_dma_channel(&self) -> bool {
        self.dma.is_some()
    }

    /// True once the DMA path has been bound to the bus.
    pub fn dma_active(&self) -> bool {
        self.dma.as_ref().is_some_and(DmaPath::is_ready)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Runs the panel power-up sequence.
    ///
    /// The sequence is fixed and not recoverable half way: a bus problem
    /// shows up as a wrong picture, never as an error.
    pub fn init<T: DelayNs>(&mut self, delay: &mut T, buffering: Buffering) {
        info!("Initialising {} buffered display.", buffering);

        self.window.invalidate();

        self.init_bus();
        delay.delay_ms(RESET_DELAY_MS);

        if let Some(pin) = self.config.pin_rst {
            debug!("Resetting display via pin {}.", pin);
            let gpio = self.transport.gpio_mut();
            gpio.set_function(pin, PinFunction::Sio);
            gpio.set_direction(pin, Direction::Output);

            gpio.put(pin, false);
            delay.delay_ms(RESET_DELAY_MS);
            gpio.put(pin, true);
            delay.delay_ms(RESET_DELAY_MS);
        }

        self.transport.write_command(dcs::SOFT_RESET);
        delay.delay_ms(COMMAND_DELAY_MS);

        self.transport.write_command(dcs::SET_ADDRESS_MODE);
        self.transport.write_data(&[self.config.address_mode]);

        self.transport.write_command(dcs::SET_PIXEL_FORMAT);
        self.transport.write_data(&[self.config.pixel_format]);

        if let Some(pin) = self.config.pin_te {
            self.transport.write_command(dcs::SET_TEAR_ON);
            self.transport.write_data(&[dcs::TEAR_ON_VSYNC]);
            debug!("Enable vsync notification on pin {}.", pin);
        }

        if self.config.invert {
            self.transport.write_command(dcs::ENTER_INVERT_MODE);
            debug!("Inverting display.");
        } else {
            self.transport.write_command(dcs::EXIT_INVERT_MODE);
        }

        self.transport.write_command(dcs::EXIT_SLEEP_MODE);
        delay.delay_ms(COMMAND_DELAY_MS);

        self.transport.write_command(dcs::SET_DISPLAY_ON);
        delay.delay_ms(COMMAND_DELAY_MS);

        let gpio = self.transport.gpio_mut();
        for pin in [self.config.pin_bl, self.config.pin_power].into_iter().flatten() {
            gpio.set_function(pin, PinFunction::Sio);
            gpio.set_direction(pin, Direction::Output);
            gpio.put(pin, true);
        }

        if let Some(pin) = self.config.pin_te {
            gpio.set_function(pin, PinFunction::Sio);
            gpio.set_direction(pin, Direction::Input);
            gpio.pull_up(pin);
        }

        self.set_address_window(
            0,
            0,
            self.config.width.saturating_sub(1),
            self.config.height.saturating_sub(1),
        );

        if buffering.has_back_buffer() {
            if let Some(dma) = self.dma.as_mut() {
                dma.init(self.transport.bus());
            }
        }
    }

    fn init_bus(&mut self) {
        if !self.config.init_spi {
            debug!("Skipping SPI init, bus is owned by the caller.");
            return;
        }

        debug!("Initialising SPI.");

        let config = &self.config;
        let gpio = self.transport.gpio_mut();
        gpio.set_function(config.pin_dc, PinFunction::Sio);
        gpio.set_direction(config.pin_dc, Direction::Output);

        gpio.set_function(config.pin_cs, PinFunction::Sio);
        gpio.set_direction(config.pin_cs, Direction::Output);

        gpio.set_function(config.pin_clk, PinFunction::Spi);
        gpio.set_function(config.pin_mosi, PinFunction::Spi);
        if let Some(pin) = config.pin_miso {
            gpio.set_function(pin, PinFunction::Spi);
        }

        // Idle the bus before the peripheral starts clocking.
        gpio.put(config.pin_cs, true);

        let bus = self.transport.bus_mut();
        bus.init(config.spi_frequency);
        bus.set_data_bits(8);
        let baud = bus.set_baudrate(config.spi_frequency);
        debug!("Baudrate is set to {}.", baud);
    }

    /// Programs the controller window `(x1, y1)..=(x2, y2)` and opens a memory write.
    ///
    /// Column and page ranges are only resent when they differ from the cached
    /// window.
    pub fn set_address_window(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) {
        let x1 = x1.wrapping_add(self.config.offset_x);
        let y1 = y1.wrapping_add(self.config.offset_y);
        let x2 = x2.wrapping_add(self.config.offset_x);
        let y2 = y2.wrapping_add(self.config.offset_y);

        if self.window.update_columns(x1, x2) {
            self.transport.write_command(dcs::SET_COLUMN_ADDRESS);
            self.transport.write_data(&dcs::encode_range(x1, x2));
        }

        if self.window.update_pages(y1, y2) {
            self.transport.write_command(dcs::SET_PAGE_ADDRESS);
            self.transport.write_data(&dcs::encode_range(y1, y2));
        }

        self.transport.write_command(dcs::WRITE_MEMORY_START);
    }

    /// Points the controller at a single pixel and opens a memory write.
    ///
    /// Only start coordinates are sent, so the cached window no longer
    /// matches the controller and is dropped.
    pub fn set_address_point(&mut self, x: u16, y: u16) {
        let x = x.wrapping_add(self.config.offset_x);
        let y = y.wrapping_add(self.config.offset_y);

        self.transport.write_command(dcs::SET_COLUMN_ADDRESS);
        self.transport.write_data(&dcs::encode_start(x));

        self.transport.write_command(dcs::SET_PAGE_ADDRESS);
        self.transport.write_data(&dcs::encode_start(y));

        self.window.invalidate();

        self.transport.write_command(dcs::WRITE_MEMORY_START);
    }

    /// Writes a `w` by `h` block of pixels at `(x, y)`.
    ///
    /// Returns the number of pixel bytes sent; command bytes are not counted.
    /// With an active DMA path the call returns while the transfer runs.
    pub fn write_region(&mut self, x: u16, y: u16, w: u16, h: u16, buffer: &[u8]) -> usize {
        if w == 0 || h == 0 {
            return 0;
        }

        let x2 = x + w - 1;
        let y2 = y + h - 1;
        let size = w as usize * h as usize * self.config.bytes_per_pixel();

        self.set_address_window(x, y, x2, y2);

        let data = &buffer[..size.min(buffer.len())];
        match self.dma.as_mut() {
            Some(dma) if dma.is_ready() => dma.write(&mut self.transport, data),
            _ => self.transport.write_data(data),
        }

        size
    }

    /// Writes a single pixel. Returns the number of pixel bytes sent.
    pub fn write_point(&mut self, x: u16, y: u16, pixel: &[u8]) -> usize {
        let size = self.config.bytes_per_pixel();

        self.set_address_point(x, y);
        self.transport.write_data(&pixel[..size.min(pixel.len())]);

        size
    }

    /// Fills a `w` by `h` block with one color.
    ///
    /// Always streams 16-bit words, so this is only correct at depth 16.
    /// Returns the number of pixels written.
    pub fn fill_region(&mut self, x: u16, y: u16, w: u16, h: u16, color: Color) -> usize {
        if w == 0 || h == 0 {
            return 0;
        }

        let x2 = x + w - 1;
        let y2 = y + h - 1;
        let size = w as usize * h as usize;

        self.set_address_window(x, y, x2, y2);
        self.transport.write_repeated_words(color, size);

        size
    }

    /// Sends a raw DCS command.
    ///
    /// Status "get" commands read their reply into `data`; everything else
    /// sends `data` as parameters.
    pub fn ioctl(&mut self, command: u8, data: &mut [u8]) {
        self.transport.write_command(command);

        if dcs::is_read_command(command) {
            self.transport.read_data(data);
        } else {
            self.transport.write_data(data);
        }

        if dcs::affects_address_window(command) {
            self.window.invalidate();
        }
    }

    /// Blocks until a running DMA transfer is done with its source buffer.
    pub fn wait_for_dma(&mut self) {
        if let Some(dma) = self.dma.as_mut() {
            dma.wait();
        }
    }

    /// Busy-waits for the tearing-effect line, if one is wired.
    ///
    /// There is no timeout: a stuck line blocks forever.
    pub fn wait_for_vsync(&mut self) {
        if let Some(pin) = self.config.pin_te {
            let gpio = self.transport.gpio_mut();
            while !gpio.get(pin) {}
        }
    }

    /// Releases the SPI bus. Buffers and the DMA channel stay claimed.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.transport.bus_mut().deinit();
        self.closed = true;
        debug!("SPI bus released.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{BusEvent, SimBus, SimDelay, SimDma, SimGpio, SimPanel};

    fn small_config() -> DisplayConfig {
        DisplayConfig {
            width: 16,
            height: 8,
            offset_x: 0,
            offset_y: 0,
            ..Default::default()
        }
    }

    fn display(config: DisplayConfig) -> (SimPanel, MipiDisplay<SimBus, SimGpio>) {
        let panel = SimPanel::new(&config);
        let display = MipiDisplay::new(config, panel.bus(), panel.gpio());
        (panel, display)
    }

    fn ready_display(config: DisplayConfig) -> (SimPanel, MipiDisplay<SimBus, SimGpio>) {
        let (panel, mut display) = display(config);
        display.init(&mut panel.delay(), Buffering::Single);
        panel.clear_events();
        (panel, display)
    }

    fn dma_display(config: DisplayConfig) -> (SimPanel, MipiDisplay<SimBus, SimGpio, SimDma>) {
        let panel = SimPanel::new(&config);
        let mut display = MipiDisplay::new(config, panel.bus(), panel.gpio()).with_dma(panel.dma());
        display.init(&mut panel.delay(), Buffering::Double);
        panel.clear_events();
        (panel, display)
    }

    #[test]
    fn test_init_sequence() {
        let config = DisplayConfig {
            pin_rst: Some(12),
            pin_bl: Some(25),
            pin_power: Some(20),
            ..small_config()
        };
        let (panel, mut display) = display(config);
        let mut delay: SimDelay = panel.delay();
        display.init(&mut delay, Buffering::Single);

        assert_eq!(
            panel.commands(),
            vec![
                dcs::SOFT_RESET,
                dcs::SET_ADDRESS_MODE,
                dcs::SET_PIXEL_FORMAT,
                dcs::ENTER_INVERT_MODE,
                dcs::EXIT_SLEEP_MODE,
                dcs::SET_DISPLAY_ON,
                dcs::SET_COLUMN_ADDRESS,
                dcs::SET_PAGE_ADDRESS,
                dcs::WRITE_MEMORY_START,
            ]
        );

        assert_eq!(panel.pin_history(12), vec![false, true]);
        assert_eq!(panel.pin_history(25), vec![true]);
        assert_eq!(panel.pin_history(20), vec![true]);
        assert!(panel.bus_initialized());
        assert_eq!(panel.data_bits(), 8);
        // 100 settle + 2 x 100 reset + 3 x 200 command delays
        assert_eq!(panel.elapsed_ms(), 900);

        let state = panel.controller();
        assert_eq!(state.address_mode, 0x68);
        assert_eq!(state.pixel_format, 0x55);
        assert!(state.inverted);
        assert!(!state.sleeping);
        assert!(state.display_on);
        assert_eq!(state.columns, (0, 15));
        assert_eq!(state.pages, (0, 7));

        assert_eq!(display.window().columns(), Some((0, 15)));
        assert_eq!(display.window().pages(), Some((0, 7)));
        assert!(!display.dma_active());
    }

    #[test]
    fn test_init_with_tearing_pin() {
        let config = DisplayConfig {
            pin_te: Some(22),
            invert: false,
            ..small_config()
        };
        let (panel, mut display) = display(config);
        display.init(&mut panel.delay(), Buffering::Double);

        let commands = panel.commands();
        assert!(commands.contains(&dcs::SET_TEAR_ON));
        assert!(commands.contains(&dcs::EXIT_INVERT_MODE));
        assert!(!commands.contains(&dcs::ENTER_INVERT_MODE));
        assert!(panel.controller().tearing_on);
        assert!(panel.pin_pulled_up(22));
        assert_eq!(panel.pin_direction(22), Some(Direction::Input));
    }

    #[test]
    fn test_init_skips_bus_setup() {
        let config = DisplayConfig {
            init_spi: false,
            ..small_config()
        };
        let (panel, mut display) = display(config);
        display.init(&mut panel.delay(), Buffering::Single);

        assert!(!panel.bus_initialized());
        assert_eq!(panel.commands()[0], dcs::SOFT_RESET);
    }

    #[test]
    fn test_window_elides_unchanged_ranges() {
        let (panel, mut display) = ready_display(small_config());

        display.set_address_window(0, 0, 3, 3);
        display.set_address_window(0, 4, 3, 7);
        display.set_address_window(4, 4, 7, 7);

        assert_eq!(
            panel.commands(),
            vec![
                dcs::SET_COLUMN_ADDRESS,
                dcs::SET_PAGE_ADDRESS,
                dcs::WRITE_MEMORY_START,
                // same columns
                dcs::SET_PAGE_ADDRESS,
                dcs::WRITE_MEMORY_START,
                // same pages
                dcs::SET_COLUMN_ADDRESS,
                dcs::WRITE_MEMORY_START,
            ]
        );
    }

    #[test]
    fn test_identical_window_twice() {
        let (panel, mut display) = ready_display(small_config());

        display.set_address_window(2, 1, 9, 5);
        panel.clear_events();
        display.set_address_window(2, 1, 9, 5);
        display.set_address_window(2, 1, 9, 5);

        assert_eq!(
            panel.commands(),
            vec![dcs::WRITE_MEMORY_START, dcs::WRITE_MEMORY_START]
        );
    }

    #[test]
    fn test_window_applies_offsets() {
        let (panel, mut display) = ready_display(DisplayConfig::default());

        display.set_address_window(0, 0, 159, 79);
        // Full screen is already programmed by init.
        assert_eq!(panel.commands(), vec![dcs::WRITE_MEMORY_START]);

        display.set_address_window(10, 10, 19, 19);
        assert_eq!(display.window().columns(), Some((11, 20)));
        assert_eq!(display.window().pages(), Some((36, 45)));
        assert_eq!(
            panel.events()[2],
            BusEvent::Data(vec![0x00, 11, 0x00, 20])
        );
    }

    #[test]
    fn test_point_invalidates_window() {
        let (panel, mut display) = ready_display(small_config());

        display.write_point(3, 4, &[0xF8, 0x00]);
        assert_eq!(
            panel.events(),
            vec![
                BusEvent::Command(dcs::SET_COLUMN_ADDRESS),
                BusEvent::Data(vec![0x00, 0x03]),
                BusEvent::Command(dcs::SET_PAGE_ADDRESS),
                BusEvent::Data(vec![0x00, 0x04]),
                BusEvent::Command(dcs::WRITE_MEMORY_START),
                BusEvent::Data(vec![0xF8, 0x00]),
            ]
        );
        assert_eq!(panel.pixel(3, 4), Some(0xF800));
        assert_eq!(display.window(), AddressWindow::unknown());

        panel.clear_events();
        display.set_address_window(0, 0, 15, 7);
        assert_eq!(
            panel.commands(),
            vec![
                dcs::SET_COLUMN_ADDRESS,
                dcs::SET_PAGE_ADDRESS,
                dcs::WRITE_MEMORY_START
            ]
        );
    }

    #[test]
    fn test_empty_regions_are_silent() {
        let (panel, mut display) = ready_display(small_config());

        assert_eq!(display.write_region(0, 0, 0, 4, &[0; 8]), 0);
        assert_eq!(display.write_region(0, 0, 4, 0, &[0; 8]), 0);
        assert_eq!(display.fill_region(1, 1, 0, 3, 0xFFFF), 0);
        assert_eq!(display.fill_region(1, 1, 3, 0, 0xFFFF), 0);
        assert!(panel.events().is_empty());
    }

    #[test]
    fn test_write_region() {
        let (panel, mut display) = ready_display(small_config());
        let pixels: Vec<u8> = (0..2 * 3 * 2).map(|i| i as u8).collect();

        assert_eq!(display.write_region(4, 2, 2, 3, &pixels), 12);
        assert_eq!(panel.data_bytes_after_memory_write(), 12);
        assert_eq!(panel.pixel(4, 2), Some(0x0001));
        assert_eq!(panel.pixel(5, 2), Some(0x0203));
        assert_eq!(panel.pixel(4, 3), Some(0x0405));
        assert_eq!(panel.pixel(5, 4), Some(0x0A0B));
    }

    #[test]
    fn test_write_region_depth_8() {
        let config = DisplayConfig {
            depth: 8,
            pixel_format: dcs::pixel_format::RGB332,
            ..small_config()
        };
        let (panel, mut display) = ready_display(config);

        assert_eq!(display.write_region(0, 0, 4, 2, &[0xE0; 8]), 8);
        assert_eq!(display.write_point(7, 7, &[0x1C]), 1);
        assert_eq!(panel.pixel(3, 1), Some(0xE0));
        assert_eq!(panel.pixel(7, 7), Some(0x1C));
    }

    #[test]
    fn test_fill_region() {
        let (panel, mut display) = ready_display(small_config());

        assert_eq!(display.fill_region(2, 2, 3, 2, 0x07E0), 6);
        assert_eq!(panel.data_bytes_after_memory_write(), 12);
        assert_eq!(panel.pixel(2, 2), Some(0x07E0));
        assert_eq!(panel.pixel(4, 3), Some(0x07E0));
        assert_eq!(panel.pixel(5, 3), Some(0x0000));
        assert_eq!(panel.data_bits(), 8);
    }

    #[test]
    fn test_ioctl_routes_reads_and_writes() {
        let (panel, mut display) = ready_display(small_config());

        let mut id = [0x55u8; 3];
        display.ioctl(dcs::GET_DISPLAY_ID, &mut id);
        assert_eq!(id, [0x55; 3]);
        assert_eq!(panel.events(), vec![BusEvent::Command(dcs::GET_DISPLAY_ID)]);

        panel.clear_events();
        display.ioctl(dcs::SET_DISPLAY_BRIGHTNESS, &mut [0x80]);
        assert_eq!(
            panel.events(),
            vec![
                BusEvent::Command(dcs::SET_DISPLAY_BRIGHTNESS),
                BusEvent::Data(vec![0x80])
            ]
        );
        assert_eq!(display.window().columns(), Some((0, 15)));

        display.ioctl(dcs::SET_COLUMN_ADDRESS, &mut dcs::encode_range(1, 2));
        assert_eq!(display.window(), AddressWindow::unknown());
    }

    #[test]
    fn test_dma_region_write() {
        let (panel, mut display) = dma_display(small_config());
        assert!(display.dma_active());

        let frame = vec![0xFFu8; 16 * 8 * 2];
        assert_eq!(display.write_region(0, 0, 16, 8, &frame), 256);
        assert_eq!(display.write_region(0, 0, 16, 8, &frame), 256);

        let stats = panel.dma_stats();
        assert_eq!(stats.transfers, 2);
        assert_eq!(stats.waits, 2);
        assert_eq!(stats.overlaps, 0);
        assert_eq!(panel.pixel(15, 7), Some(0xFFFF));
        // Only memory-write-start: the window was already full screen.
        assert_eq!(
            panel.commands(),
            vec![dcs::WRITE_MEMORY_START, dcs::WRITE_MEMORY_START]
        );
    }

    #[test]
    fn test_dma_unused_for_single_buffer() {
        let config = small_config();
        let panel = SimPanel::new(&config);
        let mut display = MipiDisplay::new(config, panel.bus(), panel.gpio()).with_dma(panel.dma());
        display.init(&mut panel.delay(), Buffering::Single);

        assert!(display.has_dma_channel());
        assert!(!display.dma_active());
        display.write_region(0, 0, 2, 2, &[0; 8]);
        assert_eq!(panel.dma_stats().transfers, 0);
    }

    #[test]
    fn test_vsync_wait() {
        let config = DisplayConfig {
            pin_te: Some(22),
            ..small_config()
        };
        let (panel, mut display) = ready_display(config);
        panel.set_tearing_period(4);

        display.wait_for_vsync();
        assert_eq!(panel.tearing_polls(), 5);
        assert_eq!(panel.events(), vec![BusEvent::Vsync]);
    }

    #[test]
    fn test_close_releases_bus_once() {
        let (panel, mut display) = ready_display(small_config());
        display.close();
        display.close();
        assert!(display.is_closed());
        assert!(!panel.bus_initialized());
        assert_eq!(panel.bus_deinits(), 1);
    }
}
