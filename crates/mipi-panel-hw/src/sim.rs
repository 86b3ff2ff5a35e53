//! Simulated panel for host-side runs.
//!
//! The bus, GPIO bank, DMA channel and delay handles all share one state.
//! Bytes clocked out while chip-select is low are decoded as MIPI DCS, so the
//! simulated controller keeps its own address window and GRAM, independent
//! of the driver's cache.

use crate::bitmap::{rgb332_to_rgb888, rgb565_to_rgb888, rgb888_to_rgb565};
use crate::config::DisplayConfig;
use crate::dcs;
use crate::hal::{ChannelConfig, Direction, DmaChannel, Gpio, PinFunction, SpiBus};
use embedded_hal::delay::DelayNs;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Peripheral clock feeding the simulated SPI block.
const PERI_CLOCK_HZ: u32 = 125_000_000;

/// Data-request line of the simulated SPI transmit FIFO.
const TX_REQUEST: u8 = 16;

/// Address of the simulated SPI data register.
const DATA_REGISTER: usize = 0x4003_C008;

/// Something observed on the wires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// Byte clocked with D/C low.
    Command(u8),
    /// Bytes clocked with D/C high within one chip-select assertion.
    Data(Vec<u8>),
    /// Tearing-effect line read as asserted.
    Vsync,
}

/// Counters kept by the simulated DMA channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DmaStats {
    pub transfers: usize,
    pub waits: usize,
    /// Transfers started while the previous one was never waited for.
    pub overlaps: usize,
    pub bytes: usize,
    pub in_flight: bool,
}

/// Registers of the simulated controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    pub address_mode: u8,
    pub pixel_format: u8,
    pub inverted: bool,
    pub sleeping: bool,
    pub display_on: bool,
    pub tearing_on: bool,
    /// Inclusive column range in controller RAM.
    pub columns: (u16, u16),
    /// Inclusive page range in controller RAM.
    pub pages: (u16, u16),
}

impl ControllerState {
    fn power_on(width: u16, height: u16) -> Self {
        Self {
            address_mode: 0,
            pixel_format: dcs::pixel_format::RGB666,
            inverted: false,
            sleeping: true,
            display_on: false,
            tearing_on: false,
            columns: (0, width.saturating_sub(1)),
            pages: (0, height.saturating_sub(1)),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Pin {
    function: Option<PinFunction>,
    direction: Option<Direction>,
    pulled_up: bool,
    level: bool,
    history: Vec<bool>,
}

struct State {
    pin_cs: u8,
    pin_dc: u8,
    pin_te: Option<u8>,
    pins: HashMap<u8, Pin>,

    bus_initialized: bool,
    bus_deinits: usize,
    baudrate: u32,
    data_bits: u8,
    overrun_clears: usize,
    fifo_stall: usize,
    fifo_stalls: usize,

    events: Vec<BusEvent>,
    burst_open: bool,

    controller: ControllerState,
    command: Option<u8>,
    params: Vec<u8>,
    pixel: Vec<u8>,
    cursor: (u16, u16),

    offset_x: u16,
    offset_y: u16,
    width: u16,
    height: u16,
    gram_width: u16,
    gram_height: u16,
    gram: Vec<u16>,

    tearing_period: usize,
    tearing_counter: usize,
    tearing_polls: usize,

    dma_config: Option<ChannelConfig>,
    dma: DmaStats,
    dma_sources: Vec<usize>,

    elapsed_ns: u64,
}

impl State {
    fn new(config: &DisplayConfig) -> Self {
        let gram_width = config.width + config.offset_x;
        let gram_height = config.height + config.offset_y;

        let mut pins = HashMap::new();
        // Chip-select idles high through the board pull-up.
        pins.insert(
            config.pin_cs,
            Pin {
                level: true,
                ..Default::default()
            },
        );

        Self {
            pin_cs: config.pin_cs,
            pin_dc: config.pin_dc,
            pin_te: config.pin_te,
            pins,
            bus_initialized: false,
            bus_deinits: 0,
            baudrate: 0,
            data_bits: 8,
            overrun_clears: 0,
            fifo_stall: 0,
            fifo_stalls: 0,
            events: Vec::new(),
            burst_open: false,
            controller: ControllerState::power_on(gram_width, gram_height),
            command: None,
            params: Vec::new(),
            pixel: Vec::new(),
            cursor: (0, 0),
            offset_x: config.offset_x,
            offset_y: config.offset_y,
            width: config.width,
            height: config.height,
            gram_width,
            gram_height,
            gram: vec![0; gram_width as usize * gram_height as usize],
            tearing_period: 0,
            tearing_counter: 0,
            tearing_polls: 0,
            dma_config: None,
            dma: DmaStats::default(),
            dma_sources: Vec::new(),
            elapsed_ns: 0,
        }
    }

    fn level(&self, pin: u8) -> bool {
        self.pins.get(&pin).is_some_and(|p| p.level)
    }

    fn pin(&mut self, pin: u8) -> &mut Pin {
        self.pins.entry(pin).or_default()
    }

    fn put(&mut self, pin: u8, high: bool) {
        if pin == self.pin_cs && high {
            self.burst_open = false;
        }
        let is_control = pin == self.pin_cs || pin == self.pin_dc;
        let state = self.pin(pin);
        state.level = high;
        if !is_control {
            state.history.push(high);
        }
    }

    fn sample(&mut self, pin: u8) -> bool {
        if Some(pin) != self.pin_te {
            return self.level(pin);
        }

        self.tearing_polls += 1;
        if self.tearing_counter < self.tearing_period {
            self.tearing_counter += 1;
            return false;
        }
        self.tearing_counter = 0;
        self.events.push(BusEvent::Vsync);
        self.burst_open = false;
        true
    }

    /// Clocks one frame out of the shift register.
    fn shift(&mut self, word: u16) {
        // Not selected: the controller ignores the bus.
        if self.level(self.pin_cs) {
            return;
        }

        let data = self.level(self.pin_dc);
        let [hi, lo] = word.to_be_bytes();
        let bytes: &[u8] = if self.data_bits == 16 { &[hi, lo] } else { &[lo] };
        for &byte in bytes {
            if data {
                self.data(byte);
            } else {
                self.command(byte);
            }
        }
    }

    fn command(&mut self, command: u8) {
        self.events.push(BusEvent::Command(command));
        self.burst_open = false;
        self.command = Some(command);
        self.params.clear();
        self.pixel.clear();

        let controller = &mut self.controller;
        match command {
            dcs::SOFT_RESET => {
                *controller = ControllerState::power_on(self.gram_width, self.gram_height);
            }
            dcs::ENTER_SLEEP_MODE => controller.sleeping = true,
            dcs::EXIT_SLEEP_MODE => controller.sleeping = false,
            dcs::SET_DISPLAY_OFF => controller.display_on = false,
            dcs::SET_DISPLAY_ON => controller.display_on = true,
            dcs::ENTER_INVERT_MODE => controller.inverted = true,
            dcs::EXIT_INVERT_MODE => controller.inverted = false,
            dcs::SET_TEAR_ON => controller.tearing_on = true,
            dcs::SET_TEAR_OFF => controller.tearing_on = false,
            dcs::WRITE_MEMORY_START => self.cursor = (controller.columns.0, controller.pages.0),
            _ => {}
        }
    }

    fn data(&mut self, byte: u8) {
        match self.events.last_mut() {
            Some(BusEvent::Data(bytes)) if self.burst_open => bytes.push(byte),
            _ => self.events.push(BusEvent::Data(vec![byte])),
        }
        self.burst_open = true;

        let Some(command) = self.command else {
            return;
        };

        self.params.push(byte);
        let params = &self.params;
        let controller = &mut self.controller;
        match command {
            dcs::SET_COLUMN_ADDRESS => match params.len() {
                2 => controller.columns.0 = u16::from_be_bytes([params[0], params[1]]),
                4 => controller.columns.1 = u16::from_be_bytes([params[2], params[3]]),
                _ => {}
            },
            dcs::SET_PAGE_ADDRESS => match params.len() {
                2 => controller.pages.0 = u16::from_be_bytes([params[0], params[1]]),
                4 => controller.pages.1 = u16::from_be_bytes([params[2], params[3]]),
                _ => {}
            },
            dcs::SET_ADDRESS_MODE if params.len() == 1 => controller.address_mode = byte,
            dcs::SET_PIXEL_FORMAT if params.len() == 1 => controller.pixel_format = byte,
            dcs::WRITE_MEMORY_START | dcs::WRITE_MEMORY_CONTINUE => {
                let bytes_per_pixel = dcs::pixel_format::bytes_per_pixel(controller.pixel_format);
                self.params.clear();
                self.pixel.push(byte);
                if self.pixel.len() == bytes_per_pixel {
                    self.store_pixel();
                }
            }
            _ => {}
        }
    }

    fn store_pixel(&mut self) {
        let value = match self.pixel.as_slice() {
            [v] => *v as u16,
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [r, g, b] => rgb888_to_rgb565(*r, *g, *b),
            _ => 0,
        };
        self.pixel.clear();

        let (x, y) = self.cursor;
        if x < self.gram_width && y < self.gram_height {
            self.gram[y as usize * self.gram_width as usize + x as usize] = value;
        }

        let (x0, x1) = self.controller.columns;
        let (y0, y1) = self.controller.pages;
        self.cursor = if x >= x1 {
            (x0, if y >= y1 { y0 } else { y + 1 })
        } else {
            (x + 1, y)
        };
    }
}

/// Handle to a simulated panel and its wiring.
#[derive(Clone)]
pub struct SimPanel {
    state: Rc<RefCell<State>>,
}

impl SimPanel {
    /// Creates a powered-off panel wired as described by `config`.
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::new(config))),
        }
    }

    pub fn bus(&self) -> SimBus {
        SimBus {
            state: self.state.clone(),
        }
    }

    pub fn gpio(&self) -> SimGpio {
        SimGpio {
            state: self.state.clone(),
        }
    }

    pub fn dma(&self) -> SimDma {
        SimDma {
            state: self.state.clone(),
        }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay {
            state: self.state.clone(),
        }
    }

    /// Visible width in pixels.
    pub fn width(&self) -> u16 {
        self.state.borrow().width
    }

    /// Visible height in pixels.
    pub fn height(&self) -> u16 {
        self.state.borrow().height
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.state.borrow().events.clone()
    }

    /// Command bytes seen so far, in order.
    pub fn commands(&self) -> Vec<u8> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|event| match event {
                BusEvent::Command(command) => Some(*command),
                _ => None,
            })
            .collect()
    }

    /// Number of times `command` was sent.
    pub fn command_count(&self, command: u8) -> usize {
        self.commands().iter().filter(|&&c| c == command).count()
    }

    /// Data bytes sent since the most recent memory-write-start.
    pub fn data_bytes_after_memory_write(&self) -> usize {
        let state = self.state.borrow();
        state
            .events
            .iter()
            .rev()
            .take_while(|event| **event != BusEvent::Command(dcs::WRITE_MEMORY_START))
            .map(|event| match event {
                BusEvent::Data(bytes) => bytes.len(),
                _ => 0,
            })
            .sum()
    }

    /// Total data bytes sent as pixel payload.
    pub fn pixel_bytes(&self) -> usize {
        let state = self.state.borrow();
        let mut in_memory_write = false;
        let mut total = 0;
        for event in &state.events {
            match event {
                BusEvent::Command(command) => {
                    in_memory_write = *command == dcs::WRITE_MEMORY_START
                        || *command == dcs::WRITE_MEMORY_CONTINUE;
                }
                BusEvent::Data(bytes) if in_memory_write => total += bytes.len(),
                _ => {}
            }
        }
        total
    }

    pub fn clear_events(&self) {
        let mut state = self.state.borrow_mut();
        state.events.clear();
        state.burst_open = false;
        state.tearing_polls = 0;
    }

    /// True while chip-select is asserted.
    pub fn chip_selected(&self) -> bool {
        let state = self.state.borrow();
        !state.level(state.pin_cs)
    }

    pub fn data_bits(&self) -> u8 {
        self.state.borrow().data_bits
    }

    pub fn overrun_clears(&self) -> usize {
        self.state.borrow().overrun_clears
    }

    /// Makes the transmit FIFO report full for the next `polls` checks.
    pub fn stall_fifo(&self, polls: usize) {
        self.state.borrow_mut().fifo_stall = polls;
    }

    pub fn fifo_stalls(&self) -> usize {
        self.state.borrow().fifo_stalls
    }

    pub fn bus_initialized(&self) -> bool {
        self.state.borrow().bus_initialized
    }

    pub fn bus_deinits(&self) -> usize {
        self.state.borrow().bus_deinits
    }

    pub fn baudrate(&self) -> u32 {
        self.state.borrow().baudrate
    }

    /// Levels driven onto a non-control pin, oldest first.
    pub fn pin_history(&self, pin: u8) -> Vec<bool> {
        self.state
            .borrow()
            .pins
            .get(&pin)
            .map(|p| p.history.clone())
            .unwrap_or_default()
    }

    pub fn pin_direction(&self, pin: u8) -> Option<Direction> {
        self.state.borrow().pins.get(&pin).and_then(|p| p.direction)
    }

    pub fn pin_function(&self, pin: u8) -> Option<PinFunction> {
        self.state.borrow().pins.get(&pin).and_then(|p| p.function)
    }

    pub fn pin_pulled_up(&self, pin: u8) -> bool {
        self.state.borrow().pins.get(&pin).is_some_and(|p| p.pulled_up)
    }

    pub fn controller(&self) -> ControllerState {
        self.state.borrow().controller.clone()
    }

    /// Number of low reads of the tearing line before each assertion.
    pub fn set_tearing_period(&self, polls: usize) {
        let mut state = self.state.borrow_mut();
        state.tearing_period = polls;
        state.tearing_counter = 0;
    }

    /// Reads of the tearing line since the last `clear_events`.
    pub fn tearing_polls(&self) -> usize {
        self.state.borrow().tearing_polls
    }

    pub fn dma_config(&self) -> Option<ChannelConfig> {
        self.state.borrow().dma_config
    }

    pub fn dma_stats(&self) -> DmaStats {
        self.state.borrow().dma
    }

    /// Source address of every DMA transfer, in start order.
    pub fn dma_sources(&self) -> Vec<usize> {
        self.state.borrow().dma_sources.clone()
    }

    /// Total time spent in delays.
    pub fn elapsed_ms(&self) -> u64 {
        self.state.borrow().elapsed_ns / 1_000_000
    }

    /// Raw GRAM value at a visible coordinate.
    pub fn pixel(&self, x: u16, y: u16) -> Option<u16> {
        let state = self.state.borrow();
        if x >= state.width || y >= state.height {
            return None;
        }
        let gx = (x + state.offset_x) as usize;
        let gy = (y + state.offset_y) as usize;
        state.gram.get(gy * state.gram_width as usize + gx).copied()
    }

    /// Visible area as RGBA8 bytes, row-major.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let state = self.state.borrow();
        let one_byte = dcs::pixel_format::bytes_per_pixel(state.controller.pixel_format) == 1;

        let mut rgba = Vec::with_capacity(state.width as usize * state.height as usize * 4);
        for y in 0..state.height {
            for x in 0..state.width {
                let gx = (x + state.offset_x) as usize;
                let gy = (y + state.offset_y) as usize;
                let value = state.gram[gy * state.gram_width as usize + gx];
                let (r, g, b) = if one_byte {
                    rgb332_to_rgb888(value as u8)
                } else {
                    rgb565_to_rgb888(value)
                };
                rgba.extend_from_slice(&[r, g, b, 255]);
            }
        }
        rgba
    }
}

/// Simulated SPI master.
pub struct SimBus {
    state: Rc<RefCell<State>>,
}

impl SpiBus for SimBus {
    fn init(&mut self, frequency: u32) {
        let mut state = self.state.borrow_mut();
        state.bus_initialized = true;
        state.baudrate = frequency;
        state.data_bits = 8;
    }

    fn set_data_bits(&mut self, bits: u8) {
        self.state.borrow_mut().data_bits = bits;
    }

    fn set_baudrate(&mut self, frequency: u32) -> u32 {
        let divider = PERI_CLOCK_HZ.div_ceil(frequency.max(1)).max(2);
        let baud = PERI_CLOCK_HZ / divider;
        self.state.borrow_mut().baudrate = baud;
        baud
    }

    fn is_writable(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.fifo_stall > 0 {
            state.fifo_stall -= 1;
            state.fifo_stalls += 1;
            return false;
        }
        true
    }

    fn write_fifo(&mut self, word: u16) {
        self.state.borrow_mut().shift(word);
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn clear_overrun(&mut self) {
        self.state.borrow_mut().overrun_clears += 1;
    }

    fn deinit(&mut self) {
        let mut state = self.state.borrow_mut();
        state.bus_initialized = false;
        state.bus_deinits += 1;
    }

    fn tx_request(&self) -> u8 {
        TX_REQUEST
    }

    fn data_register(&self) -> usize {
        DATA_REGISTER
    }
}

/// Simulated GPIO bank.
pub struct SimGpio {
    state: Rc<RefCell<State>>,
}

impl Gpio for SimGpio {
    fn set_function(&mut self, pin: u8, function: PinFunction) {
        self.state.borrow_mut().pin(pin).function = Some(function);
    }

    fn set_direction(&mut self, pin: u8, direction: Direction) {
        self.state.borrow_mut().pin(pin).direction = Some(direction);
    }

    fn pull_up(&mut self, pin: u8) {
        self.state.borrow_mut().pin(pin).pulled_up = true;
    }

    fn put(&mut self, pin: u8, high: bool) {
        self.state.borrow_mut().put(pin, high);
    }

    fn get(&mut self, pin: u8) -> bool {
        self.state.borrow_mut().sample(pin)
    }
}

/// Simulated DMA channel.
///
/// Bytes reach the panel as soon as a transfer starts; the channel still
/// counts as busy until someone waits for it.
pub struct SimDma {
    state: Rc<RefCell<State>>,
}

impl DmaChannel for SimDma {
    fn configure(&mut self, config: ChannelConfig) {
        self.state.borrow_mut().dma_config = Some(config);
    }

    fn wait_for_finish(&mut self) {
        let mut state = self.state.borrow_mut();
        state.dma.waits += 1;
        state.dma.in_flight = false;
    }

    fn start(&mut self, source: &[u8]) {
        let mut state = self.state.borrow_mut();
        if state.dma.in_flight {
            state.dma.overlaps += 1;
        }
        state.dma.transfers += 1;
        state.dma.bytes += source.len();
        state.dma.in_flight = true;
        state.dma_sources.push(source.as_ptr() as usize);

        for &byte in source {
            state.shift(byte as u16);
        }
    }
}

/// Delay that only advances the simulated clock.
pub struct SimDelay {
    state: Rc<RefCell<State>>,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.state.borrow_mut().elapsed_ns += ns as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DisplayConfig {
        DisplayConfig {
            width: 4,
            height: 2,
            offset_x: 1,
            offset_y: 2,
            ..Default::default()
        }
    }

    fn send(panel: &SimPanel, command: u8, data: &[u8]) {
        let config = config();
        let mut gpio = panel.gpio();
        let mut bus = panel.bus();
        gpio.put(config.pin_dc, false);
        gpio.put(config.pin_cs, false);
        bus.write_fifo(command as u16);
        gpio.put(config.pin_dc, true);
        for &byte in data {
            bus.write_fifo(byte as u16);
        }
        gpio.put(config.pin_cs, true);
    }

    #[test]
    fn test_ignores_bus_when_deselected() {
        let panel = SimPanel::new(&config());
        panel.bus().write_fifo(0x29);
        assert!(panel.events().is_empty());
    }

    #[test]
    fn test_memory_write_wraps_in_window() {
        let panel = SimPanel::new(&config());
        send(&panel, dcs::SET_PIXEL_FORMAT, &[dcs::pixel_format::RGB565]);
        send(&panel, dcs::SET_COLUMN_ADDRESS, &dcs::encode_range(2, 3));
        send(&panel, dcs::SET_PAGE_ADDRESS, &dcs::encode_range(2, 3));
        send(&panel, dcs::WRITE_MEMORY_START, &[0, 1, 0, 2, 0, 3, 0, 4]);

        assert_eq!(panel.controller().columns, (2, 3));
        assert_eq!(panel.pixel(1, 0), Some(1));
        assert_eq!(panel.pixel(2, 0), Some(2));
        assert_eq!(panel.pixel(1, 1), Some(3));
        assert_eq!(panel.pixel(2, 1), Some(4));
        assert_eq!(panel.pixel(0, 0), Some(0));
        assert_eq!(panel.pixel(4, 0), None);
        assert_eq!(panel.pixel_bytes(), 8);
    }

    #[test]
    fn test_soft_reset_restores_power_on_state() {
        let panel = SimPanel::new(&config());
        send(&panel, dcs::EXIT_SLEEP_MODE, &[]);
        send(&panel, dcs::ENTER_INVERT_MODE, &[]);
        assert!(!panel.controller().sleeping);

        send(&panel, dcs::SOFT_RESET, &[]);
        let controller = panel.controller();
        assert!(controller.sleeping);
        assert!(!controller.inverted);
        assert_eq!(controller.columns, (0, 4));
        assert_eq!(controller.pages, (0, 3));
    }

    #[test]
    fn test_rgba_conversion() {
        let panel = SimPanel::new(&config());
        send(&panel, dcs::SET_PIXEL_FORMAT, &[dcs::pixel_format::RGB565]);
        send(&panel, dcs::SET_COLUMN_ADDRESS, &dcs::encode_range(1, 1));
        send(&panel, dcs::SET_PAGE_ADDRESS, &dcs::encode_range(2, 2));
        send(&panel, dcs::WRITE_MEMORY_START, &[0xF8, 0x00]);

        let rgba = panel.to_rgba8();
        assert_eq!(rgba.len(), 4 * 2 * 4);
        assert_eq!(&rgba[0..4], &[255, 0, 0, 255]);
        assert_eq!(&rgba[4..8], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_baudrate_divider() {
        let panel = SimPanel::new(&config());
        let mut bus = panel.bus();
        assert_eq!(bus.set_baudrate(62_500_000), 62_500_000);
        assert_eq!(bus.set_baudrate(40_000_000), 31_250_000);
        assert_eq!(panel.baudrate(), 31_250_000);
    }

    #[test]
    fn test_tearing_line_period() {
        let config = DisplayConfig {
            pin_te: Some(22),
            ..config()
        };
        let panel = SimPanel::new(&config);
        panel.set_tearing_period(2);
        let mut gpio = panel.gpio();

        let reads: Vec<bool> = (0..6).map(|_| gpio.get(22)).collect();
        assert_eq!(reads, vec![false, false, true, false, false, true]);
        assert_eq!(panel.tearing_polls(), 6);
    }
}
