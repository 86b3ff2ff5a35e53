//! Byte-level command and data writers.
//!
//! Every transaction is framed by the D/C line (low for commands, high for
//! data) and the chip-select line (active low).

use crate::hal::{Gpio, SpiBus};
use tracing::trace;

/// SPI transport gated by chip-select and data/command pins.
pub struct Transport<B, G> {
    bus: B,
    gpio: G,
    pin_cs: u8,
    pin_dc: u8,
}

impl<B: SpiBus, G: Gpio> Transport<B, G> {
    /// Creates a transport over an already wired bus.
    pub fn new(bus: B, gpio: G, pin_cs: u8, pin_dc: u8) -> Self {
        Self {
            bus,
            gpio,
            pin_cs,
            pin_dc,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }

    /// Sends a single command byte.
    pub fn write_command(&mut self, command: u8) {
        trace!("command 0x{:02X}", command);
        self.gpio.put(self.pin_dc, false);
        self.gpio.put(self.pin_cs, false);

        self.shift_word(command as u16);
        self.drain();

        self.gpio.put(self.pin_cs, true);
    }

    /// Sends parameter or pixel bytes. Does nothing for an empty slice.
    pub fn write_data(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        self.select_data();
        for &byte in data {
            self.shift_word(byte as u16);
        }
        self.drain();

        self.gpio.put(self.pin_cs, true);
    }

    /// Reads reply bytes after a "get" command.
    ///
    /// Readback is not wired up: the buffer is left as it was.
    pub fn read_data(&mut self, buffer: &mut [u8]) {
        if buffer.is_empty() {
            return;
        }
        trace!("read of {} bytes not supported, buffer untouched", buffer.len());
    }

    /// Streams `count` copies of a 16-bit word using 16-bit frames.
    pub fn write_repeated_words(&mut self, word: u16, count: usize) {
        self.select_data();

        self.bus.set_data_bits(16);
        for _ in 0..count {
            self.shift_word(word);
        }
        self.drain();
        self.bus.set_data_bits(8);

        self.gpio.put(self.pin_cs, true);
    }

    /// Raises D/C and asserts chip-select ahead of a data phase.
    pub(crate) fn select_data(&mut self) {
        self.gpio.put(self.pin_dc, true);
        self.gpio.put(self.pin_cs, false);
    }

    fn shift_word(&mut self, word: u16) {
        while !self.bus.is_writable() {}
        self.bus.write_fifo(word);
    }

    /// Waits for the shifter to go idle and clears the overrun flag.
    fn drain(&mut self) {
        while self.bus.is_busy() {}
        self.bus.clear_overrun();
    }
}
