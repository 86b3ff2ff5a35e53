//! Hardware traits the protocol layer is written against.
//!
//! These mirror the register-level operations of a microcontroller SPI
//! block, GPIO bank and DMA engine. All of them are infallible: the hardware
//! offers no error reporting the protocol could act on.

/// Function multiplexed onto a GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinFunction {
    /// Software controlled I/O.
    Sio,
    /// Routed to the SPI peripheral.
    Spi,
}

/// GPIO pin direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A bank of numbered GPIO pins.
pub trait Gpio {
    /// Selects the peripheral function of a pin.
    fn set_function(&mut self, pin: u8, function: PinFunction);

    /// Sets the direction of a pin.
    fn set_direction(&mut self, pin: u8, direction: Direction);

    /// Enables the internal pull-up of a pin.
    fn pull_up(&mut self, pin: u8);

    /// Drives an output pin.
    fn put(&mut self, pin: u8, high: bool);

    /// Samples a pin.
    fn get(&mut self, pin: u8) -> bool;
}

/// Synchronous serial (SPI master) peripheral.
///
/// Frames are mode 0, MSB first. Only the frame width changes at runtime.
pub trait SpiBus {
    /// Enables the peripheral at the requested clock.
    fn init(&mut self, frequency: u32);

    /// Sets the frame width in bits (8 or 16).
    fn set_data_bits(&mut self, bits: u8);

    /// Sets the clock and returns the rate actually achieved.
    fn set_baudrate(&mut self, frequency: u32) -> u32;

    /// True while the transmit FIFO can accept a word.
    fn is_writable(&self) -> bool;

    /// Pushes one frame into the transmit FIFO.
    fn write_fifo(&mut self, word: u16);

    /// True while the shift register is still clocking data out.
    fn is_busy(&self) -> bool;

    /// Clears the receive overrun interrupt flag.
    fn clear_overrun(&mut self);

    /// Disables the peripheral.
    fn deinit(&mut self);

    /// DMA data-request line paced by the transmit FIFO.
    fn tx_request(&self) -> u8;

    /// Address of the data register, used as the DMA destination.
    fn data_register(&self) -> usize;
}

/// Width of a single DMA transfer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferSize {
    Bits8,
    Bits16,
    Bits32,
}

/// Channel setup for memory-to-peripheral transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub transfer_size: TransferSize,
    /// Data-request line that paces the transfer.
    pub request: u8,
    /// Peripheral register written by every element.
    pub destination: usize,
}

/// A claimed DMA channel.
///
/// `start` returns while the transfer is still running. The source must stay
/// untouched until `wait_for_finish` returns. The backends wait before the
/// next transfer and before drawing into a buffer that may still be read.
pub trait DmaChannel {
    /// Applies the channel configuration without starting it.
    fn configure(&mut self, config: ChannelConfig);

    /// Blocks until the in-flight transfer, if any, has completed.
    fn wait_for_finish(&mut self);

    /// Programs the length and source address and triggers the transfer.
    fn start(&mut self, source: &[u8]);
}
