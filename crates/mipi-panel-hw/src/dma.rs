//! DMA transfer path for back buffer flushes.

use crate::hal::{ChannelConfig, DmaChannel, Gpio, SpiBus, TransferSize};
use crate::transport::Transport;
use tracing::debug;

/// Placeholder channel type for displays built without DMA.
///
/// Uninhabited, so a `MipiDisplay<_, _, NoDma>` can never hold a channel.
#[derive(Debug)]
pub enum NoDma {}

impl DmaChannel for NoDma {
    fn configure(&mut self, _config: ChannelConfig) {
        match *self {}
    }

    fn wait_for_finish(&mut self) {
        match *self {}
    }

    fn start(&mut self, _source: &[u8]) {
        match *self {}
    }
}

/// A DMA channel bound to one SPI bus.
pub struct DmaPath<D> {
    channel: D,
    ready: bool,
    /// A transfer was started and nobody has waited for it yet.
    busy: bool,
}

impl<D: DmaChannel> DmaPath<D> {
    pub fn new(channel: D) -> Self {
        Self {
            channel,
            ready: false,
            busy: false,
        }
    }

    /// Blocks until the last transfer has finished reading its source.
    pub fn wait(&mut self) {
        if self.busy {
            self.channel.wait_for_finish();
            self.busy = false;
        }
    }

    /// True once `init` has bound the channel to the bus.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Binds the channel to the bus transmit request with byte-wide transfers.
    pub fn init<B: SpiBus>(&mut self, bus: &B) {
        debug!("Initialising DMA.");

        self.channel.configure(ChannelConfig {
            transfer_size: TransferSize::Bits8,
            request: bus.tx_request(),
            destination: bus.data_register(),
        });
        self.ready = true;
    }

    /// Starts an asynchronous transfer of `data` to the panel.
    ///
    /// Waits for the previous transfer first, then returns while the new one
    /// is still running. Chip-select stays asserted; the next command phase
    /// takes over the control lines.
    pub fn write<B: SpiBus, G: Gpio>(&mut self, transport: &mut Transport<B, G>, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        transport.select_data();

        self.channel.wait_for_finish();
        self.channel.start(data);
        self.busy = true;
    }
}
