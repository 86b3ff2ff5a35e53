//! MIPI Display Command Set definitions and encoding.
//!
//! Command structure on the wire:
//! - Command byte sent with the D/C line low
//! - Zero or more parameter bytes sent with the D/C line high
//! - Address ranges are big-endian `start, end` pairs

pub const NOP: u8 = 0x00;
pub const SOFT_RESET: u8 = 0x01;
pub const GET_COMPRESSION_MODE: u8 = 0x03;
pub const GET_DISPLAY_ID: u8 = 0x04;
pub const GET_RED_CHANNEL: u8 = 0x06;
pub const GET_GREEN_CHANNEL: u8 = 0x07;
pub const GET_BLUE_CHANNEL: u8 = 0x08;
pub const GET_DISPLAY_STATUS: u8 = 0x09;
pub const GET_POWER_MODE: u8 = 0x0A;
pub const GET_ADDRESS_MODE: u8 = 0x0B;
pub const GET_PIXEL_FORMAT: u8 = 0x0C;
pub const GET_DISPLAY_MODE: u8 = 0x0D;
pub const GET_SIGNAL_MODE: u8 = 0x0E;
pub const GET_DIAGNOSTIC_RESULT: u8 = 0x0F;
pub const ENTER_SLEEP_MODE: u8 = 0x10;
pub const EXIT_SLEEP_MODE: u8 = 0x11;
pub const ENTER_PARTIAL_MODE: u8 = 0x12;
pub const ENTER_NORMAL_MODE: u8 = 0x13;
pub const EXIT_INVERT_MODE: u8 = 0x20;
pub const ENTER_INVERT_MODE: u8 = 0x21;
pub const SET_GAMMA_CURVE: u8 = 0x26;
pub const SET_DISPLAY_OFF: u8 = 0x28;
pub const SET_DISPLAY_ON: u8 = 0x29;
pub const SET_COLUMN_ADDRESS: u8 = 0x2A;
pub const SET_PAGE_ADDRESS: u8 = 0x2B;
pub const WRITE_MEMORY_START: u8 = 0x2C;
pub const WRITE_LUT: u8 = 0x2D;
pub const READ_MEMORY_START: u8 = 0x2E;
pub const SET_PARTIAL_ROWS: u8 = 0x30;
pub const SET_PARTIAL_COLUMNS: u8 = 0x31;
pub const SET_SCROLL_AREA: u8 = 0x33;
pub const SET_TEAR_OFF: u8 = 0x34;
pub const SET_TEAR_ON: u8 = 0x35;
pub const SET_ADDRESS_MODE: u8 = 0x36;
pub const SET_SCROLL_START: u8 = 0x37;
pub const EXIT_IDLE_MODE: u8 = 0x38;
pub const ENTER_IDLE_MODE: u8 = 0x39;
pub const SET_PIXEL_FORMAT: u8 = 0x3A;
pub const WRITE_MEMORY_CONTINUE: u8 = 0x3C;
pub const READ_MEMORY_CONTINUE: u8 = 0x3E;
pub const SET_TEAR_SCANLINE: u8 = 0x44;
pub const GET_SCANLINE: u8 = 0x45;
pub const SET_DISPLAY_BRIGHTNESS: u8 = 0x51;
pub const GET_DISPLAY_BRIGHTNESS: u8 = 0x52;
pub const WRITE_CONTROL_DISPLAY: u8 = 0x53;
pub const GET_CONTROL_DISPLAY: u8 = 0x54;
pub const WRITE_POWER_SAVE: u8 = 0x55;
pub const GET_POWER_SAVE: u8 = 0x56;
pub const READ_DDB_START: u8 = 0xA1;
pub const READ_DDB_CONTINUE: u8 = 0xA8;

/// Tear-on parameter: signal V-blank only.
pub const TEAR_ON_VSYNC: u8 = 0x00;

/// Pixel format parameters for `SET_PIXEL_FORMAT` (DPI and DBI nibbles).
pub mod pixel_format {
    pub const RGB332: u8 = 0x22;
    pub const RGB444: u8 = 0x33;
    pub const RGB565: u8 = 0x55;
    pub const RGB666: u8 = 0x66;
    pub const RGB888: u8 = 0x77;

    /// Bytes per pixel the controller expects on a byte-wide bus.
    pub fn bytes_per_pixel(format: u8) -> usize {
        match format & 0x07 {
            0x01 | 0x02 => 1,
            0x06 | 0x07 => 3,
            _ => 2,
        }
    }
}

/// Address mode (MADCTL) bits.
pub mod address_mode {
    /// Page address order (row mirror).
    pub const MY: u8 = 0x80;
    /// Column address order (column mirror).
    pub const MX: u8 = 0x40;
    /// Page/column exchange.
    pub const MV: u8 = 0x20;
    /// Line refresh order.
    pub const ML: u8 = 0x10;
    /// BGR subpixel order.
    pub const BGR: u8 = 0x08;
    /// Display data latch order.
    pub const MH: u8 = 0x04;
}

/// Returns true for the "get" commands whose reply is read back from the panel.
pub fn is_read_command(command: u8) -> bool {
    matches!(
        command,
        GET_COMPRESSION_MODE
            | GET_DISPLAY_ID
            | GET_RED_CHANNEL
            | GET_GREEN_CHANNEL
            | GET_BLUE_CHANNEL
            | GET_DISPLAY_STATUS
            | GET_POWER_MODE
            | GET_ADDRESS_MODE
            | GET_PIXEL_FORMAT
            | GET_DISPLAY_MODE
            | GET_SIGNAL_MODE
            | GET_DIAGNOSTIC_RESULT
            | GET_SCANLINE
            | GET_DISPLAY_BRIGHTNESS
            | GET_CONTROL_DISPLAY
            | GET_POWER_SAVE
            | READ_DDB_START
            | READ_DDB_CONTINUE
    )
}

/// Returns true for commands that move or reset the controller's address window.
pub fn affects_address_window(command: u8) -> bool {
    matches!(
        command,
        SOFT_RESET | SET_COLUMN_ADDRESS | SET_PAGE_ADDRESS | SET_ADDRESS_MODE
    )
}

/// Encodes an inclusive `start..=end` range as column/page address parameters.
pub fn encode_range(start: u16, end: u16) -> [u8; 4] {
    let [s_hi, s_lo] = start.to_be_bytes();
    let [e_hi, e_lo] = end.to_be_bytes();
    [s_hi, s_lo, e_hi, e_lo]
}

/// Encodes a single start coordinate for point addressing.
pub fn encode_start(start: u16) -> [u8; 2] {
    start.to_be_bytes()
}
