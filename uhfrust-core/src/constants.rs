//! Protocol constants

/// First byte of every frame, in both directions
pub const HEADER_BYTE: u8 = 0xFF;

/// Bytes that must be buffered before the framer looks at a frame
pub const MIN_FRAME_PREFIX: usize = 5;

/// Response frame bytes that are not payload: header, length, command,
/// status (2) and checksum (2)
pub const RESPONSE_OVERHEAD: usize = 7;

/// Offset of the payload in a response frame
pub const PAYLOAD_OFFSET: usize = 5;

/// Status word reported by the reader on success
pub const STATUS_SUCCESS: u16 = 0x0000;

/// Bytes stripped from the front of an inventory payload (antenna, RSSI,
/// PC word and friends) before the EPC starts
pub const EPC_PREFIX_LEN: usize = 5;

/// Bytes stripped from the end of an inventory payload
pub const EPC_SUFFIX_LEN: usize = 2;

/// Seconds to wait for a start-application ack before asking the reader
/// which firmware it is running
pub const APP_START_TIMEOUT_SECS: u64 = 2;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Firmware image the reader is executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunningStage {
    Bootloader = 0x11,
    Application = 0x12,
}

impl RunningStage {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x11 => Some(Self::Bootloader),
            0x12 => Some(Self::Application),
            _ => None,
        }
    }
}
