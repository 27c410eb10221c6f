//! Command codes and outbound request templates

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::{
    checksum,
    constants::HEADER_BYTE,
    error::{Error, Result},
};

/// Command codes understood by the host
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    /// Boot the application firmware
    StartApplication = 0x04,

    /// Ask which firmware image is running
    GetRunningStage = 0x0C,

    /// Single-tag inventory result
    SingleTagInventory = 0x21,

    /// Multi-tag inventory result; also the vendor-extension command that
    /// carries scan-start / scan-stop
    MultiTagInventory = 0xAA,
}

impl CommandCode {
    /// Check if packets with this code carry an inventory result
    pub fn is_inventory(self) -> bool {
        matches!(self, Self::SingleTagInventory | Self::MultiTagInventory)
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::StartApplication => "START_APP",
            Self::GetRunningStage => "GET_RUNNING_STAGE",
            Self::SingleTagInventory => "SINGLE_TAG_INVENTORY",
            Self::MultiTagInventory => "MULTI_TAG_INVENTORY",
        }
    }
}

impl From<CommandCode> for u8 {
    fn from(cmd: CommandCode) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x04 => Ok(Self::StartApplication),
            0x0C => Ok(Self::GetRunningStage),
            0x21 => Ok(Self::SingleTagInventory),
            0xAA => Ok(Self::MultiTagInventory),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// "Moduletech" vendor-extension preamble shared by the scan commands
const MODULETECH: [u8; 10] = *b"Moduletech";

const START_APPLICATION: [u8; 3] = [HEADER_BYTE, 0x00, 0x04];

const GET_RUNNING_STAGE: [u8; 3] = [HEADER_BYTE, 0x00, 0x0C];

const SCAN_START: [u8; 22] = [
    HEADER_BYTE, 0x13, 0xAA,
    MODULETECH[0], MODULETECH[1], MODULETECH[2], MODULETECH[3], MODULETECH[4],
    MODULETECH[5], MODULETECH[6], MODULETECH[7], MODULETECH[8], MODULETECH[9],
    0xAA, 0x48, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF2, 0xBB,
];

const SCAN_STOP: [u8; 17] = [
    HEADER_BYTE, 0x0E, 0xAA,
    MODULETECH[0], MODULETECH[1], MODULETECH[2], MODULETECH[3], MODULETECH[4],
    MODULETECH[5], MODULETECH[6], MODULETECH[7], MODULETECH[8], MODULETECH[9],
    0xAA, 0x49, 0xF3, 0xBB,
];

/// Canonical request frames, without their checksum
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Template {
    StartApplication,
    GetRunningStage,
    ScanStart,
    ScanStop,
}

impl Template {
    /// Raw template bytes: header, length, command, body
    pub fn bytes(self) -> &'static [u8] {
        match self {
            Self::StartApplication => &START_APPLICATION,
            Self::GetRunningStage => &GET_RUNNING_STAGE,
            Self::ScanStart => &SCAN_START,
            Self::ScanStop => &SCAN_STOP,
        }
    }

    /// Command code carried by the template
    pub fn command(self) -> CommandCode {
        match self {
            Self::StartApplication => CommandCode::StartApplication,
            Self::GetRunningStage => CommandCode::GetRunningStage,
            Self::ScanStart | Self::ScanStop => CommandCode::MultiTagInventory,
        }
    }

    /// Encode into a ready-to-send frame
    pub fn encode(self) -> Bytes {
        encode(self.bytes())
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartApplication => "start-application",
            Self::GetRunningStage => "get-running-stage",
            Self::ScanStart => "scan-start",
            Self::ScanStop => "scan-stop",
        };
        f.write_str(name)
    }
}

/// Append the big-endian CRC16 of everything after the header byte
///
/// # Examples
///
/// ```
/// use uhfrust_core::command;
///
/// let frame = command::encode(&[0xFF, 0x00, 0x04]);
/// assert_eq!(frame.as_ref(), &[0xFF, 0x00, 0x04, 0x1D, 0x0B]);
/// ```
pub fn encode(template: &[u8]) -> Bytes {
    let body = template.get(1..).unwrap_or_default();
    let crc = checksum::calculate(body);

    let mut buf = BytesMut::with_capacity(template.len() + 2);
    buf.put_slice(template);
    buf.put_u16(crc);

    trace!("Encoded request: {}", hex::encode(&buf));

    buf.freeze()
}
