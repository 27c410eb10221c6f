//! Reader response packet structure and encoding/decoding

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::CommandCode,
    constants::{HEADER_BYTE, PAYLOAD_OFFSET, RESPONSE_OVERHEAD, STATUS_SUCCESS},
    error::{Error, Result},
};

/// Reader response packet
///
/// # Packet Structure
///
/// ```text
/// ┌────────┬────────┬─────────┬──────────┬───────────┬──────────┐
/// │ Header │ Length │ Command │  Status  │  Payload  │  CRC16   │
/// │  0xFF  │ 1 byte │ 1 byte  │ 2 bytes  │  L bytes  │ 2 bytes  │
/// │        │  (L)   │         │ (BE u16) │           │ (BE u16) │
/// └────────┴────────┴─────────┴──────────┴───────────┴──────────┘
/// ```
///
/// The CRC covers everything from the length byte to the end of the payload.
///
/// # Examples
///
/// ```
/// use uhfrust_core::Packet;
///
/// let packet = Packet::new(0x0C, 0x0000, vec![0x12]);
/// let decoded = Packet::decode(packet.encode().freeze()).unwrap();
/// assert_eq!(decoded.payload.as_ref(), &[0x12]);
/// assert!(decoded.checksum_ok());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    /// Raw command code (may be one the host does not know)
    pub command: u8,

    /// Status word (0x0000 on success)
    pub status: u16,

    /// Packet payload
    pub payload: Bytes,

    /// Checksum as received (or as computed for locally built packets)
    checksum: u16,
}

impl Packet {
    /// Maximum payload size (the length field is a single byte)
    pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

    /// Create a packet; the checksum is computed from the fields
    ///
    /// # Panics
    ///
    /// In debug builds, if the payload exceeds [`Packet::MAX_PAYLOAD_SIZE`];
    /// the length field could not describe it.
    pub fn new(command: u8, status: u16, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        debug_assert!(
            payload.len() <= Self::MAX_PAYLOAD_SIZE,
            "payload of {} bytes does not fit the length field",
            payload.len()
        );

        let mut packet = Self {
            command,
            status,
            payload,
            checksum: 0,
        };
        packet.checksum = packet.calculate_checksum();
        packet
    }

    /// Calculate the checksum of the packet fields
    pub fn calculate_checksum(&self) -> u16 {
        let mut buf = Vec::with_capacity(4 + self.payload.len());
        buf.push(self.payload.len() as u8);
        buf.push(self.command);
        buf.extend_from_slice(&self.status.to_be_bytes());
        buf.extend_from_slice(&self.payload);

        checksum::calculate(&buf)
    }

    /// Checksum carried by the frame
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Whether the carried checksum matches the packet contents
    pub fn checksum_ok(&self) -> bool {
        self.checksum == self.calculate_checksum()
    }

    /// Encode packet to bytes
    ///
    /// Used for emulating a reader; the host itself only sends templates.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_u8(HEADER_BYTE);
        buf.put_u8(self.payload.len() as u8);
        buf.put_u8(self.command);
        buf.put_u16(self.status);
        buf.put_slice(&self.payload);
        buf.put_u16(self.checksum);

        buf
    }

    /// Decode one complete frame
    ///
    /// The checksum is stored but not enforced; use [`Packet::checksum_ok`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The frame does not start with the header byte
    /// - The frame is shorter than its length field requires
    pub fn decode(frame: Bytes) -> Result<Self> {
        if frame.len() < RESPONSE_OVERHEAD {
            return Err(Error::PacketTooShort {
                expected: RESPONSE_OVERHEAD,
                actual: frame.len(),
            });
        }

        if frame[0] != HEADER_BYTE {
            return Err(Error::InvalidHeader(frame[0]));
        }

        let len = frame[1] as usize;
        let total = RESPONSE_OVERHEAD + len;
        if frame.len() != total {
            return Err(Error::LengthMismatch {
                declared: total,
                actual: frame.len(),
            });
        }

        Ok(Self::from_frame(frame))
    }

    /// Split a frame already known to hold exactly `7 + L` bytes behind a header
    pub(crate) fn from_frame(frame: Bytes) -> Self {
        let end = PAYLOAD_OFFSET + frame[1] as usize;

        Self {
            command: frame[2],
            status: BigEndian::read_u16(&frame[3..5]),
            payload: frame.slice(PAYLOAD_OFFSET..end),
            checksum: BigEndian::read_u16(&frame[end..end + 2]),
        }
    }

    /// Known command code, if any
    pub fn command_code(&self) -> Option<CommandCode> {
        CommandCode::try_from(self.command).ok()
    }

    /// Check if the reader reported success
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// Check if this is a successful inventory result
    pub fn is_inventory_result(&self) -> bool {
        self.is_success() && self.command_code().is_some_and(CommandCode::is_inventory)
    }

    /// Get total packet size
    pub fn size(&self) -> usize {
        RESPONSE_OVERHEAD + self.payload.len()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("command", &format!("0x{:02X}", self.command))
            .field("status", &format!("0x{:04X}", self.status))
            .field("checksum", &format!("0x{:04X}", self.checksum))
            .field("payload", &hex::encode_upper(&self.payload))
            .finish()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command_code() {
            Some(code) => write!(f, "Packet[{}]", code)?,
            None => write!(f, "Packet[0x{:02X}]", self.command)?,
        }
        write!(f, "(status=0x{:04X}, len={})", self.status, self.payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(s: &str) -> Bytes {
        Bytes::from(hex::decode(s).unwrap())
    }

    #[test]
    fn test_decode_running_stage() {
        let packet = Packet::decode(frame("ff010c0000126343")).unwrap();

        assert_eq!(packet.command, 0x0C);
        assert_eq!(packet.command_code(), Some(CommandCode::GetRunningStage));
        assert_eq!(packet.status, 0);
        assert_eq!(packet.payload.as_ref(), &[0x12]);
        assert_eq!(packet.checksum(), 0x6343);
        assert!(packet.checksum_ok());
    }

    #[test]
    fn test_decode_empty_payload() {
        let packet = Packet::decode(frame("ff00040000c444")).unwrap();

        assert_eq!(packet.command_code(), Some(CommandCode::StartApplication));
        assert!(packet.payload.is_empty());
        assert!(packet.checksum_ok());
    }

    #[test]
    fn test_decode_keeps_bad_checksum() {
        let packet = Packet::decode(frame("ff010c0000120000")).unwrap();
        assert!(!packet.checksum_ok());
    }

    #[test]
    fn test_encode_matches_wire() {
        let packet = Packet::new(0x22, 0x0000, vec![0x01, 0x02]);
        assert_eq!(packet.encode().to_vec(), hex::decode("ff0222000001020adc").unwrap());
    }

    #[test]
    fn test_largest_payload_fills_length_field() {
        let packet = Packet::new(0xAA, 0x0000, vec![0x5A; Packet::MAX_PAYLOAD_SIZE]);
        let wire = packet.encode();

        assert_eq!(wire[1], 0xFF);
        assert_eq!(wire.len(), 7 + 255);
        assert_eq!(Packet::decode(wire.freeze()).unwrap(), packet);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "does not fit the length field")]
    fn test_oversize_payload_rejected() {
        Packet::new(0xAA, 0x0000, vec![0; Packet::MAX_PAYLOAD_SIZE + 1]);
    }

    #[test]
    fn test_packet_too_short() {
        let result = Packet::decode(frame("ff0004"));
        assert!(matches!(result, Err(Error::PacketTooShort { .. })));
    }

    #[test]
    fn test_invalid_header() {
        let result = Packet::decode(frame("fe00040000c444"));
        assert!(matches!(result, Err(Error::InvalidHeader(0xFE))));
    }

    #[test]
    fn test_length_mismatch() {
        let result = Packet::decode(frame("ff03040000c444"));
        assert!(matches!(result, Err(Error::LengthMismatch { declared: 10, actual: 7 })));
    }

    #[test]
    fn test_is_inventory_result() {
        assert!(Packet::new(0x21, 0x0000, vec![0; 12]).is_inventory_result());
        assert!(Packet::new(0xAA, 0x0000, vec![0; 12]).is_inventory_result());
        assert!(!Packet::new(0x21, 0x0400, vec![0; 12]).is_inventory_result());
        assert!(!Packet::new(0x0C, 0x0000, vec![0x12]).is_inventory_result());
    }

    #[test]
    fn test_display() {
        let packet = Packet::new(0x0C, 0x0000, vec![0x12]);
        assert_eq!(packet.to_string(), "Packet[GET_RUNNING_STAGE(0x0C)](status=0x0000, len=1)");
    }
}
