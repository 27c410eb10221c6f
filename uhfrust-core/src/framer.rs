//! Stream reassembly
//!
//! The serial link delivers bytes in arbitrary chunks. [`Framer`] buffers
//! them and hands out complete packets:
//!
//! ```
//! use uhfrust_core::Framer;
//!
//! let mut framer = Framer::new();
//! framer.feed(&[0x00, 0xFF, 0x01, 0x0C, 0x00]);
//! assert!(framer.next_packet().is_none());
//!
//! framer.feed(&[0x00, 0x12, 0x63, 0x43]);
//! let packet = framer.next_packet().unwrap();
//! assert_eq!(packet.payload.as_ref(), &[0x12]);
//! ```

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::{
    constants::{HEADER_BYTE, MIN_FRAME_PREFIX, RESPONSE_OVERHEAD},
    packet::Packet,
};

/// Initial buffer capacity
const INITIAL_CAPACITY: usize = 512;

/// Incremental packet decoder
///
/// Feeding the same bytes in any chunking yields the same packets. Bytes in
/// front of a header are discarded one at a time until the stream lines up
/// again.
#[derive(Debug)]
pub struct Framer {
    buffer: BytesMut,
}

impl Framer {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append received bytes
    pub fn feed(&mut self, data: &[u8]) {
        trace!("Framer fed {} bytes: {:02X?}", data.len(), data);
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete packet, if one is buffered
    pub fn next_packet(&mut self) -> Option<Packet> {
        while self.buffer.len() >= MIN_FRAME_PREFIX {
            if self.buffer[0] != HEADER_BYTE {
                trace!(byte = self.buffer[0], "Dropping byte while resynchronizing");
                self.buffer.advance(1);
                continue;
            }

            let total = RESPONSE_OVERHEAD + self.buffer[1] as usize;
            if self.buffer.len() < total {
                return None;
            }

            let packet = Packet::from_frame(self.buffer.split_to(total).freeze());
            if !packet.checksum_ok() {
                debug!(
                    received = format!("0x{:04X}", packet.checksum()),
                    calculated = format!("0x{:04X}", packet.calculate_checksum()),
                    "Checksum mismatch on {}",
                    packet
                );
            }
            return Some(packet);
        }

        None
    }

    /// Number of bytes waiting for a complete frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Framer {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        self.next_packet()
    }
}
