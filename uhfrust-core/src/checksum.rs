//! Reader CRC16 algorithm
//!
//! A CRC-CCITT variant (polynomial 0x1021, initial value 0xFFFF) that feeds
//! message bits *into* the register rather than XOR-ing them against its top
//! bit:
//! 1. Remember bit 15 of the register
//! 2. Shift the register left by one (16-bit truncation)
//! 3. OR the next message bit (MSB first) into bit 0
//! 4. If the remembered bit was set, XOR with the polynomial
//!
//! Frames are checksummed from the length byte onward; the 0xFF header is
//! never included.

use tracing::trace;

/// Generator polynomial
pub const POLYNOMIAL: u16 = 0x1021;

/// Register value at the start of every calculation
pub const INITIAL_VALUE: u16 = 0xFFFF;

/// Calculate the CRC16 of `data`
///
/// # Examples
///
/// ```
/// use uhfrust_core::checksum;
///
/// // start-application request: length=0, command=0x04
/// assert_eq!(checksum::calculate(&[0x00, 0x04]), 0x1D0B);
/// ```
pub fn calculate(data: &[u8]) -> u16 {
    let mut crc = INITIAL_VALUE;

    for &byte in data {
        for shift in (0..8).rev() {
            let carry = crc & 0x8000 != 0;
            crc = (crc << 1) | u16::from((byte >> shift) & 1);
            if carry {
                crc ^= POLYNOMIAL;
            }
        }
    }

    trace!(
        len = data.len(),
        checksum = format!("0x{:04X}", crc),
        "Calculated checksum"
    );

    crc
}

/// Verify checksum
pub fn verify(data: &[u8], expected: u16) -> bool {
    calculate(data) == expected
}
