//! Transport layer for the reader protocol
//!
//! Provides byte-level communication with readers attached to a local serial
//! port or exposed through a serial-over-TCP bridge.

pub mod error;
pub mod serial;
pub mod tcp;

pub use error::{Error, Result};
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Transport trait for different communication methods
#[async_trait]
pub trait Transport: Send {
    /// Connect to device
    async fn connect(&mut self) -> Result<()>;
    
    /// Disconnect from device
    async fn disconnect(&mut self) -> Result<()>;
    
    /// Check if connected
    fn is_connected(&self) -> bool;
    
    /// Send raw bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;
    
    /// Receive whatever bytes arrive next
    ///
    /// Returns [`Error::ReadTimeout`] if nothing arrives within `timeout`.
    /// Must be cancel-safe: dropping the future loses no data.
    async fn receive(&mut self, timeout: Duration) -> Result<BytesMut>;
    
    /// Get remote address (port path or host:port)
    fn remote_addr(&self) -> String;
}
