//! Transport errors

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Link not open")]
    NotConnected,

    #[error("Link already open")]
    AlreadyConnected,

    /// Nothing arrived within the read window; the link is still usable
    #[error("Read timeout")]
    ReadTimeout,

    #[error("Timed out connecting to {0}")]
    ConnectionTimeout(String),

    #[error("Link closed by the other end")]
    ConnectionClosed,

    #[error("Failed to open serial port {path}: {source}")]
    PortOpen {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Cannot resolve bridge address {0}")]
    InvalidAddress(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if the error only means "no data yet"
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReadTimeout)
    }
}
