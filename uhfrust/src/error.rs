//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] uhfrust_core::Error),
    
    #[error("Transport error: {0}")]
    Transport(#[from] uhfrust_transport::Error),
    
    #[error("Type error: {0}")]
    Types(#[from] uhfrust_types::Error),
}

impl Error {
    /// Check if the error ends the reader session
    ///
    /// Transport failures other than a read timeout are terminal; nothing
    /// reconnects automatically.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(e) => !e.is_timeout(),
            Self::Core(_) | Self::Types(_) => false,
        }
    }
}
