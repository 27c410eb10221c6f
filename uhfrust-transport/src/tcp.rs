//! Serial-over-TCP transport
//!
//! For readers behind a network serial bridge (ser2net and similar). The
//! bridge forwards raw serial bytes, so framing is unchanged.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

/// Bytes reserved per read; reader frames are far smaller
const READ_CAPACITY: usize = 1024;

/// Transport for bridged readers
pub struct TcpTransport {
    host: String,
    port: u16,
    peer: Option<SocketAddr>,
    stream: Option<TcpStream>,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            peer: None,
            stream: None,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Limit the whole connect, across every resolved address
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Try each resolved address until one accepts
    async fn dial(&self) -> Result<(TcpStream, SocketAddr)> {
        let target = self.target();
        let addrs: Vec<SocketAddr> = lookup_host(&target)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", target, e)))?
            .collect();

        if addrs.is_empty() {
            return Err(Error::InvalidAddress(target));
        }

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok((stream, addr)),
                Err(e) => {
                    debug!("Bridge {} refused: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.map_or(Error::ConnectionClosed, Error::Io))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        debug!("Dialing bridge {}...", self.target());

        let (stream, peer) = timeout(self.connect_timeout, self.dial())
            .await
            .map_err(|_| Error::ConnectionTimeout(self.target()))??;

        // Commands are a few bytes each; don't let Nagle hold them back
        stream.set_nodelay(true)?;

        debug!("Bridge connected at {}", peer);

        self.peer = Some(peer);
        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Closing bridge {}", self.remote_addr());

            if let Err(e) = stream.shutdown().await {
                trace!("Bridge shutdown failed: {}", e);
            }
        }

        self.peer = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {:02X?}", data.len(), data);

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn receive(&mut self, wait: Duration) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::with_capacity(READ_CAPACITY);

        // read_buf is cancel-safe
        match timeout(wait, stream.read_buf(&mut buf)).await {
            Err(_) => Err(Error::ReadTimeout),
            Ok(Err(e)) => Err(Error::Io(e)),
            Ok(Ok(0)) => Err(Error::ConnectionClosed),
            Ok(Ok(n)) => {
                trace!("Received {} bytes: {:02X?}", n, &buf[..]);
                Ok(buf)
            }
        }
    }

    fn remote_addr(&self) -> String {
        match self.peer {
            Some(peer) => peer.to_string(),
            None => self.target(),
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("Bridge {} dropped while still connected", self.target());
        }
    }
}
