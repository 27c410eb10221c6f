//! Serial port transport
//!
//! `serialport` is blocking, so reads happen on a dedicated thread that
//! forwards each chunk over a channel. `receive` only awaits that channel,
//! which keeps it cancel-safe inside `tokio::select!`.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use serialport::SerialPort;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use uhfrust_core::constants::DEFAULT_BAUD_RATE;

use crate::{error::*, Transport};

/// Chunks buffered between the reader thread and `receive`
const CHANNEL_CAPACITY: usize = 64;

/// Size of a single read
const READ_CHUNK: usize = 256;

type Chunk = io::Result<BytesMut>;

/// Transport for readers on a local serial port
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    poll_interval: Duration,
    port: Option<Box<dyn SerialPort>>,
    rx: Option<mpsc::Receiver<Chunk>>,
    stop: Arc<AtomicBool>,
}

impl SerialTransport {
    /// Create new serial transport at the default baud rate
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            poll_interval: Duration::from_millis(100),
            port: None,
            rx: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set how often the reader thread checks for shutdown
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn spawn_reader(
        &self,
        mut port: Box<dyn SerialPort>,
        tx: mpsc::Sender<Chunk>,
    ) -> io::Result<()> {
        let stop = Arc::clone(&self.stop);
        let path = self.path.clone();

        thread::Builder::new()
            .name(format!("serial-rx {}", path))
            .spawn(move || {
                let mut buf = [0u8; READ_CHUNK];

                while !stop.load(Ordering::Acquire) {
                    let chunk = match port.read(&mut buf) {
                        Ok(0) => continue,
                        Ok(n) => Ok(BytesMut::from(&buf[..n])),
                        Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                        Err(e) => Err(e),
                    };

                    let failed = chunk.is_err();
                    if tx.blocking_send(chunk).is_err() || failed {
                        break;
                    }
                }

                debug!("Serial reader for {} stopped", path);
            })?;

        Ok(())
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        debug!("Opening {} at {} baud...", self.path, self.baud_rate);

        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(self.poll_interval)
            .open()
            .map_err(|source| Error::PortOpen {
                path: self.path.clone(),
                source,
            })?;
        let reader = port.try_clone()?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.stop = Arc::new(AtomicBool::new(false));
        self.spawn_reader(reader, tx)?;

        debug!("Opened {}", self.path);

        self.port = Some(port);
        self.rx = Some(rx);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        self.rx = None;

        if self.port.take().is_some() {
            debug!("Closed {}", self.path);
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {:02X?}", data.len(), data);

        port.write_all(data)?;
        port.flush()?;

        Ok(())
    }

    async fn receive(&mut self, wait: Duration) -> Result<BytesMut> {
        let rx = self.rx.as_mut().ok_or(Error::NotConnected)?;

        let buf = timeout(wait, rx.recv())
            .await
            .map_err(|_| Error::ReadTimeout)?
            .ok_or(Error::ConnectionClosed)??;

        trace!("Received {} bytes: {:02X?}", buf.len(), &buf[..]);

        Ok(buf)
    }

    fn remote_addr(&self) -> String {
        self.path.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if self.is_connected() {
            warn!("Serial transport dropped while still connected");
        }
    }
}
