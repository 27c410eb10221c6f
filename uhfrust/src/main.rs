use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use uhfrust::{Catalog, CatalogMode, ClientCommand, Event, Reader, ReaderConfig};

/// Commands buffered between stdin and the reader
const COMMAND_CAPACITY: usize = 32;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Publish every scanned record, catalog only filters
    Filter,
    /// Publish only the catalog entry that was just scanned
    Linked,
}

impl From<Mode> for CatalogMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Filter => CatalogMode::Filter,
            Mode::Linked => CatalogMode::Linked,
        }
    }
}

/// Drive a UHF RFID reader. Reads JSON commands from stdin, one per line,
/// and writes JSON events to stdout.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial port the reader is attached to.
    #[arg(long, env = "UHF_RFID_PORT", default_value = "/dev/ttyS0")]
    rfid_port: String,
    /// Serial baud rate.
    #[arg(long, env = "UHF_RFID_BAUDRATE", default_value_t = 115_200)]
    rfid_baudrate: u32,
    /// Reach the reader through a serial-over-TCP bridge (host:port) instead.
    #[arg(long, env = "UHF_RFID_TCP")]
    tcp: Option<String>,
    /// Catalog CSV to load at startup.
    #[arg(short, long, env = "UHF_INVENTORY")]
    inventory: Option<PathBuf>,
    /// How inventory updates relate to the catalog.
    #[arg(long, value_enum, env = "UHF_CATALOG_MODE", default_value_t = Mode::Filter)]
    catalog_mode: Mode,
    /// Wait for the application start ack before querying the running stage.
    #[arg(long, env = "UHF_APP_START_TIMEOUT_MS", default_value_t = 2000)]
    app_start_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries events, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    run_until(run(cli), signal::ctrl_c()).await
}

/// Run until the work finishes or the shutdown future resolves
///
/// Errors from the work are returned after it has been dropped, so the
/// transport closes before the process exits.
async fn run_until<S>(work: impl Future<Output = Result<()>>, shutdown: S) -> Result<()>
where
    S: Future,
{
    tokio::select! {
        res = work => {
            if let Err(e) = &res {
                error!("Reader failed: {:?}", e);
            }
            res
        }
        _ = shutdown => {
            info!("Ctrl+C received, shutting down.");
            Ok(())
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ReaderConfig::default()
        .with_catalog_mode(cli.catalog_mode.into())
        .with_app_start_timeout(Duration::from_millis(cli.app_start_timeout_ms));

    if let Some(path) = &cli.inventory {
        let catalog = Catalog::load(path)
            .with_context(|| format!("Failed to load inventory {}", path.display()))?;
        info!(entries = catalog.len(), "Loaded inventory from {}", path.display());
        config = config.with_catalog(catalog);
    }

    let mut reader = match &cli.tcp {
        Some(bridge) => {
            let (host, port) = parse_bridge(bridge)?;
            info!("Using serial bridge at {}:{}", host, port);
            Reader::tcp(host, port, config)
        }
        None => {
            info!("Using serial port {} at {} baud", cli.rfid_port, cli.rfid_baudrate);
            Reader::serial(&cli.rfid_port, cli.rfid_baudrate, config)
        }
    };

    let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
    tokio::spawn(write_events(reader.subscribe()));
    // Stdin reaching EOF must not stop the reader, so keep a sender here
    tokio::spawn(read_commands(commands.clone(), reader.publisher()));

    reader.run(rx).await.context("Reader session ended")?;
    drop(commands);
    Ok(())
}

/// Split a `host:port` bridge address
fn parse_bridge(bridge: &str) -> Result<(String, u16)> {
    let (host, port) = bridge
        .rsplit_once(':')
        .with_context(|| format!("Bridge address {} is not host:port", bridge))?;
    let port = port
        .parse()
        .with_context(|| format!("Invalid bridge port in {}", bridge))?;
    Ok((host.to_string(), port))
}

/// Parse JSON commands from stdin, one per line
async fn read_commands(commands: mpsc::Sender<ClientCommand>, events: broadcast::Sender<Event>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Stdin closed, no more commands");
                break;
            }
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match ClientCommand::from_json(line) {
            Ok(command) => {
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Ignoring command {}: {}", line, e);
                let _ = events.send(Event::RfidError {
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Write every published event to stdout as one JSON line
async fn write_events(mut events: broadcast::Receiver<Event>) {
    let mut stdout = tokio::io::stdout();

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event writer lagging, events dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let line = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize {}: {}", event.name(), e);
                continue;
            }
        };

        if let Err(e) = write_line(&mut stdout, &line).await {
            error!("Failed to write event: {}", e);
            break;
        }
    }
}

async fn write_line(stdout: &mut tokio::io::Stdout, line: &str) -> std::io::Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
