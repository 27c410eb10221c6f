//! Reader session state machine
//!
//! A reader boots into either its bootloader or its application firmware and
//! only the latter accepts inventory commands. The session:
//! - asks the reader to start the application and arms a fallback timer
//! - on timeout, asks which firmware is running
//! - keeps pushing start-application while the reader reports the bootloader
//! - gates scan commands until the reader is ready
//! - routes inventory results into the [`ScanAggregator`]
//!
//! The session performs no I/O. Every input returns the [`Action`]s the
//! caller must carry out, in order.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use uhfrust_types::{Catalog, ClientCommand, Event};

use crate::{
    aggregator::{CatalogMode, ScanAggregator},
    command::{CommandCode, Template},
    constants::{RunningStage, APP_START_TIMEOUT_SECS},
    error::{Error, Result},
    packet::Packet,
};

/// Firmware negotiation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Nothing sent yet
    Uninitialized,

    /// Start-application sent, waiting for confirmation
    AppStartRequested,

    /// Application firmware running; scan commands allowed
    Ready,
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::AppStartRequested => "app-start-requested",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// How inventory results are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanMode {
    /// Aggregate into cumulative records
    #[default]
    Inventory,

    /// Report each read as a one-shot event
    SingleTagRead,
}

/// Scan commands a client may issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRequest {
    Inventory,
    ReadTag,
    Stop,
}

/// Side effect requested by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write these bytes to the reader
    Transmit(Bytes),

    /// Call [`ReaderSession::on_timer`] after this delay
    ArmTimer(Duration),

    /// Publish an event to clients
    Emit(Event),
}

/// Session state for one reader
#[derive(Debug)]
pub struct ReaderSession {
    state: ReaderState,
    scan_mode: ScanMode,
    scanning: bool,
    app_start_timeout: Duration,
    aggregator: ScanAggregator,
}

impl ReaderSession {
    /// Create a new uninitialized session
    pub fn new(mode: CatalogMode) -> Self {
        Self {
            state: ReaderState::Uninitialized,
            scan_mode: ScanMode::default(),
            scanning: false,
            app_start_timeout: Duration::from_secs(APP_START_TIMEOUT_SECS),
            aggregator: ScanAggregator::new(mode),
        }
    }

    /// Set how long to wait for a start-application ack
    pub fn with_app_start_timeout(mut self, timeout: Duration) -> Self {
        self.app_start_timeout = timeout;
        self
    }

    /// Preload a catalog
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.aggregator.load_catalog(catalog);
        self
    }

    /// Get current state
    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ReaderState::Ready
    }

    pub fn scan_mode(&self) -> ScanMode {
        self.scan_mode
    }

    /// Whether a scan-start was sent more recently than a scan-stop
    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn aggregator(&self) -> &ScanAggregator {
        &self.aggregator
    }

    /// Begin firmware negotiation
    pub fn start(&mut self) -> Vec<Action> {
        info!("Starting reader initialization");
        self.request_app_start()
    }

    /// Handle the start-application fallback timer
    ///
    /// Ignored unless the session is still waiting for the application.
    pub fn on_timer(&mut self) -> Vec<Action> {
        if self.state != ReaderState::AppStartRequested {
            debug!(state = %self.state, "Ignoring stale app-start timer");
            return Vec::new();
        }

        info!("Reader did not confirm app start, checking running stage");
        vec![self.transmit(Template::GetRunningStage)]
    }

    /// Handle one decoded packet
    pub fn handle_packet(&mut self, packet: &Packet, now: DateTime<Utc>) -> Vec<Action> {
        match packet.command_code() {
            Some(CommandCode::StartApplication) => {
                self.set_state(ReaderState::Ready);
                Vec::new()
            }
            Some(CommandCode::GetRunningStage) => self.handle_running_stage(packet),
            Some(code) if code.is_inventory() => self.handle_inventory(packet, now),
            _ => {
                debug!("Ignoring {}", packet);
                Vec::new()
            }
        }
    }

    /// Issue a scan command
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReaderNotReady`] unless the reader is in application
    /// mode. Nothing is transmitted in that case.
    pub fn request(&mut self, request: ScanRequest) -> Result<Vec<Action>> {
        if !self.is_ready() {
            warn!(state = %self.state, ?request, "Rejecting scan command, reader not ready");
            return Err(Error::ReaderNotReady { state: self.state });
        }

        let template = match request {
            ScanRequest::Inventory => {
                self.scan_mode = ScanMode::Inventory;
                Template::ScanStart
            }
            ScanRequest::ReadTag => {
                self.scan_mode = ScanMode::SingleTagRead;
                Template::ScanStart
            }
            ScanRequest::Stop => Template::ScanStop,
        };

        Ok(vec![self.transmit(template)])
    }

    /// Replace the catalog and announce its contents
    pub fn load_catalog(&mut self, catalog: Catalog) -> Vec<Action> {
        let event = Event::initial_inventory(&catalog);
        self.aggregator.load_catalog(catalog);
        vec![Action::Emit(event)]
    }

    /// Dispatch a validated client command
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReaderNotReady`] for scan commands before the reader
    /// is ready, and [`Error::Catalog`] if an uploaded catalog cannot be
    /// parsed (the previous catalog stays loaded).
    pub fn handle_command(&mut self, command: ClientCommand) -> Result<Vec<Action>> {
        if command.is_scan_command() && !self.is_ready() {
            warn!(state = %self.state, command = %command, "Rejecting scan command, reader not ready");
            return Err(Error::ReaderNotReady { state: self.state });
        }

        match command {
            ClientCommand::StartInventory => self.request(ScanRequest::Inventory),
            ClientCommand::ReadTag => self.request(ScanRequest::ReadTag),
            ClientCommand::Stop => self.request(ScanRequest::Stop),
            ClientCommand::UploadInventory { payload } => {
                let catalog = Catalog::parse(&payload)?;
                info!(entries = catalog.len(), "Catalog uploaded");
                Ok(self.load_catalog(catalog))
            }
        }
    }

    fn handle_running_stage(&mut self, packet: &Packet) -> Vec<Action> {
        let Some(&stage) = packet.payload.first() else {
            warn!("Running-stage response without payload");
            return Vec::new();
        };

        match RunningStage::from_u8(stage) {
            Some(RunningStage::Application) => {
                self.set_state(ReaderState::Ready);
                Vec::new()
            }
            Some(RunningStage::Bootloader) => {
                info!("Reader is in bootloader mode, switching to application");
                self.set_state(ReaderState::Uninitialized);
                self.request_app_start()
            }
            None => {
                warn!(stage = format!("0x{:02X}", stage), "Unknown running stage");
                Vec::new()
            }
        }
    }

    fn handle_inventory(&mut self, packet: &Packet, now: DateTime<Utc>) -> Vec<Action> {
        if !packet.is_success() {
            debug!(status = format!("0x{:04X}", packet.status), "Dropping failed inventory result");
            return Vec::new();
        }

        if !self.scanning {
            debug!("Dropping inventory result while not scanning");
            return Vec::new();
        }

        self.aggregator
            .ingest(&packet.payload, self.scan_mode, now)
            .map(Action::Emit)
            .into_iter()
            .collect()
    }

    fn request_app_start(&mut self) -> Vec<Action> {
        let transmit = self.transmit(Template::StartApplication);
        self.set_state(ReaderState::AppStartRequested);
        vec![transmit, Action::ArmTimer(self.app_start_timeout)]
    }

    fn transmit(&mut self, template: Template) -> Action {
        match template {
            Template::ScanStart => self.scanning = true,
            Template::ScanStop => self.scanning = false,
            _ => {}
        }

        debug!("Sending {}", template);
        Action::Transmit(template.encode())
    }

    fn set_state(&mut self, state: ReaderState) {
        if self.state != state {
            info!(from = %self.state, to = %state, "Reader state changed");
            self.state = state;
        }
    }
}

impl Default for ReaderSession {
    fn default() -> Self {
        Self::new(CatalogMode::default())
    }
}
