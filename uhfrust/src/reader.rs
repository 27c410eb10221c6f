//! High-level reader interface

use std::time::Duration;

use bytes::BytesMut;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};

use uhfrust_core::{Action, Error as CoreError, Framer, Packet, ReaderSession, ReaderState};
use uhfrust_transport::{SerialTransport, TcpTransport, Transport};
use uhfrust_types::{ClientCommand, Event};

use crate::config::ReaderConfig;
use crate::error::Result;

/// Events buffered per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 64;

/// What woke the run loop
enum Step {
    Received(uhfrust_transport::Result<BytesMut>),
    Command(Option<ClientCommand>),
    Timer,
}

/// UHF RFID reader
///
/// Owns the link to one reader and drives its [`ReaderSession`]: bytes from
/// the transport are framed and fed to the session, client commands are
/// dispatched to it, and whatever it asks for is transmitted, scheduled or
/// published to subscribers.
///
/// # Examples
///
/// ```no_run
/// use tokio::sync::mpsc;
/// use uhfrust::{Reader, ReaderConfig};
///
/// #[tokio::main]
/// async fn main() -> uhfrust::Result<()> {
///     let mut reader = Reader::tcp("192.168.1.50", 4001, ReaderConfig::default());
///     let mut events = reader.subscribe();
///     let (_commands, rx) = mpsc::channel(8);
///
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             println!("{}", event);
///         }
///     });
///
///     reader.run(rx).await
/// }
/// ```
pub struct Reader {
    transport: Box<dyn Transport>,
    session: ReaderSession,
    framer: Framer,
    poll_interval: Duration,
    timer: Option<Instant>,
    events: broadcast::Sender<Event>,
    state: watch::Sender<ReaderState>,
}

impl Reader {
    /// Create a reader over any transport
    pub fn new(transport: impl Transport + 'static, config: ReaderConfig) -> Self {
        let mut session = ReaderSession::new(config.catalog_mode)
            .with_app_start_timeout(config.app_start_timeout);
        if let Some(catalog) = config.catalog {
            session = session.with_catalog(catalog);
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(session.state());

        Self {
            transport: Box::new(transport),
            session,
            framer: Framer::new(),
            poll_interval: config.poll_interval,
            timer: None,
            events,
            state,
        }
    }

    /// Create a reader on a local serial port
    pub fn serial(path: impl Into<String>, baud_rate: u32, config: ReaderConfig) -> Self {
        let transport = SerialTransport::new(path).with_baud_rate(baud_rate);
        Self::new(transport, config)
    }

    /// Create a reader behind a serial-over-TCP bridge
    pub fn tcp(host: impl Into<String>, port: u16, config: ReaderConfig) -> Self {
        Self::new(TcpTransport::new(host, port), config)
    }

    /// Subscribe to published events
    ///
    /// Only events published after this call are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Handle for publishing events next to the reader's own
    pub fn publisher(&self) -> broadcast::Sender<Event> {
        self.events.clone()
    }

    /// Observe firmware negotiation
    pub fn watch_state(&self) -> watch::Receiver<ReaderState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ReaderState {
        self.session.state()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn session(&self) -> &ReaderSession {
        &self.session
    }

    /// Snapshot of the loaded catalog, as sent to newly attached clients
    pub fn initial_inventory(&self) -> Option<Event> {
        self.session.aggregator().catalog().map(Event::initial_inventory)
    }

    /// Drive the reader until the command channel closes
    ///
    /// Connects if needed, announces the preloaded catalog, then negotiates
    /// application mode and serves commands.
    ///
    /// # Errors
    ///
    /// Returns the first transport failure other than a read timeout. Nothing
    /// reconnects automatically.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<ClientCommand>) -> Result<()> {
        if !self.transport.is_connected() {
            info!("Connecting to reader at {}...", self.transport.remote_addr());
            self.transport.connect().await?;
        }

        if let Some(event) = self.initial_inventory() {
            self.publish(event);
        }

        let actions = self.session.start();
        self.apply(actions).await?;

        loop {
            let deadline = self.timer;

            let step = tokio::select! {
                received = self.transport.receive(self.poll_interval) => Step::Received(received),
                command = commands.recv() => Step::Command(command),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => Step::Timer,
            };

            match step {
                Step::Received(Ok(data)) => self.on_data(&data).await?,
                Step::Received(Err(e)) if e.is_timeout() => {}
                Step::Received(Err(e)) => {
                    error!("Lost reader at {}: {}", self.transport.remote_addr(), e);
                    return Err(e.into());
                }
                Step::Command(Some(command)) => self.on_command(command).await?,
                Step::Command(None) => {
                    info!("Command channel closed, stopping reader");
                    self.transport.disconnect().await?;
                    return Ok(());
                }
                Step::Timer => {
                    self.timer = None;
                    let actions = self.session.on_timer();
                    self.apply(actions).await?;
                }
            }
        }
    }

    async fn on_data(&mut self, data: &[u8]) -> Result<()> {
        self.framer.feed(data);

        let packets: Vec<Packet> = self.framer.by_ref().collect();
        for packet in packets {
            trace!("Received {}", packet);
            let actions = self.session.handle_packet(&packet, Utc::now());
            self.apply(actions).await?;
        }

        Ok(())
    }

    async fn on_command(&mut self, command: ClientCommand) -> Result<()> {
        debug!(command = %command, "Handling client command");

        match self.session.handle_command(command) {
            Ok(actions) => self.apply(actions).await,
            Err(CoreError::ReaderNotReady { .. }) => {
                self.publish(Event::reader_not_ready());
                Ok(())
            }
            Err(e) => {
                warn!("Command failed: {}", e);
                self.publish(Event::RfidError {
                    message: e.to_string(),
                });
                Ok(())
            }
        }
    }

    /// Carry out session actions in order
    async fn apply(&mut self, actions: Vec<Action>) -> Result<()> {
        for action in actions {
            match action {
                Action::Transmit(frame) => self.transport.send(&frame).await?,
                Action::ArmTimer(delay) => self.timer = Some(Instant::now() + delay),
                Action::Emit(event) => self.publish(event),
            }
        }

        let state = self.session.state();
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });

        Ok(())
    }

    fn publish(&self, event: Event) {
        debug!(event = event.name(), "Publishing event");

        if self.events.send(event).is_err() {
            trace!("No subscribers, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use pretty_assertions::assert_eq;
    use uhfrust_core::Template;
    use uhfrust_transport::{Error as TransportError, Result as TransportResult};
    use uhfrust_types::Catalog;

    use crate::Error;

    mock! {
        pub Link {}

        #[async_trait]
        impl Transport for Link {
            async fn connect(&mut self) -> TransportResult<()>;
            async fn disconnect(&mut self) -> TransportResult<()>;
            fn is_connected(&self) -> bool;
            async fn send(&mut self, data: &[u8]) -> TransportResult<()>;
            async fn receive(&mut self, timeout: Duration) -> TransportResult<BytesMut>;
            fn remote_addr(&self) -> String;
        }
    }

    /// A link that connects, accepts start-application and then stays silent
    fn silent_link() -> MockLink {
        let mut link = MockLink::new();
        link.expect_is_connected().return_const(false);
        link.expect_remote_addr().return_const("mock".to_string());
        link.expect_connect().times(1).returning(|| Ok(()));
        link.expect_send()
            .withf(|data: &[u8]| data == Template::StartApplication.encode().as_ref())
            .times(1)
            .returning(|_| Ok(()));
        link.expect_receive()
            .returning(|_| Err(TransportError::ReadTimeout));
        link
    }

    fn config() -> ReaderConfig {
        ReaderConfig::default().with_app_start_timeout(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_connect_failure_is_returned() {
        let mut link = MockLink::new();
        link.expect_is_connected().return_const(false);
        link.expect_remote_addr().return_const("mock".to_string());
        link.expect_connect()
            .times(1)
            .returning(|| Err(TransportError::ConnectionTimeout("mock".into())));

        let mut reader = Reader::new(link, config());
        let (_commands, rx) = mpsc::channel(1);

        let err = reader.run(rx).await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::ConnectionTimeout(_))));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_transport_failure_is_terminal() {
        let mut link = MockLink::new();
        link.expect_is_connected().return_const(false);
        link.expect_remote_addr().return_const("mock".to_string());
        link.expect_connect().returning(|| Ok(()));
        link.expect_send().times(1).returning(|_| Ok(()));
        link.expect_receive()
            .returning(|_| Err(TransportError::ConnectionClosed));

        let mut reader = Reader::new(link, config());
        let (_commands, rx) = mpsc::channel(1);

        let err = reader.run(rx).await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::ConnectionClosed)));
        assert_eq!(reader.state(), ReaderState::AppStartRequested);
    }

    #[tokio::test]
    async fn test_closed_command_channel_stops_reader() {
        let mut link = silent_link();
        link.expect_disconnect().times(1).returning(|| Ok(()));

        let mut reader = Reader::new(link, config());
        let (commands, rx) = mpsc::channel(1);
        drop(commands);

        reader.run(rx).await.unwrap();
    }

    #[tokio::test]
    async fn test_scan_rejected_before_ready() {
        let mut link = silent_link();
        link.expect_disconnect().returning(|| Ok(()));

        let mut reader = Reader::new(link, config());
        let mut events = reader.subscribe();
        let (commands, rx) = mpsc::channel(4);
        commands.send(ClientCommand::StartInventory).await.unwrap();
        drop(commands);

        reader.run(rx).await.unwrap();

        assert_eq!(events.try_recv().unwrap(), Event::reader_not_ready());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_upload_accepted_before_ready() {
        let mut link = silent_link();
        link.expect_disconnect().returning(|| Ok(()));

        let mut reader = Reader::new(link, config());
        let mut events = reader.subscribe();
        let (commands, rx) = mpsc::channel(4);
        commands
            .send(ClientCommand::UploadInventory {
                payload: "EPC,item,id\nE200AB,Milk,1\n".into(),
            })
            .await
            .unwrap();
        commands
            .send(ClientCommand::UploadInventory {
                payload: "item,id\nMilk,1\n".into(),
            })
            .await
            .unwrap();
        drop(commands);

        reader.run(rx).await.unwrap();

        let Ok(Event::RfidInitialInventory { payload }) = events.try_recv() else {
            panic!("expected initial inventory");
        };
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0].epc, "E200AB");

        // The broken upload is reported and the first catalog stays loaded
        assert!(matches!(events.try_recv(), Ok(Event::RfidError { .. })));
        assert!(reader.session().aggregator().catalog().is_some_and(|c| c.contains("E200AB")));
    }

    #[tokio::test]
    async fn test_preloaded_catalog_announced_on_start() {
        let mut link = silent_link();
        link.expect_disconnect().returning(|| Ok(()));

        let catalog = Catalog::parse("EPC,item,id\nE200AB,Milk,1\nE200AC,Bread,2\n").unwrap();
        let mut reader = Reader::new(link, config().with_catalog(catalog));
        let mut events = reader.subscribe();
        let (commands, rx) = mpsc::channel(1);
        drop(commands);

        assert_eq!(reader.initial_inventory().map(|e| e.name()), Some("rfid-initial-inventory"));

        reader.run(rx).await.unwrap();

        let Ok(Event::RfidInitialInventory { payload }) = events.try_recv() else {
            panic!("expected initial inventory");
        };
        let epcs: Vec<&str> = payload.iter().map(|i| i.epc.as_str()).collect();
        assert_eq!(epcs, vec!["E200AB", "E200AC"]);
    }

    #[tokio::test]
    async fn test_state_watch_follows_session() {
        let mut link = MockLink::new();
        link.expect_is_connected().return_const(true);
        link.expect_remote_addr().return_const("mock".to_string());
        link.expect_send().returning(|_| Ok(()));
        let mut acked = false;
        link.expect_receive().returning(move |_| {
            if acked {
                return Err(TransportError::ConnectionClosed);
            }
            acked = true;
            Ok(BytesMut::from(&[0xFF, 0x00, 0x04, 0x00, 0x00, 0xC4, 0x44][..]))
        });

        let mut reader = Reader::new(link, config());
        let state = reader.watch_state();
        let (_commands, rx) = mpsc::channel(1);

        assert!(reader.run(rx).await.is_err());
        assert!(reader.is_ready());
        assert_eq!(*state.borrow(), ReaderState::Ready);
    }
}
