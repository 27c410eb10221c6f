//! End-to-end runs against an emulated reader behind a TCP bridge

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use uhfrust::{ClientCommand, Error, Event, Packet, Reader, ReaderConfig, ReaderState};

const START_APP: &str = "ff00041d0b";
const GET_STAGE: &str = "ff000c1d03";
const SCAN_START: &str = "ff13aa4d6f64756c6574656368aa480000000000f2bbe1cb";
const SCAN_STOP: &str = "ff0eaa4d6f64756c6574656368aa49f3bb0391";

const EPC: &str = "E2801160600002084E2B2C31";
const WAIT: Duration = Duration::from_secs(5);

async fn bridge() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

async fn expect_request(socket: &mut TcpStream, expected: &str) {
    let mut buf = vec![0u8; expected.len() / 2];
    timeout(WAIT, socket.read_exact(&mut buf))
        .await
        .expect("reader sent nothing")
        .unwrap();
    assert_eq!(hex::encode(&buf), expected);
}

async fn reply(socket: &mut TcpStream, command: u8, payload: Vec<u8>) {
    let frame = Packet::new(command, 0x0000, payload).encode();
    socket.write_all(&frame).await.unwrap();
}

fn inventory_frame(epc: &str) -> Vec<u8> {
    let mut payload = vec![0x01, 0xC5, 0x30, 0x00, 0x00];
    payload.extend(hex::decode(epc).unwrap());
    payload.extend([0x12, 0x34]);
    Packet::new(0xAA, 0x0000, payload).encode().to_vec()
}

async fn next_event(events: &mut broadcast::Receiver<Event>) -> Event {
    timeout(WAIT, events.recv())
        .await
        .expect("no event published")
        .unwrap()
}

fn config() -> ReaderConfig {
    ReaderConfig::default()
        .with_app_start_timeout(Duration::from_millis(50))
        .with_poll_interval(Duration::from_millis(20))
}

fn spawn(mut reader: Reader) -> (mpsc::Sender<ClientCommand>, JoinHandle<uhfrust::Result<()>>) {
    let (commands, rx) = mpsc::channel(8);
    let task = tokio::spawn(async move { reader.run(rx).await });
    (commands, task)
}

#[tokio::test]
async fn test_bootloader_negotiation_then_inventory() {
    let (listener, port) = bridge().await;

    let emulator = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        // Stay quiet so the reader falls back to asking for the stage
        expect_request(&mut socket, START_APP).await;
        expect_request(&mut socket, GET_STAGE).await;
        reply(&mut socket, 0x0C, vec![0x11]).await;

        expect_request(&mut socket, START_APP).await;
        reply(&mut socket, 0x04, Vec::new()).await;

        expect_request(&mut socket, SCAN_START).await;
        let frame = inventory_frame(EPC);
        let mut stream = vec![0x00, 0x42];
        stream.extend(&frame);
        stream.extend(&frame);
        let (head, tail) = stream.split_at(9);
        socket.write_all(head).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        socket.write_all(tail).await.unwrap();

        expect_request(&mut socket, SCAN_STOP).await;
        socket
    });

    let reader = Reader::tcp("127.0.0.1", port, config());
    let mut events = reader.subscribe();
    let mut state = reader.watch_state();
    let (commands, task) = spawn(reader);

    timeout(WAIT, state.wait_for(|s| *s == ReaderState::Ready))
        .await
        .expect("reader never became ready")
        .unwrap();

    commands.send(ClientCommand::StartInventory).await.unwrap();

    for expected in 1..=2 {
        let Event::RfidUpdate { payload } = next_event(&mut events).await else {
            panic!("expected rfid-update");
        };
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0].epc, EPC);
        assert_eq!(payload[0].count, expected);
        assert_eq!(payload[0].item, None);
    }

    commands.send(ClientCommand::Stop).await.unwrap();
    let _socket = timeout(WAIT, emulator).await.unwrap().unwrap();

    drop(commands);
    timeout(WAIT, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_single_tag_read_with_catalog() {
    let (listener, port) = bridge().await;

    let emulator = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        expect_request(&mut socket, START_APP).await;
        reply(&mut socket, 0x04, Vec::new()).await;

        expect_request(&mut socket, SCAN_START).await;
        socket.write_all(&inventory_frame(EPC)).await.unwrap();
        socket
    });

    let reader = Reader::tcp("127.0.0.1", port, config());
    let mut events = reader.subscribe();
    let mut state = reader.watch_state();
    let (commands, task) = spawn(reader);

    commands
        .send(ClientCommand::UploadInventory {
            payload: "EPC,item,id\nE200AB,Milk,1\n".into(),
        })
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        Event::RfidInitialInventory { .. }
    ));

    timeout(WAIT, state.wait_for(|s| *s == ReaderState::Ready))
        .await
        .expect("reader never became ready")
        .unwrap();

    // One-shot reads bypass the catalog
    commands.send(ClientCommand::ReadTag).await.unwrap();
    assert_eq!(
        next_event(&mut events).await,
        Event::RfidSingleTag { epc: EPC.into() }
    );

    let _socket = timeout(WAIT, emulator).await.unwrap().unwrap();
    drop(commands);
    timeout(WAIT, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_scan_rejected_until_ready() {
    let (listener, port) = bridge().await;

    let emulator = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        expect_request(&mut socket, START_APP).await;
        socket
    });

    let config = config().with_app_start_timeout(Duration::from_secs(60));
    let reader = Reader::tcp("127.0.0.1", port, config);
    let mut events = reader.subscribe();
    let (commands, task) = spawn(reader);

    let mut socket = timeout(WAIT, emulator).await.unwrap().unwrap();

    commands.send(ClientCommand::StartInventory).await.unwrap();
    assert_eq!(next_event(&mut events).await, Event::reader_not_ready());

    commands.send(ClientCommand::ReadTag).await.unwrap();
    assert_eq!(next_event(&mut events).await, Event::reader_not_ready());

    drop(commands);
    timeout(WAIT, task).await.unwrap().unwrap().unwrap();

    // Nothing but the start request ever reached the reader
    let mut rest = Vec::new();
    socket.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_bridge_loss_ends_session() {
    let (listener, port) = bridge().await;

    let emulator = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        expect_request(&mut socket, START_APP).await;
        drop(socket);
    });

    let (commands, task) = spawn(Reader::tcp("127.0.0.1", port, config()));

    timeout(WAIT, emulator).await.unwrap().unwrap();
    let err = timeout(WAIT, task).await.unwrap().unwrap().unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    assert!(err.is_fatal());
    drop(commands);
}
