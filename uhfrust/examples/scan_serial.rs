//! Run a short inventory on a serial-attached reader

use std::time::Duration;

use tokio::sync::mpsc;
use uhfrust::{ClientCommand, Event, Reader, ReaderConfig, ReaderState};

#[tokio::main]
async fn main() -> uhfrust::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Change to your port
    let port = std::env::var("UHF_RFID_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    println!("Opening {}...", port);

    let mut reader = Reader::serial(port, 115_200, ReaderConfig::default());
    let mut events = reader.subscribe();
    let mut state = reader.watch_state();
    let (commands, rx) = mpsc::channel(8);

    let session = tokio::spawn(async move { reader.run(rx).await });

    if state.wait_for(|s| *s == ReaderState::Ready).await.is_err() {
        return session.await.unwrap_or(Ok(()));
    }
    println!("✓ Reader ready");

    commands.send(ClientCommand::StartInventory).await.ok();

    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Ok(Event::RfidUpdate { payload }) => {
                    for item in payload {
                        println!("  {} seen {} times", item.epc, item.count);
                    }
                }
                Ok(other) => println!("  {}", other),
                Err(_) => break,
            },
        }
    }

    commands.send(ClientCommand::Stop).await.ok();
    drop(commands);

    session.await.unwrap_or(Ok(()))?;
    println!("✓ Done");

    Ok(())
}
