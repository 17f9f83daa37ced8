use std::str::FromStr;

use anyhow::Context;
use ntagread::presence::{self, TagEvent};
use ntagread::sim::SimulatedTag;
use ntagread::{SessionConfig, TagIdentity, TagPresence};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEMO_IDENTITY: [u8; 7] = [0x04, 0x52, 0x3a, 0x9a, 0x1b, 0x5c, 0x80];

fn init_logger(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => SessionConfig::load(&path).context("Failed to load session config")?,
        None => SessionConfig::default(),
    };
    init_logger(&config.log_level);
    info!("Starting with {config:?}");

    let (presence_tx, presence_rx) = mpsc::channel(1);
    let (event_tx, mut event_rx) = mpsc::channel(16);
    let server = tokio::spawn(presence::serve(presence_rx, event_tx, config));

    let tag = SimulatedTag::new().ready_after(3).with_buttons(0x02);
    presence_tx
        .send(TagPresence::new(TagIdentity::new(DEMO_IDENTITY), tag))
        .await
        .context("Tag presence server stopped")?;

    while let Some(event) = event_rx.recv().await {
        match event {
            TagEvent::Scanning(identity) => println!("Scanning... {identity}"),
            TagEvent::Telemetry(record) => println!("{record}"),
            TagEvent::Waiting(Some(err)) => println!("Waiting... ({err})"),
            TagEvent::Waiting(None) => println!("Waiting..."),
        }
    }

    drop(presence_tx);
    server.await?;
    Ok(())
}
