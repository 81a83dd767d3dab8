//! namewatch
//!
//! A small session-bus demo: claim a well-known name, schedule its release
//! after one second, and exit the run loop when the bus daemon broadcasts
//! that the name was lost.
//!
//! Exits 0 once the loss is observed, 1 if the session bus is unreachable
//! or the name request fails.

mod app;
mod bus;
mod error;
mod timer;

use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::App;
use bus::BusClient;

/// The well-known name this demo claims and then gives up
const WELL_KNOWN_NAME: &str = "org.DBusTest.SignalTest";

/// How long the name is held before the scheduled release
const RELEASE_DELAY: Duration = Duration::from_millis(1000);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (diagnostics go to stderr)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "namewatch=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting namewatch");

    // An unreachable bus is fatal; nothing below can work without it.
    let bus = match BusClient::connect().await {
        Ok(bus) => bus,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };

    App::new(bus, WELL_KNOWN_NAME, RELEASE_DELAY).run().await?;

    info!("Done");
    Ok(())
}
