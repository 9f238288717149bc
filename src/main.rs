//! kasa-bridge: TP-Link Kasa smart-bulb protocol emulator.
//!
//! Binds TCP and UDP servers on port 9999 and answers `get_sysinfo`
//! queries with a KL130B identity until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! ./kasa-bridge
//!
//! # Adjust log verbosity
//! RUST_LOG=debug ./kasa-bridge
//! ```

use std::sync::Arc;

use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kasa_bridge::connectivity::{self, LinkEvent};
use kasa_bridge::sensor::StaticSensors;
use kasa_bridge::{Dispatcher, ServerConfig};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    info!("kasa-bridge v{}", kasa_bridge::VERSION);

    // The real device injects its temperature/humidity driver here; the
    // standalone binary reports fixed demo readings.
    let dispatcher = Dispatcher::new(Arc::new(StaticSensors::new(21.0, 45.0)));

    // Ctrl-C stands in for the network-down event of the device firmware.
    let (events_tx, events_rx) = mpsc::channel(4);
    if events_tx.send(LinkEvent::Up).await.is_err() {
        return;
    }
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, shutting down");
                let _ = events_tx.send(LinkEvent::Down).await;
            }
            Err(e) => warn!(error = %e, "failed to listen for interrupt"),
        }
        // Dropping the sender closes the event channel and ends the run.
    });

    connectivity::run(events_rx, ServerConfig::default(), dispatcher).await;
    info!("shutdown complete");
}
