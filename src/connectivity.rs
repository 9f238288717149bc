//! Connectivity-driven server lifecycle.
//!
//! The network layer (Wi-Fi station/AP management in the original device)
//! is an external collaborator that emits link events: up when the device
//! has usable connectivity, down on disconnect. This module consumes those
//! events and starts or stops the transport server accordingly.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::handler::Dispatcher;
use crate::transport::{Server, ServerConfig, ServerHandle};

/// Link state change reported by the connectivity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Usable connectivity: station got an address, or a peer joined the
    /// access point.
    Up,
    /// Connectivity lost.
    Down,
}

/// Drive the server from a stream of link events.
///
/// On [`LinkEvent::Up`] the server is bound and spawned; a bind failure is
/// logged and the server stays down until the next up event. On
/// [`LinkEvent::Down`] the running server is cancelled and joined. Returns
/// once the event channel closes, stopping any running server first.
pub async fn run(
    mut events: mpsc::Receiver<LinkEvent>,
    config: ServerConfig,
    dispatcher: Dispatcher,
) {
    let mut running: Option<ServerHandle> = None;

    while let Some(event) = events.recv().await {
        match event {
            LinkEvent::Up => {
                if running.is_some() {
                    debug!("link up, server already running");
                    continue;
                }
                match Server::bind(config.clone(), dispatcher.clone()).await {
                    Ok(server) => {
                        running = Some(server.spawn(CancellationToken::new()));
                        info!("network up, servers started");
                    }
                    Err(e) => error!(error = %e, "failed to start servers"),
                }
            }
            LinkEvent::Down => {
                if let Some(handle) = running.take() {
                    info!("network down, stopping servers");
                    handle.shutdown().await;
                }
            }
        }
    }

    if let Some(handle) = running.take() {
        handle.shutdown().await;
    }
}
