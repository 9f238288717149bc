//! UDP transport loop.
//!
//! Datagrams carry the bare ciphertext without a length header. Each
//! iteration is a single receive, dispatch and best-effort reply to the
//! source address; there is no accept phase and no session state.

use tokio::net::UdpSocket;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ServerConfig;
use crate::handler::Dispatcher;

/// Serve headerless datagrams until the token is cancelled.
pub(super) async fn serve(
    socket: UdpSocket,
    dispatcher: Dispatcher,
    config: ServerConfig,
    token: CancellationToken,
) {
    let mut buf = vec![0u8; config.recv_buffer_size];

    loop {
        let (received, peer) = tokio::select! {
            _ = token.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "UDP receive failed");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = sleep(config.retry_interval) => continue,
                    }
                }
            },
        };

        info!(%peer, len = received, "UDP datagram received");

        if let Some(reply) = dispatcher.handle(&buf[..received], false) {
            debug!(len = reply.len(), "replying");
            // Best effort: a lost reply datagram is the client's problem.
            if let Err(e) = socket.send_to(&reply, peer).await {
                error!(error = %e, "error during UDP send");
            }
        }
    }

    info!("UDP server ended");
}
