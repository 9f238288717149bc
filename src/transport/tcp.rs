//! TCP transport loop.
//!
//! One connection is served per iteration: accept, keepalive, a single
//! read of up to the buffer capacity, dispatch, reply, shutdown. The app
//! and cloud relay open a fresh connection per command, so there is no
//! concurrent-connection support; a second client waits for the current
//! iteration, which ends as soon as the reply is written.

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ServerConfig;
use crate::handler::Dispatcher;

/// Serve framed requests until the token is cancelled.
pub(super) async fn serve(
    listener: TcpListener,
    dispatcher: Dispatcher,
    config: ServerConfig,
    token: CancellationToken,
) {
    let mut buf = vec![0u8; config.recv_buffer_size];

    loop {
        let (stream, peer) = tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "TCP accept failed");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = sleep(config.retry_interval) => continue,
                    }
                }
            },
        };

        info!(%peer, "TCP connection accepted");
        serve_connection(stream, &dispatcher, &config, &mut buf).await;
    }

    info!("TCP server ended");
}

/// Handle one accepted connection: read once, dispatch, reply, close.
async fn serve_connection(
    mut stream: TcpStream,
    dispatcher: &Dispatcher,
    config: &ServerConfig,
    buf: &mut [u8],
) {
    if let Err(e) = set_keepalive(&stream, config) {
        warn!(error = %e, "failed to set TCP keepalive");
    }

    let received = match stream.read(buf).await {
        Ok(0) => {
            info!("connection closed before any data");
            return;
        }
        Ok(n) => n,
        Err(e) => {
            error!(error = %e, "error during TCP receive");
            return;
        }
    };

    // Replies are exact-length buffers; only the first `received` bytes of
    // the reused receive buffer are ever interpreted.
    if let Some(reply) = dispatcher.handle(&buf[..received], true) {
        debug!(len = reply.len(), "replying");
        if let Err(e) = stream.write_all(&reply).await {
            error!(error = %e, "error during TCP send");
        }
    }

    // Closed whether or not a reply was produced or fully written.
    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "TCP shutdown failed");
    }
}

fn set_keepalive(stream: &TcpStream, config: &ServerConfig) -> std::io::Result<()> {
    let keepalive = TcpKeepalive::new()
        .with_time(config.keepalive_idle)
        .with_interval(config.keepalive_interval)
        .with_retries(config.keepalive_retries);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}
