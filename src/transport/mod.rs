//! Transport server: one TCP listener and one UDP socket on the same port.
//!
//! Both transports serve the same logical protocol; the only wire-level
//! difference is the 4-byte length header, present on TCP frames and
//! absent on UDP datagrams. Each transport runs as its own tokio task.
//! The tasks share nothing mutable: each owns its receive buffer and an
//! immutable [`Dispatcher`] clone, and both observe a
//! [`CancellationToken`] at every blocking boundary, so a disconnect
//! event stops them within one iteration.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kasa_bridge::{Dispatcher, Server, ServerConfig};
//! use kasa_bridge::sensor::StaticSensors;
//! use tokio_util::sync::CancellationToken;
//!
//! let dispatcher = Dispatcher::new(Arc::new(StaticSensors::new(21.0, 45.0)));
//! let server = Server::bind(ServerConfig::default(), dispatcher).await?;
//! let handle = server.spawn(CancellationToken::new());
//! // ... on network-down:
//! handle.shutdown().await;
//! ```

mod tcp;
mod udp;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{KasaError, Result};
use crate::handler::Dispatcher;

/// Well-known Kasa device port, served by both transports.
pub const KASA_PORT: u16 = 9999;

/// Transport server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Local address to bind; all interfaces by default.
    pub bind_addr: IpAddr,
    /// Port for both the TCP listener and the UDP socket.
    pub port: u16,
    /// Receive buffer capacity per transport task.
    pub recv_buffer_size: usize,
    /// Backoff after a transient accept/receive error.
    pub retry_interval: Duration,
    /// TCP keepalive: idle time before the first probe.
    pub keepalive_idle: Duration,
    /// TCP keepalive: interval between probes.
    pub keepalive_interval: Duration,
    /// TCP keepalive: probes before the connection is dropped.
    pub keepalive_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: KASA_PORT,
            recv_buffer_size: 2048,
            retry_interval: Duration::from_millis(500),
            keepalive_idle: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(5),
            keepalive_retries: 3,
        }
    }
}

impl ServerConfig {
    /// Set the port for both transports.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the local bind address.
    pub fn with_bind_addr(mut self, addr: IpAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Socket address both transports bind to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

/// Bound but not yet running server sockets.
///
/// Each transport binds independently; a failed one is logged and left
/// unbound while the other keeps serving.
pub struct Server {
    tcp: Option<TcpListener>,
    udp: Option<UdpSocket>,
    config: ServerConfig,
    dispatcher: Dispatcher,
}

impl Server {
    /// Bind the TCP listener and UDP socket.
    ///
    /// A bind failure is fatal to that transport only: the failed socket
    /// is logged and skipped, and the surviving transport serves alone.
    /// Errors only when neither socket could be bound. Once running,
    /// errors stay confined to their own transport task.
    pub async fn bind(config: ServerConfig, dispatcher: Dispatcher) -> Result<Self> {
        let addr = config.socket_addr();

        let tcp = match TcpListener::bind(addr).await {
            Ok(listener) => {
                info!(addr = %listener.local_addr()?, "TCP listener bound");
                Some(listener)
            }
            Err(e) => {
                error!(error = %e, %addr, "TCP bind failed, stream transport disabled");
                None
            }
        };

        let udp = match bind_udp(addr) {
            Ok(socket) => {
                info!(addr = %socket.local_addr()?, "UDP socket bound");
                Some(socket)
            }
            Err(e) => {
                error!(error = %e, %addr, "UDP bind failed, datagram transport disabled");
                if tcp.is_none() {
                    return Err(e.into());
                }
                None
            }
        };

        Ok(Self {
            tcp,
            udp,
            config,
            dispatcher,
        })
    }

    /// Local address of the TCP listener, if that transport is bound.
    pub fn tcp_addr(&self) -> Result<SocketAddr> {
        match &self.tcp {
            Some(listener) => Ok(listener.local_addr()?),
            None => Err(KasaError::Protocol("TCP transport is not bound".into())),
        }
    }

    /// Local address of the UDP socket, if that transport is bound.
    pub fn udp_addr(&self) -> Result<SocketAddr> {
        match &self.udp {
            Some(socket) => Ok(socket.local_addr()?),
            None => Err(KasaError::Protocol("UDP transport is not bound".into())),
        }
    }

    /// Launch one task per bound transport.
    ///
    /// The tasks run until `token` is cancelled. Use the returned handle
    /// to stop them and wait for termination.
    pub fn spawn(self, token: CancellationToken) -> ServerHandle {
        let tcp_task = self.tcp.map(|listener| {
            tokio::spawn(tcp::serve(
                listener,
                self.dispatcher.clone(),
                self.config.clone(),
                token.child_token(),
            ))
        });
        let udp_task = self.udp.map(|socket| {
            tokio::spawn(udp::serve(
                socket,
                self.dispatcher,
                self.config,
                token.child_token(),
            ))
        });
        ServerHandle {
            token,
            tcp_task,
            udp_task,
        }
    }
}

/// Bind the UDP socket with address reuse, like the TCP listener gets.
fn bind_udp(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Handle to the running transport tasks.
#[derive(Debug)]
pub struct ServerHandle {
    token: CancellationToken,
    tcp_task: Option<JoinHandle<()>>,
    udp_task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Cancellation token shared with the transport tasks.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the transport tasks and wait for them to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Some(task) = self.tcp_task {
            if let Err(e) = task.await {
                warn!(error = %e, "TCP server task panicked");
            }
        }
        if let Some(task) = self.udp_task {
            if let Err(e) = task.await {
                warn!(error = %e, "UDP server task panicked");
            }
        }
        info!("server stopped");
    }
}
