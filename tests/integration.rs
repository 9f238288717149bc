//! End-to-end tests over real sockets.
//!
//! Each test binds its own server on an ephemeral localhost port and
//! talks to it the way the vendor app does: length-framed ciphertext over
//! TCP, bare ciphertext datagrams over UDP.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use kasa_bridge::connectivity::{self, LinkEvent};
use kasa_bridge::protocol::framing;
use kasa_bridge::sensor::StaticSensors;
use kasa_bridge::{Dispatcher, Server, ServerConfig, ServerHandle};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn test_dispatcher(temperature: f64, humidity: f64) -> Dispatcher {
    Dispatcher::new(Arc::new(StaticSensors::new(temperature, humidity)))
}

fn localhost_config() -> ServerConfig {
    ServerConfig::default()
        .with_bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_port(0)
}

/// Bind on ephemeral ports and spawn; returns the handle and both addresses.
async fn start_server(dispatcher: Dispatcher) -> (ServerHandle, SocketAddr, SocketAddr) {
    let server = Server::bind(localhost_config(), dispatcher).await.unwrap();
    let tcp_addr = server.tcp_addr().unwrap();
    let udp_addr = server.udp_addr().unwrap();
    let handle = server.spawn(CancellationToken::new());
    (handle, tcp_addr, udp_addr)
}

fn sysinfo_query(framed: bool) -> Vec<u8> {
    let query = json!({"system": {"get_sysinfo": {}}});
    framing::encrypt(&query, framed).unwrap().to_vec()
}

fn parse_reply(raw: &[u8], framed: bool) -> Value {
    let frame = framing::decrypt(raw, framed);
    serde_json::from_slice(&frame.payload).unwrap()
}

#[tokio::test]
async fn udp_sysinfo_round_trip() {
    let (handle, _tcp, udp_addr) = start_server(test_dispatcher(23.5, 51.0)).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(&sysinfo_query(false), udp_addr)
        .await
        .unwrap();

    let mut buf = vec![0u8; 4096];
    let (n, from) = timeout(RECV_TIMEOUT, client.recv_from(&mut buf))
        .await
        .expect("no UDP reply")
        .unwrap();
    assert_eq!(from, udp_addr);

    let doc = parse_reply(&buf[..n], false);
    let info = &doc["system"]["get_sysinfo"];
    assert_eq!(info["temperature"], 23.5);
    assert_eq!(info["humidity"], 51.0);
    assert_eq!(info["err_code"], 0);
    assert_eq!(info["model"], "KL130B(UN)");

    handle.shutdown().await;
}

#[tokio::test]
async fn tcp_framed_query_then_eof() {
    let (handle, tcp_addr, _udp) = start_server(test_dispatcher(19.0, 60.0)).await;

    let mut stream = TcpStream::connect(tcp_addr).await.unwrap();
    stream.write_all(&sysinfo_query(true)).await.unwrap();

    // The server closes the connection after the reply, so reading to EOF
    // yields exactly the framed reply and nothing more.
    let mut reply = Vec::new();
    timeout(RECV_TIMEOUT, stream.read_to_end(&mut reply))
        .await
        .expect("no TCP reply")
        .unwrap();

    assert!(reply.len() > framing::HEADER_SIZE);
    let declared = u32::from_be_bytes([reply[0], reply[1], reply[2], reply[3]]) as usize;
    assert_eq!(reply.len(), framing::HEADER_SIZE + declared);

    let doc = parse_reply(&reply, true);
    let info = &doc["system"]["get_sysinfo"];
    assert_eq!(info["temperature"], 19.0);
    assert_eq!(info["humidity"], 60.0);
    assert_eq!(info["err_code"], 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn udp_garbage_gets_no_reply() {
    let (handle, _tcp, udp_addr) = start_server(test_dispatcher(0.0, 0.0)).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06], udp_addr)
        .await
        .unwrap();

    let mut buf = vec![0u8; 64];
    let result = timeout(Duration::from_millis(500), client.recv_from(&mut buf)).await;
    assert!(result.is_err(), "garbage datagram must not be answered");

    handle.shutdown().await;
}

#[tokio::test]
async fn tcp_unrecognized_command_closes_without_reply() {
    let (handle, tcp_addr, _udp) = start_server(test_dispatcher(0.0, 0.0)).await;

    let query = json!({"system": {"set_relay_state": {"state": 1}}});
    let raw = framing::encrypt(&query, true).unwrap();

    let mut stream = TcpStream::connect(tcp_addr).await.unwrap();
    stream.write_all(&raw).await.unwrap();

    let mut reply = Vec::new();
    let n = timeout(RECV_TIMEOUT, stream.read_to_end(&mut reply))
        .await
        .expect("connection not closed")
        .unwrap();
    assert_eq!(n, 0, "unrecognized command must get no reply");

    handle.shutdown().await;
}

#[tokio::test]
async fn consecutive_tcp_clients_are_served() {
    let (handle, tcp_addr, _udp) = start_server(test_dispatcher(5.0, 6.0)).await;

    for _ in 0..3 {
        let mut stream = TcpStream::connect(tcp_addr).await.unwrap();
        stream.write_all(&sysinfo_query(true)).await.unwrap();
        let mut reply = Vec::new();
        timeout(RECV_TIMEOUT, stream.read_to_end(&mut reply))
            .await
            .expect("no TCP reply")
            .unwrap();
        let doc = parse_reply(&reply, true);
        assert_eq!(doc["system"]["get_sysinfo"]["temperature"], 5.0);
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_both_transports() {
    let (handle, tcp_addr, udp_addr) = start_server(test_dispatcher(1.0, 2.0)).await;
    handle.shutdown().await;

    assert!(
        TcpStream::connect(tcp_addr).await.is_err(),
        "TCP listener must be gone after shutdown"
    );

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(&sysinfo_query(false), udp_addr)
        .await
        .unwrap();
    let mut buf = vec![0u8; 64];
    // Either silence or an ICMP-derived receive error proves the task is
    // gone; only a decrypted reply would be a failure.
    let result = timeout(Duration::from_millis(500), client.recv_from(&mut buf)).await;
    assert!(
        !matches!(result, Ok(Ok(_))),
        "UDP task must be gone after shutdown"
    );
}

#[tokio::test]
async fn tcp_bind_failure_leaves_udp_serving() {
    // Occupy the TCP port with a stray listener; the matching UDP port
    // stays free, so discovery must keep working.
    let stray = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = stray.local_addr().unwrap().port();
    let config = ServerConfig::default()
        .with_bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_port(port);

    let server = Server::bind(config, test_dispatcher(12.0, 34.0))
        .await
        .expect("UDP transport must survive a TCP bind failure");
    assert!(server.tcp_addr().is_err());
    let udp_addr = server.udp_addr().unwrap();
    let handle = server.spawn(CancellationToken::new());

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(&sysinfo_query(false), udp_addr)
        .await
        .unwrap();
    let mut buf = vec![0u8; 4096];
    let (n, _) = timeout(RECV_TIMEOUT, client.recv_from(&mut buf))
        .await
        .expect("no UDP reply")
        .unwrap();
    let doc = parse_reply(&buf[..n], false);
    assert_eq!(doc["system"]["get_sysinfo"]["temperature"], 12.0);

    handle.shutdown().await;
    drop(stray);
}

#[tokio::test]
async fn udp_bind_failure_leaves_tcp_serving() {
    let stray = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = stray.local_addr().unwrap().port();
    let config = ServerConfig::default()
        .with_bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_port(port);

    let server = Server::bind(config, test_dispatcher(13.0, 35.0))
        .await
        .expect("TCP transport must survive a UDP bind failure");
    assert!(server.udp_addr().is_err());
    let tcp_addr = server.tcp_addr().unwrap();
    let handle = server.spawn(CancellationToken::new());

    let mut stream = TcpStream::connect(tcp_addr).await.unwrap();
    stream.write_all(&sysinfo_query(true)).await.unwrap();
    let mut reply = Vec::new();
    timeout(RECV_TIMEOUT, stream.read_to_end(&mut reply))
        .await
        .expect("no TCP reply")
        .unwrap();
    let doc = parse_reply(&reply, true);
    assert_eq!(doc["system"]["get_sysinfo"]["temperature"], 13.0);

    handle.shutdown().await;
    drop(stray);
}

#[tokio::test]
async fn bind_fails_when_both_transports_fail() {
    let stray_tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = stray_tcp.local_addr().unwrap().port();
    let stray_udp = UdpSocket::bind(("127.0.0.1", port)).await.unwrap();

    let config = ServerConfig::default()
        .with_bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_port(port);
    assert!(Server::bind(config, test_dispatcher(0.0, 0.0)).await.is_err());

    drop(stray_tcp);
    drop(stray_udp);
}

/// Find a port that is currently free on localhost.
async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn connectivity_events_start_and_stop_the_server() {
    let port = free_port().await;
    let config = ServerConfig::default()
        .with_bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_port(port);
    let addr = config.socket_addr();

    let (events_tx, events_rx) = mpsc::channel(4);
    let driver = tokio::spawn(connectivity::run(
        events_rx,
        config,
        test_dispatcher(7.0, 8.0),
    ));

    events_tx.send(LinkEvent::Up).await.unwrap();

    // Poll until the UDP transport answers; binding happens asynchronously
    // after the up event.
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut buf = vec![0u8; 4096];
    let mut answered = None;
    for _ in 0..50 {
        client.send_to(&sysinfo_query(false), addr).await.unwrap();
        if let Ok(Ok((n, _))) =
            timeout(Duration::from_millis(100), client.recv_from(&mut buf)).await
        {
            answered = Some(n);
            break;
        }
    }
    let n = answered.expect("server did not come up after link-up event");
    let doc = parse_reply(&buf[..n], false);
    assert_eq!(doc["system"]["get_sysinfo"]["temperature"], 7.0);

    events_tx.send(LinkEvent::Down).await.unwrap();
    drop(events_tx);
    timeout(RECV_TIMEOUT, driver)
        .await
        .expect("connectivity driver did not stop")
        .unwrap();

    assert!(
        TcpStream::connect(addr).await.is_err(),
        "TCP listener must be gone after link-down"
    );
}
