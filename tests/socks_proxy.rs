//! End-to-end SOCKS5 scenarios against the proxy's real loopback listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use latency_catalog::load as load_catalog;
use latency_ephemeris::Ephemeris;
use latency_limits::LatencyClock;
use latency_metrics::Metrics;
use latency_policy::{PolicyTable, SecuritySnapshot, SecurityValidator};
use latency_socks::SocksContext;

fn test_context(latency_ms: u64) -> Arc<SocksContext> {
    let ephemeris = Arc::new(Ephemeris::new(load_catalog().expect("catalog loads")));
    let policy = Arc::new(PolicyTable::default());
    let security = Arc::new(SecurityValidator::new(SecuritySnapshot {
        test_mode: true,
        ..SecuritySnapshot::default()
    }));
    let metrics = Arc::new(Metrics::new());
    let clock = LatencyClock::Fixed(Duration::from_millis(latency_ms));
    Arc::new(SocksContext::new(ephemeris, policy, security, metrics, clock))
}

async fn spawn_socks(ctx: Arc<SocksContext>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        // Keep the sender alive for the task's lifetime so `changed()`
        // blocks normally instead of erroring out once all senders drop.
        let _shutdown_tx = shutdown_tx;
        let _ = latency_socks::serve_socks(addr, ctx, shutdown_rx).await;
    });
    // give the listener a moment to bind before the test dials it.
    tokio::task::yield_now().await;
    addr
}

/// A loopback TCP echo server: every byte read is written straight back.
async fn spawn_tcp_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => continue,
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 1024];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

/// A loopback UDP echo server: every datagram received is sent straight back
/// to its source.
async fn spawn_udp_echo() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 2048];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((n, src)) => {
                    let _ = socket.send_to(&buf[..n], src).await;
                }
                Err(_) => break,
            }
        }
    });
    addr
}

async fn greet(stream: &mut TcpStream, methods: &[u8]) -> Vec<u8> {
    let mut greeting = vec![0x05, methods.len() as u8];
    greeting.extend_from_slice(methods);
    stream.write_all(&greeting).await.unwrap();
    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await.unwrap();
    reply.to_vec()
}

/// Offering [0x00] succeeds with chosen 0x00; offering [0x01, 0x00, 0x02]
/// (NO_AUTH among others) also gets 0x00; offering only [0xFF] gets
/// [0x05, 0xFF] and the connection closes quickly.
#[tokio::test]
async fn greeting_prefers_no_auth_and_closes_on_no_acceptable() {
    let ctx = test_context(0);
    let addr = spawn_socks(ctx).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let reply = greet(&mut stream, &[0x00]).await;
    assert_eq!(reply, vec![0x05, 0x00]);
    drop(stream);

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let reply = greet(&mut stream, &[0x01, 0x00, 0x02]).await;
    assert_eq!(reply, vec![0x05, 0x00]);
    drop(stream);

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let started = tokio::time::Instant::now();
    let reply = greet(&mut stream, &[0xFF]).await;
    assert_eq!(reply, vec![0x05, 0xFF]);
    let mut probe = [0u8; 1];
    let closed = stream.read(&mut probe).await.unwrap_or(0) == 0;
    assert!(closed, "connection should close after NO_ACCEPTABLE");
    assert!(started.elapsed() < Duration::from_millis(100));
}

fn connect_request(domain: &str, port: u16) -> Vec<u8> {
    let mut buf = vec![0x05, 0x01, 0x00, 0x03, domain.len() as u8];
    buf.extend_from_slice(domain.as_bytes());
    buf.extend_from_slice(&port.to_be_bytes());
    buf
}

async fn read_connect_reply(stream: &mut TcpStream) -> u8 {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.unwrap();
    let rep = header[1];
    match header[3] {
        0x01 => {
            let mut rest = [0u8; 4 + 2];
            stream.read_exact(&mut rest).await.unwrap();
        }
        0x04 => {
            let mut rest = [0u8; 16 + 2];
            stream.read_exact(&mut rest).await.unwrap();
        }
        _ => {}
    }
    rep
}

/// CONNECT to `example.com.mars.latency.space` against a loopback echo
/// server: a 23-byte payload round-trips unchanged, and the whole exchange
/// takes at least twice the configured one-way light-time (request-phase
/// delay plus the time to traverse to the echo server and back).
#[tokio::test]
async fn connect_echoes_payload_after_light_time_delay() {
    let echo_addr = spawn_tcp_echo().await;
    let latency_ms = 20;
    let ctx = test_context(latency_ms);
    ctx.security.publish(SecuritySnapshot {
        allow_ports: vec![echo_addr.port()],
        allow_hosts: Vec::new(),
        test_mode: true,
    });
    let socks_addr = spawn_socks(ctx).await;

    let mut stream = TcpStream::connect(socks_addr).await.unwrap();
    greet(&mut stream, &[0x00]).await;

    let domain = "127.0.0.1.mars.latency.space";
    stream
        .write_all(&connect_request(domain, echo_addr.port()))
        .await
        .unwrap();

    let started = tokio::time::Instant::now();
    let rep = read_connect_reply(&mut stream).await;
    assert_eq!(rep, 0x00, "CONNECT should succeed");

    let payload = b"Hello from latency test";
    stream.write_all(payload).await.unwrap();
    let mut echoed = vec![0u8; payload.len()];
    stream.read_exact(&mut echoed).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(&echoed, payload);
    assert!(
        elapsed >= Duration::from_millis(latency_ms * 2),
        "round trip {elapsed:?} should take at least two light-time delays (out and back)"
    );
}

/// UDP ASSOCIATE: a 3-byte payload wrapped with ATYP=DOMAIN routed to
/// `mars.latency.space` against a loopback UDP echo comes back wrapped
/// symmetrically; closing the control connection tears the relay down
/// promptly.
#[tokio::test]
async fn udp_associate_echoes_wrapped_datagram_and_tears_down_on_close() {
    let echo_addr = spawn_udp_echo().await;
    let ctx = test_context(0);
    ctx.security.publish(SecuritySnapshot {
        allow_ports: vec![echo_addr.port()],
        allow_hosts: Vec::new(),
        test_mode: true,
    });
    let socks_addr = spawn_socks(ctx).await;

    let mut control = TcpStream::connect(socks_addr).await.unwrap();
    greet(&mut control, &[0x00]).await;

    // UDP ASSOCIATE request; DST.ADDR/DST.PORT in the request itself are
    // ignored by servers that only care about the per-datagram destination.
    let mut req = vec![0x05, 0x03, 0x00, 0x01];
    req.extend_from_slice(&[0, 0, 0, 0]);
    req.extend_from_slice(&0u16.to_be_bytes());
    control.write_all(&req).await.unwrap();

    let mut header = [0u8; 4];
    control.read_exact(&mut header).await.unwrap();
    assert_eq!(header[1], 0x00, "UDP ASSOCIATE should succeed");
    let mut addr_buf = [0u8; 4];
    control.read_exact(&mut addr_buf).await.unwrap();
    let mut port_buf = [0u8; 2];
    control.read_exact(&mut port_buf).await.unwrap();
    let relay_addr = SocketAddr::from((addr_buf, u16::from_be_bytes(port_buf)));
    let relay_addr = SocketAddr::new(
        if relay_addr.ip().is_unspecified() {
            "127.0.0.1".parse().unwrap()
        } else {
            relay_addr.ip()
        },
        relay_addr.port(),
    );

    let client_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut datagram = vec![0u8, 0u8, 0u8, 0x01];
    datagram.extend_from_slice(&[127, 0, 0, 1]);
    datagram.extend_from_slice(&echo_addr.port().to_be_bytes());
    datagram.extend_from_slice(b"hi!");
    client_socket.send_to(&datagram, relay_addr).await.unwrap();

    let mut buf = vec![0u8; 1024];
    let (n, _) = tokio::time::timeout(Duration::from_secs(2), client_socket.recv_from(&mut buf))
        .await
        .expect("udp echo should reply within the timeout")
        .unwrap();
    assert_eq!(&buf[n - 3..n], b"hi!");

    drop(control);
    // Closing the control connection should tear the relay down promptly;
    // re-sending should no longer produce a reply.
    tokio::time::sleep(Duration::from_millis(500)).await;
    client_socket.send_to(&datagram, relay_addr).await.unwrap();
    let no_more = tokio::time::timeout(Duration::from_millis(300), client_socket.recv_from(&mut buf)).await;
    assert!(no_more.is_err(), "relay should have torn down after control close");
}
