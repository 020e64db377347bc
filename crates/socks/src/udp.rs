//! SOCKS5 UDP ASSOCIATE (specification §4.5): a local UDP relay socket is
//! allocated and its address returned in the reply; the control TCP
//! connection must stay open for the association's lifetime; each datagram
//! is parsed, resolved, and forwarded to its upstream after a one-way
//! light-time delay, and replies are wrapped back to the last-seen client
//! source address.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{self, AsyncReadExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Mutex as AsyncMutex;

use crate::protocol::{self, Address, ReplyCode, Request};
use crate::resolve::resolve_target;
use crate::{current_centuries_since_j2000, SocksContext, UDP_IDLE_TIMEOUT};

/// Handle one UDP ASSOCIATE request end to end: reply with the relay
/// address, then run the relay loop until the control connection closes or
/// the association goes idle.
pub async fn handle_udp_associate(
    client: &mut TcpStream,
    client_addr: SocketAddr,
    _request: &Request,
    ctx: &Arc<SocksContext>,
) -> io::Result<()> {
    let relay_socket = Arc::new(UdpSocket::bind(("0.0.0.0", 0)).await?);
    let upstream_socket = Arc::new(UdpSocket::bind(("0.0.0.0", 0)).await?);
    let relay_addr = relay_socket.local_addr()?;

    protocol::write_reply(client, ReplyCode::Success, relay_addr)
        .await
        .map_err(protocol_io_err)?;
    tracing::debug!(peer = %client_addr, %relay_addr, "udp associate established");

    let last_client_addr: Arc<AsyncMutex<Option<SocketAddr>>> = Arc::new(AsyncMutex::new(None));
    let mut client_buf = vec![0u8; 65_536];
    let mut upstream_buf = vec![0u8; 65_536];
    let mut control_probe = [0u8; 1];

    loop {
        tokio::select! {
            from_client = relay_socket.recv_from(&mut client_buf) => {
                match from_client {
                    Ok((n, src)) => {
                        *last_client_addr.lock().await = Some(src);
                        handle_client_datagram(
                            &client_buf[..n],
                            ctx,
                            &upstream_socket,
                        )
                        .await;
                    }
                    Err(err) => {
                        tracing::warn!(peer = %client_addr, %err, "udp relay socket recv failed");
                        break;
                    }
                }
            }
            from_upstream = upstream_socket.recv_from(&mut upstream_buf) => {
                match from_upstream {
                    Ok((n, src)) => {
                        if let Some(dest) = *last_client_addr.lock().await {
                            let wrapped = protocol::encode_udp_datagram(
                                &Address::Ip(src.ip()),
                                src.port(),
                                &upstream_buf[..n],
                            );
                            let _ = relay_socket.send_to(&wrapped, dest).await;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(peer = %client_addr, %err, "udp upstream socket recv failed");
                        break;
                    }
                }
            }
            control = client.read(&mut control_probe) => {
                match control {
                    Ok(0) | Err(_) => {
                        tracing::debug!(peer = %client_addr, "control connection closed, tearing down udp relay");
                        break;
                    }
                    Ok(_) => {
                        // Unexpected application data on the control connection;
                        // the association stays open (specification §4.5 only
                        // requires the connection to remain open, not silent).
                    }
                }
            }
            _ = tokio::time::sleep(UDP_IDLE_TIMEOUT) => {
                tracing::debug!(peer = %client_addr, "udp association idle timeout");
                break;
            }
        }
    }

    Ok(())
}

async fn handle_client_datagram(raw: &[u8], ctx: &Arc<SocksContext>, upstream_socket: &Arc<UdpSocket>) {
    let datagram = match protocol::parse_udp_datagram(raw) {
        Ok(d) => d,
        Err(err) => {
            tracing::debug!(%err, "dropping malformed udp datagram");
            return;
        }
    };
    if datagram.fragment != 0 {
        // §4.5: "FRAG != 0 is dropped."
        return;
    }

    let catalog = ctx.ephemeris.catalog();
    let target = match resolve_target(catalog, &datagram.address, datagram.port) {
        Ok(t) => t,
        Err(err) => {
            tracing::debug!(dest = %datagram.address, %err, "dropping datagram: resolve failed");
            return;
        }
    };

    if let Err(err) = ctx.security.validate(&target.target_host, target.target_port) {
        tracing::debug!(host = %target.target_host, %err, "dropping datagram: rejected by security validator");
        return;
    }

    let t = current_centuries_since_j2000();
    match ctx.ephemeris.occlusion("earth", &target.body_name, t) {
        Ok(occlusion) if occlusion.is_occluded() => {
            ctx.metrics.record_error("occluded", &target.body_name);
            return;
        }
        Err(err) => {
            tracing::debug!(%err, "dropping datagram: occlusion check failed");
            return;
        }
        _ => {}
    }

    let distance_km = match ctx.ephemeris.distance_km("earth", &target.body_name, t) {
        Ok(d) => d,
        Err(_) => return,
    };

    let dial_addr = format!("{}:{}", target.target_host, target.target_port);
    let resolved_addr = match tokio::net::lookup_host(&dial_addr).await.ok().and_then(|mut it| it.next()) {
        Some(addr) => addr,
        None => {
            tracing::debug!(dest = %dial_addr, "dropping datagram: DNS resolution failed");
            return;
        }
    };

    ctx.metrics.record_request(&target.body_name, "socks");
    ctx.metrics.record_bytes(&target.body_name, "up", datagram.payload.len() as u64);

    let delay = ctx.latency_clock.one_way_delay(distance_km);
    let upstream_socket = upstream_socket.clone();
    let payload = datagram.payload;
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let _ = upstream_socket.send_to(&payload, resolved_addr).await;
    });
}

fn protocol_io_err(err: crate::protocol::ProtocolError) -> io::Error {
    match err {
        crate::protocol::ProtocolError::Io(e) => e,
        other => io::Error::other(other.to_string()),
    }
}
