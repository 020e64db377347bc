//! SOCKS5 BIND (specification §4.5): allocate a listening socket reachable
//! from the Internet, reply with the bound address, accept one inbound
//! connection, reply again with the peer address, then splice.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{self, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::protocol::{self, ReplyCode, Request};
use crate::resolve::{check_occlusion, resolve_target};
use crate::{current_centuries_since_j2000, SocksContext};

/// Handle one BIND request end to end over `client`.
pub async fn handle_bind(
    client: &mut TcpStream,
    client_addr: SocketAddr,
    request: &Request,
    ctx: &Arc<SocksContext>,
) -> io::Result<()> {
    let catalog = ctx.ephemeris.catalog();
    let target = match resolve_target(catalog, &request.address, request.port) {
        Ok(t) => t,
        Err(err) => {
            tracing::warn!(peer = %client_addr, dest = %request.address, %err, "bind resolve failed");
            return reply_and_close(client, err.reply_code()).await;
        }
    };

    if let Err(err) = ctx.security.validate(&target.target_host, target.target_port) {
        tracing::warn!(peer = %client_addr, host = %target.target_host, %err, "bind rejected by security validator");
        return reply_and_close(client, ReplyCode::NotAllowed).await;
    }

    let t = current_centuries_since_j2000();
    if let Err(err) = check_occlusion(&ctx.ephemeris, &target.body_name, t) {
        ctx.metrics.record_error("occluded", &target.body_name);
        return reply_and_close(client, err.reply_code()).await;
    }

    let listener = match TcpListener::bind(("0.0.0.0", 0)).await {
        Ok(l) => l,
        Err(err) => {
            tracing::warn!(peer = %client_addr, %err, "bind failed to allocate listening socket");
            return reply_and_close(client, ReplyCode::GeneralFailure).await;
        }
    };
    let bound_addr = listener.local_addr()?;

    // First reply: the bound address the external party should connect to.
    protocol::write_reply(client, ReplyCode::Success, bound_addr)
        .await
        .map_err(protocol_io_err)?;

    let distance_km = match ctx.ephemeris.distance_km("earth", &target.body_name, t) {
        Ok(d) => d,
        Err(_) => return reply_and_close(client, ReplyCode::GeneralFailure).await,
    };

    let accept_result = tokio::time::timeout(crate::HANDSHAKE_TIMEOUT, listener.accept()).await;
    let (peer_stream, peer_addr) = match accept_result {
        Ok(Ok(pair)) => pair,
        Ok(Err(err)) => {
            tracing::warn!(peer = %client_addr, %err, "bind accept failed");
            return reply_and_close(client, ReplyCode::GeneralFailure).await;
        }
        Err(_) => return reply_and_close(client, ReplyCode::HostUnreachable).await,
    };

    // §4.5 BIND: light-time delay is applied once the inbound peer arrives,
    // symmetric with CONNECT's "after resolution" timing.
    ctx.latency_clock.sleep_one_way(distance_km).await;

    // Second reply: the address of the peer that connected.
    protocol::write_reply(client, ReplyCode::Success, peer_addr)
        .await
        .map_err(protocol_io_err)?;

    ctx.metrics.record_request(&target.body_name, "socks");
    splice(client, peer_stream).await
}

async fn reply_and_close(client: &mut TcpStream, rep: ReplyCode) -> io::Result<()> {
    let bound = SocketAddr::from(([0, 0, 0, 0], 0));
    protocol::write_reply(client, rep, bound).await.map_err(protocol_io_err)?;
    client.shutdown().await
}

fn protocol_io_err(err: crate::protocol::ProtocolError) -> io::Error {
    match err {
        crate::protocol::ProtocolError::Io(e) => e,
        other => io::Error::other(other.to_string()),
    }
}

async fn splice(client: &mut TcpStream, mut peer: TcpStream) -> io::Result<()> {
    let (mut client_rd, mut client_wr) = client.split();
    let (mut peer_rd, mut peer_wr) = peer.split();
    let a = async {
        io::copy(&mut client_rd, &mut peer_wr).await?;
        peer_wr.shutdown().await
    };
    let b = async {
        io::copy(&mut peer_rd, &mut client_wr).await?;
        client_wr.shutdown().await
    };
    let (a, b) = tokio::join!(a, b);
    a.and(b)
}
