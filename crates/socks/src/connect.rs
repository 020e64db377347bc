//! SOCKS5 CONNECT (specification §4.5): resolve, light-time delay, dial,
//! reply, splice bidirectionally.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{self, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::{self, ReplyCode, Request};
use crate::resolve::{check_occlusion, resolve_target, TargetError};
use crate::{current_centuries_since_j2000, SocksContext};

/// Handle one CONNECT request end to end over `client`. Returns once the
/// spliced relay finishes (client or upstream closed).
pub async fn handle_connect(
    client: &mut TcpStream,
    client_addr: SocketAddr,
    request: &Request,
    ctx: &Arc<SocksContext>,
) -> io::Result<()> {
    let catalog = ctx.ephemeris.catalog();
    let target = match resolve_target(catalog, &request.address, request.port) {
        Ok(t) => t,
        Err(err) => {
            tracing::warn!(peer = %client_addr, dest = %request.address, %err, "connect resolve failed");
            return reply_and_close(client, err.reply_code()).await;
        }
    };

    if let Err(err) = ctx.security.validate(&target.target_host, target.target_port) {
        tracing::warn!(peer = %client_addr, host = %target.target_host, %err, "connect rejected by security validator");
        ctx.metrics.record_error("forbidden_target", &target.body_name);
        return reply_and_close(client, ReplyCode::NotAllowed).await;
    }

    let bucket = ctx.rate_limit_bucket(client_addr.ip(), &target.body_name).await;
    if !bucket.try_acquire(1.0).await {
        ctx.metrics.record_error("rate_limited", &target.body_name);
        return reply_and_close(client, ReplyCode::NotAllowed).await;
    }

    let t = current_centuries_since_j2000();
    let distance_km = match ctx.ephemeris.distance_km("earth", &target.body_name, t) {
        Ok(d) => d,
        Err(err) => {
            tracing::warn!(peer = %client_addr, %err, "ephemeris error resolving distance");
            return reply_and_close(client, ReplyCode::GeneralFailure).await;
        }
    };

    if let Err(err) = check_occlusion(&ctx.ephemeris, &target.body_name, t) {
        ctx.metrics.record_error("occluded", &target.body_name);
        return reply_and_close(client, err.reply_code()).await;
    }

    // §4.5 CONNECT: "after resolution, inject one-way light-time delay".
    ctx.latency_clock.sleep_one_way(distance_km).await;

    let policy = ctx.policy.get(&target.body_name);
    let dial_addr = format!("{}:{}", target.target_host, target.target_port);
    let upstream = match tokio::time::timeout(policy.dial_timeout, TcpStream::connect(&dial_addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) => {
            tracing::warn!(peer = %client_addr, dest = %dial_addr, %err, "connect dial failed");
            ctx.metrics.record_error("upstream_dial_failed", &target.body_name);
            return reply_and_close(client, ReplyCode::ConnectionRefused).await;
        }
        Err(_) => {
            ctx.metrics.record_error("upstream_timeout", &target.body_name);
            return reply_and_close(client, ReplyCode::HostUnreachable).await;
        }
    };

    let bound = upstream.local_addr().unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
    protocol::write_reply(client, ReplyCode::Success, bound).await.map_err(protocol_io_err)?;

    ctx.metrics.record_request(&target.body_name, "socks");

    let bandwidth_bps = policy.bandwidth_bps;
    splice_with_bandwidth_cap(client, upstream, bandwidth_bps, &target.body_name, distance_km, ctx).await
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

/// Bidirectionally copy bytes between `client` and `upstream`, metering the
/// upstream->client direction against `bandwidth_bps` with a token bucket
/// (specification §4.4 step 6, reused verbatim for SOCKS by §4.5 "Apply
/// bandwidth accounting as in §4.4").
///
/// The tunnel is symmetric with the HTTP path's two one-way delays: the
/// request-phase delay already paid before dialing covers the signal's trip
/// out to the body, and the first byte read back from upstream pays the
/// return trip before it reaches the client (§4.6 "on the first read/write
/// after open, blocks for the one-way light-time").
async fn splice_with_bandwidth_cap(
    client: &mut TcpStream,
    mut upstream: TcpStream,
    bandwidth_bps: u64,
    body_name: &str,
    distance_km: f64,
    ctx: &Arc<SocksContext>,
) -> io::Result<()> {
    let (mut client_rd, mut client_wr) = client.split();
    let (mut up_rd, mut up_wr) = upstream.split();

    let bucket = latency_limits::TokenBucket::new((bandwidth_bps as f64 / 8.0).max(1.0), (bandwidth_bps as f64 / 8.0).max(1.0));

    let client_to_upstream = async {
        let mut buf = vec![0u8; 16 * 1024];
        loop {
            let n = io::AsyncReadExt::read(&mut client_rd, &mut buf).await?;
            if n == 0 {
                break;
            }
            io::AsyncWriteExt::write_all(&mut up_wr, &buf[..n]).await?;
        }
        up_wr.shutdown().await
    };

    let upstream_to_client = async {
        let mut buf = vec![0u8; 16 * 1024];
        let mut total = 0u64;
        let mut first_byte = true;
        loop {
            let n = io::AsyncReadExt::read(&mut up_rd, &mut buf).await?;
            if n == 0 {
                break;
            }
            if first_byte {
                ctx.latency_clock.sleep_one_way(distance_km).await;
                first_byte = false;
            }
            bucket.acquire(n as f64).await;
            io::AsyncWriteExt::write_all(&mut client_wr, &buf[..n]).await?;
            total += n as u64;
        }
        ctx.metrics.record_bytes(body_name, "down", total);
        client_wr.shutdown().await
    };

    let (a, b) = tokio::join!(client_to_upstream, upstream_to_client);
    a.and(b)
}

impl From<TargetError> for ReplyCode {
    fn from(err: TargetError) -> ReplyCode {
        err.reply_code()
    }
}
