//! SOCKS5 listener loop: greeting, method selection, request dispatch
//! (specification §4.5, §6 `:1080`).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, warn};

use crate::protocol::{self, Command, ReplyCode};
use crate::state::{ConnectionState, StateTracker};
use crate::{bind, connect, udp, SocksContext, HANDSHAKE_TIMEOUT};

/// Run the SOCKS5 listener until `shutdown` fires. Each accepted connection
/// is handled on its own task (specification §5).
pub async fn serve_socks(
    addr: SocketAddr,
    ctx: Arc<SocksContext>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, kind = "socks", "listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => { warn!(%err, "socks accept failed"); continue; }
                };
                let ctx = ctx.clone();
                ctx.metrics.connection_opened();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, peer, ctx.clone()).await {
                        debug!(%peer, %err, "socks connection ended with error");
                    }
                    ctx.metrics.connection_closed();
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    peer: SocketAddr,
    ctx: Arc<SocksContext>,
) -> std::io::Result<()> {
    let mut tracker = StateTracker::new(peer);

    let greeting = tokio::time::timeout(HANDSHAKE_TIMEOUT, protocol::read_greeting(&mut stream))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "handshake timed out"))?
        .map_err(protocol_io_err)?;
    tracker.transition(ConnectionState::Greeted);

    let method = protocol::choose_method(&greeting);
    protocol::write_method_selection(&mut stream, method)
        .await
        .map_err(protocol_io_err)?;

    if method == protocol::METHOD_NO_ACCEPTABLE {
        // §8 P8: offering only unsupported methods closes within 100 ms.
        tracker.transition(ConnectionState::Closed);
        return Ok(());
    }

    let request = match tokio::time::timeout(HANDSHAKE_TIMEOUT, protocol::read_request(&mut stream)).await {
        Ok(Ok(request)) => request,
        Ok(Err(protocol::ProtocolError::UnsupportedCommand(code))) => {
            warn!(%peer, command = code, "socks request named an unsupported command");
            return reply_and_close(&mut stream, ReplyCode::CommandNotSupported).await;
        }
        Ok(Err(protocol::ProtocolError::UnsupportedAddrType(code))) => {
            warn!(%peer, atyp = code, "socks request named an unsupported address type");
            return reply_and_close(&mut stream, ReplyCode::AddrTypeNotSupported).await;
        }
        Ok(Err(err)) => return Err(protocol_io_err(err)),
        Err(_) => {
            return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "request read timed out"));
        }
    };
    tracker.transition(ConnectionState::Requested);

    match request.command {
        Command::Connect => {
            tracker.transition(ConnectionState::Relaying);
            connect::handle_connect(&mut stream, peer, &request, &ctx).await?;
        }
        Command::Bind => {
            tracker.transition(ConnectionState::Relaying);
            bind::handle_bind(&mut stream, peer, &request, &ctx).await?;
        }
        Command::UdpAssociate => {
            tracker.transition(ConnectionState::UdpAssociated);
            udp::handle_udp_associate(&mut stream, peer, &request, &ctx).await?;
        }
    }

    tracker.transition(ConnectionState::Closed);
    Ok(())
}

async fn reply_and_close(stream: &mut tokio::net::TcpStream, rep: ReplyCode) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    let bound = SocketAddr::from(([0, 0, 0, 0], 0));
    protocol::write_reply(stream, rep, bound).await.map_err(protocol_io_err)?;
    stream.shutdown().await
}

fn protocol_io_err(err: protocol::ProtocolError) -> std::io::Error {
    match err {
        protocol::ProtocolError::Io(e) => e,
        protocol::ProtocolError::UnsupportedCommand(_) => {
            std::io::Error::new(std::io::ErrorKind::InvalidData, ReplyCode::CommandNotSupported.to_string())
        }
        protocol::ProtocolError::UnsupportedAddrType(_) => {
            std::io::Error::new(std::io::ErrorKind::InvalidData, ReplyCode::AddrTypeNotSupported.to_string())
        }
        other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", *self as u8)
    }
}
