//! Listener loops for the plain-HTTP (`:80`) and TLS (`:443`) proxy fronts.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{error, warn};

use crate::certs::CertStore;
use crate::{handle_request, log_startup, ProxyContext};

/// Run the plain-HTTP listener until `shutdown` fires. Each accepted
/// connection is handled on its own task.
pub async fn serve_http(
    addr: SocketAddr,
    ctx: Arc<ProxyContext>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log_startup(addr, "http");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => { warn!(%err, "http accept failed"); continue; }
                };
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let ctx = ctx.clone();
                        async move { Ok::<_, std::convert::Infallible>(handle_request(req, ctx, peer.ip()).await) }
                    });
                    if let Err(err) = AutoBuilder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        warn!(%err, "http connection closed with error");
                    }
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

/// Run the TLS listener until `shutdown` fires, reloading certificates from
/// `cert_store` as they change on disk.
pub async fn serve_https(
    addr: SocketAddr,
    ctx: Arc<ProxyContext>,
    cert_store: Arc<CertStore>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log_startup(addr, "https");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => { warn!(%err, "https accept failed"); continue; }
                };
                let ctx = ctx.clone();
                let acceptor = TlsAcceptor::from(cert_store.current());
                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(s) => s,
                        Err(err) => { warn!(%err, "tls handshake failed"); return; }
                    };
                    let io = TokioIo::new(tls_stream);
                    let service = service_fn(move |req| {
                        let ctx = ctx.clone();
                        async move { Ok::<_, std::convert::Infallible>(handle_request(req, ctx, peer.ip()).await) }
                    });
                    if let Err(err) = AutoBuilder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        error!(%err, "https connection closed with error");
                    }
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
