//! The dedicated Prometheus scrape listener, `:9090 GET /metrics`.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use tokio::net::TcpListener;
use tracing::warn;

use latency_metrics::Metrics;

use crate::{empty_body, full_body, log_startup, BoxBody};

async fn handle(req: Request<hyper::body::Incoming>, metrics: Arc<Metrics>) -> Response<BoxBody> {
    if req.uri().path() != "/metrics" {
        let mut resp = Response::new(empty_body());
        *resp.status_mut() = StatusCode::NOT_FOUND;
        return resp;
    }
    let mut resp = Response::new(full_body(Bytes::from(metrics.render_prometheus())));
    resp.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    resp
}

/// Run the metrics listener until `shutdown` fires.
pub async fn serve_metrics(
    addr: SocketAddr,
    metrics: Arc<Metrics>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log_startup(addr, "metrics");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => { warn!(%err, "metrics accept failed"); continue; }
                };
                let metrics = metrics.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let metrics = metrics.clone();
                        async move { Ok::<_, std::convert::Infallible>(handle(req, metrics).await) }
                    });
                    if let Err(err) = AutoBuilder::new(TokioExecutor::new()).serve_connection(io, service).await {
                        warn!(%err, "metrics connection closed with error");
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
