//! HTTP(S) reverse proxy: portal page, debug JSON, and light-time-delayed
//! forwarding to an arbitrary upstream per request.

pub mod certs;
mod metrics_endpoint;
mod portal;
mod server;

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Request, Response, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use latency_catalog::ObjectKind;
use latency_ephemeris::{Ephemeris, EphemerisError};
use latency_limits::{LatencyClock, TokenBucket};
use latency_metrics::Metrics;
use latency_policy::{PolicyTable, SecurityValidator};
use latency_resolver::{resolve, DebugEndpoint, Mode, ResolveError};

pub use metrics_endpoint::serve_metrics;
pub use server::{serve_http, serve_https};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

fn full_body(bytes: Bytes) -> BoxBody {
    Full::new(bytes)
        .map_err(|never: std::convert::Infallible| match never {})
        .boxed()
}

fn empty_body() -> BoxBody {
    Empty::new()
        .map_err(|never: std::convert::Infallible| match never {})
        .boxed()
}

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Shared, process-lifetime state handed to every accepted connection.
/// Constructed once in the root binary and held by `Arc` rather than as a
/// process-wide singleton.
pub struct ProxyContext {
    pub ephemeris: Arc<Ephemeris>,
    pub policy: Arc<PolicyTable>,
    pub security: Arc<SecurityValidator>,
    pub metrics: Arc<Metrics>,
    pub latency_clock: LatencyClock,
    rate_buckets: AsyncMutex<HashMap<(IpAddr, String), Arc<TokenBucket>>>,
    client: Client<HttpConnector, BoxBody>,
    build_timestamp_unix: &'static str,
    version: &'static str,
}

impl ProxyContext {
    pub fn new(
        ephemeris: Arc<Ephemeris>,
        policy: Arc<PolicyTable>,
        security: Arc<SecurityValidator>,
        metrics: Arc<Metrics>,
        latency_clock: LatencyClock,
    ) -> ProxyContext {
        ProxyContext {
            ephemeris,
            policy,
            security,
            metrics,
            latency_clock,
            rate_buckets: AsyncMutex::new(HashMap::new()),
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            build_timestamp_unix: env!("LATENCY_BUILD_TIMESTAMP"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    async fn rate_limit_bucket(&self, client_ip: IpAddr, body: &str) -> Arc<TokenBucket> {
        let key = (client_ip, body.to_string());
        let mut buckets = self.rate_buckets.lock().await;
        buckets
            .entry(key)
            .or_insert_with(|| Arc::new(TokenBucket::new(5.0 / 60.0, 5.0)))
            .clone()
    }
}

/// Handle one HTTP request end to end: resolve, validate, rate limit, delay
/// for light-time, dial upstream, and meter bandwidth on the way back.
pub async fn handle_request(
    req: Request<Incoming>,
    ctx: Arc<ProxyContext>,
    client_ip: IpAddr,
) -> Response<BoxBody> {
    let host = match host_of(&req) {
        Some(h) => h,
        None => return status_response(StatusCode::BAD_REQUEST, "missing Host header"),
    };
    let path = req.uri().path().to_string();

    let catalog = ctx.ephemeris.catalog();
    let destination = match resolve(catalog, &host, Some(&path)) {
        Ok(d) => d,
        Err(err) => return resolve_error_response(err),
    };

    match destination.mode {
        Mode::Debug => {
            let endpoint = destination.debug_endpoint.unwrap_or(DebugEndpoint::Status);
            serve_debug(endpoint, &ctx)
        }
        Mode::Portal => portal::render(destination.body, catalog),
        Mode::HttpProxy | Mode::Direct => {
            proxy_request(req, ctx, client_ip, destination.body.name, destination.target_host)
                .await
        }
    }
}

fn host_of(req: &Request<Incoming>) -> Option<String> {
    req.headers()
        .get(hyper::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(':').next().unwrap_or(s).to_string())
        .or_else(|| req.uri().host().map(str::to_string))
}

fn resolve_error_response(err: ResolveError) -> Response<BoxBody> {
    match err {
        ResolveError::UnknownBody(_) => status_response(StatusCode::BAD_REQUEST, "unknown body"),
        ResolveError::RecursiveTarget(_) => status_response(StatusCode::FORBIDDEN, "recursive target"),
        ResolveError::InvalidTargetHost(_) => status_response(StatusCode::BAD_REQUEST, "invalid target host"),
        ResolveError::InvalidPath(_) => status_response(StatusCode::BAD_REQUEST, "invalid debug path"),
    }
}

fn kind_label(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Star => "star",
        ObjectKind::Planet => "planet",
        ObjectKind::DwarfPlanet => "dwarf_planet",
        ObjectKind::Moon => "moon",
        ObjectKind::Asteroid => "asteroid",
        ObjectKind::Spacecraft => "spacecraft",
    }
}

fn serve_debug(endpoint: DebugEndpoint, ctx: &ProxyContext) -> Response<BoxBody> {
    let body = match endpoint {
        DebugEndpoint::Metrics => serde_json::to_vec(&ctx.metrics.debug_json()),
        DebugEndpoint::Distances => {
            let t = current_centuries_since_j2000();
            let entries = ctx.ephemeris.earth_distances(t);
            let json: Vec<_> = entries
                .iter()
                .map(|e| {
                    let one_way = e.distance_km / 299_792.458;
                    let kind = ctx
                        .ephemeris
                        .catalog()
                        .find(e.target_name)
                        .map(|o| kind_label(o.kind))
                        .unwrap_or("unknown");
                    let occlusion = ctx.ephemeris.occlusion("earth", e.target_name, t).ok();
                    let occluded = occlusion.as_ref().is_some_and(|o| o.is_occluded());
                    let occluded_by = occlusion.as_ref().and_then(|o| o.occluder_name());
                    serde_json::json!({
                        "name": e.target_name,
                        "type": kind,
                        "distance_km": e.distance_km,
                        "occluded": occluded,
                        "occluded_by": occluded_by,
                        "one_way_latency_s": one_way,
                        "round_trip_s": one_way * 2.0,
                    })
                })
                .collect();
            serde_json::to_vec(&json)
        }
        DebugEndpoint::Status => serde_json::to_vec(&serde_json::json!({
            "version": ctx.version,
            "build_time": ctx.build_timestamp_unix,
            "catalog_size": ctx.ephemeris.catalog().all().len(),
            "last_distance_update_s_ago": ctx.ephemeris.distance_cache_age().map(|d| d.as_secs_f64()),
        })),
    };
    match body {
        Ok(bytes) => {
            let mut resp = Response::new(full_body(Bytes::from(bytes)));
            resp.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            resp
        }
        Err(_) => status_response(StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed"),
    }
}

fn current_centuries_since_j2000() -> f64 {
    let jd = latency_ephemeris::time::julian_date_now();
    latency_ephemeris::time::centuries_since_j2000_tdb(jd)
}

async fn proxy_request(
    req: Request<Incoming>,
    ctx: Arc<ProxyContext>,
    client_ip: IpAddr,
    body_name: &str,
    target_host: Option<String>,
) -> Response<BoxBody> {
    let Some(target_host) = target_host else {
        return status_response(StatusCode::BAD_REQUEST, "no target host specified for proxy mode");
    };

    let scheme_default_port = if req.uri().scheme_str() == Some("https") { 443 } else { 80 };
    let target_port = req.uri().port_u16().unwrap_or(scheme_default_port);

    if let Err(err) = ctx.security.validate(&target_host, target_port) {
        warn!(%target_host, target_port, %err, "rejected by security validator");
        ctx.metrics.record_error("forbidden_target", body_name);
        return status_response(StatusCode::FORBIDDEN, "forbidden target");
    }

    let bucket = ctx.rate_limit_bucket(client_ip, body_name).await;
    if !bucket.try_acquire(1.0).await {
        ctx.metrics.record_error("rate_limited", body_name);
        return status_response(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded");
    }

    let t = current_centuries_since_j2000();
    let distance_km = match ctx.ephemeris.distance_km("earth", body_name, t) {
        Ok(d) => d,
        Err(EphemerisError::NotFound(_)) => {
            return status_response(StatusCode::BAD_REQUEST, "unknown body")
        }
        Err(_) => return status_response(StatusCode::INTERNAL_SERVER_ERROR, "ephemeris error"),
    };

    match ctx.ephemeris.occlusion("earth", body_name, t) {
        Ok(occlusion) if occlusion.is_occluded() => {
            ctx.metrics.record_error("occluded", body_name);
            return status_response(StatusCode::SERVICE_UNAVAILABLE, "body is occluded from Earth");
        }
        Err(_) => return status_response(StatusCode::INTERNAL_SERVER_ERROR, "occlusion check failed"),
        _ => {}
    }

    // One-way delay before dialing upstream.
    ctx.latency_clock.sleep_one_way(distance_km).await;

    let policy = ctx.policy.get(body_name);
    let uri: Uri = match format!("http://{target_host}:{target_port}{}", path_and_query(&req)).parse() {
        Ok(u) => u,
        Err(_) => return status_response(StatusCode::BAD_REQUEST, "invalid upstream URI"),
    };

    let (parts, body) = req.into_parts();
    let collected = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return status_response(StatusCode::BAD_REQUEST, "failed to read request body"),
    };

    let build_upstream_req = |uri: Uri| -> Option<Request<BoxBody>> {
        let mut builder = Request::builder().method(parts.method.clone()).uri(uri);
        for (name, value) in parts.headers.iter() {
            if !is_hop_by_hop(name) && name != hyper::header::HOST {
                builder = builder.header(name, value);
            }
        }
        builder = builder
            .header(hyper::header::HOST, target_host.clone())
            .header("X-Forwarded-For", client_ip.to_string())
            .header(
                "X-Forwarded-Host",
                parts.headers.get(hyper::header::HOST).cloned().unwrap_or(HeaderValue::from_static("")),
            )
            .header("X-Destination", format!("{target_host}:{target_port}"));
        builder.body(full_body(collected.clone())).ok()
    };

    let dial_timeout = policy.dial_timeout;
    let retryable = is_idempotent(&parts.method);
    let mut attempt = 0;
    let (resp_parts, resp_bytes) = loop {
        attempt += 1;
        let Some(upstream_req) = build_upstream_req(uri.clone()) else {
            return status_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to build upstream request");
        };

        let outcome = async {
            let response = tokio::time::timeout(dial_timeout, ctx.client.request(upstream_req))
                .await
                .map_err(|_| UpstreamAttemptError::DialTimeout)?
                .map_err(|_| UpstreamAttemptError::DialFailed)?;
            let (resp_parts, resp_body) = response.into_parts();
            let resp_bytes = resp_body
                .collect()
                .await
                .map_err(|_| UpstreamAttemptError::ResponseReadFailed)?
                .to_bytes();
            Ok::<_, UpstreamAttemptError>((resp_parts, resp_bytes))
        }
        .await;

        match outcome {
            Ok(result) => break result,
            // A transient read error within a single request is retried once,
            // HTTP only, idempotent methods, with a small backoff.
            Err(UpstreamAttemptError::ResponseReadFailed) if retryable && attempt == 1 => {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                continue;
            }
            Err(UpstreamAttemptError::DialFailed) => {
                ctx.metrics.record_error("upstream_dial_failed", body_name);
                return status_response(StatusCode::BAD_GATEWAY, "upstream dial failed");
            }
            Err(UpstreamAttemptError::DialTimeout) => {
                ctx.metrics.record_error("upstream_timeout", body_name);
                return status_response(StatusCode::GATEWAY_TIMEOUT, "upstream dial timed out");
            }
            Err(UpstreamAttemptError::ResponseReadFailed) => {
                return status_response(StatusCode::BAD_GATEWAY, "upstream response read failed");
            }
        }
    };

    // One-way delay before the first byte of the response.
    ctx.latency_clock.sleep_one_way(distance_km).await;

    // Coarse bandwidth accounting: the whole response is metered against the
    // per-body cap before it is handed back.
    let byte_cost = resp_bytes.len() as f64;
    if byte_cost > 0.0 {
        let bandwidth_bucket = TokenBucket::new(policy.bandwidth_bps as f64 / 8.0, policy.bandwidth_bps as f64 / 8.0);
        bandwidth_bucket.acquire(byte_cost).await;
    }

    ctx.metrics.record_request(body_name, "http");
    ctx.metrics.record_bytes(body_name, "down", resp_bytes.len() as u64);

    let mut response = Response::builder().status(resp_parts.status);
    for (name, value) in resp_parts.headers.iter() {
        if !is_hop_by_hop(name) {
            response = response.header(name, value);
        }
    }
    response.body(full_body(resp_bytes)).unwrap_or_else(|_| {
        status_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to build response")
    })
}

/// Transient outcomes of a single upstream dial+read attempt. Local recovery
/// retries `ResponseReadFailed` once, HTTP only, for idempotent methods.
enum UpstreamAttemptError {
    DialFailed,
    DialTimeout,
    ResponseReadFailed,
}

/// Methods safe to retry once on a transient upstream read error.
fn is_idempotent(method: &hyper::Method) -> bool {
    matches!(
        *method,
        hyper::Method::GET | hyper::Method::HEAD | hyper::Method::PUT | hyper::Method::DELETE | hyper::Method::OPTIONS
    )
}

fn path_and_query(req: &Request<Incoming>) -> String {
    req.uri().path_and_query().map(|pq| pq.as_str().to_string()).unwrap_or_else(|| "/".to_string())
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.iter().any(|h| name.as_str().eq_ignore_ascii_case(h))
}

fn status_response(status: StatusCode, message: &str) -> Response<BoxBody> {
    let mut resp = Response::new(full_body(Bytes::from(message.to_string())));
    *resp.status_mut() = status;
    resp
}

pub(crate) fn log_startup(addr: std::net::SocketAddr, kind: &str) {
    info!(%addr, kind, "listening");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_head_put_delete_options_are_idempotent() {
        assert!(is_idempotent(&hyper::Method::GET));
        assert!(is_idempotent(&hyper::Method::HEAD));
        assert!(is_idempotent(&hyper::Method::PUT));
        assert!(is_idempotent(&hyper::Method::DELETE));
        assert!(is_idempotent(&hyper::Method::OPTIONS));
    }

    #[test]
    fn post_and_patch_are_not_idempotent() {
        assert!(!is_idempotent(&hyper::Method::POST));
        assert!(!is_idempotent(&hyper::Method::PATCH));
    }

    #[test]
    fn hop_by_hop_headers_are_filtered() {
        assert!(is_hop_by_hop(&hyper::header::CONNECTION));
        assert!(is_hop_by_hop(&hyper::header::TRANSFER_ENCODING));
        assert!(!is_hop_by_hop(&hyper::header::CONTENT_TYPE));
    }
}
