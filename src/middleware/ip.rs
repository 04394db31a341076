use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

const LOCALHOST: IpAddr = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);

/// Resolved address of the calling client, inserted into the request extensions
/// by [`client_ip_middleware`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Extract client IP from proxy headers and optional transport metadata.
pub fn extract_ip_from_headers(headers: &HeaderMap, fallback: Option<IpAddr>) -> IpAddr {
    if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
        if let Some(first) = h.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }
    if let Some(h) = headers.get("x-real-ip").and_then(|hv| hv.to_str().ok()) {
        if let Ok(ip) = h.trim().parse::<IpAddr>() {
            return ip;
        }
    }
    fallback.unwrap_or(LOCALHOST)
}

/// Resolves the client address once per request.
///
/// Proxy headers are only honoured when `trust_proxy` is set; otherwise they are
/// client-controlled and would let anyone pick their own rate-limit bucket.
pub async fn client_ip_middleware(State(trust_proxy): State<bool>, mut req: Request, next: Next) -> Response {
    let remote = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    let ip = if trust_proxy { extract_ip_from_headers(req.headers(), remote) } else { remote.unwrap_or(LOCALHOST) };
    req.extensions_mut().insert(ClientIp(ip));
    next.run(req).await
}

/// Address resolved by [`client_ip_middleware`], or loopback when it did not run.
pub fn client_ip(req: &Request) -> IpAddr {
    req.extensions().get::<ClientIp>().map(|c| c.0).unwrap_or(LOCALHOST)
}
