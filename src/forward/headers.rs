//! Hop-by-hop header handling.
//!
//! Headers that only describe one transport leg are removed before a
//! message crosses the proxy, in either direction. Everything else passes
//! through unmodified.

use axum::http::header::{self, HeaderMap, HeaderName};

/// Fixed hop-by-hop set (RFC 9110 §7.6.1 plus the legacy proxy headers).
pub static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// Remove the fixed hop-by-hop set and every header the `Connection`
/// header nominates.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let nominated: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    let doomed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name) || nominated.contains(name))
        .cloned()
        .collect();
    for name in doomed {
        headers.remove(name);
    }
}
