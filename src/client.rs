use std::net::IpAddr;

use actix_web::{http::header, HttpRequest};

/// Column width of `ip_address`.
pub const SOURCE_MAX: usize = 45;

pub const CLIENT_IP_HEADER: &str = "Client-IP";
pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

/// Request metadata captured once, when the submission is received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    pub fn from_request(req: &HttpRequest) -> Self {
        let headers = req.headers();
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            ip_address: resolve_source(
                text(CLIENT_IP_HEADER),
                text(FORWARDED_FOR_HEADER),
                req.peer_addr().map(|a| a.ip()),
            ),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .filter(|ua| !ua.is_empty())
                .map(str::to_string),
        }
    }
}

/// First non-empty of: proxy client header, forwarded-for (leftmost hop),
/// direct peer address.
pub fn resolve_source(client_ip: Option<&str>, forwarded_for: Option<&str>, peer: Option<IpAddr>) -> Option<String> {
    let forwarded = forwarded_for.and_then(|v| v.split(',').next());
    [client_ip, forwarded]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(|v| v.chars().filter(|c| !c.is_control()).take(SOURCE_MAX).collect())
        .or_else(|| peer.map(|ip| ip.to_string()))
}
