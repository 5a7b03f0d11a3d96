//! Client-address resolution.
//!
//! Behind a proxy the TCP peer is the proxy, so the client is taken from
//! `True-Client-IP`, then `X-Real-IP`, then the first `X-Forwarded-For` hop.
//! Values that do not parse as an IP address are ignored. Without a usable
//! header (or with proxy headers untrusted) the peer address is used.

use std::net::IpAddr;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

/// Client-IP stage.
#[derive(Clone, Copy, Debug)]
pub struct RealIp {
    trust_proxy_headers: bool,
}

impl RealIp {
    pub fn new(trust_proxy_headers: bool) -> Self {
        Self { trust_proxy_headers }
    }

    fn resolve(&self, req: &Request) -> IpAddr {
        if self.trust_proxy_headers {
            let forwarded = req.header("true-client-ip")
                .or_else(|| req.header("x-real-ip"))
                .or_else(|| req.header("x-forwarded-for").and_then(|v| v.split(',').next()));
            if let Some(ip) = forwarded.and_then(|v| v.trim().parse().ok()) {
                return ip;
            }
        }
        req.remote_addr().ip()
    }
}

impl Middleware for RealIp {
    fn name(&self) -> &'static str { "real_ip" }

    fn handle<'a>(&'a self, mut req: Request, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            req.ctx.client_ip = Some(self.resolve(&req));
            next.run(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    fn resolve(trust: bool, headers: &[(&str, &str)]) -> String {
        RealIp::new(trust).resolve(&request("GET", "/", headers)).to_string()
    }

    #[test]
    fn header_precedence() {
        let all = [
            ("x-forwarded-for", "203.0.113.1, 10.0.0.1"),
            ("x-real-ip", "203.0.113.2"),
            ("true-client-ip", "203.0.113.3"),
        ];
        assert_eq!(resolve(true, &all), "203.0.113.3");
        assert_eq!(resolve(true, &all[..2]), "203.0.113.2");
        assert_eq!(resolve(true, &all[..1]), "203.0.113.1");
    }

    #[test]
    fn falls_back_to_peer() {
        assert_eq!(resolve(true, &[]), "10.0.0.9");
        assert_eq!(resolve(true, &[("x-real-ip", "not-an-ip")]), "10.0.0.9");
        assert_eq!(resolve(false, &[("x-real-ip", "203.0.113.2")]), "10.0.0.9");
    }

    #[test]
    fn accepts_ipv6() {
        assert_eq!(resolve(true, &[("x-real-ip", "2001:db8::1")]), "2001:db8::1");
    }
}
