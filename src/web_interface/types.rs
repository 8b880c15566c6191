use std::net::SocketAddr;

use bytes::Bytes;
use warp::http::header::{HeaderName, CONTENT_TYPE, LOCATION};
use warp::http::{HeaderMap, Method, StatusCode};

/// Transport-independent view of an inbound web request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub remote: Option<SocketAddr>,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or("")
    }

    /// Best guess at the originating host: the first `X-Forwarded-For` entry,
    /// then `X-Real-IP`, then the socket peer.
    pub fn client_ip(&self) -> String {
        if let Some(first) = self
            .header("x-forwarded-for")
            .and_then(|xff| xff.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return first.to_string();
        }
        if let Some(real) = self.header("x-real-ip").map(str::trim).filter(|ip| !ip.is_empty()) {
            return real.to_string();
        }
        self.remote
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Response chosen by the router, before it is handed to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, String)>,
    pub body: Vec<u8>,
}

impl Outcome {
    pub fn new(status: StatusCode, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: vec![(CONTENT_TYPE, content_type.to_string())],
            body: body.into(),
        }
    }

    pub fn text(status: StatusCode, body: &str) -> Self {
        Self::new(status, "text/plain; charset=utf-8", body)
    }

    pub fn xml(body: impl Into<Vec<u8>>) -> Self {
        Self::new(StatusCode::OK, "application/xml", body)
    }

    pub fn html(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self::new(status, "text/html", body)
    }

    pub fn redirect(status: StatusCode, location: &str) -> Self {
        Self::text(status, "").with_header(LOCATION, location)
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::HeaderValue;

    fn request_with(headers: &[(&'static str, &'static str)]) -> InboundRequest {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.insert(*k, HeaderValue::from_static(v));
        }
        InboundRequest {
            method: Method::GET,
            path: "/".into(),
            headers: map,
            remote: Some("10.0.0.9:51000".parse().unwrap()),
            body: Bytes::new(),
        }
    }

    #[test]
    fn test_client_ip_precedence() {
        assert_eq!(request_with(&[]).client_ip(), "10.0.0.9");
        assert_eq!(request_with(&[("x-real-ip", "10.1.1.1")]).client_ip(), "10.1.1.1");
        assert_eq!(
            request_with(&[("x-forwarded-for", "172.16.0.2, 10.2.2.2"), ("x-real-ip", "10.1.1.1")])
                .client_ip(),
            "172.16.0.2"
        );
    }

    #[test]
    fn test_redirect_outcome() {
        let out = Outcome::redirect(StatusCode::MOVED_PERMANENTLY, "/present.html");
        assert_eq!(out.status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(out.header(&LOCATION), Some("/present.html"));
    }
}
