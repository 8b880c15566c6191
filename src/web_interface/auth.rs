use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use warp::http::header::WWW_AUTHENTICATE;
use warp::http::StatusCode;

use super::types::{InboundRequest, Outcome};
use crate::storage::storage_trait::{EventKind, EventSink};

/// Result of running the Basic-Auth challenge on a request.
#[derive(Debug)]
pub enum AuthDecision {
    Allowed,
    Denied(Outcome),
}

/// Challenges for Basic credentials, records whatever the client hands over and
/// then lets the request through.
pub fn basic_auth_gate(
    req: &InboundRequest,
    realm: &str,
    client_ip: &str,
    sink: &dyn EventSink,
) -> AuthDecision {
    let header = match req.header("authorization") {
        Some(h) => h.trim(),
        None => {
            let challenge = format!("Basic realm=\"{}\"", realm);
            return AuthDecision::Denied(
                Outcome::html(StatusCode::UNAUTHORIZED, "Unauthorized.")
                    .with_header(WWW_AUTHENTICATE, &challenge),
            );
        }
    };

    let (scheme, payload) = header.split_once(' ').unwrap_or((header, ""));
    if !scheme.eq_ignore_ascii_case("basic") {
        return AuthDecision::Denied(Outcome::html(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something happened.",
        ));
    }

    let creds = match STANDARD.decode(payload.trim()) {
        Ok(raw) => String::from_utf8_lossy(&raw).into_owned(),
        Err(_) => format!("<undecodable: {}>", payload.trim()),
    };
    sink.event(
        EventKind::CredsGiven,
        &format!("HOST: {}, BASIC-AUTH CREDS: {}", client_ip, creds),
    );
    AuthDecision::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory_log::MemoryLog;
    use bytes::Bytes;
    use warp::http::{HeaderMap, HeaderValue, Method};

    fn request(auth: Option<&'static str>) -> InboundRequest {
        let mut headers = HeaderMap::new();
        if let Some(v) = auth {
            headers.insert("authorization", HeaderValue::from_static(v));
        }
        InboundRequest {
            method: Method::GET,
            path: "/present.html".into(),
            headers,
            remote: None,
            body: Bytes::new(),
        }
    }

    #[test]
    fn test_missing_header_is_challenged() {
        let log = MemoryLog::new();
        match basic_auth_gate(&request(None), "Contoso", "10.0.0.9", &log) {
            AuthDecision::Denied(out) => {
                assert_eq!(out.status, StatusCode::UNAUTHORIZED);
                assert_eq!(out.header(&WWW_AUTHENTICATE), Some("Basic realm=\"Contoso\""));
                assert_eq!(out.body, b"Unauthorized.");
            }
            AuthDecision::Allowed => panic!("request without credentials was allowed"),
        }
        assert!(log.lines().is_empty());
    }

    #[test]
    fn test_basic_credentials_are_recorded() {
        let log = MemoryLog::new();
        // alice:s3cret
        let decision = basic_auth_gate(
            &request(Some("Basic YWxpY2U6czNjcmV0")),
            "Contoso",
            "10.0.0.9",
            &log,
        );
        assert!(matches!(decision, AuthDecision::Allowed));
        assert_eq!(log.count_containing("BASIC-AUTH CREDS: alice:s3cret"), 1);
        assert_eq!(log.count_containing("HOST: 10.0.0.9"), 1);
    }

    #[test]
    fn test_undecodable_payload_still_allowed() {
        let log = MemoryLog::new();
        let decision = basic_auth_gate(&request(Some("Basic !!!")), "r", "10.0.0.9", &log);
        assert!(matches!(decision, AuthDecision::Allowed));
        assert_eq!(log.count_containing("<undecodable: !!!>"), 1);
    }

    #[test]
    fn test_other_scheme_is_rejected() {
        let log = MemoryLog::new();
        match basic_auth_gate(&request(Some("Bearer abc")), "r", "10.0.0.9", &log) {
            AuthDecision::Denied(out) => {
                assert_eq!(out.status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(out.body, b"Something happened.");
            }
            AuthDecision::Allowed => panic!("bearer token was allowed"),
        }
    }
}
