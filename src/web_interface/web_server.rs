use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use log::{info, warn};
use warp::http::header::HeaderValue;
use warp::http::{HeaderMap, Method, StatusCode};
use warp::path::FullPath;
use warp::{reply, Filter, Rejection, Reply};

use super::routes::{Router, LOGIN_PATH};
use super::types::{InboundRequest, Outcome};
use crate::error_handling::types::WebError;

/// Largest login form body accepted.
pub const MAX_FORM_BODY: u64 = 64 * 1024;

/// HTTP front end that hands every request to the [`Router`].
pub struct WebServer {
    router: Arc<Router>,
}

impl WebServer {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    /// Two filters in front of the router. Only a login POST has its body read,
    /// capped at [`MAX_FORM_BODY`]; every other request reaches the router with
    /// an empty body.
    pub fn routes(&self) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
        let login_router = self.router.clone();
        let login = warp::path!("ssdp" / "do_login.html")
            .and(warp::post())
            .and(warp::body::content_length_limit(MAX_FORM_BODY))
            .and(warp::method())
            .and(warp::path::full())
            .and(warp::header::headers_cloned())
            .and(warp::addr::remote())
            .and(warp::body::bytes())
            .and_then(
                move |method: Method,
                      path: FullPath,
                      headers: HeaderMap,
                      remote: Option<SocketAddr>,
                      body: Bytes| {
                    let router = login_router.clone();
                    async move {
                        let req = InboundRequest {
                            method,
                            path: path.as_str().to_string(),
                            headers,
                            remote,
                            body,
                        };
                        Ok::<_, Rejection>(into_response(router.handle(req).await))
                    }
                },
            );

        let router = self.router.clone();
        let any = warp::method()
            .and(warp::path::full())
            .and(warp::header::headers_cloned())
            .and(warp::addr::remote())
            .and_then(
                move |method: Method,
                      path: FullPath,
                      headers: HeaderMap,
                      remote: Option<SocketAddr>| {
                    let router = router.clone();
                    async move {
                        let req = InboundRequest {
                            method,
                            path: path.as_str().to_string(),
                            headers,
                            remote,
                            body: Bytes::new(),
                        };
                        let outcome = match unread_body_outcome(&req) {
                            Some(out) => out,
                            None => router.handle(req).await,
                        };
                        Ok::<_, Rejection>(into_response(outcome))
                    }
                },
            );

        login.or(any).unify()
    }

    /// Serves until the listener stops. warp only returns on shutdown, so any
    /// return is reported as [`WebError::ServerStopped`].
    pub async fn start(&self, addr: SocketAddr) -> Result<(), WebError> {
        info!("Web server listening on http://{}", addr);
        warp::serve(self.routes()).run(addr).await;
        Err(WebError::ServerStopped)
    }
}

/// A login POST only lands in the catch-all when its body was refused: too
/// large, or sent without a length.
fn unread_body_outcome(req: &InboundRequest) -> Option<Outcome> {
    if req.method != Method::POST || req.path != LOGIN_PATH {
        return None;
    }
    if req.header("content-length").is_some() {
        Some(Outcome::text(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large"))
    } else {
        Some(Outcome::text(StatusCode::LENGTH_REQUIRED, "Length Required"))
    }
}

fn into_response(outcome: Outcome) -> reply::Response {
    let mut res = reply::with_status(outcome.body, outcome.status).into_response();
    for (name, value) in outcome.headers {
        match HeaderValue::from_str(&value) {
            Ok(v) => {
                res.headers_mut().insert(name, v);
            }
            Err(e) => warn!("Dropping invalid {} header value: {}", name, e),
        }
    }
    res
}
