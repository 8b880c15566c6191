// Web Interface module root
pub mod assets;
pub mod auth;
pub mod routes;
pub mod types;
pub mod web_server;

pub use routes::Router;
pub use types::{InboundRequest, Outcome};
pub use web_server::WebServer;
