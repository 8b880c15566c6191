//! Discovery-side networking: interface lookup, SSDP parsing, the known-host
//! ledger and the multicast responder.

pub mod interfaces;
pub mod known_hosts;
pub mod service_type;
pub mod socket_capabilities;
pub mod ssdp_listener;

pub use ssdp_listener::SsdpListener;
