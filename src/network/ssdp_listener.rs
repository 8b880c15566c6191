//! # SSDP Listener Module
//!
//! Answers SSDP `M-SEARCH` requests on the local segment so that control points
//! discover the impersonated device and fetch its descriptor from the web surface.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │ M-SEARCH        │───▶│ SsdpListener     │───▶│ unicast reply   │
//! │ (239.255.255.250│    │                  │    │ (unless analyze │
//! │  :1900)         │    │ - ST extraction  │    │  only)          │
//! └─────────────────┘    │ - ST validation  │    └─────────────────┘
//!                        │ - KnownHosts     │───▶ EventSink
//!                        └──────────────────┘
//! ```
//!
//! Datagrams are handled one at a time. A receive error ends [`SsdpListener::listen`]
//! and is meant to bring the whole process down.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use super::interfaces;
use super::known_hosts::KnownHosts;
use super::service_type::{extract_service_type, is_msearch, is_valid_service_type};
use super::socket_capabilities::DestinationInfo;
use crate::error_handling::types::NetworkError;
use crate::session_management::SessionIdentity;
use crate::storage::storage_trait::{EventKind, EventSink};

pub const SSDP_PORT: u16 = 1900;
pub const SSDP_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

const RECV_BUFFER_SIZE: usize = 65536;
const DATAGRAM_SIZE: usize = 2048;

/// Binds the SSDP port on all interfaces and joins the multicast group on the
/// interface owning `local_ip`.
///
/// # Errors
///
/// Every failure here is fatal to startup:
/// - [`NetworkError::InterfaceNotFound`] when no interface owns `local_ip`
/// - [`NetworkError::BindError`] when the socket cannot be created or bound
/// - [`NetworkError::MulticastJoin`] when the group cannot be joined
pub fn bind_multicast_socket(local_ip: Ipv4Addr, port: u16) -> Result<UdpSocket, NetworkError> {
    let iface = interfaces::resolve_interface_for_ip(local_ip)?;

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(NetworkError::BindError)?;
    socket
        .set_reuse_address(true)
        .map_err(NetworkError::BindError)?;
    socket
        .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into())
        .map_err(NetworkError::BindError)?;
    socket
        .join_multicast_v4(&SSDP_MULTICAST_GROUP, &local_ip)
        .map_err(NetworkError::MulticastJoin)?;

    let destination_info = DestinationInfo::detect();
    if let Err(e) = destination_info.apply(&socket) {
        warn!(
            "Failed to enable {} (non-fatal): {}",
            destination_info.describe(),
            e
        );
    }
    if let Err(e) = socket.set_recv_buffer_size(RECV_BUFFER_SIZE) {
        warn!("Failed to set receive buffer size (non-fatal): {}", e);
    }
    socket
        .set_nonblocking(true)
        .map_err(NetworkError::SockError)?;

    let socket = UdpSocket::from_std(socket.into()).map_err(NetworkError::SockError)?;
    info!(
        "SSDP listener bound to interface {} ({}) on port {}",
        iface.name, local_ip, port
    );
    Ok(socket)
}

/// Discovery responder: decides for each datagram whether to log, reply, or ignore.
pub struct SsdpListener {
    identity: Arc<SessionIdentity>,
    sink: Arc<dyn EventSink>,
    known_hosts: KnownHosts,
}

impl SsdpListener {
    pub fn new(identity: Arc<SessionIdentity>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            identity,
            sink,
            known_hosts: KnownHosts::new(),
        }
    }

    pub fn known_hosts(&self) -> &KnownHosts {
        &self.known_hosts
    }

    /// Builds the unicast answer advertising the descriptor URL for `service_type`.
    pub fn build_reply(&self, service_type: &str, now: DateTime<Utc>) -> String {
        let usn = &self.identity.session_usn;
        format!(
            "HTTP/1.1 200 OK\r\n\
             CACHE-CONTROL: max-age=1800\r\n\
             DATE: {date}\r\n\
             EXT:\r\n\
             LOCATION: {location}\r\n\
             OPT: \"http://schemas.upnp.org/upnp/1/0/\"; ns=01\r\n\
             01-NLS: {usn}\r\n\
             SERVER: UPnP/1.0\r\n\
             ST: {st}\r\n\
             USN: {usn}::{st}\r\n\
             BOOTID.UPNP.ORG: 0\r\n\
             CONFIGID.UPNP.ORG: 1\r\n\
             \r\n\r\n",
            date = now.format("%a, %d %b %Y %H:%M:%S GMT"),
            location = self.identity.device_desc_url(),
            usn = usn,
            st = service_type,
        )
    }

    /// Applies the discovery rules to one datagram and returns the reply to send, if any.
    ///
    /// Logging happens here in every mode; only the reply is suppressed in
    /// analyze-only mode.
    pub fn process_datagram(&self, data: &[u8], src: SocketAddr) -> Option<Vec<u8>> {
        let payload = String::from_utf8_lossy(data);
        if !is_msearch(&payload) {
            return None;
        }
        debug!("Received M-SEARCH from {} (length: {})", src, data.len());

        let service_type = extract_service_type(&payload)?;
        let remote_ip: IpAddr = src.ip();

        if !is_valid_service_type(service_type) {
            self.sink.event(
                EventKind::Detection,
                &format!(
                    "Odd ST ({}) from {}. Possible detection tool!",
                    service_type, remote_ip
                ),
            );
            return None;
        }

        if self.known_hosts.first_sighting(remote_ip, service_type) {
            self.sink.event(
                EventKind::MSearch,
                &format!("New Host {}, Service Type: {}", remote_ip, service_type),
            );
        }

        if self.identity.analyze_only {
            return None;
        }
        Some(self.build_reply(service_type, Utc::now()).into_bytes())
    }

    /// Receive loop. Only returns on a socket read error.
    pub async fn listen(&self, socket: UdpSocket) -> Result<(), NetworkError> {
        let mut buf = [0u8; DATAGRAM_SIZE];
        info!("SSDP listener started, waiting for M-SEARCH requests...");

        loop {
            let (n, src) = socket
                .recv_from(&mut buf)
                .await
                .map_err(NetworkError::SockError)?;

            if let Some(reply) = self.process_datagram(&buf[..n], src) {
                if let Err(e) = socket.send_to(&reply, src).await {
                    self.sink.event(
                        EventKind::Warning,
                        &format!("Error sending SSDP response to {}: {}", src, e),
                    );
                }
            }
        }
    }
}
