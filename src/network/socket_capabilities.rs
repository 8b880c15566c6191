//! Destination-address metadata support, resolved once per process.
//!
//! Some socket layers can attach the datagram's destination address as control
//! metadata. Which option (if any) does that depends on the target, so it is
//! decided here at startup instead of in the receive loop.
//!
//! Nothing consumes the metadata yet: [`SsdpListener::listen`] receives with a
//! plain `recv_from`, so enabling the option only puts the socket in the same
//! state other SSDP responders on the host use.
//!
//! [`SsdpListener::listen`]: super::ssdp_listener::SsdpListener::listen

use std::io;

use socket2::Socket;

#[cfg(any(target_os = "linux", target_os = "android"))]
const PLATFORM_OPTION: Option<libc::c_int> = Some(libc::IP_PKTINFO);
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
const PLATFORM_OPTION: Option<libc::c_int> = Some(libc::IP_RECVDSTADDR);
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
)))]
const PLATFORM_OPTION: Option<libc::c_int> = None;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationInfo {
    /// `IP_PKTINFO` (Linux, Android)
    PacketInfo,
    /// `IP_RECVDSTADDR` (BSDs and Apple platforms)
    RecvDstAddr,
    Unsupported,
}

impl DestinationInfo {
    pub fn detect() -> Self {
        if cfg!(any(target_os = "linux", target_os = "android")) {
            DestinationInfo::PacketInfo
        } else if cfg!(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )) {
            DestinationInfo::RecvDstAddr
        } else {
            DestinationInfo::Unsupported
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            DestinationInfo::PacketInfo => "IP_PKTINFO",
            DestinationInfo::RecvDstAddr => "IP_RECVDSTADDR",
            DestinationInfo::Unsupported => "unsupported",
        }
    }

    /// Turns the option on for `socket`. A no-op when unsupported.
    pub fn apply(&self, socket: &Socket) -> io::Result<()> {
        match (self, PLATFORM_OPTION) {
            (DestinationInfo::Unsupported, _) | (_, None) => Ok(()),
            (_, Some(option)) => set_ip_flag(socket, option),
        }
    }
}

#[cfg(unix)]
fn set_ip_flag(socket: &Socket, option: libc::c_int) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let one: libc::c_int = 1;
    // SAFETY: the fd is owned by `socket` for the duration of the call and the
    // option value is a plain int of the advertised size.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IP,
            option,
            &one as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn set_ip_flag(_socket: &Socket, _option: libc::c_int) -> io::Result<()> {
    Err(io::ErrorKind::Unsupported.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use socket2::{Domain, Protocol, Type};

    #[test]
    fn test_detect_matches_target() {
        let detected = DestinationInfo::detect();
        if cfg!(target_os = "linux") {
            assert_eq!(detected, DestinationInfo::PacketInfo);
        }
        assert!(!detected.describe().is_empty());
    }

    #[test]
    fn test_detect_agrees_with_platform_option() {
        assert_eq!(
            DestinationInfo::detect() == DestinationInfo::Unsupported,
            PLATFORM_OPTION.is_none()
        );
    }

    #[test]
    fn test_apply_on_udp_socket() {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).unwrap();
        DestinationInfo::detect().apply(&socket).unwrap();
        DestinationInfo::Unsupported.apply(&socket).unwrap();
    }
}
