//! Network interface enumeration.
//!
//! Interfaces are listed once through `getifaddrs` and then searched with plain
//! functions, so the selection rules can be exercised without touching the host.
//!
//! Enumeration is only implemented for unix targets; elsewhere
//! [`list_interfaces`] fails and startup stops at interface resolution.

use std::io;
use std::net::Ipv4Addr;

use log::debug;

use crate::error_handling::types::NetworkError;

/// Loopback interface names on Linux and on the BSDs/macOS.
const LOOPBACK_NAMES: [&str; 2] = ["lo", "lo0"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub ipv4: Vec<Ipv4Addr>,
    pub loopback: bool,
}

impl NetworkInterface {
    /// First routable IPv4 address, or the loopback address for a loopback interface.
    pub fn primary_ipv4(&self) -> Option<Ipv4Addr> {
        self.ipv4
            .iter()
            .copied()
            .find(|ip| !ip.is_loopback())
            .or_else(|| {
                if self.loopback {
                    self.ipv4.first().copied()
                } else {
                    None
                }
            })
    }
}

#[cfg(unix)]
pub fn list_interfaces() -> Result<Vec<NetworkInterface>, NetworkError> {
    use std::ffi::CStr;

    let mut ifaddrs_ptr: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: getifaddrs fills the pointer with a list we release below.
    if unsafe { libc::getifaddrs(&mut ifaddrs_ptr) } != 0 {
        return Err(NetworkError::InterfaceListing(io::Error::last_os_error()));
    }

    let mut interfaces: Vec<NetworkInterface> = Vec::new();
    let mut current = ifaddrs_ptr;
    while !current.is_null() {
        // SAFETY: `current` is a live node of the list returned by getifaddrs.
        let ifa = unsafe { &*current };
        let name = unsafe { CStr::from_ptr(ifa.ifa_name) }
            .to_string_lossy()
            .into_owned();
        let loopback = (ifa.ifa_flags as libc::c_int & libc::IFF_LOOPBACK) != 0;

        let idx = match interfaces.iter().position(|i| i.name == name) {
            Some(idx) => idx,
            None => {
                interfaces.push(NetworkInterface {
                    name,
                    ipv4: Vec::new(),
                    loopback,
                });
                interfaces.len() - 1
            }
        };

        // SAFETY: a non-null ifa_addr points to a sockaddr whose family tells its real type.
        let family = if ifa.ifa_addr.is_null() {
            None
        } else {
            Some(unsafe { (*ifa.ifa_addr).sa_family } as libc::c_int)
        };
        if family == Some(libc::AF_INET) {
            let sin = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
            if !interfaces[idx].ipv4.contains(&ip) {
                interfaces[idx].ipv4.push(ip);
            }
        }

        current = ifa.ifa_next;
    }

    unsafe { libc::freeifaddrs(ifaddrs_ptr) };
    debug!("Enumerated {} network interfaces", interfaces.len());
    Ok(interfaces)
}

#[cfg(not(unix))]
pub fn list_interfaces() -> Result<Vec<NetworkInterface>, NetworkError> {
    Err(NetworkError::InterfaceListing(io::Error::new(
        io::ErrorKind::Unsupported,
        "interface enumeration is only implemented for unix targets",
    )))
}

/// Exact name match first, then a case-insensitive partial match in either direction.
pub fn find_by_name<'a>(interfaces: &'a [NetworkInterface], name: &str) -> Option<&'a NetworkInterface> {
    if let Some(iface) = interfaces.iter().find(|i| i.name == name) {
        return Some(iface);
    }
    let wanted = name.to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    interfaces.iter().find(|i| {
        let have = i.name.to_lowercase();
        (have.contains(&wanted) || wanted.contains(&have)) && i.primary_ipv4().is_some()
    })
}

/// Interface owning `ip`. `127.0.0.1` is looked up by the loopback names first.
pub fn find_by_ip(interfaces: &[NetworkInterface], ip: Ipv4Addr) -> Option<&NetworkInterface> {
    if ip == Ipv4Addr::LOCALHOST {
        if let Some(iface) = LOOPBACK_NAMES
            .iter()
            .find_map(|n| interfaces.iter().find(|i| i.name == *n))
        {
            return Some(iface);
        }
    }
    interfaces.iter().find(|i| i.ipv4.contains(&ip))
}

/// Resolves the IPv4 address the operator's chosen interface listens on.
pub fn resolve_interface_ipv4(name: &str) -> Result<Ipv4Addr, NetworkError> {
    let interfaces = list_interfaces()?;
    let iface = find_by_name(&interfaces, name)
        .ok_or_else(|| NetworkError::InterfaceNotFound(name.to_string()))?;
    if iface.name != name {
        debug!("Using interface {} (matched '{}')", iface.name, name);
    }
    iface
        .primary_ipv4()
        .ok_or_else(|| NetworkError::NoIpv4Address(iface.name.clone()))
}

/// Resolves the interface owning `ip`, used before joining the multicast group.
pub fn resolve_interface_for_ip(ip: Ipv4Addr) -> Result<NetworkInterface, NetworkError> {
    let interfaces = list_interfaces()?;
    find_by_ip(&interfaces, ip)
        .cloned()
        .ok_or_else(|| NetworkError::InterfaceNotFound(format!("no interface owns {}", ip)))
}
