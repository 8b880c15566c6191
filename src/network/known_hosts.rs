use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};

/// Ledger of (sender IP, service type) pairs already reported.
///
/// Grows for the lifetime of the process; there is no eviction. Every access
/// goes through the same lock.
#[derive(Default)]
pub struct KnownHosts {
    seen: Mutex<HashSet<(IpAddr, String)>>,
}

impl KnownHosts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the pair as seen and returns `true` only the first time it is offered.
    pub fn first_sighting(&self, ip: IpAddr, service_type: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.insert((ip, service_type.to_string()))
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    #[test]
    fn test_first_sighting_once_per_pair() {
        let hosts = KnownHosts::new();
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 10));

        assert!(hosts.first_sighting(a, "ssdp:all"));
        assert!(!hosts.first_sighting(a, "ssdp:all"));
        assert!(hosts.first_sighting(a, "upnp:rootdevice"));
        assert!(hosts.first_sighting(b, "ssdp:all"));
        assert_eq!(hosts.len(), 3);
    }

    #[test]
    fn test_concurrent_sightings_count_once() {
        let hosts = Arc::new(KnownHosts::new());
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let hosts = Arc::clone(&hosts);
                std::thread::spawn(move || {
                    (0..50).filter(|_| hosts.first_sighting(ip, "ssdp:all")).count()
                })
            })
            .collect();
        let firsts: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(firsts, 1);
    }
}
