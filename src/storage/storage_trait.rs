//! Event Sink Trait
//!
//! This module defines the `EventSink` trait, the single append-only target for
//! security-relevant events raised by the discovery responder and the request router.
//!
//! Implementors are responsible for:
//! - Appending one line per call
//! - Serializing concurrent callers so lines never interleave
//! - Making the line durable before returning
//!
//! Callers normally go through [`EventSink::event`], which tags the line with its
//! [`EventKind`], echoes it to the console and swallows write failures after logging them.

use crate::error_handling::types::StorageError;
use log::{error, info, warn};

/// Category of a recorded event. Each kind carries the fixed tag that prefixes its line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A discovery request from a host/service-type pair not seen before
    MSearch,
    /// A descriptor fetch
    XmlRequest,
    /// A visit to the delivery page
    PhishHooked,
    /// Credentials captured from a form post or an auth header
    CredsGiven,
    /// A hit on an endpoint only reachable through external entity resolution
    Xxe,
    /// A callback carrying exfiltrated data in its path
    Exfiltration,
    /// Traffic that looks like scanning or security tooling
    Detection,
    /// Static asset traffic
    Asset,
    /// Operator information
    Note,
    /// Operator warning
    Warning,
}

impl EventKind {
    pub fn tag(&self) -> &'static str {
        match self {
            EventKind::MSearch => "[M-SEARCH]     ",
            EventKind::XmlRequest => "[XML REQUEST]  ",
            EventKind::PhishHooked => "[PHISH HOOKED] ",
            EventKind::CredsGiven => "[CREDS GIVEN]  ",
            EventKind::Xxe => "[XXE VULN!!!!] ",
            EventKind::Exfiltration => "[EXFILTRATION] ",
            EventKind::Detection => "[DETECTION]    ",
            EventKind::Asset => "[ASSET] ",
            EventKind::Note => "[*] ",
            EventKind::Warning => "[!] ",
        }
    }
}

/// Append-only, serialized, durable line sink shared across tasks.
pub trait EventSink: Send + Sync {
    /// Appends `line`. Must be safe for concurrent callers and must not return
    /// before the line is flushed to storage.
    fn record(&self, line: &str) -> Result<(), StorageError>;

    /// Tags `message` with `kind`, echoes it to the console and records it.
    ///
    /// A failing sink is reported on the console only; event recording never
    /// aborts the caller.
    fn event(&self, kind: EventKind, message: &str) {
        let line = format!("{}{}", kind.tag(), message);
        match kind {
            EventKind::Detection | EventKind::Warning => warn!("{}", line),
            _ => info!("{}", line),
        }
        if let Err(e) = self.record(&line) {
            error!("Failed to record event: {}", e);
        }
    }
}
