use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error_handling::types::ConfigError;

pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_TEMPLATE: &str = "office365";
pub const DEFAULT_REALM: &str = "Microsoft Corporation";
pub const DEFAULT_TEMPLATES_DIR: &str = "templates";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Command-line surface.
///
/// Every option falls back to a `DECOY_*` environment variable, then to the TOML
/// file given with `--config`, then to the built-in default. Values are kept as
/// `Option` here so that [`Config::resolve`] can tell "not given" from "default".
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "decoy")]
#[command(version)]
#[command(about = "SSDP device impersonation and capture kit for authorized assessments")]
pub struct Args {
    /// Network interface to listen on
    #[arg(env = "DECOY_INTERFACE")]
    pub interface: Option<String>,

    /// Port for the web server
    #[arg(short, long, env = "DECOY_PORT")]
    pub port: Option<u16>,

    /// Name of a campaign directory under the templates root
    #[arg(short, long, env = "DECOY_TEMPLATE")]
    pub template: Option<String>,

    /// IP of the SMB server referenced by templates (defaults to the interface IP)
    #[arg(short, long, env = "DECOY_SMB")]
    pub smb: Option<String>,

    /// Challenge delivery page visitors for Basic credentials
    #[arg(short, long, env = "DECOY_BASIC")]
    pub basic: bool,

    /// Realm advertised in the Basic-Auth challenge
    #[arg(short, long, env = "DECOY_REALM")]
    pub realm: Option<String>,

    /// Where to send victims after a form login
    #[arg(short = 'u', long = "url", env = "DECOY_URL")]
    pub url: Option<String>,

    /// Log discovery traffic without ever replying
    #[arg(short, long, env = "DECOY_ANALYZE")]
    pub analyze: bool,

    /// Root directory holding the campaigns and the shared `assets` folder
    #[arg(long, env = "DECOY_TEMPLATES_DIR")]
    pub templates_dir: Option<PathBuf>,

    /// Directory receiving `decoy.log`
    #[arg(long, env = "DECOY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(short, long, env = "DECOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the available campaigns and exit
    #[arg(long)]
    pub list_templates: bool,
}

/// Keys accepted in the TOML configuration file. All optional.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub interface: Option<String>,
    pub port: Option<u16>,
    pub template: Option<String>,
    pub smb: Option<String>,
    pub basic: Option<bool>,
    pub realm: Option<String>,
    pub url: Option<String>,
    pub analyze: Option<bool>,
    pub templates_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Sanitized interface name; empty only when listing campaigns.
    pub interface: String,
    pub port: u16,
    pub template: String,
    pub smb_server: Option<IpAddr>,
    pub basic_auth: bool,
    pub realm: String,
    pub redirect_url: String,
    pub analyze_only: bool,
    pub templates_dir: PathBuf,
    pub log_dir: PathBuf,
    pub list_templates: bool,
}

impl Config {
    /// Parses the process arguments and resolves them into a `Config`.
    pub fn from_args() -> Result<Self, ConfigError> {
        Self::resolve(Args::parse())
    }

    /// Merges CLI/environment values over the optional file, then over defaults.
    pub fn resolve(args: Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    fn merge(args: Args, file: FileConfig) -> Result<Self, ConfigError> {
        let interface = args
            .interface
            .or(file.interface)
            .map(|name| sanitize_interface(&name))
            .unwrap_or_default();
        if interface.is_empty() && !args.list_templates {
            return Err(ConfigError::MissingInterface);
        }

        let smb_server = match args.smb.or(file.smb).filter(|s| !s.trim().is_empty()) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<IpAddr>()
                    .map_err(|_| ConfigError::BadIPFormatting(raw.clone()))?,
            ),
            None => None,
        };

        Ok(Self {
            interface,
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            template: args
                .template
                .or(file.template)
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            smb_server,
            basic_auth: args.basic || file.basic.unwrap_or(false),
            realm: args
                .realm
                .or(file.realm)
                .unwrap_or_else(|| DEFAULT_REALM.to_string()),
            redirect_url: args.url.or(file.url).unwrap_or_default(),
            analyze_only: args.analyze || file.analyze.unwrap_or(false),
            templates_dir: args
                .templates_dir
                .or(file.templates_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_DIR)),
            log_dir: args
                .log_dir
                .or(file.log_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            list_templates: args.list_templates,
        })
    }

    pub fn campaign_dir(&self) -> PathBuf {
        self.templates_dir.join(&self.template)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.templates_dir.join("assets")
    }
}

/// Drops every character outside `[a-zA-Z0-9 ._-]`.
pub fn sanitize_interface(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect()
}
