use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadIPFormatting(String),
    MissingInterface,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadIPFormatting(e) => write!(f, "IP formatting error: {}", e),
            ConfigError::MissingInterface => write!(f, "No network interface given"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum NetworkError {
    InterfaceNotFound(String),
    NoIpv4Address(String),
    InterfaceListing(std::io::Error),
    BindError(std::io::Error),
    MulticastJoin(std::io::Error),
    SockError(std::io::Error),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::InterfaceNotFound(e) => write!(f, "Interface not found: {}", e),
            NetworkError::NoIpv4Address(e) => write!(f, "No IPv4 address found for interface {}", e),
            NetworkError::InterfaceListing(e) => write!(f, "Failed to list interfaces: {}", e),
            NetworkError::BindError(e) => write!(f, "Network bind error: {}", e),
            NetworkError::MulticastJoin(e) => write!(f, "Failed to join multicast group: {}", e),
            NetworkError::SockError(e) => write!(f, "Socket error: {}", e),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Failure while turning a campaign file into response text.
///
/// `NotFound` and `Malformed` are kept apart so callers can tell a missing
/// optional file from a broken one.
#[derive(Debug)]
pub enum TemplateError {
    NotFound(String),
    Io(std::io::Error),
    Malformed(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::NotFound(e) => write!(f, "Template file not found: {}", e),
            TemplateError::Io(e) => write!(f, "Template IO error: {}", e),
            TemplateError::Malformed(e) => write!(f, "Malformed template: {}", e),
        }
    }
}

impl std::error::Error for TemplateError {}

#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed,
    WriteFailed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed => write!(f, "Storage connection failed"),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum WebError {
    ServerStopped,
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::ServerStopped => write!(f, "Web server stopped unexpectedly"),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    NetworkError(NetworkError),
    TemplateError(TemplateError),
    StorageError(StorageError),
    WebError(WebError),
    TaskFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::NetworkError(e) => write!(f, "Network error: {}", e),
            ControllerError::TemplateError(e) => write!(f, "Template error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web error: {}", e),
            ControllerError::TaskFailed(e) => write!(f, "Task failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<NetworkError> for ControllerError {
    fn from(err: NetworkError) -> Self {
        ControllerError::NetworkError(err)
    }
}

impl From<TemplateError> for ControllerError {
    fn from(err: TemplateError) -> Self {
        ControllerError::TemplateError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::WebError(err)
    }
}
