use thiserror::Error;

/// Failures while loading or checking validator configuration.
///
/// These are raised at initialization or reconfiguration time and are never
/// swallowed: a validator with a half-applied policy is worse than none.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown digest token: {0}")]
    UnknownDigest(String),

    #[error("Unknown algorithm token: {0}")]
    UnknownAlgorithm(String),

    #[error("Invalid NSEC3 iteration policy: {0}")]
    InvalidIterations(String),

    #[error("Invalid trust anchor: {0}")]
    InvalidTrustAnchor(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Errors raised by the underlying transport resolver.
///
/// The validator passes these through untouched for the primary query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Query timed out")]
    Timeout,

    #[error("Connection reset by upstream")]
    ConnectionReset,

    #[error("IO error: {0}")]
    Io(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => TransportError::Timeout,
            std::io::ErrorKind::ConnectionReset => TransportError::ConnectionReset,
            _ => TransportError::Io(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
