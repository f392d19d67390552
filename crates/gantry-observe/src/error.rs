use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format '{0}' (expected text, json, or journald)")]
    InvalidFormat(String),

    #[error("journald logging is not available on this platform")]
    JournaldNotSupported,

    #[error("logging is already initialized for this process")]
    AlreadyInitialized,

    #[error("could not initialize logging: {0}")]
    InitializationFailed(String),

    #[error("invalid log level filter '{0}'")]
    InvalidLogLevel(String),
}
