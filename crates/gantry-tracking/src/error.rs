use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("run '{0}' not found")]
    RunNotFound(String),

    #[error("experiment '{0}' not found")]
    ExperimentNotFound(String),

    #[error("no credentials configured for tracking profile '{0}'")]
    UnknownProfile(String),

    #[error("tracking store error: {0}")]
    Store(String),
}
