use thiserror::Error;

use gantry_artifacts::ArtifactError;
use gantry_exec::ExecError;
use gantry_model::ModelError;
use gantry_tracking::TrackingError;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Fatal configuration problem; never retried.
    #[error("{0}")]
    Config(String),

    #[error("unsupported backend '{name}'. Supported backends: {supported}")]
    UnsupportedBackend { name: String, supported: String },

    /// A required external tool could not be invoked.
    #[error("could not find {tool} executable. {hint}")]
    ToolNotFound { tool: String, hint: String },

    #[error(
        "this project expects the environment variables {declared} to be set on the machine \
         running the project, but {name} was not set"
    )]
    MissingHostEnvVar { name: String, declared: String },

    #[error("parameter '{name}' of type uri was given the non-uri value '{value}'")]
    InvalidUriParam { name: String, value: String },

    #[error("run (id '{0}') failed")]
    RunFailed(String),

    #[error("run (id '{0}') interrupted, cancellation requested")]
    Interrupted(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid job template: {0}")]
    JobTemplate(String),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
