use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("could not find entry point '{name}'. Defined entry points: {available}")]
    UnknownEntryPoint { name: String, available: String },

    #[error("no value given for missing parameters: {0}")]
    MissingParameters(String),

    #[error("missing required backend config key '{0}'")]
    MissingConfigKey(String),

    #[error("backend config key '{key}' must be a string, got: {found}")]
    ConfigKeyType { key: String, found: String },
}
