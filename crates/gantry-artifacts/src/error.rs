use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact path '{0}' does not exist")]
    NotFound(String),

    #[error("downloading from {kind} artifact storage is not supported here (uri: {uri})")]
    DownloadUnsupported { kind: String, uri: String },

    #[error("artifact io error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
