use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Storage family behind an artifact URI.
///
/// Drives kind-specific container wiring (mounts, credential env vars).
/// Kinds this code does not recognize map to [`ArtifactStoreKind::Other`],
/// which contributes nothing — a forward-compatible default rather than an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactStoreKind {
    /// Local filesystem directory.
    Local,
    /// S3-compatible object store.
    S3,
    /// Azure blob storage.
    AzureBlob,
    /// Google Cloud Storage.
    Gcs,
    /// Distributed filesystem (HDFS-style, Kerberos-authenticated).
    Dfs,
    /// Unrecognized storage family.
    Other,
}

impl fmt::Display for ArtifactStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactStoreKind::Local => "local",
            ArtifactStoreKind::S3 => "s3",
            ArtifactStoreKind::AzureBlob => "azure-blob",
            ArtifactStoreKind::Gcs => "gcs",
            ArtifactStoreKind::Dfs => "dfs",
            ArtifactStoreKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Classify an artifact URI by its scheme.
pub fn classify_artifact_uri(uri: &str) -> ArtifactStoreKind {
    let Ok(parsed) = Url::parse(uri) else {
        // No scheme: a plain filesystem path.
        return ArtifactStoreKind::Local;
    };
    match parsed.scheme() {
        "file" => ArtifactStoreKind::Local,
        "s3" => ArtifactStoreKind::S3,
        "wasbs" => ArtifactStoreKind::AzureBlob,
        "gs" => ArtifactStoreKind::Gcs,
        "hdfs" => ArtifactStoreKind::Dfs,
        _ => ArtifactStoreKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_scheme() {
        assert_eq!(classify_artifact_uri("./gruns/0"), ArtifactStoreKind::Local);
        assert_eq!(
            classify_artifact_uri("file:///tmp/artifacts"),
            ArtifactStoreKind::Local
        );
        assert_eq!(
            classify_artifact_uri("s3://bucket/prefix"),
            ArtifactStoreKind::S3
        );
        assert_eq!(
            classify_artifact_uri("wasbs://container@account.blob.core.windows.net/x"),
            ArtifactStoreKind::AzureBlob
        );
        assert_eq!(
            classify_artifact_uri("gs://bucket/prefix"),
            ArtifactStoreKind::Gcs
        );
        assert_eq!(
            classify_artifact_uri("hdfs://namenode:8020/user/x"),
            ArtifactStoreKind::Dfs
        );
        assert_eq!(
            classify_artifact_uri("ftp://host/somewhere"),
            ArtifactStoreKind::Other
        );
    }
}
