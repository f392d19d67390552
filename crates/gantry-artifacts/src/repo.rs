use std::fs;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::ArtifactError;
use crate::kind::{ArtifactStoreKind, classify_artifact_uri};

/// Capability handle for one artifact location.
///
/// The core switches on [`kind`](ArtifactRepo::kind) to decide container
/// wiring; only local repositories can serve downloads here, remote kinds
/// are descriptors and refuse with a typed error.
pub trait ArtifactRepo: Send + Sync {
    fn kind(&self) -> ArtifactStoreKind;

    /// Host directory backing this repository, for local repositories.
    fn local_dir(&self) -> Option<&Path> {
        None
    }

    /// Materialize `src_uri` under `dst_dir`, returning the local path.
    fn download(&self, src_uri: &str, dst_dir: &Path) -> Result<PathBuf, ArtifactError>;
}

/// Build the repository handle matching an artifact URI.
pub fn repo_for_uri(uri: &str) -> Box<dyn ArtifactRepo> {
    match classify_artifact_uri(uri) {
        ArtifactStoreKind::Local => Box::new(LocalArtifactRepo::new(local_path_of(uri))),
        kind => Box::new(RemoteArtifactRepo {
            kind,
            uri: uri.to_string(),
        }),
    }
}

/// Host path behind a local artifact URI (`file://` prefix stripped).
fn local_path_of(uri: &str) -> PathBuf {
    match Url::parse(uri) {
        Ok(parsed) if parsed.scheme() == "file" => PathBuf::from(parsed.path()),
        _ => PathBuf::from(uri),
    }
}

/// Artifact repository backed by a host directory.
pub struct LocalArtifactRepo {
    dir: PathBuf,
}

impl LocalArtifactRepo {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactRepo for LocalArtifactRepo {
    fn kind(&self) -> ArtifactStoreKind {
        ArtifactStoreKind::Local
    }

    fn local_dir(&self) -> Option<&Path> {
        Some(&self.dir)
    }

    fn download(&self, src_uri: &str, dst_dir: &Path) -> Result<PathBuf, ArtifactError> {
        let src = local_path_of(src_uri);
        if !src.exists() {
            return Err(ArtifactError::NotFound(src.display().to_string()));
        }
        let name = src
            .file_name()
            .ok_or_else(|| ArtifactError::NotFound(src.display().to_string()))?;
        let dst = dst_dir.join(name);
        copy_recursive(&src, &dst)?;
        Ok(dst)
    }
}

/// Descriptor for a remote artifact store: carries the kind tag for
/// container wiring but cannot serve downloads.
pub struct RemoteArtifactRepo {
    kind: ArtifactStoreKind,
    uri: String,
}

impl ArtifactRepo for RemoteArtifactRepo {
    fn kind(&self) -> ArtifactStoreKind {
        self.kind
    }

    fn download(&self, _src_uri: &str, _dst_dir: &Path) -> Result<PathBuf, ArtifactError> {
        Err(ArtifactError::DownloadUnsupported {
            kind: self.kind.to_string(),
            uri: self.uri.clone(),
        })
    }
}

/// Copy a file or directory tree.
pub fn copy_recursive(src: &Path, dst: &Path) -> Result<(), ArtifactError> {
    if src.is_dir() {
        fs::create_dir_all(dst).map_err(|e| ArtifactError::io(dst.display().to_string(), e))?;
        let entries =
            fs::read_dir(src).map_err(|e| ArtifactError::io(src.display().to_string(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ArtifactError::io(src.display().to_string(), e))?;
            copy_recursive(&entry.path(), &dst.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ArtifactError::io(parent.display().to_string(), e))?;
        }
        fs::copy(src, dst).map_err(|e| ArtifactError::io(src.display().to_string(), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_repo_downloads_by_copy() {
        let scratch = tempfile::tempdir().unwrap();
        let src_dir = scratch.path().join("data");
        fs::create_dir_all(src_dir.join("sub")).unwrap();
        fs::write(src_dir.join("a.txt"), "alpha").unwrap();
        fs::write(src_dir.join("sub/b.txt"), "beta").unwrap();

        let dst_dir = scratch.path().join("storage");
        fs::create_dir_all(&dst_dir).unwrap();

        let repo = repo_for_uri(src_dir.to_str().unwrap());
        assert_eq!(repo.kind(), ArtifactStoreKind::Local);

        let out = repo.download(src_dir.to_str().unwrap(), &dst_dir).unwrap();
        assert_eq!(out, dst_dir.join("data"));
        assert_eq!(fs::read_to_string(out.join("a.txt")).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(out.join("sub/b.txt")).unwrap(), "beta");
    }

    #[test]
    fn local_repo_missing_source() {
        let scratch = tempfile::tempdir().unwrap();
        let repo = LocalArtifactRepo::new(scratch.path());
        let err = repo
            .download("/definitely/not/here", scratch.path())
            .unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[test]
    fn remote_repo_refuses_download() {
        let scratch = tempfile::tempdir().unwrap();
        let repo = repo_for_uri("s3://bucket/prefix");
        assert_eq!(repo.kind(), ArtifactStoreKind::S3);

        let err = repo
            .download("s3://bucket/prefix/x", scratch.path())
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("s3"), "{msg}");
    }

    #[test]
    fn file_uri_maps_to_host_path() {
        let repo = repo_for_uri("file:///tmp/artifacts");
        assert_eq!(repo.local_dir(), Some(Path::new("/tmp/artifacts")));
    }
}
