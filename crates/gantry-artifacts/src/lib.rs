//! Artifact-repository collaborator.
//!
//! An artifact URI is classified into a storage kind, and the kind drives
//! the container wiring the command assembler emits (bind mounts for local
//! directories, credential env vars for object stores). Downloads are
//! served for local repositories only.

mod error;
pub use error::ArtifactError;

mod kind;
pub use kind::{ArtifactStoreKind, classify_artifact_uri};

mod repo;
pub use repo::{ArtifactRepo, LocalArtifactRepo, RemoteArtifactRepo, copy_recursive, repo_for_uri};
