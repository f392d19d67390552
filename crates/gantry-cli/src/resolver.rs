use std::path::PathBuf;

use async_trait::async_trait;

use gantry_core::{CoreError, ProjectResolver};
use gantry_model::ProjectDescriptor;

/// Descriptor file expected at the root of a project directory.
pub const PROJECT_FILE: &str = "gantry.json";

/// Resolves a project URI that names a local directory containing a
/// `gantry.json` descriptor.
pub struct LocalDirResolver;

#[async_trait]
impl ProjectResolver for LocalDirResolver {
    async fn resolve(
        &self,
        uri: &str,
        version: Option<&str>,
    ) -> Result<(PathBuf, ProjectDescriptor), CoreError> {
        if version.is_some() {
            return Err(CoreError::Config(
                "setting a version is only supported for version-controlled project sources"
                    .to_string(),
            ));
        }
        let dir = PathBuf::from(uri);
        if !dir.is_dir() {
            return Err(CoreError::Config(format!(
                "project uri '{uri}' is not a local directory"
            )));
        }
        let descriptor_path = dir.join(PROJECT_FILE);
        if !descriptor_path.is_file() {
            return Err(CoreError::Config(format!(
                "no '{PROJECT_FILE}' found in project directory '{uri}'"
            )));
        }
        let raw = tokio::fs::read_to_string(&descriptor_path).await?;
        let descriptor: ProjectDescriptor = serde_json::from_str(&raw)?;
        Ok((std::path::absolute(dir)?, descriptor))
    }
}
