use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{DockerEnvironment, EntryPoint, ModelError};

/// Declarative description of a runnable project.
///
/// Produced by an external project-file parser and consumed read-only. A
/// declared docker environment takes precedence over a conda dependency
/// file: the project runs inside a container built on the declared image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_env: Option<DockerEnvironment>,
    /// Path to a conda dependency file, relative to the project directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conda_env_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entry_points: BTreeMap<String, EntryPoint>,
}

impl ProjectDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docker_env: None,
            conda_env_path: None,
            entry_points: BTreeMap::new(),
        }
    }

    pub fn with_docker_env(mut self, env: DockerEnvironment) -> Self {
        self.docker_env = Some(env);
        self
    }

    pub fn with_conda_env_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.conda_env_path = Some(path.into());
        self
    }

    pub fn with_entry_point(mut self, name: impl Into<String>, ep: EntryPoint) -> Self {
        self.entry_points.insert(name.into(), ep);
        self
    }

    /// Look up a declared entry point, enumerating the known ones on miss.
    pub fn entry_point(&self, name: &str) -> Result<&EntryPoint, ModelError> {
        self.entry_points
            .get(name)
            .ok_or_else(|| ModelError::UnknownEntryPoint {
                name: name.to_string(),
                available: self
                    .entry_points
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}
