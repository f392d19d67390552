use serde::{Deserialize, Serialize};

/// Container environment declared by a project descriptor.
///
/// When present it takes precedence over a conda dependency file: the project
/// is executed inside a container built on `image`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerEnvironment {
    /// Base image the project image is layered on (e.g. `"python:3.7"`).
    pub image: String,
    /// Extra volume mounts in `host:container` syntax, passed through as-is.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Environment variables the container expects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<EnvVarSpec>,
}

impl DockerEnvironment {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            volumes: Vec::new(),
            environment: Vec::new(),
        }
    }
}

/// A user-declared environment variable for the container.
///
/// Serialized form matches the project-file convention: a bare string asks
/// for the named variable to be copied from the ambient environment of the
/// submitting host (fatal if absent there), a two-element array declares a
/// literal name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvVarSpec {
    /// Copy `NAME` from the submitting host's environment.
    FromHost(String),
    /// Literal `[name, value]` pair.
    Literal([String; 2]),
}

impl EnvVarSpec {
    /// The variable name this spec defines inside the container.
    pub fn name(&self) -> &str {
        match self {
            EnvVarSpec::FromHost(name) => name,
            EnvVarSpec::Literal([name, _]) => name,
        }
    }
}
