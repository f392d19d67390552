//! Domain model for gantry project runs.
//!
//! A *project descriptor* declares how a project can be executed: an optional
//! container environment, an optional conda dependency file, and a set of
//! named entry points with parameter schemas and command templates. The
//! descriptor is produced by an external parser and consumed read-only by the
//! dispatch layer; this crate only defines the types and their invariants.

mod error;
pub use error::ModelError;

mod kv;
pub use kv::KeyValue;

mod run_env;
pub use run_env::RunEnv;

mod status;
pub use status::RunStatus;

mod docker_env;
pub use docker_env::{DockerEnvironment, EnvVarSpec};

mod entry_point;
pub use entry_point::{EntryPoint, ParamKind, ParameterSpec, shell_quote};

mod descriptor;
pub use descriptor::ProjectDescriptor;

mod backend_config;
pub use backend_config::BackendConfig;

/// Experiment identifier as issued by the tracking collaborator.
pub type ExperimentId = String;

/// Run identifier as issued by the tracking collaborator.
pub type RunId = String;
