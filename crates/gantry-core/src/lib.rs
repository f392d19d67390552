//! Orchestration core: backend dispatch, environment provisioning, command
//! assembly, and submitted-run supervision.
//!
//! The [`Launcher`] is the entry point. Given parsed [`LaunchOptions`] it
//! selects a backend (built-in `local`/`kubernetes` or a registered plugin),
//! provisions the runtime the project descriptor asks for (bare shell,
//! conda environment, docker container, cluster job), launches the entry
//! point, and — for synchronous launches — supervises the run to completion
//! with exactly-once terminal-status reporting.

pub mod consts;

mod error;
pub use error::CoreError;

mod envkey;
pub use envkey::{environment_key, environment_name};

mod conda;
pub use conda::CondaProvisioner;

mod docker;
pub use docker::{
    DockerImage, build_docker_image, git_revision, pinned_image_ref, push_image_to_registry,
    validate_docker_installation,
};

mod command;
pub use command::{
    DockerCommandSpec, docker_command, entry_point_command, run_env_vars, storage_dir_for_run,
};

mod submitted;
pub use submitted::{LocalSubmittedRun, SubmittedRun, maybe_set_terminated, wait_for};

mod registry;
pub use registry::{BackendRegistry, ProjectBackend};

mod kube;
pub use kube::{
    KubeConfig, KubernetesSubmittedRun, job_name_for, parse_kubernetes_config, render_job_spec,
    run_kubernetes_job,
};

mod dispatch;
pub use dispatch::{LaunchOptions, Launcher, ProjectResolver, async_run_cmd};
