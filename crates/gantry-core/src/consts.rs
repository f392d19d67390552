//! Fixed names shared across the dispatch core.

/// Run id of the launched run, injected into every child environment.
pub const RUN_ID_ENV_VAR: &str = "GANTRY_RUN_ID";

/// Tracking-service URI, injected into every child environment.
pub const TRACKING_URI_ENV_VAR: &str = "GANTRY_TRACKING_URI";

/// Experiment id, injected into every child environment.
pub const EXPERIMENT_ID_ENV_VAR: &str = "GANTRY_EXPERIMENT_ID";

/// Override pointing at a conda installation's home directory.
pub const CONDA_HOME_ENV_VAR: &str = "GANTRY_CONDA_HOME";

/// Conda's own active-installation variable, the fallback override.
pub const CONDA_EXE_ENV_VAR: &str = "CONDA_EXE";

/// Name of the generated build-instructions file inside the build context.
pub const GENERATED_DOCKERFILE_NAME: &str = "Dockerfile.gantry-autogenerated";

/// Directory name the archived build context is rooted at.
pub const PROJECT_ARCHIVE_NAME: &str = "gantry-project-docker-build-context";

/// Fixed in-container path project code is copied to.
pub const DOCKER_WORKDIR_PATH: &str = "/gantry/projects/code/";

/// Fixed in-container mount point for a local tracking store.
pub const DOCKER_TRACKING_DIR_PATH: &str = "/gantry/tmp/runs";

/// Backend-config key that reuses a pre-created run on the local backend.
pub const LOCAL_RUN_ID_CONFIG: &str = "gantry-local-run-id";

/// Backend-config key naming the kubernetes context to submit into.
pub const KUBE_CONTEXT_CONFIG: &str = "kube-context";

/// Backend-config key with the path to the kubernetes job template.
pub const KUBE_JOB_TEMPLATE_PATH_CONFIG: &str = "kube-job-template-path";

/// Backend-config key with the image repository to push into.
pub const REPOSITORY_URI_CONFIG: &str = "repository-uri";
