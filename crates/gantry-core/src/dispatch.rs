use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gantry_exec::{HostEnv, shell_cmd, spawn_in_group};
use gantry_model::{BackendConfig, ProjectDescriptor};
use gantry_tracking::{CredentialProfiles, RunRecord, TrackingClient, TrackingError, tags};

use crate::command::{
    DockerCommandSpec, docker_command, entry_point_command, run_env_vars, storage_dir_for_run,
};
use crate::conda::CondaProvisioner;
use crate::consts::LOCAL_RUN_ID_CONFIG;
use crate::docker::{
    build_docker_image, git_revision, pinned_image_ref, push_image_to_registry,
    validate_docker_installation,
};
use crate::error::CoreError;
use crate::kube::{job_name_for, parse_kubernetes_config, render_job_spec, run_kubernetes_job};
use crate::registry::BackendRegistry;
use crate::submitted::{LocalSubmittedRun, SubmittedRun, wait_for};

/// Backends the dispatcher implements itself.
const BUILTIN_BACKENDS: [&str; 2] = ["local", "kubernetes"];

/// Everything one launch needs, parsed before dispatch begins.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Project URI (a directory path for the bundled resolver).
    pub uri: String,
    pub entry_point: String,
    pub params: BTreeMap<String, String>,
    /// Project revision, for version-controlled project sources.
    pub version: Option<String>,
    /// Extra `--key value` flags for containerized local runs.
    pub docker_args: Vec<(String, String)>,
    pub backend: Option<String>,
    pub backend_config: BackendConfig,
    pub experiment_name: Option<String>,
    pub experiment_id: Option<String>,
    /// Provision and activate an isolated interpreter environment when the
    /// project declares no container environment.
    pub use_isolated_env: bool,
    /// Base directory for path-parameter downloads; fresh temp dir if unset.
    pub storage_dir: Option<PathBuf>,
    pub synchronous: bool,
    /// Reuse a pre-created run instead of creating a new one.
    pub run_id: Option<String>,
}

impl LaunchOptions {
    pub fn new(uri: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            entry_point: entry_point.into(),
            params: BTreeMap::new(),
            version: None,
            docker_args: Vec::new(),
            backend: None,
            backend_config: BackendConfig::new(),
            experiment_name: None,
            experiment_id: None,
            use_isolated_env: true,
            storage_dir: None,
            synchronous: true,
            run_id: None,
        }
    }
}

/// Resolves a project URI to a local working directory plus its descriptor.
///
/// Fetching and parsing project sources is outside the dispatch core; the
/// CLI supplies an implementation.
#[async_trait]
pub trait ProjectResolver: Send + Sync {
    async fn resolve(
        &self,
        uri: &str,
        version: Option<&str>,
    ) -> Result<(PathBuf, ProjectDescriptor), CoreError>;
}

/// The top-level dispatcher: selects a backend strategy, provisions the
/// matching runtime, launches the entry point, and supervises synchronous
/// runs to completion.
pub struct Launcher {
    tracking: Arc<dyn TrackingClient>,
    resolver: Arc<dyn ProjectResolver>,
    registry: BackendRegistry,
    profiles: CredentialProfiles,
    host_env: HostEnv,
}

impl Launcher {
    pub fn new(tracking: Arc<dyn TrackingClient>, resolver: Arc<dyn ProjectResolver>) -> Self {
        Self {
            tracking,
            resolver,
            registry: BackendRegistry::new(),
            profiles: CredentialProfiles::new(),
            host_env: HostEnv::capture(),
        }
    }

    pub fn with_registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_profiles(mut self, profiles: CredentialProfiles) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_host_env(mut self, host_env: HostEnv) -> Self {
        self.host_env = host_env;
        self
    }

    /// Launch a project run.
    ///
    /// Synchronous launches block until the run terminates, reporting the
    /// terminal status through the tracking collaborator and surfacing a
    /// failed run as an error. Asynchronous launches return immediately
    /// with a handle; dropping an unwaited local handle best-effort kills
    /// its process group.
    pub async fn run(
        &self,
        mut opts: LaunchOptions,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn SubmittedRun>, CoreError> {
        let experiment_id = self.resolve_experiment_id(&opts).await?;
        if let Some(run_id) = opts.run_id.take()
            && matches!(opts.backend.as_deref(), None | Some("local"))
        {
            opts.backend_config
                .insert(LOCAL_RUN_ID_CONFIG, serde_json::Value::String(run_id));
        }

        let mut submitted = self.dispatch(&opts, &experiment_id).await?;
        if opts.synchronous {
            wait_for(submitted.as_mut(), self.tracking.as_ref(), cancel).await?;
        }
        Ok(submitted)
    }

    /// Experiment under which the run is created: explicit id, or a named
    /// experiment looked up (and created on first use), or the default.
    async fn resolve_experiment_id(&self, opts: &LaunchOptions) -> Result<String, CoreError> {
        match (&opts.experiment_name, &opts.experiment_id) {
            (Some(_), Some(_)) => Err(CoreError::Config(
                "specify only one of 'experiment_name' or 'experiment_id'".to_string(),
            )),
            (None, Some(id)) => Ok(id.clone()),
            (Some(name), None) => {
                if let Some(id) = self.tracking.experiment_id_by_name(name).await? {
                    Ok(id)
                } else {
                    info!(target: "gantry.dispatch", experiment = %name, "experiment does not exist, creating it");
                    Ok(self.tracking.create_experiment(name).await?)
                }
            }
            (None, None) => Ok("0".to_string()),
        }
    }

    async fn dispatch(
        &self,
        opts: &LaunchOptions,
        experiment_id: &str,
    ) -> Result<Box<dyn SubmittedRun>, CoreError> {
        // Pluggable backends own the whole run; only tag it afterwards.
        if let Some(name) = &opts.backend
            && let Some(backend) = self.registry.load(name)
        {
            let submitted = backend
                .run(
                    &opts.uri,
                    &opts.entry_point,
                    &opts.params,
                    opts.version.as_deref(),
                    &opts.backend_config,
                    experiment_id,
                    self.tracking.tracking_uri(),
                )
                .await?;
            self.tracking
                .set_tag(submitted.run_id(), tags::PROJECT_BACKEND, name)
                .await?;
            return Ok(submitted);
        }

        let (work_dir, project) = self
            .resolver
            .resolve(&opts.uri, opts.version.as_deref())
            .await?;
        validate_execution_environment(&project, opts.backend.as_deref())?;

        let record = self
            .get_or_create_run(opts, experiment_id, &work_dir, &project)
            .await?;

        match opts.backend.as_deref() {
            None | Some("local") => self.run_local(opts, &record, &work_dir, &project).await,
            Some("kubernetes") => self.run_kubernetes(opts, &record, &work_dir, &project).await,
            Some(other) => {
                let mut supported: Vec<String> =
                    BUILTIN_BACKENDS.iter().map(|s| s.to_string()).collect();
                supported.extend(self.registry.names());
                Err(CoreError::UnsupportedBackend {
                    name: other.to_string(),
                    supported: supported.join(", "),
                })
            }
        }
    }

    /// Reuse the run named by backend config, or create a fresh one; tag
    /// it with provenance either way.
    async fn get_or_create_run(
        &self,
        opts: &LaunchOptions,
        experiment_id: &str,
        work_dir: &Path,
        project: &ProjectDescriptor,
    ) -> Result<RunRecord, CoreError> {
        let existing = if matches!(opts.backend.as_deref(), None | Some("local")) {
            opts.backend_config.str_key(LOCAL_RUN_ID_CONFIG)?
        } else {
            None
        };
        let record = match existing {
            // A re-invoked child may carry a run id its own store has never
            // seen (the parent created the record in another process);
            // recreate it rather than refusing to launch.
            Some(run_id) => match self.tracking.get_run(run_id).await {
                Ok(record) => record,
                Err(TrackingError::RunNotFound(_)) => {
                    warn!(target: "gantry.dispatch", run_id = %run_id, "run not found in this tracking store, creating a fresh record");
                    self.tracking.create_run(experiment_id).await?
                }
                Err(err) => return Err(err.into()),
            },
            None => self.tracking.create_run(experiment_id).await?,
        };

        self.tracking
            .set_tag(&record.run_id, tags::SOURCE_NAME, &project.name)
            .await?;
        self.tracking
            .set_tag(&record.run_id, tags::PROJECT_ENTRY_POINT, &opts.entry_point)
            .await?;
        if let Ok(host) = hostname::get() {
            self.tracking
                .set_tag(&record.run_id, tags::SUBMITTING_HOST, &host.to_string_lossy())
                .await?;
        }
        if let Some(revision) = git_revision(work_dir).await {
            self.tracking
                .set_tag(&record.run_id, tags::SOURCE_GIT_COMMIT, &revision)
                .await?;
        }
        Ok(record)
    }

    /// Local backend: bare shell, activated conda env, or docker container.
    async fn run_local(
        &self,
        opts: &LaunchOptions,
        record: &RunRecord,
        work_dir: &Path,
        project: &ProjectDescriptor,
    ) -> Result<Box<dyn SubmittedRun>, CoreError> {
        self.tracking
            .set_tag(&record.run_id, tags::PROJECT_BACKEND, "local")
            .await?;

        let mut command_args: Vec<String> = Vec::new();
        let mut separator = " ";
        if let Some(docker_env) = &project.docker_env {
            self.tracking
                .set_tag(&record.run_id, tags::PROJECT_ENV, "docker")
                .await?;
            validate_docker_env(project)?;
            validate_docker_installation().await?;
            let image = build_docker_image(
                work_dir,
                &project.name,
                &docker_env.image,
                &record.run_id,
                self.tracking.as_ref(),
            )
            .await?;
            command_args.extend(docker_command(&DockerCommandSpec {
                image_uri: &image.uri,
                run: record,
                tracking_uri: self.tracking.tracking_uri(),
                profiles: &self.profiles,
                host_env: &self.host_env,
                docker_args: &opts.docker_args,
                volumes: &docker_env.volumes,
                user_env_vars: &docker_env.environment,
            })?);
        } else if opts.use_isolated_env {
            // Created synchronously, before launch: concurrent creators of
            // the same environment serialize here instead of racing.
            self.tracking
                .set_tag(&record.run_id, tags::PROJECT_ENV, "conda")
                .await?;
            separator = " && ";
            let provisioner = CondaProvisioner::from_host_env(&self.host_env);
            let spec_path = project.conda_env_path.as_ref().map(|p| work_dir.join(p));
            let env_name = provisioner.ensure(spec_path.as_deref(), None).await?;
            command_args.extend(provisioner.activate_commands(&env_name));
        }

        if opts.synchronous {
            let storage_dir = storage_dir_for_run(opts.storage_dir.as_deref())?;
            command_args.push(entry_point_command(
                project,
                &opts.entry_point,
                &opts.params,
                &storage_dir,
            )?);
            let command_str = command_args.join(separator);
            info!(target: "gantry.dispatch", run_id = %record.run_id, command = %command_str, "running entry point");

            let env =
                run_env_vars(&record.run_id, &record.experiment_id, self.tracking.tracking_uri());
            let spec = shell_cmd(&command_str, Some(work_dir)).envs(env.resolved());
            let spawned = spawn_in_group(&spec)?;
            Ok(Box::new(LocalSubmittedRun::new(record.run_id.clone(), spawned)))
        } else {
            // Re-invoke the CLI in its own process group; the child reuses
            // this run record via --run-id.
            info!(target: "gantry.dispatch", run_id = %record.run_id, "asynchronously launching run");
            let env =
                run_env_vars(&record.run_id, &record.experiment_id, self.tracking.tracking_uri());
            let spec = async_run_cmd(work_dir, opts, &record.run_id).envs(env.resolved());
            let spawned = spawn_in_group(&spec)?;
            Ok(Box::new(LocalSubmittedRun::new(record.run_id.clone(), spawned)))
        }
    }

    /// Cluster-job backend: image built and pushed, then a job rendered
    /// from the user template and submitted.
    async fn run_kubernetes(
        &self,
        opts: &LaunchOptions,
        record: &RunRecord,
        work_dir: &Path,
        project: &ProjectDescriptor,
    ) -> Result<Box<dyn SubmittedRun>, CoreError> {
        self.tracking
            .set_tag(&record.run_id, tags::PROJECT_BACKEND, "kubernetes")
            .await?;
        self.tracking
            .set_tag(&record.run_id, tags::PROJECT_ENV, "docker")
            .await?;
        validate_docker_env(project)?;
        validate_docker_installation().await?;
        let kube = parse_kubernetes_config(&opts.backend_config)?;

        let Some(docker_env) = project.docker_env.as_ref() else {
            return Err(CoreError::Config(
                "the kubernetes backend requires the project to declare a docker environment"
                    .to_string(),
            ));
        };
        let image = build_docker_image(
            work_dir,
            &kube.repository_uri,
            &docker_env.image,
            &record.run_id,
            self.tracking.as_ref(),
        )
        .await?;
        let digest = push_image_to_registry(&image.uri).await?;
        let pinned = pinned_image_ref(&image.uri, &digest);

        let storage_dir = storage_dir_for_run(opts.storage_dir.as_deref())?;
        let entry_cmd =
            entry_point_command(project, &opts.entry_point, &opts.params, &storage_dir)?;
        let env =
            run_env_vars(&record.run_id, &record.experiment_id, self.tracking.tracking_uri());

        let job = render_job_spec(
            &kube.job_template,
            &job_name_for(&project.name),
            &pinned,
            &["/bin/sh".to_string(), "-c".to_string(), entry_cmd],
            &env,
        )?;
        let submitted = run_kubernetes_job(&record.run_id, &job, kube.kube_context).await?;
        Ok(Box::new(submitted))
    }
}

/// Reject descriptor/backend combinations that cannot work before any
/// provisioning happens.
fn validate_execution_environment(
    project: &ProjectDescriptor,
    backend: Option<&str>,
) -> Result<(), CoreError> {
    if backend == Some("kubernetes") && project.docker_env.is_none() {
        return Err(CoreError::Config(
            "the kubernetes backend requires the project to declare a docker environment"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_docker_env(project: &ProjectDescriptor) -> Result<(), CoreError> {
    if project.name.is_empty() {
        return Err(CoreError::Config(
            "a project name must be specified when using docker, for image tagging".to_string(),
        ));
    }
    let image_declared = project
        .docker_env
        .as_ref()
        .map(|env| !env.image.is_empty())
        .unwrap_or(false);
    if !image_declared {
        return Err(CoreError::Config(
            "a project with a docker environment must specify the image to use".to_string(),
        ));
    }
    Ok(())
}

/// The `gantry run` re-invocation used for asynchronous local launches.
pub fn async_run_cmd(work_dir: &Path, opts: &LaunchOptions, run_id: &str) -> gantry_exec::CmdSpec {
    let mut spec = gantry_exec::CmdSpec::new("gantry")
        .arg("run")
        .arg(work_dir.to_string_lossy())
        .args(["-e", &opts.entry_point])
        .args(["--run-id", run_id]);
    if let Some(storage_dir) = &opts.storage_dir {
        spec = spec.arg("--storage-dir").arg(storage_dir.to_string_lossy());
    }
    if !opts.use_isolated_env {
        spec = spec.arg("--no-isolated-env");
    }
    for (key, value) in &opts.params {
        spec = spec.arg("-P").arg(format!("{key}={value}"));
    }
    spec
}
