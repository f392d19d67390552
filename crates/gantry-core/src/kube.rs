use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_yaml::Value;
use tracing::{debug, info};

use gantry_exec::{CmdSpec, run_checked};
use gantry_model::{BackendConfig, RunEnv, RunStatus};

use crate::consts::{KUBE_CONTEXT_CONFIG, KUBE_JOB_TEMPLATE_PATH_CONFIG, REPOSITORY_URI_CONFIG};
use crate::error::CoreError;
use crate::submitted::SubmittedRun;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Validated kubernetes backend configuration.
#[derive(Debug)]
pub struct KubeConfig {
    pub job_template: Value,
    pub kube_context: Option<String>,
    pub repository_uri: String,
}

/// Parse and validate the kubernetes backend config.
///
/// The job-template path must name an existing YAML file; the repository
/// URI is where the built project image gets pushed. A missing context is
/// fine — kubectl falls back to the current context.
pub fn parse_kubernetes_config(config: &BackendConfig) -> Result<KubeConfig, CoreError> {
    let template_path = config.required_str_key(KUBE_JOB_TEMPLATE_PATH_CONFIG)?;
    if !Path::new(template_path).exists() {
        return Err(CoreError::Config(format!(
            "could not find '{KUBE_JOB_TEMPLATE_PATH_CONFIG}': {template_path}"
        )));
    }
    let job_template: Value = serde_yaml::from_str(&std::fs::read_to_string(template_path)?)?;
    let repository_uri = config.required_str_key(REPOSITORY_URI_CONFIG)?.to_string();
    let kube_context = config.str_key(KUBE_CONTEXT_CONFIG)?.map(str::to_string);
    if kube_context.is_none() {
        debug!(target: "gantry.kube", "no kube-context configured, using current context");
    }
    Ok(KubeConfig {
        job_template,
        kube_context,
        repository_uri,
    })
}

/// RFC-1123-safe job name: sanitized project name plus a timestamp suffix.
pub fn job_name_for(project_name: &str) -> String {
    let now = time::OffsetDateTime::now_utc();
    let stamp = now
        .format(time::macros::format_description!(
            "[year]-[month]-[day]-[hour]-[minute]-[second]"
        ))
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    format!("{}-{stamp}", sanitize_job_name(project_name))
}

fn sanitize_job_name(name: &str) -> String {
    let cleaned: String = name
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "gantry-job".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Instantiate the user-supplied job template for one run.
///
/// Replaces the job name and the first container's image and command, and
/// appends the run environment after any template-declared variables so
/// the run's values win inside the container.
pub fn render_job_spec(
    template: &Value,
    job_name: &str,
    image: &str,
    command: &[String],
    env: &RunEnv,
) -> Result<Value, CoreError> {
    let mut job = template.clone();

    let metadata = job
        .get_mut("metadata")
        .ok_or_else(|| CoreError::JobTemplate("missing 'metadata'".to_string()))?;
    if !metadata.is_mapping() {
        return Err(CoreError::JobTemplate("'metadata' must be a mapping".to_string()));
    }
    metadata["name"] = Value::String(job_name.to_string());

    let container = job
        .get_mut("spec")
        .and_then(|spec| spec.get_mut("template"))
        .and_then(|template| template.get_mut("spec"))
        .and_then(|spec| spec.get_mut("containers"))
        .and_then(|containers| containers.get_mut(0))
        .ok_or_else(|| {
            CoreError::JobTemplate("missing 'spec.template.spec.containers[0]'".to_string())
        })?;
    if !container.is_mapping() {
        return Err(CoreError::JobTemplate(
            "'spec.template.spec.containers[0]' must be a mapping".to_string(),
        ));
    }

    container["image"] = Value::String(image.to_string());
    container["command"] = Value::Sequence(
        command
            .iter()
            .map(|token| Value::String(token.clone()))
            .collect(),
    );

    let mut env_entries = match container.get("env") {
        Some(Value::Sequence(existing)) => existing.clone(),
        _ => Vec::new(),
    };
    for kv in env.iter() {
        let mut entry = serde_yaml::Mapping::new();
        entry.insert(
            Value::String("name".to_string()),
            Value::String(kv.key().to_string()),
        );
        entry.insert(
            Value::String("value".to_string()),
            Value::String(kv.value().to_string()),
        );
        env_entries.push(Value::Mapping(entry));
    }
    container["env"] = Value::Sequence(env_entries);

    Ok(job)
}

/// Namespace a job spec targets, defaulting to `default`.
pub fn job_namespace(job: &Value) -> String {
    job.get("metadata")
        .and_then(|metadata| metadata.get("namespace"))
        .and_then(Value::as_str)
        .unwrap_or("default")
        .to_string()
}

fn kubectl(kube_context: Option<&str>, args: &[&str]) -> CmdSpec {
    let mut spec = CmdSpec::new("kubectl");
    if let Some(ctx) = kube_context {
        spec = spec.arg("--context").arg(ctx);
    }
    spec.args(args.iter().copied())
}

/// Submit a rendered job spec to the cluster.
pub async fn run_kubernetes_job(
    run_id: &str,
    job: &Value,
    kube_context: Option<String>,
) -> Result<KubernetesSubmittedRun, CoreError> {
    let job_name = job
        .get("metadata")
        .and_then(|metadata| metadata.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::JobTemplate("missing 'metadata.name'".to_string()))?
        .to_string();
    let namespace = job_namespace(job);

    let file = tempfile::NamedTempFile::new()?;
    serde_yaml::to_writer(file.as_file(), job).map_err(CoreError::Yaml)?;

    info!(target: "gantry.kube", job = %job_name, %namespace, "submitting kubernetes job");
    let path = file.path().to_string_lossy().into_owned();
    run_checked(&kubectl(
        kube_context.as_deref(),
        &["apply", "-n", &namespace, "-f", &path],
    ))
    .await?;

    Ok(KubernetesSubmittedRun {
        run_id: run_id.to_string(),
        job_name,
        namespace,
        kube_context,
        poll_interval: DEFAULT_POLL_INTERVAL,
    })
}

/// A run backed by a kubernetes job, supervised by polling.
pub struct KubernetesSubmittedRun {
    run_id: String,
    job_name: String,
    namespace: String,
    kube_context: Option<String>,
    poll_interval: Duration,
}

impl KubernetesSubmittedRun {
    async fn job_status(&self) -> Result<RunStatus, CoreError> {
        let out = run_checked(&kubectl(
            self.kube_context.as_deref(),
            &[
                "get",
                "job",
                &self.job_name,
                "-n",
                &self.namespace,
                "-o",
                "json",
            ],
        ))
        .await?;
        let job: serde_json::Value = serde_json::from_str(&out)?;
        Ok(translate_job_status(&job))
    }
}

/// Map a kubernetes job object onto a run status.
fn translate_job_status(job: &serde_json::Value) -> RunStatus {
    let status = &job["status"];
    if status["succeeded"].as_u64().unwrap_or(0) > 0 {
        RunStatus::Finished
    } else if status["failed"].as_u64().unwrap_or(0) > 0 {
        RunStatus::Failed
    } else if status["startTime"].is_null() {
        RunStatus::Scheduled
    } else {
        RunStatus::Running
    }
}

#[async_trait]
impl SubmittedRun for KubernetesSubmittedRun {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    async fn wait(&mut self) -> Result<bool, CoreError> {
        loop {
            let status = self.job_status().await?;
            if status.is_terminal() {
                return Ok(status == RunStatus::Finished);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn cancel(&mut self) -> Result<(), CoreError> {
        info!(target: "gantry.kube", job = %self.job_name, "deleting kubernetes job");
        run_checked(&kubectl(
            self.kube_context.as_deref(),
            &[
                "delete",
                "job",
                &self.job_name,
                "-n",
                &self.namespace,
                "--ignore-not-found",
            ],
        ))
        .await?;
        Ok(())
    }

    async fn status(&mut self) -> Result<RunStatus, CoreError> {
        self.job_status().await
    }
}
