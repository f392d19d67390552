use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use tracing::info;

use gantry_artifacts::{ArtifactStoreKind, repo_for_uri};
use gantry_exec::HostEnv;
use gantry_model::{EnvVarSpec, ParamKind, ProjectDescriptor, RunEnv};
use gantry_tracking::{
    CredentialProfiles, RunRecord, TrackingUriKind, classify_tracking_uri,
    path_to_local_file_uri, path_to_local_sqlite_uri,
};

use crate::consts::{
    DOCKER_TRACKING_DIR_PATH, DOCKER_WORKDIR_PATH, EXPERIMENT_ID_ENV_VAR, RUN_ID_ENV_VAR,
    TRACKING_URI_ENV_VAR,
};
use crate::error::CoreError;

// Credential env vars forwarded from the submitting host, per storage kind.
const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
const S3_ENDPOINT_URL: &str = "GANTRY_S3_ENDPOINT_URL";
const AZURE_STORAGE_CONNECTION_STRING: &str = "AZURE_STORAGE_CONNECTION_STRING";
const AZURE_STORAGE_ACCESS_KEY: &str = "AZURE_STORAGE_ACCESS_KEY";
const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const KERBEROS_TICKET_CACHE: &str = "GANTRY_KERBEROS_TICKET_CACHE";
const KERBEROS_USER: &str = "GANTRY_KERBEROS_USER";

// Tracking credential env vars injected for profile URIs.
const TRACKING_HOST_ENV_VAR: &str = "GANTRY_TRACKING_HOST";
const TRACKING_TOKEN_ENV_VAR: &str = "GANTRY_TRACKING_TOKEN";
const TRACKING_USERNAME_ENV_VAR: &str = "GANTRY_TRACKING_USERNAME";
const TRACKING_PASSWORD_ENV_VAR: &str = "GANTRY_TRACKING_PASSWORD";
const TRACKING_INSECURE_ENV_VAR: &str = "GANTRY_TRACKING_INSECURE";

/// Environment variables injected into every launched run, regardless of
/// backend. They make the child self-identifying to the tracking
/// collaborator without explicit arguments.
pub fn run_env_vars(run_id: &str, experiment_id: &str, tracking_uri: &str) -> RunEnv {
    [
        (RUN_ID_ENV_VAR, run_id),
        (TRACKING_URI_ENV_VAR, tracking_uri),
        (EXPERIMENT_ID_ENV_VAR, experiment_id),
    ]
    .into_iter()
    .collect()
}

/// Create the per-run directory remote path-typed parameters download into.
///
/// Distinct per run; deliberately not deleted afterwards — downstream code
/// may keep referencing the downloaded data.
pub fn storage_dir_for_run(base: Option<&Path>) -> Result<PathBuf, CoreError> {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let dir = match base {
        Some(base) => base.join(suffix),
        None => std::env::temp_dir().join(format!("gantry-params-{suffix}")),
    };
    std::fs::create_dir_all(&dir)?;
    info!(target: "gantry.command", dir = %dir.display(), "created download directory for path parameters");
    Ok(dir)
}

/// Shell command executing `entry_point` with `user_params` resolved.
///
/// Path-typed parameter values pointing at remote storage are materialized
/// under `storage_dir` first; local paths are verified and absolutized.
pub fn entry_point_command(
    project: &ProjectDescriptor,
    entry_point: &str,
    user_params: &BTreeMap<String, String>,
    storage_dir: &Path,
) -> Result<String, CoreError> {
    let ep = project.entry_point(entry_point)?;
    let (mut declared, extra) = ep.partition_params(user_params)?;

    for (name, value) in declared.iter_mut() {
        let Some(spec) = ep.parameter(name) else {
            continue;
        };
        match spec.kind {
            ParamKind::Path => *value = resolve_path_param(value, storage_dir)?,
            ParamKind::Uri => validate_uri_param(name, value)?,
            _ => {}
        }
    }
    Ok(ep.render(&declared, &extra))
}

fn validate_uri_param(name: &str, value: &str) -> Result<(), CoreError> {
    if url::Url::parse(value).is_err() {
        return Err(CoreError::InvalidUriParam {
            name: name.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

fn resolve_path_param(value: &str, storage_dir: &Path) -> Result<String, CoreError> {
    let repo = repo_for_uri(value);
    match repo.kind() {
        ArtifactStoreKind::Local => {
            let path = repo
                .local_dir()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(value));
            if !path.exists() {
                return Err(gantry_artifacts::ArtifactError::NotFound(
                    path.display().to_string(),
                )
                .into());
            }
            Ok(std::path::absolute(&path)?.display().to_string())
        }
        _ => {
            let downloaded = repo.download(value, storage_dir)?;
            Ok(downloaded.display().to_string())
        }
    }
}

/// Inputs for assembling one full container invocation.
pub struct DockerCommandSpec<'a> {
    pub image_uri: &'a str,
    pub run: &'a RunRecord,
    pub tracking_uri: &'a str,
    pub profiles: &'a CredentialProfiles,
    pub host_env: &'a HostEnv,
    /// Extra `--key value` run flags supplied by the caller.
    pub docker_args: &'a [(String, String)],
    /// Project-declared volume mounts, passed through as-is.
    pub volumes: &'a [String],
    /// Project-declared environment variables.
    pub user_env_vars: &'a [EnvVarSpec],
}

/// Assemble the `docker run` token sequence for a containerized run.
///
/// Token order is fixed: base flags, caller flags, tracking connectivity,
/// artifact-storage connectivity, volumes, `-e` variables, and the image
/// reference as the final token. The entry-point command is appended by
/// the caller after the image. Built fresh per run — the result can embed
/// credentials and must not be cached.
pub fn docker_command(spec: &DockerCommandSpec<'_>) -> Result<Vec<String>, CoreError> {
    let mut cmd: Vec<String> = vec!["docker".into(), "run".into(), "--rm".into()];
    for (key, value) in spec.docker_args {
        cmd.push(format!("--{key}"));
        cmd.push(value.clone());
    }

    let mut env = run_env_vars(&spec.run.run_id, &spec.run.experiment_id, spec.tracking_uri);

    let (tracking_mounts, tracking_env) = tracking_cmd_and_envs(spec.tracking_uri, spec.profiles)?;
    let (artifact_mounts, artifact_env) =
        artifact_cmd_and_envs(&spec.run.artifact_uri, spec.host_env)?;
    cmd.extend(tracking_mounts);
    cmd.extend(artifact_mounts);
    env = env.merged(&tracking_env).merged(&artifact_env);

    for user_var in spec.user_env_vars {
        match user_var {
            EnvVarSpec::Literal([name, value]) => env.push(name.clone(), value.clone()),
            EnvVarSpec::FromHost(name) => match spec.host_env.get(name) {
                Some(value) => env.push(name.clone(), value),
                None => {
                    let declared = spec
                        .user_env_vars
                        .iter()
                        .map(EnvVarSpec::name)
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(CoreError::MissingHostEnvVar {
                        name: name.clone(),
                        declared,
                    });
                }
            },
        }
    }

    for volume in spec.volumes {
        cmd.push("-v".into());
        cmd.push(volume.clone());
    }
    for (key, value) in env.resolved() {
        cmd.push("-e".into());
        cmd.push(format!("{key}={value}"));
    }
    cmd.push(spec.image_uri.to_string());
    Ok(cmd)
}

/// Container wiring for the tracking store: mount local stores at a fixed
/// in-container path and rewrite the URI; inject credentials for profile
/// URIs; pass remote URIs through untouched.
fn tracking_cmd_and_envs(
    tracking_uri: &str,
    profiles: &CredentialProfiles,
) -> Result<(Vec<String>, RunEnv), CoreError> {
    let mut mounts = Vec::new();
    let mut env = RunEnv::new();
    match classify_tracking_uri(tracking_uri) {
        TrackingUriKind::LocalFile(path) => {
            let host = std::path::absolute(&path)?;
            mounts.push("-v".to_string());
            mounts.push(format!("{}:{DOCKER_TRACKING_DIR_PATH}", host.display()));
            env.push(
                TRACKING_URI_ENV_VAR,
                path_to_local_file_uri(DOCKER_TRACKING_DIR_PATH),
            );
        }
        TrackingUriKind::LocalSqlite(path) => {
            let host = std::path::absolute(&path)?;
            mounts.push("-v".to_string());
            mounts.push(format!("{}:{DOCKER_TRACKING_DIR_PATH}", host.display()));
            env.push(
                TRACKING_URI_ENV_VAR,
                path_to_local_sqlite_uri(DOCKER_TRACKING_DIR_PATH),
            );
        }
        TrackingUriKind::Profile(name) => {
            let creds = profiles.resolve(&name)?;
            env.push(TRACKING_URI_ENV_VAR, tracking_uri);
            env.push(TRACKING_HOST_ENV_VAR, creds.host.clone());
            if let Some(token) = &creds.token {
                env.push(TRACKING_TOKEN_ENV_VAR, token.clone());
            }
            if let Some(username) = &creds.username {
                env.push(TRACKING_USERNAME_ENV_VAR, username.clone());
            }
            if let Some(password) = &creds.password {
                env.push(TRACKING_PASSWORD_ENV_VAR, password.clone());
            }
            if creds.insecure {
                env.push(TRACKING_INSECURE_ENV_VAR, "true");
            }
        }
        TrackingUriKind::Remote => {}
    }
    Ok((mounts, env))
}

/// Container wiring for artifact storage, dispatched by storage kind.
///
/// Unknown kinds contribute nothing so new storage families degrade
/// gracefully instead of failing dispatch.
fn artifact_cmd_and_envs(
    artifact_uri: &str,
    host_env: &HostEnv,
) -> Result<(Vec<String>, RunEnv), CoreError> {
    let repo = repo_for_uri(artifact_uri);
    let mut mounts = Vec::new();
    let mut env = RunEnv::new();

    match repo.kind() {
        ArtifactStoreKind::Local => {
            let dir = repo
                .local_dir()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(artifact_uri));
            let container_path = if dir.is_absolute() {
                dir.clone()
            } else {
                normalize_path(&Path::new(DOCKER_WORKDIR_PATH).join(&dir))
            };
            let host = std::path::absolute(&dir)?;
            mounts.push("-v".to_string());
            mounts.push(format!("{}:{}", host.display(), container_path.display()));
        }
        ArtifactStoreKind::S3 => {
            if let Some(aws_dir) = dirs::home_dir().map(|home| home.join(".aws"))
                && aws_dir.exists()
            {
                mounts.push("-v".to_string());
                mounts.push(format!("{}:/.aws", aws_dir.display()));
            }
            forward_host_vars(
                &mut env,
                host_env,
                &[AWS_SECRET_ACCESS_KEY, AWS_ACCESS_KEY_ID, S3_ENDPOINT_URL],
            );
        }
        ArtifactStoreKind::AzureBlob => {
            forward_host_vars(
                &mut env,
                host_env,
                &[AZURE_STORAGE_CONNECTION_STRING, AZURE_STORAGE_ACCESS_KEY],
            );
        }
        ArtifactStoreKind::Gcs => {
            if let Some(creds_file) = host_env.get(GOOGLE_APPLICATION_CREDENTIALS) {
                mounts.push("-v".to_string());
                mounts.push(format!("{creds_file}:/.gcs"));
                env.push(GOOGLE_APPLICATION_CREDENTIALS, "/.gcs");
            }
        }
        ArtifactStoreKind::Dfs => {
            forward_host_vars(&mut env, host_env, &[KERBEROS_TICKET_CACHE, KERBEROS_USER]);
            if let Some(ticket_cache) = host_env.get(KERBEROS_TICKET_CACHE) {
                mounts.push("-v".to_string());
                mounts.push(format!("{ticket_cache}:{ticket_cache}"));
            }
        }
        ArtifactStoreKind::Other => {}
    }
    Ok((mounts, env))
}

fn forward_host_vars(env: &mut RunEnv, host_env: &HostEnv, names: &[&str]) {
    for name in names {
        if let Some(value) = host_env.get(name) {
            env.push(*name, value);
        }
    }
}

/// Lexical normalization: resolve `.` and `..` segments without touching
/// the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_model::{EntryPoint, RunStatus};
    use gantry_tracking::HostCreds;

    fn record(artifact_uri: &str) -> RunRecord {
        RunRecord {
            run_id: "run123".to_string(),
            experiment_id: "0".to_string(),
            status: RunStatus::Running,
            artifact_uri: artifact_uri.to_string(),
        }
    }

    fn empty_host_env() -> HostEnv {
        std::iter::empty::<(&str, &str)>().collect()
    }

    #[test]
    fn run_env_vars_identify_the_run() {
        let env = run_env_vars("r1", "7", "http://tracking:5000");
        assert_eq!(env.get(RUN_ID_ENV_VAR), Some("r1"));
        assert_eq!(env.get(EXPERIMENT_ID_ENV_VAR), Some("7"));
        assert_eq!(env.get(TRACKING_URI_ENV_VAR), Some("http://tracking:5000"));
    }

    #[test]
    fn entry_point_command_resolves_local_path_param() {
        let scratch = tempfile::tempdir().unwrap();
        let data = scratch.path().join("data.csv");
        std::fs::write(&data, "a,b\n").unwrap();

        let project = ProjectDescriptor::new("demo").with_entry_point(
            "main",
            EntryPoint::new("python train.py {data}").with_param("data", ParamKind::Path),
        );
        let params: BTreeMap<_, _> =
            [("data".to_string(), data.display().to_string())].into();

        let cmd = entry_point_command(&project, "main", &params, scratch.path()).unwrap();
        assert_eq!(cmd, format!("python train.py {}", data.display()));
    }

    #[test]
    fn entry_point_command_rejects_missing_local_path() {
        let scratch = tempfile::tempdir().unwrap();
        let project = ProjectDescriptor::new("demo").with_entry_point(
            "main",
            EntryPoint::new("python train.py {data}").with_param("data", ParamKind::Path),
        );
        let params: BTreeMap<_, _> =
            [("data".to_string(), "/no/such/file".to_string())].into();

        let err = entry_point_command(&project, "main", &params, scratch.path()).unwrap_err();
        assert!(err.to_string().contains("/no/such/file"), "{err}");
    }

    #[test]
    fn entry_point_command_accepts_uri_param() {
        let scratch = tempfile::tempdir().unwrap();
        let project = ProjectDescriptor::new("demo").with_entry_point(
            "main",
            EntryPoint::new("python train.py {data}").with_param("data", ParamKind::Uri),
        );
        let params: BTreeMap<_, _> =
            [("data".to_string(), "s3://bucket/train.csv".to_string())].into();

        let cmd = entry_point_command(&project, "main", &params, scratch.path()).unwrap();
        assert_eq!(cmd, "python train.py s3://bucket/train.csv");
    }

    #[test]
    fn entry_point_command_rejects_non_uri_value() {
        let scratch = tempfile::tempdir().unwrap();
        let project = ProjectDescriptor::new("demo").with_entry_point(
            "main",
            EntryPoint::new("python train.py {data}").with_param("data", ParamKind::Uri),
        );
        let params: BTreeMap<_, _> =
            [("data".to_string(), "just a plain string".to_string())].into();

        let err = entry_point_command(&project, "main", &params, scratch.path()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidUriParam { .. }), "{err}");
        assert!(err.to_string().contains("data"), "{err}");
    }

    #[test]
    fn docker_command_image_is_final_token() {
        let run = record("s3://bucket/artifacts");
        let cmd = docker_command(&DockerCommandSpec {
            image_uri: "demo:abc1234",
            run: &run,
            tracking_uri: "http://tracking:5000",
            profiles: &CredentialProfiles::new(),
            host_env: &empty_host_env(),
            docker_args: &[],
            volumes: &[],
            user_env_vars: &[],
        })
        .unwrap();

        assert_eq!(cmd[..3], ["docker", "run", "--rm"]);
        assert_eq!(cmd.last().map(String::as_str), Some("demo:abc1234"));
    }

    #[test]
    fn docker_command_relative_artifact_dir_is_rooted_in_workdir() {
        let run = record("gruns/0/run123/artifacts");
        let cmd = docker_command(&DockerCommandSpec {
            image_uri: "demo",
            run: &run,
            tracking_uri: "http://tracking:5000",
            profiles: &CredentialProfiles::new(),
            host_env: &empty_host_env(),
            docker_args: &[],
            volumes: &[],
            user_env_vars: &[],
        })
        .unwrap();

        let mount_pos = cmd.iter().position(|t| t == "-v").unwrap();
        let mapping = &cmd[mount_pos + 1];
        let (host, container) = mapping.rsplit_once(':').unwrap();
        assert!(Path::new(host).is_absolute(), "{mapping}");
        assert_eq!(container, "/gantry/projects/code/gruns/0/run123/artifacts");
        assert!(!container.contains(".."), "{mapping}");
    }

    #[test]
    fn docker_command_absolute_artifact_dir_mounts_in_place() {
        let run = record("/data/artifacts");
        let cmd = docker_command(&DockerCommandSpec {
            image_uri: "demo",
            run: &run,
            tracking_uri: "http://tracking:5000",
            profiles: &CredentialProfiles::new(),
            host_env: &empty_host_env(),
            docker_args: &[],
            volumes: &[],
            user_env_vars: &[],
        })
        .unwrap();

        let mount_pos = cmd.iter().position(|t| t == "-v").unwrap();
        assert_eq!(cmd[mount_pos + 1], "/data/artifacts:/data/artifacts");
    }

    #[test]
    fn docker_command_mounts_local_tracking_store() {
        let run = record("s3://bucket/artifacts");
        let cmd = docker_command(&DockerCommandSpec {
            image_uri: "demo",
            run: &run,
            tracking_uri: "/var/lib/gantry/runs",
            profiles: &CredentialProfiles::new(),
            host_env: &empty_host_env(),
            docker_args: &[],
            volumes: &[],
            user_env_vars: &[],
        })
        .unwrap();

        let mount_pos = cmd.iter().position(|t| t == "-v").unwrap();
        assert_eq!(
            cmd[mount_pos + 1],
            format!("/var/lib/gantry/runs:{DOCKER_TRACKING_DIR_PATH}")
        );
        let rewritten = format!(
            "{TRACKING_URI_ENV_VAR}={}",
            path_to_local_file_uri(DOCKER_TRACKING_DIR_PATH)
        );
        assert!(cmd.contains(&rewritten), "{cmd:?}");
    }

    #[test]
    fn docker_command_injects_profile_credentials() {
        let run = record("s3://bucket/artifacts");
        let mut profiles = CredentialProfiles::new();
        profiles.insert(
            "staging",
            HostCreds::new("https://tracking.example.com").with_token("t0k3n"),
        );

        let cmd = docker_command(&DockerCommandSpec {
            image_uri: "demo",
            run: &run,
            tracking_uri: "profile://staging",
            profiles: &profiles,
            host_env: &empty_host_env(),
            docker_args: &[],
            volumes: &[],
            user_env_vars: &[],
        })
        .unwrap();

        assert!(
            cmd.contains(&format!("{TRACKING_HOST_ENV_VAR}=https://tracking.example.com")),
            "{cmd:?}"
        );
        assert!(cmd.contains(&format!("{TRACKING_TOKEN_ENV_VAR}=t0k3n")), "{cmd:?}");
        assert!(
            cmd.contains(&format!("{TRACKING_URI_ENV_VAR}=profile://staging")),
            "{cmd:?}"
        );
    }

    #[test]
    fn docker_command_forwards_declared_host_vars() {
        let run = record("s3://bucket/artifacts");
        let host_env: HostEnv = [("HOME", "/home/u")].into_iter().collect();
        let user_env_vars = vec![
            EnvVarSpec::FromHost("HOME".to_string()),
            EnvVarSpec::Literal(["MODE".to_string(), "fast".to_string()]),
        ];

        let cmd = docker_command(&DockerCommandSpec {
            image_uri: "demo",
            run: &run,
            tracking_uri: "http://tracking:5000",
            profiles: &CredentialProfiles::new(),
            host_env: &host_env,
            docker_args: &[],
            volumes: &[],
            user_env_vars: &user_env_vars,
        })
        .unwrap();

        assert!(cmd.contains(&"HOME=/home/u".to_string()), "{cmd:?}");
        assert!(cmd.contains(&"MODE=fast".to_string()), "{cmd:?}");
    }

    #[test]
    fn docker_command_missing_host_var_is_fatal_and_named() {
        let run = record("s3://bucket/artifacts");
        let user_env_vars = vec![
            EnvVarSpec::FromHost("GANTRY_TEST_ABSENT_VAR".to_string()),
            EnvVarSpec::Literal(["MODE".to_string(), "fast".to_string()]),
        ];

        let err = docker_command(&DockerCommandSpec {
            image_uri: "demo",
            run: &run,
            tracking_uri: "http://tracking:5000",
            profiles: &CredentialProfiles::new(),
            host_env: &empty_host_env(),
            docker_args: &[],
            volumes: &[],
            user_env_vars: &user_env_vars,
        })
        .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("GANTRY_TEST_ABSENT_VAR"), "{msg}");
        assert!(msg.contains("MODE"), "{msg}");
    }

    #[test]
    fn docker_command_keeps_caller_flags_and_volumes_in_order() {
        let run = record("s3://bucket/artifacts");
        let docker_args = vec![("memory".to_string(), "1g".to_string())];
        let volumes = vec!["/data:/data".to_string()];

        let cmd = docker_command(&DockerCommandSpec {
            image_uri: "demo",
            run: &run,
            tracking_uri: "http://tracking:5000",
            profiles: &CredentialProfiles::new(),
            host_env: &empty_host_env(),
            docker_args: &docker_args,
            volumes: &volumes,
            user_env_vars: &[],
        })
        .unwrap();

        let memory_pos = cmd.iter().position(|t| t == "--memory").unwrap();
        assert_eq!(cmd[memory_pos + 1], "1g");
        let volume_pos = cmd.iter().position(|t| t == "/data:/data").unwrap();
        assert!(memory_pos < volume_pos);
        assert!(volume_pos < cmd.len() - 1);
    }

    #[test]
    fn normalize_strips_dot_segments() {
        assert_eq!(
            normalize_path(Path::new("/gantry/projects/code/../code/./x")),
            PathBuf::from("/gantry/projects/code/x")
        );
    }

    #[test]
    fn storage_dirs_are_distinct_per_run() {
        let scratch = tempfile::tempdir().unwrap();
        let a = storage_dir_for_run(Some(scratch.path())).unwrap();
        let b = storage_dir_for_run(Some(scratch.path())).unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir());
        assert!(b.is_dir());
    }
}
