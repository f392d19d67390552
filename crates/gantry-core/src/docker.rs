use std::future::Future;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, info};

use gantry_artifacts::copy_recursive;
use gantry_exec::{CmdSpec, run_checked, run_checked_with_stdin};
use gantry_tracking::{TrackingClient, tags};

use crate::consts::{DOCKER_WORKDIR_PATH, GENERATED_DOCKERFILE_NAME, PROJECT_ARCHIVE_NAME};
use crate::error::CoreError;

/// A built project image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerImage {
    /// Image reference (`repository[:short-revision]`).
    pub uri: String,
    /// Builder-assigned image identifier.
    pub id: String,
}

/// Verify docker is reachable; fatal with an install hint if not.
pub async fn validate_docker_installation() -> Result<(), CoreError> {
    match gantry_exec::probe("docker", &["--help"]).await {
        Ok(()) => Ok(()),
        Err(gantry_exec::ExecError::ToolNotFound { .. }) => Err(CoreError::ToolNotFound {
            tool: "docker".to_string(),
            hint: "Ensure Docker is installed as per the instructions at \
                   https://docs.docker.com/install/overview/"
                .to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Git revision of `work_dir`, when it is inside a resolvable repository.
pub async fn git_revision(work_dir: &Path) -> Option<String> {
    let spec = CmdSpec::new("git").args(["rev-parse", "HEAD"]).cwd(work_dir);
    match run_checked(&spec).await {
        Ok(out) => {
            let rev = out.trim().to_string();
            (!rev.is_empty()).then_some(rev)
        }
        Err(_) => None,
    }
}

/// Deterministic image reference for a project build.
///
/// `repository[:rev7]` — the first seven characters of the working
/// directory's revision when resolvable, bare repository name otherwise.
pub async fn image_uri(repository_uri: &str, work_dir: &Path) -> String {
    match git_revision(work_dir).await {
        Some(rev) => format!("{repository_uri}:{}", &rev[..rev.len().min(7)]),
        None => repository_uri.to_string(),
    }
}

/// Generated build instructions: layer the archived project onto the base
/// image at the fixed in-container working path.
pub fn dockerfile_contents(base_image: &str) -> String {
    format!(
        "FROM {base_image}\n\
         COPY {PROJECT_ARCHIVE_NAME}/ {DOCKER_WORKDIR_PATH}\n\
         WORKDIR {DOCKER_WORKDIR_PATH}\n"
    )
}

/// Stage a build context for `work_dir`, hand its archive to `f`, and tear
/// everything down afterwards.
///
/// The staging directory and the archive are scoped temporaries: both are
/// removed on every exit path, including when `f` fails. The archive is a
/// gzip tarball rooted at [`PROJECT_ARCHIVE_NAME`] containing the project
/// tree plus the generated build-instructions file.
pub async fn with_build_context<T, F, Fut>(
    work_dir: &Path,
    dockerfile: &str,
    f: F,
) -> Result<T, CoreError>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let staging = tempfile::tempdir()?;
    let context_dir = staging.path().join(PROJECT_ARCHIVE_NAME);
    copy_recursive(work_dir, &context_dir)?;
    std::fs::write(context_dir.join(GENERATED_DOCKERFILE_NAME), dockerfile)?;

    let archive = tempfile::NamedTempFile::new()?;
    let encoder = GzEncoder::new(archive.reopen()?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(PROJECT_ARCHIVE_NAME, &context_dir)?;
    builder.into_inner()?.finish()?;
    debug!(target: "gantry.docker", context = %archive.path().display(), "build context staged");

    // `staging` and `archive` drop (and delete) regardless of the outcome.
    f(archive.path().to_path_buf()).await
}

/// Build a project image layering `work_dir` onto `base_image`, tagging the
/// owning run with the image URI and id for provenance.
pub async fn build_docker_image(
    work_dir: &Path,
    repository_uri: &str,
    base_image: &str,
    run_id: &str,
    tracking: &dyn TrackingClient,
) -> Result<DockerImage, CoreError> {
    let uri = image_uri(repository_uri, work_dir).await;
    let dockerfile = dockerfile_contents(base_image);

    info!(target: "gantry.docker", image = %uri, "building docker image");
    with_build_context(work_dir, &dockerfile, |context_path| async move {
        let spec = CmdSpec::new("docker").args([
            "build",
            "-t",
            &uri,
            "-f",
            &format!("{PROJECT_ARCHIVE_NAME}/{GENERATED_DOCKERFILE_NAME}"),
            "-",
        ]);
        run_checked_with_stdin(&spec, std::fs::File::open(&context_path)?).await?;

        let inspect = CmdSpec::new("docker").args(["inspect", "--format", "{{.Id}}", &uri]);
        let id = run_checked(&inspect).await?.trim().to_string();

        tracking.set_tag(run_id, tags::DOCKER_IMAGE_URI, &uri).await?;
        tracking.set_tag(run_id, tags::DOCKER_IMAGE_ID, &id).await?;
        Ok(DockerImage { uri, id })
    })
    .await
}

/// Push an image and return its registry digest (`sha256:...`).
pub async fn push_image_to_registry(image_uri: &str) -> Result<String, CoreError> {
    info!(target: "gantry.docker", image = %image_uri, "pushing docker image");
    run_checked(&CmdSpec::new("docker").args(["push", image_uri])).await?;

    let inspect = CmdSpec::new("docker").args([
        "inspect",
        "--format",
        "{{index .RepoDigests 0}}",
        image_uri,
    ]);
    let pinned = run_checked(&inspect).await?.trim().to_string();
    match pinned.split_once('@') {
        Some((_, digest)) => Ok(digest.to_string()),
        None => Err(CoreError::Config(format!(
            "could not resolve registry digest for image '{image_uri}' (got '{pinned}')"
        ))),
    }
}

/// Registry-pinned reference: repository part of `image_uri` at `digest`.
pub fn pinned_image_ref(image_uri: &str, digest: &str) -> String {
    let repository = match image_uri.rsplit_once(':') {
        // A ':' before the last '/' belongs to a registry port, not a tag.
        Some((repo, _)) if !repo.ends_with('/') && !image_uri[repo.len()..].contains('/') => repo,
        _ => image_uri,
    };
    format!("{repository}@{digest}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dockerfile_layers_context_on_base() {
        let df = dockerfile_contents("python:3.7");
        assert_eq!(
            df,
            "FROM python:3.7\n\
             COPY gantry-project-docker-build-context/ /gantry/projects/code/\n\
             WORKDIR /gantry/projects/code/\n"
        );
    }

    #[tokio::test]
    async fn image_uri_without_git_is_bare_repository() {
        let scratch = tempfile::tempdir().unwrap();
        // Not a git repository, so no revision suffix.
        let uri = image_uri("demo-project", scratch.path()).await;
        assert_eq!(uri, "demo-project");
    }

    #[test]
    fn pinned_ref_replaces_tag_with_digest() {
        assert_eq!(
            pinned_image_ref("registry.example.com/demo:abc1234", "sha256:feed"),
            "registry.example.com/demo@sha256:feed"
        );
        assert_eq!(
            pinned_image_ref("registry.example.com:5000/demo", "sha256:feed"),
            "registry.example.com:5000/demo@sha256:feed"
        );
    }

    #[tokio::test]
    async fn build_context_is_removed_after_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let project = scratch.path().join("proj");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("main.py"), "print('hi')").unwrap();

        let seen = std::sync::Arc::new(std::sync::Mutex::new(None::<PathBuf>));
        let seen_in = seen.clone();
        let result: Result<(), CoreError> =
            with_build_context(&project, "FROM scratch\n", |ctx| async move {
                assert!(ctx.exists());
                *seen_in.lock().unwrap() = Some(ctx);
                Err(CoreError::Config("build failed".to_string()))
            })
            .await;

        assert!(result.is_err());
        let ctx = seen.lock().unwrap().take().unwrap();
        assert!(!ctx.exists(), "archive should be deleted on failure");
    }

    #[tokio::test]
    async fn build_context_contains_project_and_dockerfile() {
        let scratch = tempfile::tempdir().unwrap();
        let project = scratch.path().join("proj");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("main.py"), "print('hi')").unwrap();

        let names = with_build_context(&project, "FROM scratch\n", |ctx| async move {
            let file = std::fs::File::open(&ctx)?;
            let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
            let mut names = Vec::new();
            for entry in archive.entries()? {
                names.push(entry?.path()?.display().to_string());
            }
            Ok(names)
        })
        .await
        .unwrap();

        assert!(
            names
                .iter()
                .any(|n| n == &format!("{PROJECT_ARCHIVE_NAME}/main.py")),
            "{names:?}"
        );
        assert!(
            names
                .iter()
                .any(|n| n == &format!("{PROJECT_ARCHIVE_NAME}/{GENERATED_DOCKERFILE_NAME}")),
            "{names:?}"
        );
    }
}
