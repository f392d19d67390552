//! Well-known run tag names written through the tracking collaborator.

/// Backend the run was dispatched to (`local`, `kubernetes`, plugin name).
pub const PROJECT_BACKEND: &str = "gantry.project.backend";

/// Environment kind the run executes in (`docker`, `conda`).
pub const PROJECT_ENV: &str = "gantry.project.env";

/// Entry point the run was launched with.
pub const PROJECT_ENTRY_POINT: &str = "gantry.project.entryPoint";

/// Full URI of the image the run executes in.
pub const DOCKER_IMAGE_URI: &str = "gantry.docker.image.uri";

/// Builder-assigned identifier of that image.
pub const DOCKER_IMAGE_ID: &str = "gantry.docker.image.id";

/// Project name as declared by the descriptor.
pub const SOURCE_NAME: &str = "gantry.source.name";

/// Git revision of the project working directory, when resolvable.
pub const SOURCE_GIT_COMMIT: &str = "gantry.source.git.commit";

/// Hostname of the machine that submitted the run.
pub const SUBMITTING_HOST: &str = "gantry.host";
