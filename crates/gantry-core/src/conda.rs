use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use gantry_exec::{CmdSpec, HostEnv, run_checked};

use crate::consts::{CONDA_EXE_ENV_VAR, CONDA_HOME_ENV_VAR};
use crate::envkey::environment_name;
use crate::error::CoreError;

/// Ensures named conda environments exist for dependency specs.
///
/// Environment identity is the content hash of the spec file, so the same
/// spec always resolves to the same environment and a second `ensure` is a
/// cache hit. Creation is synchronous and blocking: callers serialize on it
/// before launching work, which keeps concurrent creators of the *same*
/// environment from racing (the name collision is the synchronization
/// point, conda treats the duplicate as a harmless failure-to-add).
pub struct CondaProvisioner {
    conda_home: Option<PathBuf>,
    conda_exe: Option<PathBuf>,
}

#[derive(Deserialize)]
struct CondaEnvList {
    envs: Vec<PathBuf>,
}

impl CondaProvisioner {
    /// Resolve the tool location from the submitting host's environment:
    /// the home-directory override, then conda's own active-installation
    /// variable, then the bare name on PATH.
    pub fn from_host_env(env: &HostEnv) -> Self {
        Self {
            conda_home: env.get(CONDA_HOME_ENV_VAR).map(PathBuf::from),
            conda_exe: env.get(CONDA_EXE_ENV_VAR).map(PathBuf::from),
        }
    }

    pub fn with_conda_home(home: impl Into<PathBuf>) -> Self {
        Self {
            conda_home: Some(home.into()),
            conda_exe: None,
        }
    }

    /// Path of an executable in the conda installation's `bin` directory.
    fn conda_bin(&self, executable: &str) -> PathBuf {
        if let Some(home) = &self.conda_home {
            return home.join("bin").join(executable);
        }
        if let Some(exe) = &self.conda_exe
            && let Some(dir) = exe.parent()
        {
            return dir.join(executable);
        }
        PathBuf::from(executable)
    }

    fn conda_executable(&self) -> PathBuf {
        self.conda_bin("conda")
    }

    /// Verify the tool is reachable; fatal with a remediation hint if not.
    pub async fn validate(&self) -> Result<(), CoreError> {
        let conda = self.conda_executable();
        match gantry_exec::probe(&conda.to_string_lossy(), &["--help"]).await {
            Ok(()) => Ok(()),
            Err(gantry_exec::ExecError::ToolNotFound { .. }) => Err(CoreError::ToolNotFound {
                tool: "conda".to_string(),
                hint: format!(
                    "Ensure conda is installed, or point the {CONDA_HOME_ENV_VAR} environment \
                     variable at your conda installation (tried '{}')",
                    conda.display()
                ),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Ensure an environment for `spec_path` exists, returning its name.
    ///
    /// An absent spec file hashes as empty content and yields a bare
    /// python environment.
    pub async fn ensure(
        &self,
        spec_path: Option<&Path>,
        discriminator: Option<&str>,
    ) -> Result<String, CoreError> {
        let spec_bytes = match spec_path {
            Some(path) => std::fs::read(path)?,
            None => Vec::new(),
        };
        let env_name = environment_name(&spec_bytes, discriminator);

        self.validate().await?;

        let conda = self.conda_executable().to_string_lossy().into_owned();
        let listing =
            run_checked(&CmdSpec::new(&conda).args(["env", "list", "--json"])).await?;
        let existing: CondaEnvList = serde_json::from_str(&listing)?;
        let present = existing.envs.iter().any(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy() == env_name)
                .unwrap_or(false)
        });
        if present {
            return Ok(env_name);
        }

        info!(target: "gantry.conda", env = %env_name, "creating conda environment");
        let create = match spec_path {
            Some(path) => CmdSpec::new(&conda)
                .args(["env", "create", "-n", &env_name, "--file"])
                .arg(path.to_string_lossy()),
            None => CmdSpec::new(&conda).args(["create", "-n", &env_name, "python"]),
        };
        run_checked(&create).await?;
        Ok(env_name)
    }

    /// Shell fragment activating `env_name`, for prefixing the entry-point
    /// command. Activation output goes to stderr so the entry point owns
    /// stdout.
    pub fn activate_commands(&self, env_name: &str) -> Vec<String> {
        cfg_if::cfg_if! {
            if #[cfg(target_family = "windows")] {
                vec![format!("conda activate {env_name}")]
            } else {
                if self.conda_home.is_some() || self.conda_exe.is_some() {
                    let conda_dir = self
                        .conda_executable()
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    vec![
                        format!("source {}/../etc/profile.d/conda.sh", conda_dir.display()),
                        format!("conda activate {env_name} 1>&2"),
                    ]
                } else {
                    let activate = self.conda_bin("activate");
                    vec![format!("source {} {env_name} 1>&2", activate.display())]
                }
            }
        }
    }
}
