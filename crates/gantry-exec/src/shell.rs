use std::path::Path;

use crate::spec::CmdSpec;

/// Build the host-shell invocation of a script string.
///
/// `bash -c` on unix-family hosts, `cmd /C` on windows.
pub fn shell_cmd(script: &str, cwd: Option<&Path>) -> CmdSpec {
    cfg_if::cfg_if! {
        if #[cfg(target_family = "windows")] {
            let mut spec = CmdSpec::new("cmd").arg("/C").arg(script);
        } else {
            let mut spec = CmdSpec::new("bash").arg("-c").arg(script);
        }
    }
    if let Some(cwd) = cwd {
        spec = spec.cwd(cwd);
    }
    spec
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn unix_shell_is_bash_dash_c() {
        let spec = shell_cmd("echo hi && true", None);
        assert_eq!(spec.program, "bash");
        assert_eq!(spec.args, vec!["-c", "echo hi && true"]);
    }

    #[tokio::test]
    async fn shell_cmd_runs_in_cwd() {
        let spec = shell_cmd("pwd", Some(Path::new("/")));
        let out = crate::capture::run_checked(&spec).await.unwrap();
        assert_eq!(out.trim(), "/");
    }
}
