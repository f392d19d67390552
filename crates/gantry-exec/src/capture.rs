use std::process::Output;

use tracing::trace;

use crate::error::ExecError;
use crate::spec::CmdSpec;

/// Run a command to completion, capturing stdout and stderr.
///
/// A nonzero exit is not an error here; use [`run_checked`] for that.
pub async fn run_and_capture(spec: &CmdSpec) -> Result<Output, ExecError> {
    trace!(target: "gantry.exec", program = %spec.program, args = ?spec.args, "exec");
    spec.command()
        .output()
        .await
        .map_err(|e| ExecError::from_spawn(&spec.program, e))
}

/// Run a command, treating a nonzero exit as an error carrying the tool's
/// stderr verbatim. Returns captured stdout on success.
pub async fn run_checked(spec: &CmdSpec) -> Result<String, ExecError> {
    let output = run_and_capture(spec).await?;
    if !output.status.success() {
        return Err(ExecError::NonZeroExit {
            program: spec.program.clone(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Like [`run_checked`], but with the command's stdin fed from a file.
pub async fn run_checked_with_stdin(
    spec: &CmdSpec,
    stdin: std::fs::File,
) -> Result<String, ExecError> {
    trace!(target: "gantry.exec", program = %spec.program, args = ?spec.args, "exec (stdin from file)");
    let mut cmd = spec.command();
    cmd.stdin(std::process::Stdio::from(stdin));
    let output = cmd
        .output()
        .await
        .map_err(|e| ExecError::from_spawn(&spec.program, e))?;
    if !output.status.success() {
        return Err(ExecError::NonZeroExit {
            program: spec.program.clone(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Check that a tool can be invoked at all.
///
/// The exit code is ignored: many tools exit nonzero on `--help`. Only a
/// failure to spawn (tool absent) surfaces.
pub async fn probe(program: &str, args: &[&str]) -> Result<(), ExecError> {
    let spec = CmdSpec::new(program).args(args.iter().copied());
    run_and_capture(&spec).await.map(|_| ())
}
