use tokio::process::Child;
use tracing::debug;

use crate::error::ExecError;
use crate::spec::CmdSpec;

/// A spawned child together with its process-group id (unix only).
pub struct SpawnedChild {
    pub child: Child,
    pub pgid: Option<i32>,
}

/// Spawn a command as the leader of its own process group.
///
/// Group leadership lets cancellation reach every descendant the child
/// forks, not just the child itself. On non-unix platforms the child is
/// spawned plainly and `pgid` is `None`.
pub fn spawn_in_group(spec: &CmdSpec) -> Result<SpawnedChild, ExecError> {
    let mut cmd = spec.command();
    cmd.kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd
        .spawn()
        .map_err(|e| ExecError::from_spawn(&spec.program, e))?;
    #[cfg(unix)]
    let pgid = child.id().map(|id| id as i32);
    #[cfg(not(unix))]
    let pgid = None;
    debug!(target: "gantry.exec", program = %spec.program, pid = ?child.id(), "spawned");
    Ok(SpawnedChild { child, pgid })
}

/// Best-effort termination of a whole process group: SIGTERM first, then
/// SIGKILL. Safe to call from `Drop`.
#[cfg(unix)]
pub fn kill_group(pgid: i32) {
    unsafe {
        libc::killpg(pgid, libc::SIGTERM);
        libc::killpg(pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
pub fn kill_group(_pgid: i32) {}

/// Terminate a single child: SIGTERM on unix, then a hard kill.
pub async fn kill_graceful(child: &mut Child) -> std::io::Result<()> {
    #[cfg(unix)]
    if let Some(id) = child.id() {
        unsafe {
            libc::kill(id as i32, libc::SIGTERM);
        }
    }
    let _ = child.kill().await;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_runs_and_exits() {
        let spec = CmdSpec::new("true");
        let mut spawned = spawn_in_group(&spec).unwrap();
        assert!(spawned.pgid.is_some());
        let status = spawned.child.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn kill_group_stops_sleeping_child() {
        let spec = CmdSpec::new("sleep").arg("30");
        let mut spawned = spawn_in_group(&spec).unwrap();
        let pgid = spawned.pgid.unwrap();

        kill_group(pgid);
        let status = spawned.child.wait().await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn kill_graceful_stops_child() {
        let spec = CmdSpec::new("sleep").arg("30");
        let mut spawned = spawn_in_group(&spec).unwrap();

        kill_graceful(&mut spawned.child).await.unwrap();
        let status = spawned.child.wait().await.unwrap();
        assert!(!status.success());
    }
}
