use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use gantry_exec::{SpawnedChild, kill_group};
use gantry_model::RunStatus;
use gantry_tracking::TrackingClient;

use crate::error::CoreError;

/// Handle to a launched execution.
///
/// Created at launch; moves through `Running` into exactly one terminal
/// state. Callers must not construct two supervisors for one run id.
#[async_trait]
pub trait SubmittedRun: Send {
    fn run_id(&self) -> &str;

    /// Block until the underlying process/job exits; `true` on success.
    async fn wait(&mut self) -> Result<bool, CoreError>;

    /// Request best-effort termination of the underlying process/job.
    async fn cancel(&mut self) -> Result<(), CoreError>;

    /// Current status as observed from the underlying process/job.
    async fn status(&mut self) -> Result<RunStatus, CoreError>;
}

/// A run backed by a local child process (group leader).
///
/// Dropping a still-unwaited handle best-effort kills the whole process
/// group, so an exiting parent does not orphan descendants of an
/// asynchronous launch.
pub struct LocalSubmittedRun {
    run_id: String,
    child: SpawnedChild,
    waited: bool,
}

impl LocalSubmittedRun {
    pub fn new(run_id: impl Into<String>, child: SpawnedChild) -> Self {
        Self {
            run_id: run_id.into(),
            child,
            waited: false,
        }
    }
}

#[async_trait]
impl SubmittedRun for LocalSubmittedRun {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    async fn wait(&mut self) -> Result<bool, CoreError> {
        let status = self.child.child.wait().await.map_err(CoreError::Io)?;
        self.waited = true;
        Ok(status.success())
    }

    async fn cancel(&mut self) -> Result<(), CoreError> {
        if let Some(pgid) = self.child.pgid {
            kill_group(pgid);
        } else {
            let _ = self.child.child.kill().await;
        }
        // Reap so the child does not linger as a zombie.
        let _ = self.child.child.wait().await;
        self.waited = true;
        Ok(())
    }

    async fn status(&mut self) -> Result<RunStatus, CoreError> {
        match self.child.child.try_wait().map_err(CoreError::Io)? {
            None => Ok(RunStatus::Running),
            Some(status) => {
                self.waited = true;
                Ok(if status.success() {
                    RunStatus::Finished
                } else {
                    RunStatus::Failed
                })
            }
        }
    }
}

impl Drop for LocalSubmittedRun {
    fn drop(&mut self) {
        if !self.waited
            && let Some(pgid) = self.child.pgid
        {
            warn!(target: "gantry.run", run_id = %self.run_id, "terminating unwaited run's process group");
            kill_group(pgid);
        }
    }
}

/// Mark the run terminated unless something already did.
///
/// Re-reads current status immediately before writing; user code inside
/// the run may have terminated it first. Not atomic against an independent
/// terminator, but `set_terminated` is idempotent by contract, so the
/// worst case is a redundant no-op write.
pub async fn maybe_set_terminated(
    tracking: &dyn TrackingClient,
    run_id: &str,
    status: RunStatus,
) -> Result<(), CoreError> {
    let current = tracking.get_run(run_id).await?;
    if current.status.is_terminal() {
        return Ok(());
    }
    tracking.set_terminated(run_id, status).await?;
    Ok(())
}

/// Supervise a submitted run to completion, reporting the terminal status
/// to the tracking collaborator exactly once.
///
/// Cancellation interrupts the wait, requests cancellation of the
/// underlying run, marks it `Failed` if not already terminal, and
/// surfaces as [`CoreError::Interrupted`].
pub async fn wait_for(
    run: &mut dyn SubmittedRun,
    tracking: &dyn TrackingClient,
    cancel: &CancellationToken,
) -> Result<(), CoreError> {
    let run_id = run.run_id().to_string();
    let outcome = tokio::select! {
        result = run.wait() => Some(result),
        _ = cancel.cancelled() => None,
    };

    match outcome {
        Some(Ok(true)) => {
            info!(target: "gantry.run", %run_id, "run succeeded");
            maybe_set_terminated(tracking, &run_id, RunStatus::Finished).await?;
            Ok(())
        }
        Some(Ok(false)) => {
            maybe_set_terminated(tracking, &run_id, RunStatus::Failed).await?;
            Err(CoreError::RunFailed(run_id))
        }
        Some(Err(e)) => {
            maybe_set_terminated(tracking, &run_id, RunStatus::Failed).await?;
            Err(e)
        }
        None => {
            error!(target: "gantry.run", %run_id, "interrupted, cancelling run");
            if let Err(e) = run.cancel().await {
                warn!(target: "gantry.run", %run_id, error = %e, "cancel failed");
            }
            maybe_set_terminated(tracking, &run_id, RunStatus::Failed).await?;
            Err(CoreError::Interrupted(run_id))
        }
    }
}
