use serde::{Deserialize, Serialize};

/// Lifecycle state of a project run as recorded by the tracking service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// Run has been submitted but the executor has not started it yet.
    Scheduled,
    /// Run is currently executing.
    Running,
    /// Run completed successfully.
    Finished,
    /// Run failed or was marked failed after an interruption.
    Failed,
    /// Run was explicitly killed.
    Killed,
}

impl RunStatus {
    /// Returns `true` if the run is in a terminal state.
    ///
    /// Terminal states are absorbing: the tracking collaborator treats any
    /// further `set_terminated` on such a run as a no-op.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Finished | RunStatus::Failed | RunStatus::Killed
        )
    }

    /// Returns `true` if the run may still transition (scheduled or running).
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Scheduled | RunStatus::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(RunStatus::Finished.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Killed.is_terminal());

        assert!(!RunStatus::Scheduled.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn active_states() {
        assert!(RunStatus::Scheduled.is_active());
        assert!(RunStatus::Running.is_active());

        assert!(!RunStatus::Finished.is_active());
        assert!(!RunStatus::Killed.is_active());
    }

    #[test]
    fn serde_roundtrip() {
        let status = RunStatus::Running;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#""running""#);

        let back: RunStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
