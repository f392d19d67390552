use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gantry_model::{ExperimentId, RunId, RunStatus};

use crate::error::TrackingError;

/// Snapshot of a run record as held by the tracking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: RunId,
    pub experiment_id: ExperimentId,
    pub status: RunStatus,
    /// Root URI under which the run's artifacts are stored.
    pub artifact_uri: String,
}

/// The external service of record for run status, tags, and artifacts.
///
/// The core never mutates run state except through this interface.
/// `set_terminated` is contractually idempotent: terminal states are
/// absorbing, so setting a terminal status on an already-terminal run is a
/// no-op rather than an overwrite.
#[async_trait]
pub trait TrackingClient: Send + Sync {
    /// Create a fresh run under `experiment_id`, initially `Running`.
    async fn create_run(&self, experiment_id: &str) -> Result<RunRecord, TrackingError>;

    async fn get_run(&self, run_id: &str) -> Result<RunRecord, TrackingError>;

    async fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<(), TrackingError>;

    /// Move the run to a terminal status unless it already reached one.
    async fn set_terminated(&self, run_id: &str, status: RunStatus) -> Result<(), TrackingError>;

    /// Id of the experiment named `name`, if it exists.
    async fn experiment_id_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ExperimentId>, TrackingError>;

    async fn create_experiment(&self, name: &str) -> Result<ExperimentId, TrackingError>;

    /// URI of this tracking service, injected into every launched run.
    fn tracking_uri(&self) -> &str;
}
