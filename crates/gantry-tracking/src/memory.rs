use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use gantry_model::{ExperimentId, RunStatus};

use crate::client::{RunRecord, TrackingClient};
use crate::error::TrackingError;

/// In-memory tracking store.
///
/// Backs tests and the demo CLI wiring; not a durable store. Counts every
/// effective termination per run so tests can assert the exactly-once
/// property of terminal-status reporting.
pub struct InMemoryTracking {
    tracking_uri: String,
    artifact_root: String,
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    runs: HashMap<String, RunRecord>,
    tags: HashMap<String, BTreeMap<String, String>>,
    experiments: HashMap<String, ExperimentId>,
    terminations: HashMap<String, usize>,
    next_experiment: u64,
}

impl InMemoryTracking {
    pub fn new(tracking_uri: impl Into<String>, artifact_root: impl Into<String>) -> Self {
        Self {
            tracking_uri: tracking_uri.into(),
            artifact_root: artifact_root.into(),
            inner: Arc::new(RwLock::new(Inner {
                next_experiment: 1,
                ..Inner::default()
            })),
        }
    }

    /// Value of tag `key` on `run_id`, if set.
    pub async fn tag(&self, run_id: &str, key: &str) -> Option<String> {
        let inner = self.inner.read().await;
        inner.tags.get(run_id).and_then(|t| t.get(key)).cloned()
    }

    /// Number of `set_terminated` calls that actually changed the run.
    pub async fn termination_count(&self, run_id: &str) -> usize {
        let inner = self.inner.read().await;
        inner.terminations.get(run_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl TrackingClient for InMemoryTracking {
    async fn create_run(&self, experiment_id: &str) -> Result<RunRecord, TrackingError> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let record = RunRecord {
            run_id: run_id.clone(),
            experiment_id: experiment_id.to_string(),
            status: RunStatus::Running,
            artifact_uri: format!("{}/{experiment_id}/{run_id}/artifacts", self.artifact_root),
        };

        let mut inner = self.inner.write().await;
        inner.runs.insert(run_id, record.clone());
        Ok(record)
    }

    async fn get_run(&self, run_id: &str) -> Result<RunRecord, TrackingError> {
        let inner = self.inner.read().await;
        inner
            .runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| TrackingError::RunNotFound(run_id.to_string()))
    }

    async fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<(), TrackingError> {
        let mut inner = self.inner.write().await;
        if !inner.runs.contains_key(run_id) {
            return Err(TrackingError::RunNotFound(run_id.to_string()));
        }
        inner
            .tags
            .entry(run_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_terminated(&self, run_id: &str, status: RunStatus) -> Result<(), TrackingError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| TrackingError::RunNotFound(run_id.to_string()))?;

        // Terminal states are absorbing: a second terminator is a no-op.
        if record.status.is_terminal() {
            return Ok(());
        }
        record.status = status;
        *inner.terminations.entry(run_id.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn experiment_id_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ExperimentId>, TrackingError> {
        let inner = self.inner.read().await;
        Ok(inner.experiments.get(name).cloned())
    }

    async fn create_experiment(&self, name: &str) -> Result<ExperimentId, TrackingError> {
        let mut inner = self.inner.write().await;
        let id = inner.next_experiment.to_string();
        inner.next_experiment += 1;
        inner.experiments.insert(name.to_string(), id.clone());
        Ok(id)
    }

    fn tracking_uri(&self) -> &str {
        &self.tracking_uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryTracking {
        InMemoryTracking::new("file:./gruns", "file:./gruns")
    }

    #[tokio::test]
    async fn create_and_get_run() {
        let tracking = store();
        let record = tracking.create_run("0").await.unwrap();

        assert_eq!(record.status, RunStatus::Running);
        assert!(record.artifact_uri.ends_with(&format!("{}/artifacts", record.run_id)));

        let back = tracking.get_run(&record.run_id).await.unwrap();
        assert_eq!(back, record);
    }

    #[tokio::test]
    async fn get_unknown_run_fails() {
        let tracking = store();
        let err = tracking.get_run("missing").await.unwrap_err();
        assert!(matches!(err, TrackingError::RunNotFound(_)));
    }

    #[tokio::test]
    async fn set_terminated_is_idempotent() {
        let tracking = store();
        let record = tracking.create_run("0").await.unwrap();

        tracking
            .set_terminated(&record.run_id, RunStatus::Finished)
            .await
            .unwrap();
        tracking
            .set_terminated(&record.run_id, RunStatus::Failed)
            .await
            .unwrap();

        let back = tracking.get_run(&record.run_id).await.unwrap();
        assert_eq!(back.status, RunStatus::Finished);
        assert_eq!(tracking.termination_count(&record.run_id).await, 1);
    }

    #[tokio::test]
    async fn tags_are_recorded() {
        let tracking = store();
        let record = tracking.create_run("0").await.unwrap();

        tracking
            .set_tag(&record.run_id, crate::tags::PROJECT_BACKEND, "local")
            .await
            .unwrap();

        assert_eq!(
            tracking.tag(&record.run_id, crate::tags::PROJECT_BACKEND).await,
            Some("local".to_string())
        );
    }

    #[tokio::test]
    async fn experiment_lookup_and_create() {
        let tracking = store();
        assert_eq!(tracking.experiment_id_by_name("demo").await.unwrap(), None);

        let id = tracking.create_experiment("demo").await.unwrap();
        assert_eq!(
            tracking.experiment_id_by_name("demo").await.unwrap(),
            Some(id)
        );
    }
}
