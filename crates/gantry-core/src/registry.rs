use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use gantry_model::BackendConfig;

use crate::error::CoreError;
use crate::submitted::SubmittedRun;

/// A pluggable execution backend.
///
/// A registered backend owns its run end to end: project resolution,
/// provisioning, and launch all happen behind `run`; the dispatcher only
/// tags the resulting run with the backend name.
#[async_trait]
pub trait ProjectBackend: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        uri: &str,
        entry_point: &str,
        params: &BTreeMap<String, String>,
        version: Option<&str>,
        backend_config: &BackendConfig,
        experiment_id: &str,
        tracking_uri: &str,
    ) -> Result<Box<dyn SubmittedRun>, CoreError>;
}

/// Name-keyed registry of pluggable backends, resolved once at dispatch
/// start.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn ProjectBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn ProjectBackend>) {
        self.backends.insert(name.into(), backend);
    }

    pub fn load(&self, name: &str) -> Option<Arc<dyn ProjectBackend>> {
        self.backends.get(name).cloned()
    }

    /// Registered backend names, sorted for stable error messages.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }
}
