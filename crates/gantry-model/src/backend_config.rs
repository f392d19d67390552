use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ModelError;

/// Backend-specific key/value options, parsed once per invocation.
///
/// The shape is backend-defined (job-template path, repository URI, run-id
/// reuse key, ...); this type only offers typed access with uniform errors
/// for missing or mistyped keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendConfig(pub Map<String, Value>);

impl BackendConfig {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value under `key`, or `None` when absent.
    ///
    /// A present but non-string value is a configuration error, not a miss.
    pub fn str_key(&self, key: &str) -> Result<Option<&str>, ModelError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ModelError::ConfigKeyType {
                key: key.to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// String value under `key`, failing with the key name when absent.
    pub fn required_str_key(&self, key: &str) -> Result<&str, ModelError> {
        self.str_key(key)?
            .ok_or_else(|| ModelError::MissingConfigKey(key.to_string()))
    }
}

impl FromIterator<(String, Value)> for BackendConfig {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> BackendConfig {
        serde_json::from_value(json!({
            "repository-uri": "registry.example.com/demo",
            "retries": 3,
        }))
        .unwrap()
    }

    #[test]
    fn str_key_present_and_absent() {
        let cfg = config();
        assert_eq!(
            cfg.str_key("repository-uri").unwrap(),
            Some("registry.example.com/demo")
        );
        assert_eq!(cfg.str_key("kube-context").unwrap(), None);
    }

    #[test]
    fn str_key_rejects_non_string() {
        let cfg = config();
        let msg = cfg.str_key("retries").unwrap_err().to_string();
        assert!(msg.contains("retries"), "{msg}");
    }

    #[test]
    fn required_str_key_names_missing_key() {
        let cfg = config();
        let msg = cfg
            .required_str_key("kube-job-template-path")
            .unwrap_err()
            .to_string();
        assert!(msg.contains("kube-job-template-path"), "{msg}");
    }
}
