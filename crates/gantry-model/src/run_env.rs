use serde::{Deserialize, Serialize};

use crate::KeyValue;

/// Ordered list of environment variables assembled for a launched run.
///
/// Stored as key-value pairs and serialized as a transparent array. A fresh
/// `RunEnv` is assembled per run and never cached: values may embed
/// credentials resolved at launch time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunEnv(pub Vec<KeyValue>);

impl RunEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Get the value for a key, returning the last matching entry.
    ///
    /// Scanning from the end gives later entries override semantics, so
    /// merged environments resolve naturally.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    /// Append a pair. Later entries override earlier ones when queried.
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Concatenate two environments; entries from `other` override ours.
    pub fn merged(&self, other: &RunEnv) -> RunEnv {
        let mut out = self.0.clone();
        out.extend(other.0.clone());
        RunEnv(out)
    }

    /// Deduplicated view with override semantics applied, insertion-ordered
    /// by the first occurrence of each key.
    pub fn resolved(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::new();
        for kv in &self.0 {
            match out.iter_mut().find(|(k, _)| k == kv.key()) {
                Some((_, v)) => *v = kv.value().to_string(),
                None => out.push((kv.key().to_string(), kv.value().to_string())),
            }
        }
        out
    }
}

impl<K, V> FromIterator<(K, V)> for RunEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| KeyValue::new(k, v))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::RunEnv;

    #[test]
    fn env_new_is_empty() {
        let env = RunEnv::new();
        assert!(env.is_empty());
        assert!(env.get("FOO").is_none());
    }

    #[test]
    fn env_push_and_override_last_wins() {
        let mut env = RunEnv::new();
        env.push("FOO", "one");
        env.push("BAR", "x");
        env.push("FOO", "two");

        assert_eq!(env.get("FOO"), Some("two"));
        assert_eq!(env.get("BAR"), Some("x"));
        assert!(env.get("BAZ").is_none());
    }

    #[test]
    fn env_merged_other_overrides_base() {
        let base: RunEnv = [("FOO", "base"), ("BAR", "bar")].into_iter().collect();
        let other: RunEnv = [("FOO", "override"), ("BAZ", "baz")].into_iter().collect();

        let merged = base.merged(&other);

        assert_eq!(merged.get("FOO"), Some("override"));
        assert_eq!(merged.get("BAR"), Some("bar"));
        assert_eq!(merged.get("BAZ"), Some("baz"));
    }

    #[test]
    fn env_resolved_applies_overrides_in_place() {
        let env: RunEnv = [("A", "1"), ("B", "2"), ("A", "3")].into_iter().collect();
        let resolved = env.resolved();

        assert_eq!(
            resolved,
            vec![("A".to_string(), "3".to_string()), ("B".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn serde_transparent_roundtrip_json() {
        let env: RunEnv = [("FOO", "bar")].into_iter().collect();

        let json = serde_json::to_string(&env).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("\"key\":\"FOO\""));

        let back: RunEnv = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("FOO"), Some("bar"));
    }
}
