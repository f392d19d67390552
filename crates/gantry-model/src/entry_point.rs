use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Declared type of an entry-point parameter.
///
/// `Path` and `Uri` parameters are data references: the command assembler
/// resolves them against artifact storage before the command is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamKind {
    String,
    Float,
    Path,
    Uri,
}

impl ParamKind {
    /// Returns `true` for parameter kinds that reference stored data.
    pub fn is_data(&self) -> bool {
        matches!(self, ParamKind::Path | ParamKind::Uri)
    }
}

/// Schema of a single entry-point parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub kind: ParamKind,
    /// Default value applied when the caller supplies none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// A named, parameterized command template declared by a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    /// Command template with `{name}` placeholders for declared parameters.
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterSpec>,
}

impl EntryPoint {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.parameters.insert(
            name.into(),
            ParameterSpec {
                kind,
                default: None,
            },
        );
        self
    }

    pub fn with_param_default(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        default: impl Into<String>,
    ) -> Self {
        self.parameters.insert(
            name.into(),
            ParameterSpec {
                kind,
                default: Some(default.into()),
            },
        );
        self
    }

    /// Split user parameters into declared values (defaults applied) and
    /// extras, failing if any declared parameter without a default is absent.
    ///
    /// Values are returned raw: data-typed values still need resolution
    /// against artifact storage before rendering.
    pub fn partition_params(
        &self,
        user: &BTreeMap<String, String>,
    ) -> Result<(BTreeMap<String, String>, BTreeMap<String, String>), ModelError> {
        let missing: Vec<&str> = self
            .parameters
            .iter()
            .filter(|(name, spec)| !user.contains_key(*name) && spec.default.is_none())
            .map(|(name, _)| name.as_str())
            .collect();
        if !missing.is_empty() {
            let listed = missing
                .iter()
                .map(|name| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ModelError::MissingParameters(listed));
        }

        let mut declared = BTreeMap::new();
        for (name, spec) in &self.parameters {
            let value = user
                .get(name)
                .cloned()
                .or_else(|| spec.default.clone())
                .unwrap_or_default();
            declared.insert(name.clone(), value);
        }
        let extra: BTreeMap<String, String> = user
            .iter()
            .filter(|(name, _)| !self.parameters.contains_key(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Ok((declared, extra))
    }

    /// Instantiate the command template with resolved parameter values.
    ///
    /// Declared values replace their `{name}` placeholders; extras are
    /// appended as `--name value` in name order. Every value is shell-quoted.
    pub fn render(
        &self,
        declared: &BTreeMap<String, String>,
        extra: &BTreeMap<String, String>,
    ) -> String {
        let mut command = self.command.clone();
        for (name, value) in declared {
            command = command.replace(&format!("{{{name}}}"), &shell_quote(value));
        }
        for (name, value) in extra {
            command.push_str(&format!(" --{name} {}", shell_quote(value)));
        }
        command
    }

    /// The parameter spec declared under `name`, if any.
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.get(name)
    }
}

/// Quote a value for inclusion in a POSIX shell command line.
///
/// Values made of unambiguous characters pass through untouched; everything
/// else is wrapped in single quotes with embedded quotes escaped.
pub fn shell_quote(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    let safe = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r#"'"'"'"#))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train_entry_point() -> EntryPoint {
        EntryPoint::new("python train.py {alpha} {data}")
            .with_param_default("alpha", ParamKind::Float, "0.5")
            .with_param("data", ParamKind::Path)
    }

    #[test]
    fn partition_applies_defaults() {
        let ep = train_entry_point();
        let user: BTreeMap<_, _> = [("data".to_string(), "/tmp/in".to_string())].into();

        let (declared, extra) = ep.partition_params(&user).unwrap();
        assert_eq!(declared.get("alpha").map(String::as_str), Some("0.5"));
        assert_eq!(declared.get("data").map(String::as_str), Some("/tmp/in"));
        assert!(extra.is_empty());
    }

    #[test]
    fn partition_reports_all_missing() {
        let ep = EntryPoint::new("run {a} {b}")
            .with_param("a", ParamKind::String)
            .with_param("b", ParamKind::String);

        let err = ep.partition_params(&BTreeMap::new()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'a'"), "{msg}");
        assert!(msg.contains("'b'"), "{msg}");
    }

    #[test]
    fn partition_splits_extras() {
        let ep = train_entry_point();
        let user: BTreeMap<_, _> = [
            ("data".to_string(), "/tmp/in".to_string()),
            ("epochs".to_string(), "10".to_string()),
        ]
        .into();

        let (_, extra) = ep.partition_params(&user).unwrap();
        assert_eq!(extra.get("epochs").map(String::as_str), Some("10"));
    }

    #[test]
    fn render_substitutes_and_appends_extras_sorted() {
        let ep = train_entry_point();
        let declared: BTreeMap<_, _> = [
            ("alpha".to_string(), "0.5".to_string()),
            ("data".to_string(), "/tmp/in".to_string()),
        ]
        .into();
        let extra: BTreeMap<_, _> = [
            ("zeta".to_string(), "z".to_string()),
            ("epochs".to_string(), "10".to_string()),
        ]
        .into();

        let cmd = ep.render(&declared, &extra);
        assert_eq!(cmd, "python train.py 0.5 /tmp/in --epochs 10 --zeta z");
    }

    #[test]
    fn render_quotes_unsafe_values() {
        let ep = EntryPoint::new("run {msg}").with_param("msg", ParamKind::String);
        let declared: BTreeMap<_, _> = [("msg".to_string(), "hello world".to_string())].into();

        let cmd = ep.render(&declared, &BTreeMap::new());
        assert_eq!(cmd, "run 'hello world'");
    }

    #[test]
    fn shell_quote_rules() {
        assert_eq!(shell_quote("plain-value_1.0"), "plain-value_1.0");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r#"'it'"'"'s'"#);
    }
}
