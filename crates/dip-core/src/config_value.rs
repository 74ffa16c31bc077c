use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single scalar value inside an application's Helm-values overlay.
/// Kept as a closed set (string/number/bool) rather than raw `serde_json::Value`
/// so that template rendering can reject types tera can't coerce predictably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl ConfigValue {
    pub fn as_tera_value(&self) -> tera::Value {
        match self {
            ConfigValue::String(s) => tera::Value::String(s.clone()),
            ConfigValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(tera::Value::Number)
                .unwrap_or(tera::Value::Null),
            ConfigValue::Bool(b) => tera::Value::Bool(*b),
        }
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::Number(n) => write!(f, "{n}"),
            ConfigValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// User-supplied configuration overrides for a deployment, keyed by the
/// dotted path the catalog descriptor expects (e.g. `"executor.replicas"`).
pub type ConfigMap = BTreeMap<String, ConfigValue>;
