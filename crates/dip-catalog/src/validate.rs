//! Config validation (§4.7): given an application descriptor and a user
//! config mapping, return the list of missing/invalid fields. Evaluated
//! against the same mapping conditional visibility is defined over, so a
//! hidden field is treated as absent rather than validated.

use dip_core::{ConfigMap, ConfigValue};

use crate::descriptor::{ApplicationDescriptor, ConfigOptionType};

fn field_as_str(config: &ConfigMap, id: &str) -> Option<String> {
    config.get(id).map(|v| v.to_string())
}

fn field_as_bool(config: &ConfigMap, id: &str) -> bool {
    match config.get(id) {
        Some(ConfigValue::Bool(b)) => *b,
        Some(ConfigValue::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// A field is visible iff it has no `conditional`, or its conditional
/// predicate evaluates true against the same config mapping (spec.md §4.7:
/// "a hidden field is treated as absent").
fn is_visible(option: &crate::descriptor::ConfigOption, config: &ConfigMap) -> bool {
    match &option.conditional {
        None => true,
        Some(cond) => field_as_str(config, &cond.field).as_deref() == Some(cond.value.as_str()),
    }
}

fn type_matches(option_type: ConfigOptionType, value: &ConfigValue) -> bool {
    match (option_type, value) {
        (ConfigOptionType::Boolean, ConfigValue::Bool(_)) => true,
        (ConfigOptionType::Number, ConfigValue::Number(_)) => true,
        (ConfigOptionType::Text | ConfigOptionType::Select, ConfigValue::String(_)) => true,
        // A boolean/number option represented as a stringified scalar is
        // still acceptable wire-format leniency, not a type error.
        (ConfigOptionType::Boolean, ConfigValue::String(s)) => {
            s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false")
        }
        (ConfigOptionType::Number, ConfigValue::String(s)) => s.parse::<f64>().is_ok(),
        _ => false,
    }
}

/// Returns `Ok(())` when the config satisfies every visible, required field
/// and every per-application special rule; otherwise `Err(reasons)` with one
/// human-readable entry per violation. Called twice with the same input
/// (admission, then re-validation on update) must yield the same outcome
/// (§8's "Validation idempotence" law) — this function is pure.
pub fn validate_config(app: &ApplicationDescriptor, config: &ConfigMap) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    for option in &app.config_options {
        if !is_visible(option, config) {
            continue;
        }
        match config.get(&option.id) {
            Some(value) => {
                if !type_matches(option.option_type, value) {
                    errors.push(format!("field '{}' has the wrong type", option.id));
                }
                if option.option_type == ConfigOptionType::Select
                    && !option.fetched_versions
                    && !option.select_options.is_empty()
                {
                    let s = value.to_string();
                    if !option.select_options.iter().any(|o| o == &s) {
                        errors.push(format!("field '{}' must be one of {:?}", option.id, option.select_options));
                    }
                }
            }
            None => {
                if option.required {
                    errors.push(format!("field '{}' is required", option.id));
                }
            }
        }
    }

    apply_special_rules(app, config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Per-application special rules (§4.7): rules that don't fit the generic
/// schema (type/required/conditional) and are hand-written per descriptor.
fn apply_special_rules(app: &ApplicationDescriptor, config: &ConfigMap, errors: &mut Vec<String>) {
    match app.short_name.as_str() {
        "airflow" => {
            if let Some(url) = field_as_str(config, "dags_repository_url") {
                let valid = url.starts_with("http://") || url.starts_with("https://") || url.starts_with("git@");
                if !valid {
                    errors.push("dags_repository_url must start with http(s):// or git@".to_string());
                }
            }
            if field_as_bool(config, "custom_image_enabled") {
                if field_as_str(config, "custom_image_registry").is_none() {
                    errors.push("custom_image_registry is required when custom_image_enabled is true".to_string());
                }
                if field_as_str(config, "custom_image_tag").is_none() {
                    errors.push("custom_image_tag is required when custom_image_enabled is true".to_string());
                }
            }
        }
        "spark" => {
            let min = field_as_str(config, "min_workers").and_then(|s| s.parse::<i64>().ok());
            let max = field_as_str(config, "max_workers").and_then(|s| s.parse::<i64>().ok());
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    errors.push("min_workers must be <= max_workers".to_string());
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{AccessEndpointDescriptor, ConfigOption};
    use dip_core::AccessType;
    use std::collections::BTreeMap;

    fn airflow() -> ApplicationDescriptor {
        ApplicationDescriptor {
            short_name: "airflow".to_string(),
            display_name: "Apache Airflow".to_string(),
            default_version: "2.9.3".to_string(),
            config_options: vec![
                ConfigOption {
                    id: "dags_repository_url".to_string(),
                    option_type: ConfigOptionType::Text,
                    required: true,
                    default: None,
                    select_options: vec![],
                    fetched_versions: false,
                    conditional: None,
                },
                ConfigOption {
                    id: "custom_image_enabled".to_string(),
                    option_type: ConfigOptionType::Boolean,
                    required: false,
                    default: Some("false".to_string()),
                    select_options: vec![],
                    fetched_versions: false,
                    conditional: None,
                },
                ConfigOption {
                    id: "custom_image_registry".to_string(),
                    option_type: ConfigOptionType::Text,
                    required: false,
                    default: None,
                    select_options: vec![],
                    fetched_versions: false,
                    conditional: Some(crate::descriptor::Conditional {
                        field: "custom_image_enabled".to_string(),
                        value: "true".to_string(),
                    }),
                },
            ],
            volume_requirements: vec![],
            access_endpoints: vec![AccessEndpointDescriptor {
                name: "webserver".to_string(),
                description: "UI".to_string(),
                default_access_type: AccessType::DomainPath,
                default_value: "/airflow".to_string(),
                required: true,
            }],
            artifact_bundle_path: "airflow".to_string(),
        }
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let app = airflow();
        let config: BTreeMap<_, _> = BTreeMap::new();
        let errors = validate_config(&app, &config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("dags_repository_url")));
    }

    #[test]
    fn hidden_conditional_field_is_not_required() {
        let app = airflow();
        let mut config = BTreeMap::new();
        config.insert("dags_repository_url".to_string(), ConfigValue::String("https://x".to_string()));
        assert!(validate_config(&app, &config).is_ok());
    }

    #[test]
    fn custom_image_gates_registry_fields() {
        let app = airflow();
        let mut config = BTreeMap::new();
        config.insert("dags_repository_url".to_string(), ConfigValue::String("https://x".to_string()));
        config.insert("custom_image_enabled".to_string(), ConfigValue::Bool(true));
        let errors = validate_config(&app, &config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("custom_image_registry")));
    }

    #[test]
    fn bad_repo_scheme_is_rejected() {
        let app = airflow();
        let mut config = BTreeMap::new();
        config.insert("dags_repository_url".to_string(), ConfigValue::String("ftp://x".to_string()));
        let errors = validate_config(&app, &config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("http(s)")));
    }

    #[test]
    fn validation_is_idempotent() {
        let app = airflow();
        let mut config = BTreeMap::new();
        config.insert("dags_repository_url".to_string(), ConfigValue::String("git@host:repo.git".to_string()));
        let once = validate_config(&app, &config);
        let twice = validate_config(&app, &config);
        assert_eq!(once.is_ok(), twice.is_ok());
    }
}
