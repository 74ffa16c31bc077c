use dip_core::AccessType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigOptionType {
    Text,
    Number,
    Select,
    Boolean,
}

/// A predicate over the same config mapping it's evaluated against: "this
/// field is only visible when `field == value`" (spec.md §4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditional {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigOption {
    pub id: String,
    #[serde(rename = "type")]
    pub option_type: ConfigOptionType,
    #[serde(default)]
    pub required: bool,
    pub default: Option<String>,
    #[serde(default)]
    pub select_options: Vec<String>,
    /// If true, `dip-catalog::list_versions` is the source of valid values
    /// instead of `select_options`.
    #[serde(default)]
    pub fetched_versions: bool,
    pub conditional: Option<Conditional>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRequirement {
    pub name: String,
    pub default_size_gb: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEndpointDescriptor {
    pub name: String,
    pub description: String,
    pub default_access_type: AccessType,
    pub default_value: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDescriptor {
    pub short_name: String,
    pub display_name: String,
    pub default_version: String,
    #[serde(default)]
    pub config_options: Vec<ConfigOption>,
    #[serde(default)]
    pub volume_requirements: Vec<VolumeRequirement>,
    #[serde(default)]
    pub access_endpoints: Vec<AccessEndpointDescriptor>,
    pub artifact_bundle_path: String,
}

impl ApplicationDescriptor {
    pub fn config_option(&self, id: &str) -> Option<&ConfigOption> {
        self.config_options.iter().find(|o| o.id == id)
    }
}
