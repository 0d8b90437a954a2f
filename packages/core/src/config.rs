/// Configuration for the tree editor
use crate::error::{Result, TreeError};
use crate::models::time::DEFAULT_TIMESTAMP_FORMAT;
use crate::models::{Overlay, ValueSchema};
use serde::{Deserialize, Serialize};

/// Editor policy supplied by the host
///
/// All fields use `#[serde(default)]` so partial configuration files load
/// with the stock explorer behavior for anything they leave out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Meaning of the positional `values` record
    pub value_schema: ValueSchema,

    /// Kind value of nodes that may hold children and receive pastes
    pub container_kind: String,

    /// Kind value given to new leaf nodes
    pub leaf_kind: String,

    /// chrono format string for the modified column
    pub timestamp_format: String,

    /// Overrides the document's `unique` flag on the text column when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_text: Option<bool>,

    /// Overlays that survive the Escape reset
    pub preserve_on_escape: Vec<Overlay>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            value_schema: ValueSchema::default(),
            container_kind: "Folder".to_string(),
            leaf_kind: "Item".to_string(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            unique_text: None,
            preserve_on_escape: vec![Overlay::Cut, Overlay::Copied],
        }
    }
}

impl TreeConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate().map_err(TreeError::config_error)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.value_schema.validate()?;

        if self.container_kind.trim().is_empty() {
            return Err("container_kind cannot be empty".to_string());
        }

        if self.leaf_kind == self.container_kind {
            return Err("leaf_kind must differ from container_kind".to_string());
        }

        if self.timestamp_format.is_empty() {
            return Err("timestamp_format cannot be empty".to_string());
        }

        if self.preserve_on_escape.contains(&Overlay::None) {
            return Err("preserve_on_escape cannot list the empty overlay".to_string());
        }

        Ok(())
    }
}
