//! File-based service description loader
//!
//! This loader handles only file I/O and document decoding. Parsing and
//! validation are done by [`ServiceSpec::from_document`].

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::fs;

use crate::application::SpecLoader;
use crate::core::{Error, Result};
use crate::openapi::ServiceSpec;

/// Loads service descriptions from local JSON or YAML files
#[derive(Debug, Clone, Default)]
pub struct FileSpecLoader;

impl FileSpecLoader {
    pub fn new() -> Self {
        Self
    }

    /// Decodes a document, choosing the format by file extension.
    ///
    /// Unknown extensions are tried as JSON first, then as YAML.
    pub fn decode(source: &str, content: &str) -> Result<JsonValue> {
        if source.ends_with(".json") {
            Ok(serde_json::from_str(content)?)
        } else if source.ends_with(".yaml") || source.ends_with(".yml") {
            from_yaml(content)
        } else {
            serde_json::from_str(content)
                .or_else(|_| from_yaml(content))
                .map_err(|e| Error::config(format!("Failed to parse {source}: {e}")))
        }
    }
}

// Goes through the YAML value model so numeric keys such as response codes
// become JSON object keys.
fn from_yaml(content: &str) -> Result<JsonValue> {
    let value: serde_yaml::Value = serde_yaml::from_str(content)?;
    Ok(serde_json::to_value(value)?)
}

#[async_trait]
impl SpecLoader for FileSpecLoader {
    async fn load(&self, source: &str) -> Result<ServiceSpec> {
        let content = fs::read_to_string(source).await?;
        let document = Self::decode(source, &content)?;
        tracing::debug!("Loaded service description from {source}");
        ServiceSpec::from_document(document)
    }
}
