use serde::{Deserialize, Serialize};

use crate::node::Document;

pub const VALUE_SCHEMA: &str = "folio-plate";
pub const VALUE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("invalid post body JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown body schema `{0}`")]
    Schema(String),
    #[error("body version {found} is newer than supported version {VALUE_VERSION}")]
    Version { found: u32 },
}

/// Stored form of a post body. Older payloads without `schema`/`version`
/// read as the current version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateValue {
    #[serde(default = "schema_name")]
    pub schema: String,
    #[serde(default = "current_version")]
    pub version: u32,
    pub document: Document,
}

fn schema_name() -> String {
    VALUE_SCHEMA.to_string()
}

fn current_version() -> u32 {
    VALUE_VERSION
}

impl PlateValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            schema: schema_name(),
            version: VALUE_VERSION,
            document,
        }
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn to_json_pretty(&self) -> Result<String, ValueError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ValueError> {
        let value: Self = serde_json::from_str(s)?;
        if value.schema != VALUE_SCHEMA {
            return Err(ValueError::Schema(value.schema));
        }
        if value.version > VALUE_VERSION {
            tracing::warn!(version = value.version, "refusing post body from a newer editor");
            return Err(ValueError::Version {
                found: value.version,
            });
        }
        Ok(value)
    }
}
