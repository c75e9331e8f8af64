//! API spec loading
//!
//! Only the parts the route publisher needs are read: `basePath` and the
//! declared path templates, in document order.

use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur while loading an API spec
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid spec: {0}")]
    Invalid(String),
}

/// Declared API surface of this service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiSpec {
    pub base_path: String,
    pub paths: Vec<String>,
}

impl ApiSpec {
    pub fn new(base_path: impl Into<String>, paths: Vec<String>) -> Self {
        Self {
            base_path: base_path.into(),
            paths,
        }
    }

    /// Load a JSON spec file. A missing file yields an empty spec.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SpecError> {
        let path = path.as_ref();
        if !path.is_file() {
            tracing::info!("Swagger API NOT detected at {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let spec = Self::from_json(&content)?;
        tracing::info!(
            "Swagger API has been detected ({} paths, base \"{}\")",
            spec.paths.len(),
            spec.base_path
        );
        Ok(spec)
    }

    /// Parse a spec from JSON text
    pub fn from_json(content: &str) -> Result<Self, SpecError> {
        let document: Map<String, Value> = serde_json::from_str(content)?;

        let base_path = match document.get("basePath") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(base)) => base.clone(),
            Some(other) => {
                return Err(SpecError::Invalid(format!("basePath is not a string: {}", other)))
            }
        };

        let paths = match document.get("paths") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(paths)) => paths.keys().cloned().collect(),
            Some(_) => return Err(SpecError::Invalid("paths is not an object".to_string())),
        };

        Ok(Self { base_path, paths })
    }

    pub fn has_api(&self) -> bool {
        !self.paths.is_empty()
    }
}
