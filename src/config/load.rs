use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{HpcError, Result};

/// A configuration file on disk and the schema it must satisfy
pub struct ConfigFile<'a> {
    pub path: PathBuf,
    pub compiled_schema: &'a JSONSchema,
}

impl ConfigFile<'_> {
    /// Read the file and deserialise it once it passes schema validation
    pub fn read<T: DeserializeOwned>(&self) -> Result<T> {
        let text = self.read_file()?;
        self.read_str(&text)
    }

    /// Same as [`ConfigFile::read`] for content that was already loaded (and possibly rewritten)
    pub fn read_str<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        let json: Value = self.parse_untyped_json(text)?;

        match self.validate(&json) {
            Ok(_) => {
                info!("Configuration {} is valid", self.path.display());
                self.parse_json(json)
            }
            Err(err) => {
                warn!("Configuration {} fails validation", self.path.display());
                Err(err)
            }
        }
    }

    pub fn read_file(&self) -> Result<String> {
        let path: &Path = self.path.as_path();
        info!("Reading configuration at {}", path.display());
        fs::read_to_string(path).map_err(|err| {
            HpcError::Configuration(format!("can't read {}: {}", path.display(), err))
        })
    }

    fn validate(&self, json: &Value) -> Result<()> {
        debug!("Validating {} against JSON schema", self.path.display());
        self.compiled_schema.validate(json).map_err(|errors| {
            let reasons: Vec<String> = errors
                .map(|err| format!("{} (at '{}')", err, err.instance_path))
                .collect();
            HpcError::Configuration(format!("{} is invalid: {}", self.path.display(), reasons.join("; ")))
        })
    }

    fn parse_json<T: DeserializeOwned>(&self, value: Value) -> Result<T> {
        serde_json::from_value::<T>(value).map_err(|err| {
            HpcError::Configuration(format!("can't deserialise {}: {}", self.path.display(), err))
        })
    }

    fn parse_untyped_json(&self, text: &str) -> Result<Value> {
        serde_json::from_str::<Value>(text).map_err(|err| {
            HpcError::Configuration(format!("{} is not valid JSON: {}", self.path.display(), err))
        })
    }
}
