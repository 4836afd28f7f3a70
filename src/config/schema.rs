use jsonschema::JSONSchema;
use log::debug;
use serde_json::Value;

use crate::error::{HpcError, Result};

static BACKEND: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/backend.json"));
static EXPERIMENT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/experiment.json"));

pub fn backend_schema() -> Result<JSONSchema> {
    compile_schema("backend", BACKEND)
}

pub fn experiment_schema() -> Result<JSONSchema> {
    compile_schema("experiment", EXPERIMENT)
}

fn compile_schema(name: &str, raw: &str) -> Result<JSONSchema> {
    debug!("Compiling {name} schema");
    let schema: Value = serde_json::from_str(raw)
        .map_err(|err| HpcError::Configuration(format!("{name} schema is not valid JSON: {err}")))?;

    JSONSchema::options()
        .compile(&schema)
        .map_err(|err| HpcError::Configuration(format!("{name} schema does not compile: {err}")))
}
