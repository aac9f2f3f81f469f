//! Synthesis error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthError {
    #[error(transparent)]
    Topology(#[from] fleetstack_core::TopologyError),

    #[error("Artifact {path} has format version {found}, newer than supported version {supported}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("Logical ids '{first}' and '{second}' both become engine id '{engine_id}'")]
    EngineIdCollision {
        first: String,
        second: String,
        engine_id: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SynthError>;
