use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a stack description or constructing its topology.
///
/// Every construction error names the offending entity's logical id together
/// with the violated constraint.
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Invalid topology '{entity}': {reason}")]
    InvalidTopology { entity: String, reason: String },

    #[error("Insufficient topology for '{entity}': {reason}")]
    InsufficientTopology { entity: String, reason: String },

    #[error("Duplicate capacity '{name}' on cluster '{cluster}': node group and profile names must be unique")]
    DuplicateCapacity { cluster: String, name: String },

    #[error("Distribution '{entity}' marks {count} behaviors as default, exactly one is required")]
    MultipleDefaultBehaviors { entity: String, count: usize },

    #[error("Distribution '{entity}' has no default behavior, exactly one is required")]
    NoDefaultBehavior { entity: String },

    #[error("Invalid storage sizing for '{entity}': {reason}")]
    InvalidStorageSizing { entity: String, reason: String },

    #[error("'{entity}' has no value for projection '{projection}'")]
    MissingProjection { entity: String, projection: String },

    #[error("Invalid logical id '{id}': {reason}")]
    InvalidLogicalId { id: String, reason: String },

    #[error("Logical id '{0}' is already declared in this stack")]
    DuplicateLogicalId(String),

    #[error("'{entity}' references '{target}', which is not declared in this stack")]
    UnknownReference { entity: String, target: String },

    #[error("Node group '{entity}' uses role '{role}' without the baseline policy {missing}")]
    InvalidNodeRole {
        entity: String,
        role: String,
        missing: String,
    },

    #[error("Invalid Fargate profile '{entity}': {reason}")]
    InvalidProfile { entity: String, reason: String },

    #[error("Invalid behavior on distribution '{entity}': {reason}")]
    InvalidBehavior { entity: String, reason: String },

    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error: {path}\nreason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Template error: {file}\nreason: {message}")]
    TemplateError { file: PathBuf, message: String },

    #[error("Template render error: {0}")]
    TemplateRenderError(String),

    #[error("Stack file not found: {0}")]
    StackFileNotFound(PathBuf),
}

impl TopologyError {
    pub(crate) fn invalid(entity: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidTopology {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn insufficient(entity: impl ToString, reason: impl Into<String>) -> Self {
        Self::InsufficientTopology {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn sizing(entity: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidStorageSizing {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TopologyError>;
