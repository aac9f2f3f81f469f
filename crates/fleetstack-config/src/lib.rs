pub mod error;

pub use error::*;

use fleetstack_core::{Variables, kdl_value_to_json};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Environment variable naming a stack file directly
pub const STACK_FILE_ENV: &str = "FLEETSTACK_FILE";

/// Project-local directory for stack files and synthesized artifacts
pub const PROJECT_DIR: &str = ".fleetstack";

const CANDIDATES: [&str; 4] = [
    "stack.local.kdl",
    ".stack.local.kdl",
    "stack.kdl",
    ".stack.kdl",
];

/// `~/.config/fleetstack` (or the platform equivalent)
pub fn user_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("fleetstack"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// Path of the user-level context file
pub fn user_context_path() -> Result<PathBuf> {
    Ok(user_config_dir()?.join("context.kdl"))
}

/// Find the stack file of the current project
///
/// Lookup order:
/// 1. `FLEETSTACK_FILE`
/// 2. current directory: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl
/// 3. `./.fleetstack/`, same order
#[instrument]
pub fn find_stack_file() -> Result<PathBuf> {
    if let Ok(stack_path) = std::env::var(STACK_FILE_ENV) {
        let path = PathBuf::from(stack_path);
        if path.exists() {
            return Ok(path);
        }
        debug!(path = %path.display(), "FLEETSTACK_FILE does not exist, searching");
    }

    let current_dir = std::env::current_dir()?;
    find_stack_file_in(&current_dir)
}

/// Same lookup as `find_stack_file`, rooted at `dir` and ignoring the environment
pub fn find_stack_file_in(dir: &Path) -> Result<PathBuf> {
    for filename in &CANDIDATES {
        let path = dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = dir.join(PROJECT_DIR);
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    Err(ConfigError::StackFileNotFound)
}

/// Directory that owns a stack file: the parent of `.fleetstack/` when the
/// file lives there, otherwise the file's own directory.
pub fn project_root(stack_file: &Path) -> PathBuf {
    let dir = stack_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if dir.file_name().is_some_and(|n| n == PROJECT_DIR)
        && let Some(parent) = dir.parent()
    {
        return parent.to_path_buf();
    }
    dir.to_path_buf()
}

/// Read the user context file; a missing file is an empty context
#[instrument]
pub fn load_user_context() -> Result<Variables> {
    let path = user_context_path()?;
    if !path.exists() {
        debug!(path = %path.display(), "No user context file");
        return Ok(Variables::new());
    }
    load_context_file(&path)
}

/// Parse a context file: one `key value` node per variable.
///
/// ```kdl
/// region "ap-northeast-1"
/// node_count 3
/// ```
pub fn load_context_file(path: &Path) -> Result<Variables> {
    let content = std::fs::read_to_string(path)?;
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        ConfigError::InvalidContext {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    let mut variables = Variables::new();
    for node in doc.nodes() {
        let key = node.name().value();
        let value = node
            .entries()
            .iter()
            .find(|e| e.name().is_none())
            .map(|e| kdl_value_to_json(e.value()))
            .ok_or_else(|| ConfigError::InvalidContext {
                path: path.to_path_buf(),
                message: format!("'{}' has no value", key),
            })?;
        variables.insert(key.to_string(), value);
    }

    debug!(count = variables.len(), "Loaded context file");
    Ok(variables)
}
