//! Stack loader
//!
//! Ties template expansion and parsing together: the stack file is rendered
//! with the merged context, parsed, and optionally constructed.

use crate::error::{Result, TopologyError};
use crate::model::StackDefinition;
use crate::parser::{parse_stack_string, stack_name_from_path};
use crate::stack::Stack;
use crate::template::{TemplateProcessor, Variables, extract_variables};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Context sources that do not come from the stack file itself
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Values from the user-level context file
    pub user_context: Variables,

    /// `--context key=value` values
    pub overrides: Variables,
}

/// Load and parse a stack file.
///
/// Context priority, lowest first:
/// 1. user context file
/// 2. `variables { }` blocks of the stack file
/// 3. `FLEETSTACK_*` / `CI_*` environment variables
/// 4. command line overrides
#[instrument(skip(options), fields(path = %path.display()))]
pub fn load_definition(path: &Path, options: &LoadOptions) -> Result<StackDefinition> {
    if !path.is_file() {
        return Err(TopologyError::StackFileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| TopologyError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    debug!("Step 1: Preparing template processor");
    let mut processor = prepare_template_processor(path, &content, options)?;

    debug!("Step 2: Expanding template");
    let rendered = processor.render_file(path)?;
    info!(content_size = rendered.len(), "Template expansion complete");

    debug!("Step 3: Parsing KDL");
    let definition = parse_stack_string(&rendered, stack_name_from_path(path))?;
    info!(
        stack = %definition.name,
        declarations = definition.len(),
        "Stack file loaded"
    );

    Ok(definition)
}

/// Load a stack file and construct its topology
#[instrument(skip(options), fields(path = %path.display()))]
pub fn load_stack(path: &Path, options: &LoadOptions) -> Result<Stack> {
    let definition = load_definition(path, options)?;
    definition.build()
}

fn prepare_template_processor(
    path: &Path,
    content: &str,
    options: &LoadOptions,
) -> Result<TemplateProcessor> {
    let mut processor = TemplateProcessor::new();

    if let Some(dir) = path.parent() {
        processor.add_variable(
            "STACK_DIR",
            serde_json::Value::String(dir.to_string_lossy().to_string()),
        );
    }

    processor.add_variables(options.user_context.clone());

    let variables = extract_variables(content)?;
    debug!(count = variables.len(), "Collected variables block");
    processor.add_variables(variables);

    processor.add_env_variables();

    debug!(count = options.overrides.len(), "Adding context overrides");
    processor.add_variables(options.overrides.clone());

    Ok(processor)
}
