//! Template expansion
//!
//! Stack files are rendered with Tera before they are parsed, so values such
//! as CIDR blocks or instance sizes can come from context variables.

use crate::error::{Result, TopologyError};
use std::collections::HashMap;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, info};

/// Environment variable prefixes exposed to templates
pub const ALLOWED_ENV_PREFIXES: &[&str] = &["FLEETSTACK_", "CI_"];

/// Context variables
pub type Variables = HashMap<String, serde_json::Value>;

pub struct TemplateProcessor {
    tera: Tera,
    context: Context,
}

impl TemplateProcessor {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            context: Context::new(),
        }
    }

    pub fn add_variable(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.context.insert(key.into(), &value);
    }

    /// Add variables, replacing existing keys
    pub fn add_variables(&mut self, variables: Variables) {
        for (key, value) in variables {
            self.context.insert(key, &value);
        }
    }

    /// Add environment variables whose name starts with one of
    /// `ALLOWED_ENV_PREFIXES`; everything else in the environment stays hidden.
    #[tracing::instrument(skip(self))]
    pub fn add_env_variables(&mut self) {
        let mut count = 0;

        for (key, value) in std::env::vars() {
            if ALLOWED_ENV_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
            {
                debug!(key = %key, "Adding environment variable");
                self.context.insert(key, &serde_json::Value::String(value));
                count += 1;
            }
        }

        info!(
            env_var_count = count,
            "Added filtered environment variables"
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.context.contains_key(key)
    }

    pub fn render_str(&mut self, template: &str) -> Result<String> {
        self.tera
            .render_str(template, &self.context)
            .map_err(|e| TopologyError::TemplateRenderError(extract_tera_error_detail(&e)))
    }

    pub fn render_file(&mut self, path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path).map_err(|e| TopologyError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        self.render_str(&content).map_err(|e| match e {
            TopologyError::TemplateRenderError(message) => TopologyError::TemplateError {
                file: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the `variables { ... }` blocks of a stack file.
///
/// The blocks are cut out with a regex and parsed on their own, so template
/// expressions elsewhere in the file do not have to be valid KDL yet.
pub fn extract_variables(kdl_content: &str) -> Result<Variables> {
    use regex::Regex;

    let re = Regex::new(r"(?s)variables\s*\{(?P<content>.*?)\}")
        .map_err(|e| TopologyError::InvalidConfig(format!("regex compile error: {}", e)))?;

    let mut variables = HashMap::new();

    for cap in re.captures_iter(kdl_content) {
        if let Some(block) = cap.name("content") {
            let wrapped = format!("extracted {{\n{}\n}}", block.as_str());
            let doc: kdl::KdlDocument = wrapped.parse().map_err(|e| {
                TopologyError::InvalidConfig(format!("KDL parse error in variables block: {}", e))
            })?;

            if let Some(node) = doc.nodes().first()
                && let Some(children) = node.children()
            {
                for var_node in children.nodes() {
                    let key = var_node.name().value().to_string();
                    if let Some(entry) = var_node.entries().first() {
                        variables.insert(key, kdl_value_to_json(entry.value()));
                    }
                }
            }
        }
    }

    Ok(variables)
}

/// Parse a `key=value` context assignment
pub fn parse_assignment(assignment: &str) -> Result<(String, serde_json::Value)> {
    let (key, value) = assignment.split_once('=').ok_or_else(|| {
        TopologyError::InvalidConfig(format!(
            "context '{}' must be written as key=value",
            assignment
        ))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(TopologyError::InvalidConfig(format!(
            "context '{}' has an empty key",
            assignment
        )));
    }
    Ok((
        key.to_string(),
        serde_json::Value::String(value.trim().to_string()),
    ))
}

/// Pull the useful part out of a Tera error chain
fn extract_tera_error_detail(e: &tera::Error) -> String {
    use std::error::Error;

    let mut details = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        details.push(err.to_string());
        source = err.source();
    }
    let full_error = details.join(" | ");

    if full_error.contains("not found in context")
        && let Some(start) = full_error.find("Variable `")
        && let Some(end) = full_error[start..].find("` not found")
    {
        let var_name = &full_error[start + 10..start + end];
        return format!(
            "undefined variable: `{}`\nhint: define it in a variables block, the user context file or with --context {}=<value>",
            var_name, var_name
        );
    }

    if full_error.contains("Filter") && full_error.contains("not found") {
        return format!("undefined filter\ndetail: {full_error}");
    }

    full_error
}

/// KDL scalar as a JSON value
pub fn kdl_value_to_json(value: &kdl::KdlValue) -> serde_json::Value {
    if let Some(s) = value.as_string() {
        serde_json::Value::String(s.to_string())
    } else if let Some(i) = value.as_integer() {
        i64::try_from(i)
            .map(|i| serde_json::Value::Number(i.into()))
            .unwrap_or(serde_json::Value::Null)
    } else if let Some(f) = value.as_float() {
        serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    } else if let Some(b) = value.as_bool() {
        serde_json::Value::Bool(b)
    } else {
        serde_json::Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_simple_variable_expansion() {
        let mut processor = TemplateProcessor::new();
        processor.add_variable("cidr", serde_json::Value::String("10.1.0.0/16".to_string()));

        let result = processor.render_str(r#"cidr "{{ cidr }}""#).unwrap();
        assert_eq!(result, r#"cidr "10.1.0.0/16""#);
    }

    #[test]
    fn test_conditional_block() {
        let mut processor = TemplateProcessor::new();
        processor.add_variable("env", serde_json::Value::String("prod".to_string()));

        let template = r#"{% if env == "prod" %}multi-az #true{% else %}multi-az #false{% endif %}"#;
        assert_eq!(processor.render_str(template).unwrap(), "multi-az #true");
    }

    #[test]
    fn test_extract_variables() {
        let kdl = r#"
            variables {
                env "dev"
                node_count 3
                multi_az #false
            }
            network "MyVPC" {
                cidr "{{ cidr }}"
            }
        "#;

        let vars = extract_variables(kdl).unwrap();
        assert_eq!(vars.get("env"), Some(&serde_json::json!("dev")));
        assert_eq!(vars.get("node_count"), Some(&serde_json::json!(3)));
        assert_eq!(vars.get("multi_az"), Some(&serde_json::json!(false)));
    }

    #[test]
    fn test_undefined_variable_error() {
        let mut processor = TemplateProcessor::new();
        let err = processor.render_str("version \"{{ k8s_version }}\"").unwrap_err();
        match err {
            TopologyError::TemplateRenderError(message) => {
                assert!(message.contains("k8s_version"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_env_variables_filtering() {
        unsafe {
            std::env::set_var("FLEETSTACK_TEST_REGION", "ap-northeast-1");
            std::env::set_var("UNRELATED_TEST_SECRET", "hidden");
        }

        let mut processor = TemplateProcessor::new();
        processor.add_env_variables();
        assert!(processor.contains("FLEETSTACK_TEST_REGION"));
        assert!(!processor.contains("UNRELATED_TEST_SECRET"));

        unsafe {
            std::env::remove_var("FLEETSTACK_TEST_REGION");
            std::env::remove_var("UNRELATED_TEST_SECRET");
        }
    }

    #[test]
    fn test_parse_assignment() {
        let (key, value) = parse_assignment("env=prod").unwrap();
        assert_eq!(key, "env");
        assert_eq!(value, serde_json::json!("prod"));

        let (_, value) = parse_assignment("url=a=b").unwrap();
        assert_eq!(value, serde_json::json!("a=b"));

        assert!(parse_assignment("env").is_err());
        assert!(parse_assignment("=prod").is_err());
    }

    #[test]
    fn test_render_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.kdl");
        std::fs::write(&path, "stack \"{{ missing }}\"").unwrap();

        let mut processor = TemplateProcessor::new();
        match processor.render_file(&path) {
            Err(TopologyError::TemplateError { file, .. }) => assert_eq!(file, path),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
