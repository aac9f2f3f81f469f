//! KDL parser
//!
//! Turns a stack file into a `StackDefinition`. Each resource kind has its
//! own module; the helpers below read entries the same way for all of them.

mod cluster;
mod database;
mod delivery;
mod network;

use cluster::parse_cluster;
use database::parse_database;
use delivery::{parse_bucket, parse_distribution};
use network::{parse_network, parse_role};

use crate::error::{Result, TopologyError};
use crate::model::{Declaration, LogicalId, OutputProps, StackDefinition};
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Parse a stack file. The stack name defaults to the file stem.
pub fn parse_stack_file<P: AsRef<Path>>(path: P) -> Result<StackDefinition> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| TopologyError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_stack_string(&content, stack_name_from_path(path))
}

/// `stack.local.kdl` and `.stack.kdl` both name the stack "stack"
pub fn stack_name_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|n| n.to_str())
        .map(|n| n.trim_start_matches('.'))
        .map(|n| n.split('.').next().unwrap_or(n))
        .filter(|n| !n.is_empty())
        .unwrap_or("stack")
        .to_string()
}

/// Parse a stack description
pub fn parse_stack_string(content: &str, default_name: String) -> Result<StackDefinition> {
    let doc: KdlDocument = content.parse()?;
    let mut definition = StackDefinition::new(default_name);

    for node in doc.nodes() {
        match node.name().value() {
            "stack" => {
                definition.name = string_arg(node)?;
            }
            "addon-ordering" => {
                definition.addon_ordering = parsed_arg(node)?;
            }
            "network" => {
                definition.networks.push(parse_network(node)?);
            }
            "role" => {
                definition.roles.push(parse_role(node)?);
            }
            "cluster" => {
                definition.clusters.push(parse_cluster(node)?);
            }
            "bucket" => {
                definition.buckets.push(parse_bucket(node)?);
            }
            "distribution" => {
                definition.distributions.push(parse_distribution(node)?);
            }
            "database" => {
                definition.databases.push(parse_database(node)?);
            }
            "output" => {
                definition.outputs.push(parse_output(node)?);
            }
            "variables" => {
                // consumed by the template processor
            }
            other => {
                tracing::debug!(node = other, "Skipping unknown top-level node");
            }
        }
    }

    Ok(definition)
}

/// `output "dbEndpoint" source="db-instance" value="endpoint-hostname"`
fn parse_output(node: &KdlNode) -> Result<Declaration<OutputProps>> {
    let id = declared_id(node)?;
    check_properties(node, id.as_str(), &["source", "value", "description"])?;

    let source = required(string_prop(node, "source")?, node, id.as_str(), "source")?;
    let projection = required(string_prop(node, "value")?, node, id.as_str(), "value")?;
    let mut props = OutputProps::new(LogicalId::new(source)?, projection.parse()?);
    props.description = string_prop(node, "description")?;

    Ok(Declaration::new(id, props))
}

fn kind(node: &KdlNode) -> &str {
    node.name().value()
}

/// Positional arguments of a node
fn arguments(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

/// Named property of a node
fn property<'a>(node: &'a KdlNode, key: &str) -> Option<&'a KdlValue> {
    node.entries()
        .iter()
        .rev()
        .find(|e| e.name().is_some_and(|n| n.value() == key))
        .map(|e| e.value())
}

/// First positional argument as a logical id: `network "MyVPC" { ... }`
fn declared_id(node: &KdlNode) -> Result<LogicalId> {
    let name = arguments(node)
        .next()
        .and_then(|v| v.as_string())
        .ok_or_else(|| TopologyError::InvalidConfig(format!("{} requires a name", kind(node))))?;
    LogicalId::new(name)
}

fn string_arg(node: &KdlNode) -> Result<String> {
    arguments(node)
        .next()
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            TopologyError::InvalidConfig(format!("{} requires a string value", kind(node)))
        })
}

fn string_args(node: &KdlNode) -> Result<Vec<String>> {
    let values: Vec<String> = arguments(node)
        .map(|v| {
            v.as_string().map(|s| s.to_string()).ok_or_else(|| {
                TopologyError::InvalidConfig(format!(
                    "{} only accepts string values, got {}",
                    kind(node),
                    v
                ))
            })
        })
        .collect::<Result<_>>()?;
    if values.is_empty() {
        return Err(TopologyError::InvalidConfig(format!(
            "{} requires at least one value",
            kind(node)
        )));
    }
    Ok(values)
}

fn to_integer<T: TryFrom<i128>>(node: &KdlNode, key: &str, value: &KdlValue) -> Result<T> {
    let n = value.as_integer().ok_or_else(|| {
        TopologyError::InvalidConfig(format!("{} requires an integer, got {}", key, value))
    })?;
    T::try_from(n).map_err(|_| {
        TopologyError::InvalidConfig(format!(
            "{} on {}: {} is out of range",
            key,
            kind(node),
            n
        ))
    })
}

fn integer_arg<T: TryFrom<i128>>(node: &KdlNode) -> Result<T> {
    let value = arguments(node).next().ok_or_else(|| {
        TopologyError::InvalidConfig(format!("{} requires an integer value", kind(node)))
    })?;
    to_integer(node, kind(node), value)
}

fn bool_arg(node: &KdlNode) -> Result<bool> {
    arguments(node)
        .next()
        .and_then(|v| v.as_bool())
        .ok_or_else(|| {
            TopologyError::InvalidConfig(format!(
                "{} requires #true or #false",
                kind(node)
            ))
        })
}

/// First positional argument parsed with `FromStr`
fn parsed_arg<T: FromStr<Err = TopologyError>>(node: &KdlNode) -> Result<T> {
    string_arg(node)?.parse()
}

fn string_prop(node: &KdlNode, key: &str) -> Result<Option<String>> {
    property(node, key)
        .map(|v| {
            v.as_string().map(|s| s.to_string()).ok_or_else(|| {
                TopologyError::InvalidConfig(format!("{}={} must be a string", key, v))
            })
        })
        .transpose()
}

fn integer_prop<T: TryFrom<i128>>(node: &KdlNode, key: &str) -> Result<Option<T>> {
    property(node, key)
        .map(|v| to_integer(node, key, v))
        .transpose()
}

fn bool_prop(node: &KdlNode, key: &str) -> Result<Option<bool>> {
    property(node, key)
        .map(|v| {
            v.as_bool().ok_or_else(|| {
                TopologyError::InvalidConfig(format!("{}={} must be #true or #false", key, v))
            })
        })
        .transpose()
}

/// Reject properties a node does not understand
fn check_properties(node: &KdlNode, owner: &str, allowed: &[&str]) -> Result<()> {
    for entry in node.entries() {
        if let Some(name) = entry.name()
            && !allowed.contains(&name.value())
        {
            return Err(TopologyError::InvalidConfig(format!(
                "{} '{}': unknown property '{}' on {}",
                kind(node),
                owner,
                name.value(),
                kind(node)
            )));
        }
    }
    Ok(())
}

fn unknown_key(parent: &KdlNode, owner: &str, child: &KdlNode) -> TopologyError {
    TopologyError::InvalidConfig(format!(
        "{} '{}': unknown key '{}'",
        kind(parent),
        owner,
        kind(child)
    ))
}

/// Store a scalar key; the same key twice in one block is an error
fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    parent: &KdlNode,
    owner: &str,
    child: &KdlNode,
) -> Result<()> {
    if slot.is_some() {
        return Err(TopologyError::InvalidConfig(format!(
            "{} '{}': key '{}' is set more than once",
            kind(parent),
            owner,
            kind(child)
        )));
    }
    *slot = Some(value);
    Ok(())
}

fn required<T>(value: Option<T>, parent: &KdlNode, owner: &str, key: &str) -> Result<T> {
    value.ok_or_else(|| {
        TopologyError::InvalidConfig(format!(
            "{} '{}': missing required key '{}'",
            kind(parent),
            owner,
            key
        ))
    })
}

/// Child nodes of a block, empty when the node has no block
fn children(node: &KdlNode) -> &[KdlNode] {
    node.children().map(|c| c.nodes()).unwrap_or(&[])
}

#[cfg(test)]
mod tests;
