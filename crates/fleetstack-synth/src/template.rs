//! Engine template
//!
//! The resource graph rendered in the provisioning engine's document format:
//! a `Resources` map and an `Outputs` map keyed by logical id, plus metadata
//! describing how the document was produced.
//!
//! The engine only accepts alphanumeric logical ids. Declared ids such as
//! `db-instance` are written as `DbInstance`; every `Ref`, `Fn::GetAtt` and
//! `DependsOn` target follows the rename and `Metadata.declared_ids` maps the
//! engine id back to the declared one.

use crate::error::{Result, SynthError};
use chrono::{DateTime, Utc};
use fleetstack_core::{ResourceGraph, ResourceNode, to_pascal};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Artifact format understood by this version
pub const FORMAT_VERSION: u32 = 1;

/// Template language version expected by the engine
pub const ENGINE_TEMPLATE_VERSION: &str = "2010-09-09";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EngineTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub template_version: String,

    pub description: String,

    pub metadata: TemplateMetadata,

    pub resources: BTreeMap<String, EngineResource>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, EngineOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub stack: String,
    pub format_version: u32,
    pub generator: String,
    pub generated_at: DateTime<Utc>,

    /// Engine id -> declared id, for ids that had to be renamed
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub declared_ids: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EngineResource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    pub properties: Value,

    /// Ordering that is not implied by `Ref` / `Fn::GetAtt`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EngineOutput {
    pub value: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EngineTemplate {
    pub fn from_graph(graph: &ResourceGraph) -> Result<Self> {
        let ids = EngineIds::new(graph.resources.keys().chain(graph.outputs.keys()))?;

        let resources = graph
            .resources
            .iter()
            .map(|(id, node)| (ids.engine_id(id), EngineResource::from_node(node, &ids)))
            .collect();

        let outputs = graph
            .outputs
            .iter()
            .map(|(name, output)| {
                let mut value = output.value.to_json();
                ids.rename_references(&mut value);
                (
                    ids.engine_id(name),
                    EngineOutput {
                        value,
                        description: output.description.clone(),
                    },
                )
            })
            .collect();

        Ok(Self {
            template_version: ENGINE_TEMPLATE_VERSION.to_string(),
            description: format!("{} (generated by fleetstack)", graph.stack_name),
            metadata: TemplateMetadata {
                stack: graph.stack_name.clone(),
                format_version: FORMAT_VERSION,
                generator: format!("fleetstack {}", env!("CARGO_PKG_VERSION")),
                generated_at: Utc::now(),
                declared_ids: ids.renamed(),
            },
            resources,
            outputs,
        })
    }

    pub fn stack_name(&self) -> &str {
        &self.metadata.stack
    }

    /// Same resources and outputs, ignoring when and by whom the template was generated
    pub fn same_content(&self, other: &EngineTemplate) -> bool {
        self.resources == other.resources && self.outputs == other.outputs
    }
}

impl EngineResource {
    fn from_node(node: &ResourceNode, ids: &EngineIds) -> Self {
        let mut properties = node.properties.clone();
        ids.rename_references(&mut properties);
        Self {
            resource_type: node.resource_type.clone(),
            properties,
            depends_on: node.depends_on.iter().map(|id| ids.engine_id(id)).collect(),
            deletion_policy: node
                .deletion_policy
                .as_ref()
                .map(|policy| policy.engine_name().to_string()),
        }
    }
}

/// `db-instance` -> `DbInstance`; alphanumeric ids are kept as they are
fn engine_id(declared: &str) -> String {
    if declared.chars().all(|c| c.is_ascii_alphanumeric()) {
        return declared.to_string();
    }
    to_pascal(declared)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Declared id -> engine id for every node and output of a graph
struct EngineIds {
    ids: BTreeMap<String, String>,
}

impl EngineIds {
    fn new<'a>(declared: impl Iterator<Item = &'a String>) -> Result<Self> {
        let mut ids = BTreeMap::new();
        let mut owners: BTreeMap<String, &String> = BTreeMap::new();
        for id in declared {
            let engine = engine_id(id);
            if let Some(first) = owners.insert(engine.clone(), id) {
                return Err(SynthError::EngineIdCollision {
                    first: first.clone(),
                    second: id.clone(),
                    engine_id: engine,
                });
            }
            ids.insert(id.clone(), engine);
        }
        Ok(Self { ids })
    }

    fn engine_id(&self, declared: &str) -> String {
        self.ids
            .get(declared)
            .cloned()
            .unwrap_or_else(|| declared.to_string())
    }

    fn renamed(&self) -> BTreeMap<String, String> {
        self.ids
            .iter()
            .filter(|(declared, engine)| declared != engine)
            .map(|(declared, engine)| (engine.clone(), declared.clone()))
            .collect()
    }

    /// Point `Ref` and `Fn::GetAtt` targets at engine ids
    fn rename_references(&self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(target)) = map.get_mut("Ref")
                    && let Some(engine) = self.ids.get(target.as_str())
                {
                    *target = engine.clone();
                }
                if let Some(Value::Array(args)) = map.get_mut("Fn::GetAtt")
                    && let Some(Value::String(target)) = args.first_mut()
                    && let Some(engine) = self.ids.get(target.as_str())
                {
                    *target = engine.clone();
                }
                for v in map.values_mut() {
                    self.rename_references(v);
                }
            }
            Value::Array(items) => {
                for v in items {
                    self.rename_references(v);
                }
            }
            _ => {}
        }
    }
}
