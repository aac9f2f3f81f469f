//! Resource graph handed to the provisioning engine
//!
//! Nodes are addressed by logical id and carry a resource type, JSON
//! properties and an explicit dependency set. References between nodes are
//! embedded in the properties as `{"Ref": id}` and `{"Fn::GetAtt": [id, attr]}`
//! and are folded into the dependency set when the graph is walked.
//!
//! All collections are ordered so that building the same topology twice
//! yields byte-identical graphs.

use crate::error::{Result, TopologyError};
use crate::model::RemovalPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Prefix of engine pseudo parameters (`AWS::Region`, `AWS::Partition`)
const PSEUDO_PARAMETER_PREFIX: &str = "AWS::";

/// `{"Ref": id}`
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [id, attribute]}`
pub fn attribute(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// ARN of a declared role
pub fn role_arn(logical_id: &str) -> Value {
    attribute(logical_id, "Arn")
}

/// A value computed by the engine from other nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueExpr {
    Literal(String),
    Ref(String),
    GetAtt { logical_id: String, attribute: String },
    Join(Vec<ValueExpr>),
}

impl ValueExpr {
    pub fn reference(logical_id: impl Into<String>) -> Self {
        Self::Ref(logical_id.into())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::GetAtt {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    /// Engine representation of the expression
    pub fn to_json(&self) -> Value {
        match self {
            ValueExpr::Literal(s) => Value::String(s.clone()),
            ValueExpr::Ref(id) => reference(id),
            ValueExpr::GetAtt {
                logical_id,
                attribute: attr,
            } => attribute(logical_id, attr),
            ValueExpr::Join(parts) => {
                let parts: Vec<Value> = parts.iter().map(ValueExpr::to_json).collect();
                json!({ "Fn::Join": ["", parts] })
            }
        }
    }

    /// Logical ids this expression reads from
    pub fn targets(&self) -> BTreeSet<String> {
        let mut targets = BTreeSet::new();
        collect_references(&self.to_json(), &mut targets);
        targets
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExpr::Literal(s) => write!(f, "{}", s),
            ValueExpr::Ref(id) => write!(f, "${{{}}}", id),
            ValueExpr::GetAtt {
                logical_id,
                attribute,
            } => write!(f, "${{{}.{}}}", logical_id, attribute),
            ValueExpr::Join(parts) => {
                for part in parts {
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
        }
    }
}

/// A single resource declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Logical id, unique within the stack
    pub logical_id: String,

    /// Engine resource type (e.g. "AWS::EC2::VPC")
    pub resource_type: String,

    /// Resource properties, with references embedded as intrinsics
    pub properties: Value,

    /// Ordering dependencies that are not visible through references
    pub depends_on: BTreeSet<String>,

    /// What the engine does with the physical resource when the node goes away
    pub deletion_policy: Option<RemovalPolicy>,
}

impl ResourceNode {
    pub fn new(
        logical_id: impl Into<String>,
        resource_type: impl Into<String>,
        properties: Value,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            properties,
            depends_on: BTreeSet::new(),
            deletion_policy: None,
        }
    }

    pub fn with_depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.insert(logical_id.into());
        self
    }

    pub fn with_deletion_policy(mut self, policy: RemovalPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self
    }

    /// Logical ids referenced from the properties
    pub fn references(&self) -> BTreeSet<String> {
        let mut refs = BTreeSet::new();
        collect_references(&self.properties, &mut refs);
        refs
    }

    /// Every logical id this node must be created after
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = self.references();
        deps.extend(self.depends_on.iter().cloned());
        deps
    }
}

fn collect_references(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("Ref") {
                if !id.starts_with(PSEUDO_PARAMETER_PREFIX) {
                    out.insert(id.clone());
                }
            } else if let Some(Value::Array(args)) = map.get("Fn::GetAtt")
                && let Some(Value::String(id)) = args.first()
            {
                out.insert(id.clone());
            }
            for v in map.values() {
                collect_references(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_references(v, out);
            }
        }
        _ => {}
    }
}

/// A named value exported for downstream consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputNode {
    pub name: String,
    pub value: ValueExpr,
    pub description: Option<String>,
}

/// The complete declared topology of one stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGraph {
    pub stack_name: String,
    pub resources: BTreeMap<String, ResourceNode>,
    pub outputs: BTreeMap<String, OutputNode>,
}

impl ResourceGraph {
    pub fn new(stack_name: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Add a resource node; logical ids are unique across resources and outputs
    pub fn insert(&mut self, node: ResourceNode) -> Result<()> {
        if self.resources.contains_key(&node.logical_id)
            || self.outputs.contains_key(&node.logical_id)
        {
            return Err(TopologyError::DuplicateLogicalId(node.logical_id));
        }
        self.resources.insert(node.logical_id.clone(), node);
        Ok(())
    }

    pub fn insert_output(&mut self, output: OutputNode) -> Result<()> {
        if self.resources.contains_key(&output.name) || self.outputs.contains_key(&output.name) {
            return Err(TopologyError::DuplicateLogicalId(output.name));
        }
        self.outputs.insert(output.name.clone(), output);
        Ok(())
    }

    pub fn resource(&self, logical_id: &str) -> Option<&ResourceNode> {
        self.resources.get(logical_id)
    }

    pub fn output(&self, name: &str) -> Option<&OutputNode> {
        self.outputs.get(name)
    }

    pub fn by_type(&self, resource_type: &str) -> Vec<&ResourceNode> {
        self.resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }

    /// Nodes that depend on the given logical id
    pub fn dependents(&self, logical_id: &str) -> Vec<&ResourceNode> {
        self.resources
            .values()
            .filter(|r| r.dependencies().contains(logical_id))
            .collect()
    }

    /// Resource count per resource type
    pub fn type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for node in self.resources.values() {
            *counts.entry(node.resource_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Check that every reference points at a declared node
    pub fn validate_references(&self) -> Result<()> {
        for node in self.resources.values() {
            for target in node.dependencies() {
                if !self.resources.contains_key(&target) {
                    return Err(TopologyError::UnknownReference {
                        entity: node.logical_id.clone(),
                        target,
                    });
                }
            }
        }
        for output in self.outputs.values() {
            for target in output.value.targets() {
                if !self.resources.contains_key(&target) {
                    return Err(TopologyError::UnknownReference {
                        entity: output.name.clone(),
                        target,
                    });
                }
            }
        }
        Ok(())
    }

    /// Resources ordered so that every node comes after its dependencies.
    ///
    /// Ties are broken by logical id, so the order is stable.
    pub fn dependency_order(&self) -> Result<Vec<&ResourceNode>> {
        let mut remaining: BTreeMap<&str, BTreeSet<String>> = self
            .resources
            .values()
            .map(|n| (n.logical_id.as_str(), n.dependencies()))
            .collect();
        let mut ordered = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let ready: Vec<&str> = remaining
                .iter()
                .filter(|(_, deps)| deps.iter().all(|d| !remaining.contains_key(d.as_str())))
                .map(|(id, _)| *id)
                .collect();

            if ready.is_empty() {
                let stuck: Vec<&str> = remaining.keys().copied().collect();
                return Err(TopologyError::invalid(
                    &self.stack_name,
                    format!("dependency cycle between {}", stuck.join(", ")),
                ));
            }

            for id in ready {
                remaining.remove(id);
                if let Some(node) = self.resources.get(id) {
                    ordered.push(node);
                }
            }
        }

        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> ResourceGraph {
        let mut graph = ResourceGraph::new("test");
        graph
            .insert(ResourceNode::new(
                "Vpc",
                "AWS::EC2::VPC",
                json!({ "CidrBlock": "10.0.0.0/16" }),
            ))
            .unwrap();
        graph
            .insert(ResourceNode::new(
                "Subnet",
                "AWS::EC2::Subnet",
                json!({ "VpcId": reference("Vpc") }),
            ))
            .unwrap();
        graph
            .insert(
                ResourceNode::new(
                    "Route",
                    "AWS::EC2::Route",
                    json!({
                        "Target": attribute("Subnet", "Id"),
                        "Partition": reference("AWS::Partition"),
                    }),
                )
                .with_depends_on("Vpc"),
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_references_skip_pseudo_parameters() {
        let graph = sample_graph();
        let route = graph.resource("Route").unwrap();
        assert_eq!(
            route.references(),
            BTreeSet::from(["Subnet".to_string()])
        );
        assert_eq!(
            route.dependencies(),
            BTreeSet::from(["Subnet".to_string(), "Vpc".to_string()])
        );
    }

    #[test]
    fn test_dependency_order() {
        let graph = sample_graph();
        let order: Vec<&str> = graph
            .dependency_order()
            .unwrap()
            .iter()
            .map(|n| n.logical_id.as_str())
            .collect();
        assert_eq!(order, vec!["Vpc", "Subnet", "Route"]);
    }

    #[test]
    fn test_dependency_cycle_detected() {
        let mut graph = ResourceGraph::new("cyclic");
        graph
            .insert(ResourceNode::new("A", "T", json!({ "x": reference("B") })))
            .unwrap();
        graph
            .insert(ResourceNode::new("B", "T", json!({ "x": reference("A") })))
            .unwrap();
        assert!(matches!(
            graph.dependency_order(),
            Err(TopologyError::InvalidTopology { .. })
        ));
    }

    #[test]
    fn test_duplicate_logical_id() {
        let mut graph = sample_graph();
        let result = graph.insert(ResourceNode::new("Vpc", "AWS::EC2::VPC", json!({})));
        assert!(matches!(result, Err(TopologyError::DuplicateLogicalId(id)) if id == "Vpc"));
    }

    #[test]
    fn test_dangling_reference() {
        let mut graph = sample_graph();
        graph
            .insert_output(OutputNode {
                name: "missing".to_string(),
                value: ValueExpr::get_att("Nowhere", "Arn"),
                description: None,
            })
            .unwrap();
        match graph.validate_references() {
            Err(TopologyError::UnknownReference { entity, target }) => {
                assert_eq!(entity, "missing");
                assert_eq!(target, "Nowhere");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_value_expr_display() {
        let expr = ValueExpr::Join(vec![
            ValueExpr::Literal("name=".to_string()),
            ValueExpr::reference("Cluster"),
        ]);
        assert_eq!(expr.to_string(), "name=${Cluster}");
        assert_eq!(
            ValueExpr::get_att("db", "Endpoint.Address").to_string(),
            "${db.Endpoint.Address}"
        );
        assert_eq!(expr.targets(), BTreeSet::from(["Cluster".to_string()]));
    }

    #[test]
    fn test_dependents() {
        let graph = sample_graph();
        let dependents: Vec<&str> = graph
            .dependents("Vpc")
            .iter()
            .map(|n| n.logical_id.as_str())
            .collect();
        assert_eq!(dependents, vec!["Route", "Subnet"]);
    }
}
