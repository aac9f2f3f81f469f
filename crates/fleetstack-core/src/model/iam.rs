//! IAM roles
//!
//! A role is declared once and shared by reference (`RoleRef`) with every
//! resource that acts under it.

use super::LogicalId;
use crate::error::{Result, TopologyError};
use crate::graph::{ResourceNode, reference};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const WORKER_NODE_POLICY: &str = "AmazonEKSWorkerNodePolicy";
pub const CONTAINER_REGISTRY_READ_POLICY: &str = "AmazonEC2ContainerRegistryReadOnly";
pub const CNI_POLICY: &str = "AmazonEKS_CNI_Policy";
pub const CLUSTER_POLICY: &str = "AmazonEKSClusterPolicy";
pub const FARGATE_POD_EXECUTION_POLICY: &str = "AmazonEKSFargatePodExecutionRolePolicy";

/// Policies a node role needs for nodes to register with the control plane
pub const NODE_BASELINE_POLICIES: [&str; 3] =
    [WORKER_NODE_POLICY, CONTAINER_REGISTRY_READ_POLICY, CNI_POLICY];

pub const EC2_SERVICE: &str = "ec2.amazonaws.com";
pub const EKS_SERVICE: &str = "eks.amazonaws.com";
pub const EKS_FARGATE_PODS_SERVICE: &str = "eks-fargate-pods.amazonaws.com";

/// Provider-managed policy, addressed by name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedPolicy(String);

impl ManagedPolicy {
    pub fn aws_managed(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Partition-independent ARN
    pub fn arn(&self) -> Value {
        json!({
            "Fn::Join": ["", ["arn:", reference("AWS::Partition"), ":iam::aws:policy/", self.0]]
        })
    }
}

/// Role declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleProps {
    /// Physical name; `None` lets the engine generate one
    pub role_name: Option<String>,

    /// Service principal trusted to assume the role
    pub assumed_by: String,

    /// Attached policies, in attachment order
    pub managed_policies: Vec<ManagedPolicy>,
}

impl RoleProps {
    pub fn new(assumed_by: impl Into<String>) -> Self {
        Self {
            role_name: None,
            assumed_by: assumed_by.into(),
            managed_policies: Vec::new(),
        }
    }

    pub fn with_role_name(mut self, name: impl Into<String>) -> Self {
        self.role_name = Some(name.into());
        self
    }

    pub fn with_managed_policy(mut self, name: impl Into<String>) -> Self {
        self.managed_policies.push(ManagedPolicy::aws_managed(name));
        self
    }

    /// Node role trusted by EC2 with the three baseline policies attached
    pub fn node_role() -> Self {
        NODE_BASELINE_POLICIES
            .iter()
            .fold(Self::new(EC2_SERVICE), |props, policy| {
                props.with_managed_policy(*policy)
            })
    }
}

/// A constructed role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: LogicalId,
    props: RoleProps,
}

impl Role {
    pub(crate) fn build(id: LogicalId, props: RoleProps) -> Result<Self> {
        if props.assumed_by.trim().is_empty() {
            return Err(TopologyError::invalid(&id, "role requires a trusted principal"));
        }
        let mut seen = std::collections::HashSet::new();
        for policy in &props.managed_policies {
            if !seen.insert(policy.name()) {
                return Err(TopologyError::invalid(
                    &id,
                    format!("managed policy {} is attached twice", policy.name()),
                ));
            }
        }
        Ok(Self { id, props })
    }

    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    pub fn props(&self) -> &RoleProps {
        &self.props
    }

    pub fn has_policy(&self, name: &str) -> bool {
        self.props.managed_policies.iter().any(|p| p.name() == name)
    }

    /// First baseline node policy this role lacks
    pub fn missing_node_policy(&self) -> Option<&'static str> {
        NODE_BASELINE_POLICIES
            .iter()
            .copied()
            .find(|policy| !self.has_policy(policy))
    }

    pub(crate) fn resource(&self) -> ResourceNode {
        role_resource(self.id.as_str(), &self.props)
    }
}

pub(crate) fn role_resource(logical_id: &str, props: &RoleProps) -> ResourceNode {
    let mut properties = json!({
        "AssumeRolePolicyDocument": {
            "Version": "2012-10-17",
            "Statement": [{
                "Action": "sts:AssumeRole",
                "Effect": "Allow",
                "Principal": { "Service": props.assumed_by },
            }],
        },
        "ManagedPolicyArns": props
            .managed_policies
            .iter()
            .map(ManagedPolicy::arn)
            .collect::<Vec<_>>(),
    });
    if let Some(name) = &props.role_name {
        properties["RoleName"] = json!(name);
    }
    ResourceNode::new(logical_id, "AWS::IAM::Role", properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_role_has_baseline_policies() {
        let role =
            Role::build(LogicalId::new("NodeRole").unwrap(), RoleProps::node_role()).unwrap();
        assert!(role.missing_node_policy().is_none());
        assert_eq!(role.props().managed_policies.len(), 3);
    }

    #[test]
    fn test_missing_node_policy() {
        let props = RoleProps::new(EC2_SERVICE)
            .with_managed_policy(WORKER_NODE_POLICY)
            .with_managed_policy(CNI_POLICY);
        let role = Role::build(LogicalId::new("NodeRole").unwrap(), props).unwrap();
        assert_eq!(role.missing_node_policy(), Some(CONTAINER_REGISTRY_READ_POLICY));
    }

    #[test]
    fn test_duplicate_policy_rejected() {
        let props = RoleProps::new(EC2_SERVICE)
            .with_managed_policy(CNI_POLICY)
            .with_managed_policy(CNI_POLICY);
        assert!(Role::build(LogicalId::new("NodeRole").unwrap(), props).is_err());
    }

    #[test]
    fn test_role_resource() {
        let props = RoleProps::node_role().with_role_name("eksClusterNodeGroupRole");
        let role = Role::build(LogicalId::new("NodeRole").unwrap(), props).unwrap();
        let node = role.resource();
        assert_eq!(node.resource_type, "AWS::IAM::Role");
        assert_eq!(node.properties["RoleName"], "eksClusterNodeGroupRole");
        assert_eq!(
            node.properties["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            EC2_SERVICE
        );
        // partition pseudo parameter is not a graph dependency
        assert!(node.references().is_empty());
    }
}
