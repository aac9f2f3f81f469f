//! Parsed stack description, before construction

use super::{
    AddonOrdering, AddonProps, BucketProps, ClusterProps, ClusterRef, DatabaseProps,
    DistributionProps, FargateProfileProps, LogicalId, NetworkProps, NodeGroupProps, OutputProps,
    RoleProps,
};
use crate::error::Result;
use crate::stack::Stack;
use serde::{Deserialize, Serialize};

/// One top-level entity of the description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration<P> {
    pub id: LogicalId,
    pub props: P,
}

impl<P> Declaration<P> {
    pub fn new(id: LogicalId, props: P) -> Self {
        Self { id, props }
    }
}

/// Capacity declared inside a cluster, named per cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity<P> {
    pub name: String,
    pub props: P,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDeclaration {
    pub id: LogicalId,
    pub props: ClusterProps,
    pub node_groups: Vec<Capacity<NodeGroupProps>>,
    pub fargate_profiles: Vec<Capacity<FargateProfileProps>>,
    pub addons: Vec<AddonProps>,
}

/// Every declaration of a stack file, grouped by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDefinition {
    pub name: String,
    pub addon_ordering: AddonOrdering,
    pub networks: Vec<Declaration<NetworkProps>>,
    pub roles: Vec<Declaration<RoleProps>>,
    pub clusters: Vec<ClusterDeclaration>,
    pub buckets: Vec<Declaration<BucketProps>>,
    pub distributions: Vec<Declaration<DistributionProps>>,
    pub databases: Vec<Declaration<DatabaseProps>>,
    pub outputs: Vec<Declaration<OutputProps>>,
}

impl StackDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addon_ordering: AddonOrdering::default(),
            networks: Vec::new(),
            roles: Vec::new(),
            clusters: Vec::new(),
            buckets: Vec::new(),
            distributions: Vec::new(),
            databases: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Number of top-level declarations
    pub fn len(&self) -> usize {
        self.networks.len()
            + self.roles.len()
            + self.clusters.len()
            + self.buckets.len()
            + self.distributions.len()
            + self.databases.len()
            + self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Construct the stack, kind by kind: networks, roles, clusters with
    /// their capacity and addons, buckets, distributions, databases, outputs.
    pub fn build(&self) -> Result<Stack> {
        let mut stack = Stack::new(&self.name, self.addon_ordering)?;

        for network in &self.networks {
            stack.add_network(network.id.as_str(), network.props.clone())?;
        }
        for role in &self.roles {
            stack.add_role(role.id.as_str(), role.props.clone())?;
        }
        for cluster in &self.clusters {
            let handle: ClusterRef = stack.add_cluster(cluster.id.as_str(), cluster.props.clone())?;
            for group in &cluster.node_groups {
                stack.add_node_group(&handle, &group.name, group.props.clone())?;
            }
            for profile in &cluster.fargate_profiles {
                stack.add_fargate_profile(&handle, &profile.name, profile.props.clone())?;
            }
            for addon in &cluster.addons {
                stack.add_addon(&handle, addon.clone())?;
            }
        }
        for bucket in &self.buckets {
            stack.add_bucket(bucket.id.as_str(), bucket.props.clone())?;
        }
        for distribution in &self.distributions {
            stack.add_distribution(distribution.id.as_str(), distribution.props.clone())?;
        }
        for database in &self.databases {
            stack.add_database(database.id.as_str(), database.props.clone())?;
        }
        for output in &self.outputs {
            stack.add_output(output.id.as_str(), output.props.clone())?;
        }

        Ok(stack)
    }
}
