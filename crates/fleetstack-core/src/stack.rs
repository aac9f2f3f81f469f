//! Stack construction
//!
//! A `Stack` owns every constructed entity. Each `add_*` call validates its
//! declaration against the entities already present and hands back a typed
//! handle; handles of other entities are resolved on the way in, so an
//! entity can only be added after everything it refers to.

use crate::error::{Result, TopologyError};
use crate::graph::ResourceGraph;
use crate::model::{
    AddonOrdering, AddonProps, AddonRef, Bucket, BucketProps, BucketRef, Cluster, ClusterProps,
    ClusterRef, DatabaseInstance, DatabaseProps, DatabaseRef, Distribution, DistributionProps,
    DistributionRef, Exportable, FargateProfileProps, LogicalId, Network, NetworkProps,
    NetworkRef, NodeGroupProps, NodeGroupRef, Output, OutputProps, OutputRef, PodExecutionRole,
    ProfileRef, Projection, Role, RoleProps, RoleRef,
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    addon_ordering: AddonOrdering,
    claimed: BTreeSet<LogicalId>,
    networks: BTreeMap<LogicalId, Network>,
    roles: BTreeMap<LogicalId, Role>,
    clusters: BTreeMap<LogicalId, Cluster>,
    buckets: BTreeMap<LogicalId, Bucket>,
    distributions: BTreeMap<LogicalId, Distribution>,
    databases: BTreeMap<LogicalId, DatabaseInstance>,
    outputs: BTreeMap<LogicalId, Output>,
}

fn unknown(entity: impl ToString, target: &LogicalId) -> TopologyError {
    TopologyError::UnknownReference {
        entity: entity.to_string(),
        target: target.to_string(),
    }
}

impl Stack {
    pub fn new(name: &str, addon_ordering: AddonOrdering) -> Result<Self> {
        let name = LogicalId::new(name)?;
        Ok(Self {
            name: name.to_string(),
            addon_ordering,
            claimed: BTreeSet::new(),
            networks: BTreeMap::new(),
            roles: BTreeMap::new(),
            clusters: BTreeMap::new(),
            buckets: BTreeMap::new(),
            distributions: BTreeMap::new(),
            databases: BTreeMap::new(),
            outputs: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addon_ordering(&self) -> AddonOrdering {
        self.addon_ordering
    }

    /// Validate an id that is about to be declared
    fn unclaimed(&self, id: &str) -> Result<LogicalId> {
        let id = LogicalId::new(id)?;
        if self.claimed.contains(&id) {
            return Err(TopologyError::DuplicateLogicalId(id.to_string()));
        }
        Ok(id)
    }

    fn resolve_network(&self, entity: &LogicalId, network: &NetworkRef) -> Result<&Network> {
        self.networks
            .get(network.id())
            .ok_or_else(|| unknown(entity, network.id()))
    }

    pub fn add_network(&mut self, id: &str, props: NetworkProps) -> Result<NetworkRef> {
        let id = self.unclaimed(id)?;
        let network = Network::build(id.clone(), props)?;
        self.claimed.insert(id.clone());
        tracing::debug!(network = %id, "Added network");
        self.networks.insert(id.clone(), network);
        Ok(NetworkRef::new(id))
    }

    pub fn add_role(&mut self, id: &str, props: RoleProps) -> Result<RoleRef> {
        let id = self.unclaimed(id)?;
        let role = Role::build(id.clone(), props)?;
        self.claimed.insert(id.clone());
        tracing::debug!(role = %id, "Added role");
        self.roles.insert(id.clone(), role);
        Ok(RoleRef::new(id))
    }

    pub fn add_cluster(&mut self, id: &str, props: ClusterProps) -> Result<ClusterRef> {
        let id = self.unclaimed(id)?;
        let network = self.resolve_network(&id, &props.network)?;
        let cluster = Cluster::build(id.clone(), props, network)?;

        let mut exported = Vec::new();
        if cluster.props().output_cluster_name {
            exported.push((cluster.id().child("ClusterName"), Projection::ClusterName));
        }
        if cluster.props().output_config_command {
            exported.push((cluster.id().child("ConfigCommand"), Projection::ConfigCommand));
        }
        let mut outputs = Vec::with_capacity(exported.len());
        for (name, projection) in exported {
            outputs.push((self.unclaimed(&name)?, projection));
        }

        self.claimed.insert(id.clone());
        for (name, projection) in outputs {
            self.claimed.insert(name.clone());
            let output = Output::build(
                name.clone(),
                OutputProps::new(id.clone(), projection),
                &cluster,
            )?;
            self.outputs.insert(name, output);
        }

        tracing::debug!(cluster = %id, version = %cluster.props().version, "Added cluster");
        self.clusters.insert(id.clone(), cluster);
        Ok(ClusterRef::new(id))
    }

    pub fn add_node_group(
        &mut self,
        cluster: &ClusterRef,
        name: &str,
        props: NodeGroupProps,
    ) -> Result<NodeGroupRef> {
        let entity = cluster.id().child(&format!("nodegroup-{}", name));
        let role = self
            .roles
            .get(props.node_role.id())
            .ok_or_else(|| unknown(&entity, props.node_role.id()))?;
        let target = self
            .clusters
            .get_mut(cluster.id())
            .ok_or_else(|| unknown(&entity, cluster.id()))?;
        let network = self
            .networks
            .get(target.props().network.id())
            .ok_or_else(|| unknown(target.id(), target.props().network.id()))?;
        target.add_node_group(name, props, role, network)
    }

    pub fn add_fargate_profile(
        &mut self,
        cluster: &ClusterRef,
        name: &str,
        props: FargateProfileProps,
    ) -> Result<ProfileRef> {
        let entity = cluster.id().child(&format!("fargate-profile-{}", name));
        if let PodExecutionRole::Existing(role) = &props.pod_execution_role
            && !self.roles.contains_key(role.id())
        {
            return Err(unknown(&entity, role.id()));
        }
        let target = self
            .clusters
            .get_mut(cluster.id())
            .ok_or_else(|| unknown(&entity, cluster.id()))?;
        let network = self
            .networks
            .get(target.props().network.id())
            .ok_or_else(|| unknown(target.id(), target.props().network.id()))?;
        target.add_fargate_profile(name, props, network)
    }

    pub fn add_addon(&mut self, cluster: &ClusterRef, props: AddonProps) -> Result<AddonRef> {
        let target = self
            .clusters
            .get_mut(cluster.id())
            .ok_or_else(|| unknown(&props.name, cluster.id()))?;
        target.add_addon(props)
    }

    pub fn add_bucket(&mut self, id: &str, props: BucketProps) -> Result<BucketRef> {
        let id = self.unclaimed(id)?;
        let bucket = Bucket::build(id.clone(), props)?;
        self.claimed.insert(id.clone());
        tracing::debug!(bucket = %id, "Added bucket");
        self.buckets.insert(id.clone(), bucket);
        Ok(BucketRef::new(id))
    }

    pub fn add_distribution(
        &mut self,
        id: &str,
        props: DistributionProps,
    ) -> Result<DistributionRef> {
        let id = self.unclaimed(id)?;
        if !self.buckets.contains_key(props.origin.id()) {
            return Err(unknown(&id, props.origin.id()));
        }
        let distribution = Distribution::build(id.clone(), props)?;
        self.claimed.insert(id.clone());
        tracing::debug!(
            distribution = %id,
            origin = %distribution.props().origin,
            "Added distribution"
        );
        self.distributions.insert(id.clone(), distribution);
        Ok(DistributionRef::new(id))
    }

    pub fn add_database(&mut self, id: &str, props: DatabaseProps) -> Result<DatabaseRef> {
        let id = self.unclaimed(id)?;
        let network = self.resolve_network(&id, &props.network)?;
        let database = DatabaseInstance::build(id.clone(), props, network)?;
        self.claimed.insert(id.clone());
        tracing::debug!(
            database = %id,
            engine = %database.props().engine,
            teardown = %database.teardown(),
            "Added database"
        );
        self.databases.insert(id.clone(), database);
        Ok(DatabaseRef::new(id))
    }

    /// Entity the output source names, if it can export values
    fn exportable(&self, id: &LogicalId) -> Option<&dyn Exportable> {
        if let Some(cluster) = self.clusters.get(id) {
            return Some(cluster);
        }
        if let Some(bucket) = self.buckets.get(id) {
            return Some(bucket);
        }
        if let Some(distribution) = self.distributions.get(id) {
            return Some(distribution);
        }
        if let Some(database) = self.databases.get(id) {
            return Some(database);
        }
        None
    }

    pub fn add_output(&mut self, name: &str, props: OutputProps) -> Result<OutputRef> {
        let name = self.unclaimed(name)?;
        let output = match self.exportable(&props.source) {
            Some(source) => Output::build(name.clone(), props, source)?,
            None if self.claimed.contains(&props.source) => {
                return Err(TopologyError::MissingProjection {
                    entity: props.source.to_string(),
                    projection: props.projection.to_string(),
                });
            }
            None => return Err(unknown(&name, &props.source)),
        };
        self.claimed.insert(name.clone());
        tracing::debug!(output = %name, value = %output.value(), "Added output");
        self.outputs.insert(name.clone(), output);
        Ok(OutputRef::new(name))
    }

    pub fn network(&self, handle: &NetworkRef) -> Option<&Network> {
        self.networks.get(handle.id())
    }

    pub fn role(&self, handle: &RoleRef) -> Option<&Role> {
        self.roles.get(handle.id())
    }

    pub fn cluster(&self, handle: &ClusterRef) -> Option<&Cluster> {
        self.clusters.get(handle.id())
    }

    pub fn bucket(&self, handle: &BucketRef) -> Option<&Bucket> {
        self.buckets.get(handle.id())
    }

    pub fn distribution(&self, handle: &DistributionRef) -> Option<&Distribution> {
        self.distributions.get(handle.id())
    }

    pub fn database(&self, handle: &DatabaseRef) -> Option<&DatabaseInstance> {
        self.databases.get(handle.id())
    }

    pub fn output(&self, handle: &OutputRef) -> Option<&Output> {
        self.outputs.get(handle.id())
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }

    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values()
    }

    pub fn distributions(&self) -> impl Iterator<Item = &Distribution> {
        self.distributions.values()
    }

    pub fn databases(&self) -> impl Iterator<Item = &DatabaseInstance> {
        self.databases.values()
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.outputs.values()
    }

    /// Emit the resource graph.
    ///
    /// Fails without a partial graph if derived logical ids collide, a
    /// reference dangles or the dependencies form a cycle.
    pub fn synth(&self) -> Result<ResourceGraph> {
        let mut graph = ResourceGraph::new(self.name.as_str());

        for network in self.networks.values() {
            for node in network.resources() {
                graph.insert(node)?;
            }
        }
        for role in self.roles.values() {
            graph.insert(role.resource())?;
        }
        for cluster in self.clusters.values() {
            let network = self
                .networks
                .get(cluster.props().network.id())
                .ok_or_else(|| unknown(cluster.id(), cluster.props().network.id()))?;
            for node in cluster.resources(network, self.addon_ordering) {
                graph.insert(node)?;
            }
        }
        for bucket in self.buckets.values() {
            graph.insert(bucket.resource())?;
        }
        for distribution in self.distributions.values() {
            for node in distribution.resources() {
                graph.insert(node)?;
            }
        }
        for database in self.databases.values() {
            for node in database.resources() {
                graph.insert(node)?;
            }
        }
        for output in self.outputs.values() {
            graph.insert_output(output.node())?;
        }

        graph.validate_references()?;
        graph.dependency_order()?;

        tracing::info!(
            stack = %self.name,
            resources = graph.resources.len(),
            outputs = graph.outputs.len(),
            "Synthesized resource graph"
        );
        Ok(graph)
    }
}
