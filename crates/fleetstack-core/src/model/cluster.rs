//! Container orchestration cluster, its capacity and its addons
//!
//! A cluster starts with zero capacity. Node groups and Fargate profiles are
//! added explicitly and share one name space per cluster.

use super::iam::{
    CLUSTER_POLICY, EKS_FARGATE_PODS_SERVICE, EKS_SERVICE, FARGATE_POD_EXECUTION_POLICY,
};
use super::network::{Network, SubnetType};
use super::{
    AddonRef, LogicalId, NetworkRef, NodeGroupRef, ProfileRef, Role, RoleProps, RoleRef, to_pascal,
};
use crate::error::{Result, TopologyError};
use crate::graph::{ResourceNode, ValueExpr, reference, role_arn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Minimum subnet groups (and availability zones) the control plane needs
pub const MIN_CONTROL_PLANE_SUBNET_GROUPS: usize = 2;

/// Upper bound of selectors per Fargate profile
pub const MAX_FARGATE_SELECTORS: usize = 5;

pub const KUBE_PROXY: &str = "kube-proxy";
pub const COREDNS: &str = "coredns";
pub const VPC_CNI: &str = "vpc-cni";

/// Whether addons wait for the cluster's capacity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddonOrdering {
    /// Addons depend on the cluster only
    #[default]
    Independent,
    /// Addons also depend on every node group and Fargate profile of the cluster
    AfterCapacity,
}

impl FromStr for AddonOrdering {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "independent" => Ok(AddonOrdering::Independent),
            "after-capacity" => Ok(AddonOrdering::AfterCapacity),
            other => Err(TopologyError::InvalidConfig(format!(
                "unknown addon ordering '{}' (expected independent or after-capacity)",
                other
            ))),
        }
    }
}

/// Control plane version, `major.minor`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesVersion(String);

impl KubernetesVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for KubernetesVersion {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        let valid = s
            .split_once('.')
            .map(|(major, minor)| {
                !major.is_empty()
                    && !minor.is_empty()
                    && major.chars().all(|c| c.is_ascii_digit())
                    && minor.chars().all(|c| c.is_ascii_digit())
            })
            .unwrap_or(false);
        if !valid {
            return Err(TopologyError::InvalidConfig(format!(
                "invalid Kubernetes version '{}' (expected major.minor, e.g. 1.27)",
                s
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for KubernetesVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    Ipv4,
    Ipv6,
}

impl IpFamily {
    fn engine_name(&self) -> &'static str {
        match self {
            IpFamily::Ipv4 => "ipv4",
            IpFamily::Ipv6 => "ipv6",
        }
    }
}

impl FromStr for IpFamily {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ipv4" => Ok(IpFamily::Ipv4),
            "ipv6" => Ok(IpFamily::Ipv6),
            other => Err(TopologyError::InvalidConfig(format!(
                "unknown ip family '{}' (expected ipv4 or ipv6)",
                other
            ))),
        }
    }
}

/// Control plane log categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClusterLogType {
    Api,
    Audit,
    Authenticator,
    ControllerManager,
    Scheduler,
}

impl ClusterLogType {
    pub fn engine_name(&self) -> &'static str {
        match self {
            ClusterLogType::Api => "api",
            ClusterLogType::Audit => "audit",
            ClusterLogType::Authenticator => "authenticator",
            ClusterLogType::ControllerManager => "controllerManager",
            ClusterLogType::Scheduler => "scheduler",
        }
    }
}

impl FromStr for ClusterLogType {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "api" => Ok(ClusterLogType::Api),
            "audit" => Ok(ClusterLogType::Audit),
            "authenticator" => Ok(ClusterLogType::Authenticator),
            "controllerManager" | "controller-manager" => Ok(ClusterLogType::ControllerManager),
            "scheduler" => Ok(ClusterLogType::Scheduler),
            other => Err(TopologyError::InvalidConfig(format!(
                "unknown cluster log type '{}'",
                other
            ))),
        }
    }
}

/// Cluster declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterProps {
    pub network: NetworkRef,
    pub version: KubernetesVersion,
    pub ip_family: IpFamily,
    pub logging: BTreeSet<ClusterLogType>,

    /// Implicit worker capacity. Only 0 is accepted: capacity is declared
    /// through node groups and Fargate profiles so that it can be reviewed.
    pub default_capacity: u32,

    /// Export the cluster name as `<cluster>ClusterName`
    pub output_cluster_name: bool,

    /// Export the kubeconfig command as `<cluster>ConfigCommand`
    pub output_config_command: bool,
}

impl ClusterProps {
    pub fn new(network: NetworkRef, version: KubernetesVersion, ip_family: IpFamily) -> Self {
        Self {
            network,
            version,
            ip_family,
            logging: BTreeSet::new(),
            default_capacity: 0,
            output_cluster_name: false,
            output_config_command: false,
        }
    }

    pub fn with_logging(mut self, log_type: ClusterLogType) -> Self {
        self.logging.insert(log_type);
        self
    }
}

/// Node image family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmiType {
    Al2X86_64,
    Al2X86_64Gpu,
    Al2Arm64,
    Al2023X86_64Standard,
    Al2023Arm64Standard,
    BottlerocketX86_64,
    BottlerocketArm64,
}

impl AmiType {
    pub fn engine_name(&self) -> &'static str {
        match self {
            AmiType::Al2X86_64 => "AL2_x86_64",
            AmiType::Al2X86_64Gpu => "AL2_x86_64_GPU",
            AmiType::Al2Arm64 => "AL2_ARM_64",
            AmiType::Al2023X86_64Standard => "AL2023_x86_64_STANDARD",
            AmiType::Al2023Arm64Standard => "AL2023_ARM_64_STANDARD",
            AmiType::BottlerocketX86_64 => "BOTTLEROCKET_x86_64",
            AmiType::BottlerocketArm64 => "BOTTLEROCKET_ARM_64",
        }
    }
}

impl FromStr for AmiType {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        [
            AmiType::Al2X86_64,
            AmiType::Al2X86_64Gpu,
            AmiType::Al2Arm64,
            AmiType::Al2023X86_64Standard,
            AmiType::Al2023Arm64Standard,
            AmiType::BottlerocketX86_64,
            AmiType::BottlerocketArm64,
        ]
        .into_iter()
        .find(|ami| ami.engine_name().eq_ignore_ascii_case(s))
        .ok_or_else(|| TopologyError::InvalidConfig(format!("unknown AMI type '{}'", s)))
    }
}

/// Node group declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeGroupProps {
    pub node_role: RoleRef,
    pub instance_types: Vec<String>,
    pub ami_type: AmiType,
    pub desired_size: u32,
    /// Lower scaling bound; `None` pins it to `desired_size`
    pub min_size: Option<u32>,
    /// Upper scaling bound; `None` pins it to `desired_size`
    pub max_size: Option<u32>,
    pub disk_size_gib: u32,
    pub labels: BTreeMap<String, String>,
}

impl NodeGroupProps {
    pub fn new(
        node_role: RoleRef,
        instance_type: impl Into<String>,
        ami_type: AmiType,
        desired_size: u32,
        disk_size_gib: u32,
    ) -> Self {
        Self {
            node_role,
            instance_types: vec![instance_type.into()],
            ami_type,
            desired_size,
            min_size: None,
            max_size: None,
            disk_size_gib,
            labels: BTreeMap::new(),
        }
    }

    fn scaling(&self) -> (u32, u32, u32) {
        (
            self.min_size.unwrap_or(self.desired_size),
            self.desired_size,
            self.max_size.unwrap_or(self.desired_size),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub name: String,
    pub logical_id: String,
    pub props: NodeGroupProps,
}

/// Namespace selector of a Fargate profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FargateSelector {
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
}

impl FargateSelector {
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Identity the Fargate pods run under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodExecutionRole {
    /// Declare a dedicated role `<profile>PodExecutionRole` with the pod execution policy
    Generated,
    /// Use a role declared elsewhere in the stack
    Existing(RoleRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FargateProfileProps {
    pub selectors: Vec<FargateSelector>,
    pub pod_execution_role: PodExecutionRole,
}

impl FargateProfileProps {
    pub fn new(selectors: Vec<FargateSelector>, pod_execution_role: PodExecutionRole) -> Self {
        Self {
            selectors,
            pod_execution_role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FargateProfile {
    pub name: String,
    pub logical_id: String,
    pub props: FargateProfileProps,
}

impl FargateProfile {
    fn pod_execution_role_id(&self) -> String {
        match &self.props.pod_execution_role {
            PodExecutionRole::Generated => format!("{}PodExecutionRole", self.logical_id),
            PodExecutionRole::Existing(role) => role.id().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveConflicts {
    None,
    Overwrite,
    Preserve,
}

impl ResolveConflicts {
    fn engine_name(&self) -> &'static str {
        match self {
            ResolveConflicts::None => "NONE",
            ResolveConflicts::Overwrite => "OVERWRITE",
            ResolveConflicts::Preserve => "PRESERVE",
        }
    }
}

impl FromStr for ResolveConflicts {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ResolveConflicts::None),
            "overwrite" => Ok(ResolveConflicts::Overwrite),
            "preserve" => Ok(ResolveConflicts::Preserve),
            other => Err(TopologyError::InvalidConfig(format!(
                "unknown resolve-conflicts policy '{}'",
                other
            ))),
        }
    }
}

/// Addon declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonProps {
    pub name: String,
    /// Pinned addon version; `None` takes the engine's default for the cluster version
    pub version: Option<String>,
    pub resolve_conflicts: Option<ResolveConflicts>,
}

impl AddonProps {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            resolve_conflicts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addon {
    pub logical_id: String,
    pub props: AddonProps,
}

/// A constructed cluster with its registered capacity and addons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    id: LogicalId,
    props: ClusterProps,
    node_groups: BTreeMap<String, NodeGroup>,
    fargate_profiles: BTreeMap<String, FargateProfile>,
    /// Keyed by logical id
    addons: BTreeMap<String, Addon>,
}

impl Cluster {
    pub(crate) fn build(id: LogicalId, props: ClusterProps, network: &Network) -> Result<Self> {
        if props.default_capacity != 0 {
            return Err(TopologyError::invalid(
                &id,
                format!(
                    "default capacity of {} is implicit; set it to 0 and add node groups explicitly",
                    props.default_capacity
                ),
            ));
        }

        let groups = network.subnet_groups().len();
        if groups < MIN_CONTROL_PLANE_SUBNET_GROUPS {
            return Err(TopologyError::insufficient(
                &id,
                format!(
                    "network '{}' has {} subnet group(s), the control plane needs at least {}",
                    network.id(),
                    groups,
                    MIN_CONTROL_PLANE_SUBNET_GROUPS
                ),
            ));
        }
        let zones = network.availability_zone_count();
        if zones < MIN_CONTROL_PLANE_SUBNET_GROUPS {
            return Err(TopologyError::insufficient(
                &id,
                format!(
                    "network '{}' spans {} availability zone(s), the control plane needs at least {}",
                    network.id(),
                    zones,
                    MIN_CONTROL_PLANE_SUBNET_GROUPS
                ),
            ));
        }

        Ok(Self {
            id,
            props,
            node_groups: BTreeMap::new(),
            fargate_profiles: BTreeMap::new(),
            addons: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    pub fn props(&self) -> &ClusterProps {
        &self.props
    }

    pub fn node_groups(&self) -> impl Iterator<Item = &NodeGroup> {
        self.node_groups.values()
    }

    pub fn node_group(&self, name: &str) -> Option<&NodeGroup> {
        self.node_groups.get(name)
    }

    pub fn fargate_profiles(&self) -> impl Iterator<Item = &FargateProfile> {
        self.fargate_profiles.values()
    }

    pub fn fargate_profile(&self, name: &str) -> Option<&FargateProfile> {
        self.fargate_profiles.get(name)
    }

    pub fn addons(&self) -> impl Iterator<Item = &Addon> {
        self.addons.values()
    }

    /// Number of explicitly declared capacity mechanisms
    pub fn capacity_count(&self) -> usize {
        self.node_groups.len() + self.fargate_profiles.len()
    }

    fn role_id(&self) -> String {
        self.id.child("Role")
    }

    /// Names are compared by the logical id they produce, so `custom-node-group`
    /// and `custom_node_group` collide.
    fn check_capacity_name(&self, name: &str) -> Result<()> {
        LogicalId::new(name)?;
        let key = to_pascal(name);
        let taken = self
            .node_groups
            .keys()
            .chain(self.fargate_profiles.keys())
            .any(|existing| to_pascal(existing) == key);
        if taken {
            return Err(TopologyError::DuplicateCapacity {
                cluster: self.id.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn add_node_group(
        &mut self,
        name: &str,
        props: NodeGroupProps,
        role: &Role,
        network: &Network,
    ) -> Result<NodeGroupRef> {
        self.check_capacity_name(name)?;
        let logical_id = format!("{}Nodegroup{}", self.id, to_pascal(name));

        if let Some(missing) = role.missing_node_policy() {
            return Err(TopologyError::InvalidNodeRole {
                entity: logical_id,
                role: role.id().to_string(),
                missing: missing.to_string(),
            });
        }
        if props.instance_types.is_empty() {
            return Err(TopologyError::invalid(
                &logical_id,
                "at least one instance type is required",
            ));
        }
        if props.disk_size_gib == 0 {
            return Err(TopologyError::invalid(&logical_id, "disk size must be at least 1 GiB"));
        }
        let (min, desired, max) = props.scaling();
        if min > desired || desired > max || max == 0 {
            return Err(TopologyError::invalid(
                &logical_id,
                format!(
                    "scaling must satisfy min <= desired <= max and max >= 1 (got {}/{}/{})",
                    min, desired, max
                ),
            ));
        }
        if network.subnets(SubnetType::PrivateWithEgress).is_empty() {
            return Err(TopologyError::insufficient(
                &logical_id,
                format!("network '{}' has no private-with-egress subnets for nodes", network.id()),
            ));
        }

        tracing::debug!(cluster = %self.id, node_group = name, "Registered node group");
        self.node_groups.insert(
            name.to_string(),
            NodeGroup {
                name: name.to_string(),
                logical_id: logical_id.clone(),
                props,
            },
        );
        Ok(NodeGroupRef::new(LogicalId::new(logical_id)?))
    }

    pub(crate) fn add_fargate_profile(
        &mut self,
        name: &str,
        props: FargateProfileProps,
        network: &Network,
    ) -> Result<ProfileRef> {
        self.check_capacity_name(name)?;
        let logical_id = format!("{}FargateProfile{}", self.id, to_pascal(name));

        if props.selectors.is_empty() {
            return Err(TopologyError::InvalidProfile {
                entity: logical_id,
                reason: "at least one namespace selector is required".to_string(),
            });
        }
        if props.selectors.len() > MAX_FARGATE_SELECTORS {
            return Err(TopologyError::InvalidProfile {
                entity: logical_id,
                reason: format!("at most {} selectors are allowed", MAX_FARGATE_SELECTORS),
            });
        }
        if let Some(selector) = props.selectors.iter().find(|s| s.namespace.trim().is_empty()) {
            return Err(TopologyError::InvalidProfile {
                entity: logical_id,
                reason: format!(
                    "selector with labels {:?} has an empty namespace",
                    selector.labels
                ),
            });
        }
        if network.subnets(SubnetType::PrivateWithEgress).is_empty() {
            return Err(TopologyError::insufficient(
                &logical_id,
                format!(
                    "network '{}' has no private-with-egress subnets for Fargate pods",
                    network.id()
                ),
            ));
        }

        tracing::debug!(cluster = %self.id, profile = name, "Registered Fargate profile");
        self.fargate_profiles.insert(
            name.to_string(),
            FargateProfile {
                name: name.to_string(),
                logical_id: logical_id.clone(),
                props,
            },
        );
        Ok(ProfileRef::new(LogicalId::new(logical_id)?))
    }

    pub(crate) fn add_addon(&mut self, props: AddonProps) -> Result<AddonRef> {
        if props.name.trim().is_empty() {
            return Err(TopologyError::invalid(&self.id, "addon name must not be empty"));
        }
        let logical_id = format!("{}Addon{}", self.id, to_pascal(&props.name));
        if self.addons.contains_key(&logical_id) {
            return Err(TopologyError::DuplicateLogicalId(logical_id));
        }

        tracing::debug!(cluster = %self.id, addon = %props.name, "Registered addon");
        self.addons.insert(
            logical_id.clone(),
            Addon {
                logical_id: logical_id.clone(),
                props,
            },
        );
        Ok(AddonRef::new(LogicalId::new(logical_id)?))
    }

    /// Cluster name as seen by the engine
    pub fn cluster_name(&self) -> ValueExpr {
        ValueExpr::reference(self.id.as_str())
    }

    /// Command that writes a kubeconfig entry for this cluster
    pub fn config_command(&self) -> ValueExpr {
        ValueExpr::Join(vec![
            ValueExpr::Literal("aws eks update-kubeconfig --name ".to_string()),
            self.cluster_name(),
            ValueExpr::Literal(" --region ".to_string()),
            ValueExpr::reference("AWS::Region"),
        ])
    }

    pub(crate) fn resources(
        &self,
        network: &Network,
        ordering: AddonOrdering,
    ) -> Vec<ResourceNode> {
        let cluster_id = self.id.as_str();
        let private_subnets: Vec<Value> = network
            .subnets(SubnetType::PrivateWithEgress)
            .iter()
            .map(|s| reference(&s.logical_id))
            .collect();
        let all_subnets: Vec<Value> = network
            .all_subnets()
            .iter()
            .map(|s| reference(&s.logical_id))
            .collect();

        let mut nodes = vec![super::iam::role_resource(
            &self.role_id(),
            &RoleProps::new(EKS_SERVICE).with_managed_policy(CLUSTER_POLICY),
        )];

        let mut cluster = json!({
            "Version": self.props.version.as_str(),
            "RoleArn": role_arn(&self.role_id()),
            "ResourcesVpcConfig": {
                "SubnetIds": all_subnets,
                "EndpointPublicAccess": true,
                "EndpointPrivateAccess": true,
            },
            "KubernetesNetworkConfig": { "IpFamily": self.props.ip_family.engine_name() },
        });
        if !self.props.logging.is_empty() {
            let enabled: Vec<Value> = self
                .props
                .logging
                .iter()
                .map(|t| json!({ "Type": t.engine_name() }))
                .collect();
            cluster["Logging"] = json!({ "ClusterLogging": { "EnabledTypes": enabled } });
        }
        nodes.push(ResourceNode::new(cluster_id, "AWS::EKS::Cluster", cluster));

        for group in self.node_groups.values() {
            let (min, desired, max) = group.props.scaling();
            let mut properties = json!({
                "ClusterName": reference(cluster_id),
                "NodegroupName": group.name,
                "NodeRole": role_arn(group.props.node_role.id().as_str()),
                "Subnets": private_subnets,
                "ScalingConfig": { "MinSize": min, "DesiredSize": desired, "MaxSize": max },
                "InstanceTypes": group.props.instance_types,
                "AmiType": group.props.ami_type.engine_name(),
                "DiskSize": group.props.disk_size_gib,
            });
            if !group.props.labels.is_empty() {
                properties["Labels"] = json!(group.props.labels);
            }
            nodes.push(ResourceNode::new(
                group.logical_id.as_str(),
                "AWS::EKS::Nodegroup",
                properties,
            ));
        }

        for profile in self.fargate_profiles.values() {
            if profile.props.pod_execution_role == PodExecutionRole::Generated {
                nodes.push(super::iam::role_resource(
                    &profile.pod_execution_role_id(),
                    &RoleProps::new(EKS_FARGATE_PODS_SERVICE)
                        .with_managed_policy(FARGATE_POD_EXECUTION_POLICY),
                ));
            }
            let selectors: Vec<Value> = profile
                .props
                .selectors
                .iter()
                .map(|s| {
                    let mut selector = json!({ "Namespace": s.namespace });
                    if !s.labels.is_empty() {
                        let labels: Vec<Value> = s
                            .labels
                            .iter()
                            .map(|(k, v)| json!({ "Key": k, "Value": v }))
                            .collect();
                        selector["Labels"] = Value::Array(labels);
                    }
                    selector
                })
                .collect();
            nodes.push(ResourceNode::new(
                profile.logical_id.as_str(),
                "AWS::EKS::FargateProfile",
                json!({
                    "ClusterName": reference(cluster_id),
                    "FargateProfileName": profile.name,
                    "PodExecutionRoleArn": role_arn(&profile.pod_execution_role_id()),
                    "Selectors": selectors,
                    "Subnets": private_subnets,
                }),
            ));
        }

        let capacity_ids: Vec<&str> = self
            .node_groups
            .values()
            .map(|g| g.logical_id.as_str())
            .chain(self.fargate_profiles.values().map(|p| p.logical_id.as_str()))
            .collect();

        for addon in self.addons.values() {
            let mut properties = json!({
                "AddonName": addon.props.name,
                "ClusterName": reference(cluster_id),
            });
            if let Some(version) = &addon.props.version {
                properties["AddonVersion"] = json!(version);
            }
            if let Some(policy) = addon.props.resolve_conflicts {
                properties["ResolveConflicts"] = json!(policy.engine_name());
            }
            let mut node =
                ResourceNode::new(addon.logical_id.as_str(), "AWS::EKS::Addon", properties);
            if ordering == AddonOrdering::AfterCapacity {
                for id in &capacity_ids {
                    node = node.with_depends_on(*id);
                }
            }
            nodes.push(node);
        }

        nodes
    }
}
