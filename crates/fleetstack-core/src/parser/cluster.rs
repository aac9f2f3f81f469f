//! cluster node with its capacity and addons

use super::{
    bool_arg, check_properties, children, declared_id, integer_arg, parsed_arg, required,
    set_once, string_arg, string_args, string_prop, unknown_key,
};
use crate::error::{Result, TopologyError};
use crate::model::{
    AddonProps, AmiType, Capacity, ClusterDeclaration, ClusterLogType, ClusterProps,
    FargateProfileProps, FargateSelector, IpFamily, LogicalId, NetworkRef, NodeGroupProps,
    PodExecutionRole, ResolveConflicts, RoleRef,
};
use kdl::KdlNode;
use std::collections::{BTreeMap, BTreeSet};

pub fn parse_cluster(node: &KdlNode) -> Result<ClusterDeclaration> {
    let id = declared_id(node)?;
    let owner = id.as_str();

    let mut network = None;
    let mut version = None;
    let mut ip_family = None;
    let mut default_capacity = None;
    let mut logging = BTreeSet::new();
    let mut output_cluster_name = None;
    let mut output_config_command = None;
    let mut node_groups = Vec::new();
    let mut fargate_profiles = Vec::new();
    let mut addons = Vec::new();

    for child in children(node) {
        match child.name().value() {
            "network" => {
                set_once(&mut network, LogicalId::new(string_arg(child)?)?, node, owner, child)?
            }
            "version" => set_once(&mut version, parsed_arg(child)?, node, owner, child)?,
            "ip-family" => {
                set_once(&mut ip_family, parsed_arg::<IpFamily>(child)?, node, owner, child)?
            }
            "default-capacity" => {
                let capacity = integer_arg::<u32>(child)?;
                set_once(&mut default_capacity, capacity, node, owner, child)?
            }
            "logging" => {
                for value in string_args(child)? {
                    logging.insert(value.parse::<ClusterLogType>()?);
                }
            }
            "output-cluster-name" => {
                set_once(&mut output_cluster_name, bool_arg(child)?, node, owner, child)?
            }
            "output-config-command" => {
                set_once(&mut output_config_command, bool_arg(child)?, node, owner, child)?
            }
            "node-group" => node_groups.push(parse_node_group(child, owner)?),
            "fargate-profile" => fargate_profiles.push(parse_fargate_profile(child, owner)?),
            "addon" => addons.push(parse_addon(child, owner)?),
            _ => return Err(unknown_key(node, owner, child)),
        }
    }

    let mut props = ClusterProps::new(
        NetworkRef::new(required(network, node, owner, "network")?),
        required(version, node, owner, "version")?,
        required(ip_family, node, owner, "ip-family")?,
    );
    props.default_capacity = required(default_capacity, node, owner, "default-capacity")?;
    props.logging = logging;
    props.output_cluster_name = output_cluster_name.unwrap_or(false);
    props.output_config_command = output_config_command.unwrap_or(false);

    Ok(ClusterDeclaration {
        id,
        props,
        node_groups,
        fargate_profiles,
        addons,
    })
}

/// ```kdl
/// node-group "custom-node-group" {
///     instance-types "m5.large"
///     ami-type "AL2_x86_64"
///     desired-size 2
///     disk-size 20
///     node-role "NodeRole"
/// }
/// ```
fn parse_node_group(node: &KdlNode, cluster: &str) -> Result<Capacity<NodeGroupProps>> {
    let name = string_arg(node)?;
    let owner = format!("{}/{}", cluster, name);

    let mut node_role = None;
    let mut instance_types = None;
    let mut ami_type = None;
    let mut desired_size = None;
    let mut min_size = None;
    let mut max_size = None;
    let mut disk_size = None;
    let mut labels = BTreeMap::new();

    for child in children(node) {
        match child.name().value() {
            "node-role" => {
                let role = LogicalId::new(string_arg(child)?)?;
                set_once(&mut node_role, role, node, &owner, child)?
            }
            "instance-types" => {
                set_once(&mut instance_types, string_args(child)?, node, &owner, child)?
            }
            "ami-type" => {
                set_once(&mut ami_type, parsed_arg::<AmiType>(child)?, node, &owner, child)?
            }
            "desired-size" => {
                set_once(&mut desired_size, integer_arg::<u32>(child)?, node, &owner, child)?
            }
            "min-size" => {
                set_once(&mut min_size, integer_arg::<u32>(child)?, node, &owner, child)?
            }
            "max-size" => {
                set_once(&mut max_size, integer_arg::<u32>(child)?, node, &owner, child)?
            }
            "disk-size" => {
                set_once(&mut disk_size, integer_arg::<u32>(child)?, node, &owner, child)?
            }
            "label" => {
                let (key, value) = parse_label(child)?;
                labels.insert(key, value);
            }
            _ => return Err(unknown_key(node, &owner, child)),
        }
    }

    Ok(Capacity {
        name,
        props: NodeGroupProps {
            node_role: RoleRef::new(required(node_role, node, &owner, "node-role")?),
            instance_types: required(instance_types, node, &owner, "instance-types")?,
            ami_type: required(ami_type, node, &owner, "ami-type")?,
            desired_size: required(desired_size, node, &owner, "desired-size")?,
            min_size,
            max_size,
            disk_size_gib: required(disk_size, node, &owner, "disk-size")?,
            labels,
        },
    })
}

/// ```kdl
/// fargate-profile "myProfile" {
///     selector namespace="default" {
///         label "tier" "web"
///     }
///     pod-execution-role "PodRole"
/// }
/// ```
///
/// Without `pod-execution-role` a dedicated role is generated for the profile.
fn parse_fargate_profile(node: &KdlNode, cluster: &str) -> Result<Capacity<FargateProfileProps>> {
    let name = string_arg(node)?;
    let owner = format!("{}/{}", cluster, name);

    let mut selectors = Vec::new();
    let mut pod_execution_role = None;

    for child in children(node) {
        match child.name().value() {
            "selector" => selectors.push(parse_selector(child, &owner)?),
            "pod-execution-role" => {
                let role = RoleRef::new(LogicalId::new(string_arg(child)?)?);
                set_once(&mut pod_execution_role, role, node, &owner, child)?
            }
            _ => return Err(unknown_key(node, &owner, child)),
        }
    }

    Ok(Capacity {
        name,
        props: FargateProfileProps::new(
            selectors,
            pod_execution_role.map_or(PodExecutionRole::Generated, PodExecutionRole::Existing),
        ),
    })
}

fn parse_selector(node: &KdlNode, owner: &str) -> Result<FargateSelector> {
    check_properties(node, owner, &["namespace"])?;
    let namespace = required(string_prop(node, "namespace")?, node, owner, "namespace")?;
    let mut selector = FargateSelector::namespace(namespace);
    for child in children(node) {
        match child.name().value() {
            "label" => {
                let (key, value) = parse_label(child)?;
                selector = selector.with_label(key, value);
            }
            _ => return Err(unknown_key(node, owner, child)),
        }
    }
    Ok(selector)
}

/// `label "key" "value"`
fn parse_label(node: &KdlNode) -> Result<(String, String)> {
    match string_args(node)?.as_slice() {
        [key, value] => Ok((key.clone(), value.clone())),
        _ => Err(TopologyError::InvalidConfig(
            "label requires a key and a value".to_string(),
        )),
    }
}

/// `addon "kube-proxy" version="v1.27.1-eksbuild.1" resolve-conflicts="overwrite"`
fn parse_addon(node: &KdlNode, cluster: &str) -> Result<AddonProps> {
    check_properties(node, cluster, &["version", "resolve-conflicts"])?;
    let mut props = AddonProps::new(string_arg(node)?);
    props.version = string_prop(node, "version")?;
    props.resolve_conflicts = string_prop(node, "resolve-conflicts")?
        .map(|value| value.parse::<ResolveConflicts>())
        .transpose()?;
    Ok(props)
}
