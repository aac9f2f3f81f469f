//! network and role nodes

use super::{
    check_properties, children, declared_id, integer_arg, integer_prop, parsed_arg, required,
    set_once, string_arg, string_args, string_prop, unknown_key,
};
use crate::error::Result;
use crate::model::{Declaration, NetworkProps, RoleProps, SubnetGroupSpec, SubnetType};
use kdl::KdlNode;

/// ```kdl
/// network "MyVPC" {
///     cidr "10.0.0.0/16"
///     max-azs 2
///     nat-gateways 1
///     subnet "Public" type="public" mask=24
/// }
/// ```
pub fn parse_network(node: &KdlNode) -> Result<Declaration<NetworkProps>> {
    let id = declared_id(node)?;
    let owner = id.as_str();

    let mut cidr = None;
    let mut max_azs = None;
    let mut nat_gateways = None;
    let mut groups = Vec::new();

    for child in children(node) {
        match child.name().value() {
            "cidr" => set_once(&mut cidr, parsed_arg(child)?, node, owner, child)?,
            "max-azs" => set_once(&mut max_azs, integer_arg::<u8>(child)?, node, owner, child)?,
            "nat-gateways" => {
                set_once(&mut nat_gateways, integer_arg::<u8>(child)?, node, owner, child)?
            }
            "subnet" => groups.push(parse_subnet(child, owner)?),
            _ => return Err(unknown_key(node, owner, child)),
        }
    }

    let mut props = NetworkProps::new(
        required(cidr, node, owner, "cidr")?,
        required(max_azs, node, owner, "max-azs")?,
        required(nat_gateways, node, owner, "nat-gateways")?,
    );
    props.subnet_groups = groups;

    Ok(Declaration::new(id, props))
}

fn parse_subnet(node: &KdlNode, network: &str) -> Result<SubnetGroupSpec> {
    check_properties(node, network, &["type", "mask"])?;
    let name = string_arg(node)?;
    let subnet_type: SubnetType =
        required(string_prop(node, "type")?, node, network, "type")?.parse()?;
    let mask = required(integer_prop::<u8>(node, "mask")?, node, network, "mask")?;
    Ok(SubnetGroupSpec::new(name, subnet_type, mask))
}

/// ```kdl
/// role "NodeRole" {
///     role-name "eksClusterNodeGroupRole"
///     assumed-by "ec2.amazonaws.com"
///     managed-policy "AmazonEKSWorkerNodePolicy" "AmazonEKS_CNI_Policy"
/// }
/// ```
pub fn parse_role(node: &KdlNode) -> Result<Declaration<RoleProps>> {
    let id = declared_id(node)?;
    let owner = id.as_str();

    let mut role_name = None;
    let mut assumed_by = None;
    let mut policies = Vec::new();

    for child in children(node) {
        match child.name().value() {
            "role-name" => set_once(&mut role_name, string_arg(child)?, node, owner, child)?,
            "assumed-by" => set_once(&mut assumed_by, string_arg(child)?, node, owner, child)?,
            "managed-policy" => policies.extend(string_args(child)?),
            _ => return Err(unknown_key(node, owner, child)),
        }
    }

    let mut props = RoleProps::new(required(assumed_by, node, owner, "assumed-by")?);
    props.role_name = role_name;
    for policy in policies {
        props = props.with_managed_policy(policy);
    }

    Ok(Declaration::new(id, props))
}
