//! Network topology: an isolated address block split into subnet groups
//!
//! Each subnet group is replicated once per availability zone. Subnet CIDRs
//! are allocated in declaration order, aligned to each group's mask.

use super::LogicalId;
use crate::error::{Result, TopologyError};
use crate::graph::{ResourceNode, attribute, reference};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Addresses the provider keeps in every subnet (network, router, DNS, future, broadcast)
pub const RESERVED_ADDRESSES_PER_SUBNET: u32 = 5;

/// Widest mask the provider accepts for a network or subnet
pub const MIN_MASK: u8 = 16;

/// Narrowest mask the provider accepts; /28 keeps 11 usable addresses after reservation
pub const MAX_MASK: u8 = 28;

/// An IPv4 block in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ipv4Cidr {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(TopologyError::InvalidConfig(format!(
                "IPv4 prefix length must be <= 32, got {}",
                prefix_len
            )));
        }
        let cidr = Self {
            address,
            prefix_len,
        };
        if u32::from(address) & !cidr.netmask() != 0 {
            return Err(TopologyError::InvalidConfig(format!(
                "{} has host bits set",
                cidr
            )));
        }
        Ok(cidr)
    }

    fn netmask(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix_len)
        }
    }

    /// Number of addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - self.prefix_len)
    }

    pub fn start(&self) -> u64 {
        u64::from(u32::from(self.address))
    }

    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix_len >= self.prefix_len
            && other.start() >= self.start()
            && other.start() + other.size() <= self.start() + self.size()
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        let (address, prefix) = s
            .split_once('/')
            .ok_or_else(|| TopologyError::InvalidConfig(format!("invalid CIDR notation: {}", s)))?;
        let address = address.parse::<Ipv4Addr>().map_err(|e| {
            TopologyError::InvalidConfig(format!("invalid IPv4 address in {}: {}", s, e))
        })?;
        let prefix_len = prefix.parse::<u8>().map_err(|e| {
            TopologyError::InvalidConfig(format!("invalid prefix length in {}: {}", s, e))
        })?;
        Self::new(address, prefix_len)
    }
}

/// Routing classification of a subnet group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubnetType {
    /// Routed to the internet gateway; instances may receive public addresses
    Public,
    /// No inbound reachability; outbound traffic leaves through a NAT gateway
    PrivateWithEgress,
}

impl fmt::Display for SubnetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubnetType::Public => write!(f, "public"),
            SubnetType::PrivateWithEgress => write!(f, "private-with-egress"),
        }
    }
}

impl FromStr for SubnetType {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "public" => Ok(SubnetType::Public),
            "private-with-egress" | "private" => Ok(SubnetType::PrivateWithEgress),
            other => Err(TopologyError::InvalidConfig(format!(
                "unknown subnet type '{}' (expected public or private-with-egress)",
                other
            ))),
        }
    }
}

/// Requested subnet group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetGroupSpec {
    pub name: String,
    pub subnet_type: SubnetType,
    /// Mask bits of every subnet in the group
    pub mask: u8,
}

impl SubnetGroupSpec {
    pub fn new(name: impl Into<String>, subnet_type: SubnetType, mask: u8) -> Self {
        Self {
            name: name.into(),
            subnet_type,
            mask,
        }
    }
}

/// Network declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProps {
    /// Address block of the whole network
    pub cidr: Ipv4Cidr,

    /// Number of availability zones each subnet group is replicated over
    pub max_azs: u8,

    /// NAT gateways placed in the first public group, one per zone at most
    pub nat_gateways: u8,

    pub subnet_groups: Vec<SubnetGroupSpec>,
}

impl NetworkProps {
    pub fn new(cidr: Ipv4Cidr, max_azs: u8, nat_gateways: u8) -> Self {
        Self {
            cidr,
            max_azs,
            nat_gateways,
            subnet_groups: Vec::new(),
        }
    }

    pub fn with_subnet_group(mut self, group: SubnetGroupSpec) -> Self {
        self.subnet_groups.push(group);
        self
    }
}

/// One subnet of a group, pinned to an availability zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub logical_id: String,
    /// Index into the region's availability zone list
    pub az_index: u8,
    pub cidr: Ipv4Cidr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetGroup {
    pub name: String,
    pub subnet_type: SubnetType,
    pub mask: u8,
    pub subnets: Vec<Subnet>,
}

/// A constructed network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    id: LogicalId,
    props: NetworkProps,
    groups: Vec<SubnetGroup>,
}

impl Network {
    pub(crate) fn build(id: LogicalId, props: NetworkProps) -> Result<Self> {
        if !(MIN_MASK..=MAX_MASK).contains(&props.cidr.prefix_len) {
            return Err(TopologyError::invalid(
                &id,
                format!(
                    "network block {} must have a mask between /{} and /{}",
                    props.cidr, MIN_MASK, MAX_MASK
                ),
            ));
        }
        if props.subnet_groups.is_empty() {
            return Err(TopologyError::invalid(&id, "at least one subnet group is required"));
        }
        if props.max_azs == 0 {
            return Err(TopologyError::invalid(&id, "max_azs must be at least 1"));
        }

        let mut names = HashSet::new();
        for group in &props.subnet_groups {
            if !names.insert(group.name.as_str()) {
                return Err(TopologyError::invalid(
                    &id,
                    format!("subnet group name '{}' is used twice", group.name),
                ));
            }
            LogicalId::new(group.name.as_str())?;
            validate_mask(&id, group, &props.cidr)?;
        }

        let has_public = props
            .subnet_groups
            .iter()
            .any(|g| g.subnet_type == SubnetType::Public);
        let has_private = props
            .subnet_groups
            .iter()
            .any(|g| g.subnet_type == SubnetType::PrivateWithEgress);
        if has_private && !has_public {
            return Err(TopologyError::invalid(
                &id,
                "private-with-egress subnets need a public subnet group to host NAT gateways",
            ));
        }
        if has_private && props.nat_gateways == 0 {
            return Err(TopologyError::invalid(
                &id,
                "private-with-egress subnets need at least one NAT gateway",
            ));
        }
        if !has_private && props.nat_gateways > 0 {
            return Err(TopologyError::invalid(
                &id,
                "NAT gateways are declared but no private-with-egress subnet group uses them",
            ));
        }
        if props.nat_gateways > props.max_azs {
            return Err(TopologyError::invalid(
                &id,
                format!(
                    "{} NAT gateways requested but only {} availability zones are used",
                    props.nat_gateways, props.max_azs
                ),
            ));
        }

        let groups = allocate(&id, &props)?;
        tracing::debug!(
            network = %id,
            groups = groups.len(),
            subnets = groups.iter().map(|g| g.subnets.len()).sum::<usize>(),
            "Allocated subnets"
        );

        Ok(Self { id, props, groups })
    }

    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    pub fn props(&self) -> &NetworkProps {
        &self.props
    }

    pub fn subnet_groups(&self) -> &[SubnetGroup] {
        &self.groups
    }

    pub fn subnet_group(&self, name: &str) -> Option<&SubnetGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Every subnet of the given classification, in allocation order
    pub fn subnets(&self, subnet_type: SubnetType) -> Vec<&Subnet> {
        self.groups
            .iter()
            .filter(|g| g.subnet_type == subnet_type)
            .flat_map(|g| g.subnets.iter())
            .collect()
    }

    pub fn all_subnets(&self) -> Vec<&Subnet> {
        self.groups.iter().flat_map(|g| g.subnets.iter()).collect()
    }

    /// Number of distinct availability zones covered by the subnets
    pub fn availability_zone_count(&self) -> usize {
        self.all_subnets()
            .iter()
            .map(|s| s.az_index)
            .collect::<BTreeSet<_>>()
            .len()
    }

    fn internet_gateway_id(&self) -> String {
        self.id.child("IGW")
    }

    fn gateway_attachment_id(&self) -> String {
        self.id.child("VPCGW")
    }

    /// NAT gateway ids, one per zone of the first public group
    fn nat_gateway_ids(&self) -> Vec<String> {
        self.groups
            .iter()
            .find(|g| g.subnet_type == SubnetType::Public)
            .map(|g| {
                g.subnets
                    .iter()
                    .take(self.props.nat_gateways as usize)
                    .map(|s| format!("{}NATGateway", s.logical_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn resources(&self) -> Vec<ResourceNode> {
        let vpc_id = self.id.as_str();
        let mut nodes = vec![ResourceNode::new(
            vpc_id,
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": self.props.cidr.to_string(),
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": [{ "Key": "Name", "Value": vpc_id }],
            }),
        )];

        let has_public = !self.subnets(SubnetType::Public).is_empty();
        if has_public {
            nodes.push(ResourceNode::new(
                self.internet_gateway_id(),
                "AWS::EC2::InternetGateway",
                json!({ "Tags": [{ "Key": "Name", "Value": vpc_id }] }),
            ));
            nodes.push(ResourceNode::new(
                self.gateway_attachment_id(),
                "AWS::EC2::VPCGatewayAttachment",
                json!({
                    "VpcId": reference(vpc_id),
                    "InternetGatewayId": reference(&self.internet_gateway_id()),
                }),
            ));
        }

        let nat_ids = self.nat_gateway_ids();

        for group in &self.groups {
            for subnet in &group.subnets {
                let public = group.subnet_type == SubnetType::Public;
                let route_table_id = format!("{}RouteTable", subnet.logical_id);

                nodes.push(ResourceNode::new(
                    subnet.logical_id.as_str(),
                    "AWS::EC2::Subnet",
                    json!({
                        "VpcId": reference(vpc_id),
                        "CidrBlock": subnet.cidr.to_string(),
                        "AvailabilityZone": {
                            "Fn::Select": [subnet.az_index, { "Fn::GetAZs": "" }]
                        },
                        "MapPublicIpOnLaunch": public,
                        "Tags": [
                            { "Key": "Name", "Value": subnet.logical_id },
                            { "Key": "fleetstack:subnet-name", "Value": group.name },
                            {
                                "Key": "fleetstack:subnet-type",
                                "Value": group.subnet_type.to_string(),
                            },
                        ],
                    }),
                ));
                nodes.push(ResourceNode::new(
                    route_table_id.as_str(),
                    "AWS::EC2::RouteTable",
                    json!({ "VpcId": reference(vpc_id) }),
                ));
                nodes.push(ResourceNode::new(
                    format!("{}RouteTableAssociation", subnet.logical_id),
                    "AWS::EC2::SubnetRouteTableAssociation",
                    json!({
                        "RouteTableId": reference(&route_table_id),
                        "SubnetId": reference(&subnet.logical_id),
                    }),
                ));

                let default_route_id = format!("{}DefaultRoute", subnet.logical_id);
                if public {
                    nodes.push(
                        ResourceNode::new(
                            default_route_id,
                            "AWS::EC2::Route",
                            json!({
                                "RouteTableId": reference(&route_table_id),
                                "DestinationCidrBlock": "0.0.0.0/0",
                                "GatewayId": reference(&self.internet_gateway_id()),
                            }),
                        )
                        .with_depends_on(self.gateway_attachment_id()),
                    );

                    let nat_id = format!("{}NATGateway", subnet.logical_id);
                    if nat_ids.contains(&nat_id) {
                        let eip_id = format!("{}EIP", subnet.logical_id);
                        nodes.push(ResourceNode::new(
                            eip_id.as_str(),
                            "AWS::EC2::EIP",
                            json!({ "Domain": "vpc" }),
                        ));
                        nodes.push(
                            ResourceNode::new(
                                nat_id,
                                "AWS::EC2::NatGateway",
                                json!({
                                    "SubnetId": reference(&subnet.logical_id),
                                    "AllocationId": attribute(&eip_id, "AllocationId"),
                                }),
                            )
                            .with_depends_on(default_route_id_for(&subnet.logical_id)),
                        );
                    }
                } else if !nat_ids.is_empty() {
                    let nat_id = &nat_ids[subnet.az_index as usize % nat_ids.len()];
                    nodes.push(ResourceNode::new(
                        default_route_id,
                        "AWS::EC2::Route",
                        json!({
                            "RouteTableId": reference(&route_table_id),
                            "DestinationCidrBlock": "0.0.0.0/0",
                            "NatGatewayId": reference(nat_id),
                        }),
                    ));
                }
            }
        }

        nodes
    }
}

fn default_route_id_for(subnet_id: &str) -> String {
    format!("{}DefaultRoute", subnet_id)
}

fn validate_mask(id: &LogicalId, group: &SubnetGroupSpec, block: &Ipv4Cidr) -> Result<()> {
    if group.mask > MAX_MASK {
        let usable = (1u32 << (32 - u32::from(group.mask.min(32))))
            .saturating_sub(RESERVED_ADDRESSES_PER_SUBNET);
        return Err(TopologyError::invalid(
            id,
            format!(
                "subnet group '{}' mask /{} leaves {} usable addresses after the {} reserved ones (narrowest allowed mask is /{})",
                group.name, group.mask, usable, RESERVED_ADDRESSES_PER_SUBNET, MAX_MASK
            ),
        ));
    }
    if group.mask < block.prefix_len {
        return Err(TopologyError::invalid(
            id,
            format!(
                "subnet group '{}' mask /{} is wider than the network block {}",
                group.name, group.mask, block
            ),
        ));
    }
    Ok(())
}

fn allocate(id: &LogicalId, props: &NetworkProps) -> Result<Vec<SubnetGroup>> {
    let block_end = props.cidr.start() + props.cidr.size();
    let mut cursor = props.cidr.start();
    let mut groups = Vec::with_capacity(props.subnet_groups.len());

    for spec in &props.subnet_groups {
        let size = 1u64 << (32 - spec.mask);
        cursor = cursor.div_ceil(size) * size;

        let mut subnets = Vec::with_capacity(props.max_azs as usize);
        for az_index in 0..props.max_azs {
            if cursor + size > block_end {
                return Err(TopologyError::invalid(
                    id,
                    format!(
                        "subnet group '{}' does not fit into {} across {} availability zones",
                        spec.name, props.cidr, props.max_azs
                    ),
                ));
            }
            // cursor < block_end <= 2^32, so the cast is lossless
            let cidr = Ipv4Cidr::new(Ipv4Addr::from(cursor as u32), spec.mask)?;
            subnets.push(Subnet {
                logical_id: format!("{}{}Subnet{}", id, spec.name, az_index + 1),
                az_index,
                cidr,
            });
            cursor += size;
        }

        groups.push(SubnetGroup {
            name: spec.name.clone(),
            subnet_type: spec.subnet_type,
            mask: spec.mask,
            subnets,
        });
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference_props() -> NetworkProps {
        NetworkProps::new("10.0.0.0/16".parse().unwrap(), 2, 1)
            .with_subnet_group(SubnetGroupSpec::new("Public", SubnetType::Public, 24))
            .with_subnet_group(SubnetGroupSpec::new(
                "Private1",
                SubnetType::PrivateWithEgress,
                24,
            ))
            .with_subnet_group(SubnetGroupSpec::new(
                "Private2",
                SubnetType::PrivateWithEgress,
                24,
            ))
    }

    fn build(props: NetworkProps) -> Result<Network> {
        Network::build(LogicalId::new("MyVPC").unwrap(), props)
    }

    #[test]
    fn test_cidr_parse() {
        let cidr: Ipv4Cidr = "10.0.0.0/16".parse().unwrap();
        assert_eq!(cidr.size(), 65536);
        assert_eq!(cidr.to_string(), "10.0.0.0/16");
        assert!("10.0.0.1/16".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0.0".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0.0/33".parse::<Ipv4Cidr>().is_err());
    }

    #[test]
    fn test_reference_allocation() {
        let network = build(reference_props()).unwrap();
        let cidrs: Vec<String> = network
            .all_subnets()
            .iter()
            .map(|s| s.cidr.to_string())
            .collect();
        assert_eq!(
            cidrs,
            vec![
                "10.0.0.0/24",
                "10.0.1.0/24",
                "10.0.2.0/24",
                "10.0.3.0/24",
                "10.0.4.0/24",
                "10.0.5.0/24",
            ]
        );
        assert_eq!(network.availability_zone_count(), 2);
        assert_eq!(network.subnets(SubnetType::PrivateWithEgress).len(), 4);
        assert_eq!(
            network.subnet_group("Public").unwrap().subnets[1].logical_id,
            "MyVPCPublicSubnet2"
        );
    }

    #[test]
    fn test_mixed_masks_are_aligned() {
        let props = NetworkProps::new("10.0.0.0/16".parse().unwrap(), 1, 0)
            .with_subnet_group(SubnetGroupSpec::new("Small", SubnetType::Public, 28))
            .with_subnet_group(SubnetGroupSpec::new("Large", SubnetType::Public, 20));
        let network = build(props).unwrap();
        let large = &network.subnet_group("Large").unwrap().subnets[0];
        assert_eq!(large.cidr.to_string(), "10.0.16.0/20");
        assert!(network.props().cidr.contains(&large.cidr));
    }

    #[test]
    fn test_duplicate_group_name() {
        let props = reference_props()
            .with_subnet_group(SubnetGroupSpec::new("Public", SubnetType::Public, 24));
        assert!(matches!(
            build(props),
            Err(TopologyError::InvalidTopology { entity, .. }) if entity == "MyVPC"
        ));
    }

    #[test]
    fn test_private_without_public_group() {
        let props = NetworkProps::new("10.0.0.0/16".parse().unwrap(), 2, 1).with_subnet_group(
            SubnetGroupSpec::new("Private", SubnetType::PrivateWithEgress, 24),
        );
        assert!(matches!(
            build(props),
            Err(TopologyError::InvalidTopology { .. })
        ));
    }

    #[test]
    fn test_private_without_nat_gateway() {
        let mut props = reference_props();
        props.nat_gateways = 0;
        assert!(matches!(
            build(props),
            Err(TopologyError::InvalidTopology { .. })
        ));
    }

    #[test]
    fn test_block_overflow() {
        let props = NetworkProps::new("10.0.0.0/24".parse().unwrap(), 3, 0)
            .with_subnet_group(SubnetGroupSpec::new("Public", SubnetType::Public, 25));
        match build(props) {
            Err(TopologyError::InvalidTopology { reason, .. }) => {
                assert!(reason.contains("does not fit"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_mask_wider_than_block() {
        let props = NetworkProps::new("10.0.0.0/24".parse().unwrap(), 1, 0)
            .with_subnet_group(SubnetGroupSpec::new("Public", SubnetType::Public, 20));
        assert!(matches!(
            build(props),
            Err(TopologyError::InvalidTopology { .. })
        ));
    }

    #[test]
    fn test_routing_resources() {
        let network = build(reference_props()).unwrap();
        let nodes = network.resources();
        let count = |t: &str| nodes.iter().filter(|n| n.resource_type == t).count();

        assert_eq!(count("AWS::EC2::VPC"), 1);
        assert_eq!(count("AWS::EC2::Subnet"), 6);
        assert_eq!(count("AWS::EC2::InternetGateway"), 1);
        assert_eq!(count("AWS::EC2::NatGateway"), 1);
        assert_eq!(count("AWS::EC2::Route"), 6);

        let private_route = nodes
            .iter()
            .find(|n| n.logical_id == "MyVPCPrivate2Subnet2DefaultRoute")
            .unwrap();
        assert_eq!(
            private_route.properties["NatGatewayId"],
            json!({ "Ref": "MyVPCPublicSubnet1NATGateway" })
        );
    }

    proptest! {
        #[test]
        fn prop_mask_beyond_reserved_addresses_is_rejected(
            mask in (MAX_MASK + 1)..=32u8,
            azs in 1u8..=3,
        ) {
            let props = NetworkProps::new("10.0.0.0/16".parse().unwrap(), azs, 0)
                .with_subnet_group(SubnetGroupSpec::new("Public", SubnetType::Public, mask));
            let is_invalid = matches!(build(props), Err(TopologyError::InvalidTopology { .. }));
            prop_assert!(is_invalid);
        }

        #[test]
        fn prop_valid_masks_allocate_inside_block(mask in 20u8..=MAX_MASK, azs in 1u8..=3) {
            let props = NetworkProps::new("10.0.0.0/16".parse().unwrap(), azs, 0)
                .with_subnet_group(SubnetGroupSpec::new("Public", SubnetType::Public, mask));
            let network = build(props).unwrap();
            for subnet in network.all_subnets() {
                prop_assert!(network.props().cidr.contains(&subnet.cidr));
            }
            prop_assert_eq!(network.availability_zone_count(), azs as usize);
        }
    }
}
