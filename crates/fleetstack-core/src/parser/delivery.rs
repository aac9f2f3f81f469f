//! bucket and distribution nodes

use super::{
    bool_arg, bool_prop, check_properties, children, declared_id, parsed_arg, required,
    set_once, string_arg, string_prop, unknown_key,
};
use crate::error::Result;
use crate::model::{
    AllowedMethods, Behavior, BucketProps, BucketRef, Declaration, DistributionProps, LogicalId,
    PriceClass, ViewerProtocolPolicy,
};
use kdl::KdlNode;

/// `bucket "MyBucket" { removal-policy "destroy"; versioned #true }`
pub fn parse_bucket(node: &KdlNode) -> Result<Declaration<BucketProps>> {
    let id = declared_id(node)?;
    let owner = id.as_str();

    let mut removal_policy = None;
    let mut versioned = None;

    for child in children(node) {
        match child.name().value() {
            "removal-policy" => {
                set_once(&mut removal_policy, parsed_arg(child)?, node, owner, child)?
            }
            "versioned" => set_once(&mut versioned, bool_arg(child)?, node, owner, child)?,
            _ => return Err(unknown_key(node, owner, child)),
        }
    }

    let mut props = BucketProps::new(required(removal_policy, node, owner, "removal-policy")?);
    props.versioned = versioned.unwrap_or(false);

    Ok(Declaration::new(id, props))
}

/// ```kdl
/// distribution "MyDistribution" {
///     origin "MyBucket"
///     price-class "all"
///     behavior default=#true
///     behavior default=#false path="/api/*" viewer-protocol="https-only" methods="all"
/// }
/// ```
///
/// Every behavior states `default` explicitly.
pub fn parse_distribution(node: &KdlNode) -> Result<Declaration<DistributionProps>> {
    let id = declared_id(node)?;
    let owner = id.as_str();

    let mut origin = None;
    let mut behaviors = Vec::new();
    let mut price_class = None;
    let mut enabled = None;
    let mut comment = None;

    for child in children(node) {
        match child.name().value() {
            "origin" => {
                set_once(&mut origin, LogicalId::new(string_arg(child)?)?, node, owner, child)?
            }
            "behavior" => behaviors.push(parse_behavior(child, owner)?),
            "price-class" => {
                set_once(&mut price_class, parsed_arg::<PriceClass>(child)?, node, owner, child)?
            }
            "enabled" => set_once(&mut enabled, bool_arg(child)?, node, owner, child)?,
            "comment" => set_once(&mut comment, string_arg(child)?, node, owner, child)?,
            _ => return Err(unknown_key(node, owner, child)),
        }
    }

    let mut props = DistributionProps::new(
        BucketRef::new(required(origin, node, owner, "origin")?),
        behaviors,
    );
    props.price_class = price_class.unwrap_or_default();
    props.enabled = enabled.unwrap_or(true);
    props.comment = comment;

    Ok(Declaration::new(id, props))
}

fn parse_behavior(node: &KdlNode, owner: &str) -> Result<Behavior> {
    check_properties(
        node,
        owner,
        &["default", "path", "viewer-protocol", "methods", "compress"],
    )?;

    let is_default = required(bool_prop(node, "default")?, node, owner, "default")?;
    let mut behavior = Behavior::default_behavior();
    behavior.is_default = is_default;
    behavior.path_pattern = string_prop(node, "path")?;
    if let Some(policy) = string_prop(node, "viewer-protocol")? {
        behavior.viewer_protocol_policy = policy.parse::<ViewerProtocolPolicy>()?;
    }
    if let Some(methods) = string_prop(node, "methods")? {
        behavior.allowed_methods = methods.parse::<AllowedMethods>()?;
    }
    if let Some(compress) = bool_prop(node, "compress")? {
        behavior.compress = compress;
    }

    Ok(behavior)
}
