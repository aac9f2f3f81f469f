//! Static content delivery: an object store and the frontend serving it

use super::{BucketRef, LogicalId, RemovalPolicy};
use crate::error::{Result, TopologyError};
use crate::graph::{ResourceNode, ValueExpr, attribute};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketProps {
    pub removal_policy: RemovalPolicy,
    pub versioned: bool,
}

impl BucketProps {
    pub fn new(removal_policy: RemovalPolicy) -> Self {
        Self {
            removal_policy,
            versioned: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    id: LogicalId,
    props: BucketProps,
}

impl Bucket {
    pub(crate) fn build(id: LogicalId, props: BucketProps) -> Result<Self> {
        if props.removal_policy == RemovalPolicy::Snapshot {
            return Err(TopologyError::invalid(
                &id,
                "buckets cannot be snapshotted; use destroy or retain",
            ));
        }
        Ok(Self { id, props })
    }

    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    pub fn props(&self) -> &BucketProps {
        &self.props
    }

    pub fn bucket_name(&self) -> ValueExpr {
        ValueExpr::reference(self.id.as_str())
    }

    pub(crate) fn resource(&self) -> ResourceNode {
        let mut properties = json!({
            "PublicAccessBlockConfiguration": {
                "BlockPublicAcls": true,
                "BlockPublicPolicy": true,
                "IgnorePublicAcls": true,
                "RestrictPublicBuckets": true,
            },
        });
        if self.props.versioned {
            properties["VersioningConfiguration"] = json!({ "Status": "Enabled" });
        }
        ResourceNode::new(self.id.as_str(), "AWS::S3::Bucket", properties)
            .with_deletion_policy(self.props.removal_policy)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocolPolicy {
    AllowAll,
    #[default]
    RedirectToHttps,
    HttpsOnly,
}

impl ViewerProtocolPolicy {
    fn engine_name(&self) -> &'static str {
        match self {
            ViewerProtocolPolicy::AllowAll => "allow-all",
            ViewerProtocolPolicy::RedirectToHttps => "redirect-to-https",
            ViewerProtocolPolicy::HttpsOnly => "https-only",
        }
    }
}

impl FromStr for ViewerProtocolPolicy {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "allow-all" => Ok(ViewerProtocolPolicy::AllowAll),
            "redirect-to-https" => Ok(ViewerProtocolPolicy::RedirectToHttps),
            "https-only" => Ok(ViewerProtocolPolicy::HttpsOnly),
            other => Err(TopologyError::InvalidConfig(format!(
                "unknown viewer protocol policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllowedMethods {
    #[default]
    GetHead,
    GetHeadOptions,
    All,
}

impl AllowedMethods {
    fn methods(&self) -> &'static [&'static str] {
        match self {
            AllowedMethods::GetHead => &["GET", "HEAD"],
            AllowedMethods::GetHeadOptions => &["GET", "HEAD", "OPTIONS"],
            AllowedMethods::All => &["GET", "HEAD", "OPTIONS", "PUT", "PATCH", "POST", "DELETE"],
        }
    }
}

impl FromStr for AllowedMethods {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "get-head" => Ok(AllowedMethods::GetHead),
            "get-head-options" => Ok(AllowedMethods::GetHeadOptions),
            "all" => Ok(AllowedMethods::All),
            other => Err(TopologyError::InvalidConfig(format!(
                "unknown allowed methods '{}' (expected get-head, get-head-options or all)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceClass {
    PriceClass100,
    PriceClass200,
    #[default]
    PriceClassAll,
}

impl PriceClass {
    fn engine_name(&self) -> &'static str {
        match self {
            PriceClass::PriceClass100 => "PriceClass_100",
            PriceClass::PriceClass200 => "PriceClass_200",
            PriceClass::PriceClassAll => "PriceClass_All",
        }
    }
}

impl FromStr for PriceClass {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "100" | "PriceClass_100" => Ok(PriceClass::PriceClass100),
            "200" | "PriceClass_200" => Ok(PriceClass::PriceClass200),
            "all" | "PriceClass_All" => Ok(PriceClass::PriceClassAll),
            other => Err(TopologyError::InvalidConfig(format!(
                "unknown price class '{}' (expected 100, 200 or all)",
                other
            ))),
        }
    }
}

/// Routing rule of a distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Behavior {
    /// Marks the catch-all behavior
    pub is_default: bool,
    /// Request path the behavior applies to; only non-default behaviors have one
    pub path_pattern: Option<String>,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub allowed_methods: AllowedMethods,
    pub compress: bool,
}

impl Behavior {
    pub fn default_behavior() -> Self {
        Self {
            is_default: true,
            path_pattern: None,
            viewer_protocol_policy: ViewerProtocolPolicy::default(),
            allowed_methods: AllowedMethods::default(),
            compress: true,
        }
    }

    pub fn path(pattern: impl Into<String>) -> Self {
        Self {
            is_default: false,
            path_pattern: Some(pattern.into()),
            ..Self::default_behavior()
        }
    }

    fn to_json(&self, origin_id: &str) -> Value {
        let mut behavior = json!({
            "TargetOriginId": origin_id,
            "ViewerProtocolPolicy": self.viewer_protocol_policy.engine_name(),
            "AllowedMethods": self.allowed_methods.methods(),
            "Compress": self.compress,
        });
        if let Some(pattern) = &self.path_pattern {
            behavior["PathPattern"] = json!(pattern);
        }
        behavior
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionProps {
    pub origin: BucketRef,
    pub behaviors: Vec<Behavior>,
    pub price_class: PriceClass,
    pub enabled: bool,
    pub comment: Option<String>,
}

impl DistributionProps {
    pub fn new(origin: BucketRef, behaviors: Vec<Behavior>) -> Self {
        Self {
            origin,
            behaviors,
            price_class: PriceClass::default(),
            enabled: true,
            comment: None,
        }
    }
}

/// A constructed distribution, bound read-only to its origin bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    id: LogicalId,
    props: DistributionProps,
}

impl Distribution {
    pub(crate) fn build(id: LogicalId, props: DistributionProps) -> Result<Self> {
        let defaults = props.behaviors.iter().filter(|b| b.is_default).count();
        match defaults {
            0 => {
                return Err(TopologyError::NoDefaultBehavior {
                    entity: id.to_string(),
                });
            }
            1 => {}
            count => {
                return Err(TopologyError::MultipleDefaultBehaviors {
                    entity: id.to_string(),
                    count,
                });
            }
        }

        let mut patterns = HashSet::new();
        for behavior in &props.behaviors {
            match (&behavior.path_pattern, behavior.is_default) {
                (Some(pattern), true) => {
                    return Err(TopologyError::InvalidBehavior {
                        entity: id.to_string(),
                        reason: format!(
                            "the default behavior cannot have path pattern '{}'",
                            pattern
                        ),
                    });
                }
                (None, false) => {
                    return Err(TopologyError::InvalidBehavior {
                        entity: id.to_string(),
                        reason: "a non-default behavior needs a path pattern".to_string(),
                    });
                }
                (Some(pattern), false) if !patterns.insert(pattern.as_str()) => {
                    return Err(TopologyError::InvalidBehavior {
                        entity: id.to_string(),
                        reason: format!("path pattern '{}' is used by two behaviors", pattern),
                    });
                }
                _ => {}
            }
        }

        Ok(Self { id, props })
    }

    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    pub fn props(&self) -> &DistributionProps {
        &self.props
    }

    pub fn default_behavior(&self) -> Option<&Behavior> {
        self.props.behaviors.iter().find(|b| b.is_default)
    }

    pub fn domain_name(&self) -> ValueExpr {
        ValueExpr::get_att(self.id.as_str(), "DomainName")
    }

    fn origin_access_control_id(&self) -> String {
        self.id.child("OriginAccessControl")
    }

    pub(crate) fn resources(&self) -> Vec<ResourceNode> {
        let bucket_id = self.props.origin.id().as_str();
        let origin_id = format!("{}Origin", bucket_id);

        let (defaults, others): (Vec<&Behavior>, Vec<&Behavior>) =
            self.props.behaviors.iter().partition(|b| b.is_default);
        let mut config = json!({
            "Enabled": self.props.enabled,
            "PriceClass": self.props.price_class.engine_name(),
            "HttpVersion": "http2",
            "Origins": [{
                "Id": origin_id,
                "DomainName": attribute(bucket_id, "RegionalDomainName"),
                "S3OriginConfig": { "OriginAccessIdentity": "" },
                "OriginAccessControlId": attribute(&self.origin_access_control_id(), "Id"),
            }],
        });
        if let Some(default) = defaults.first() {
            config["DefaultCacheBehavior"] = default.to_json(&origin_id);
        }
        if !others.is_empty() {
            config["CacheBehaviors"] =
                Value::Array(others.iter().map(|b| b.to_json(&origin_id)).collect());
        }
        if let Some(comment) = &self.props.comment {
            config["Comment"] = json!(comment);
        }

        vec![
            ResourceNode::new(
                self.origin_access_control_id(),
                "AWS::CloudFront::OriginAccessControl",
                json!({
                    "OriginAccessControlConfig": {
                        "Name": self.origin_access_control_id(),
                        "OriginAccessControlOriginType": "s3",
                        "SigningBehavior": "always",
                        "SigningProtocol": "sigv4",
                    },
                }),
            ),
            ResourceNode::new(
                self.id.as_str(),
                "AWS::CloudFront::Distribution",
                json!({ "DistributionConfig": config }),
            ),
        ]
    }

    /// Whether the distribution reads from the given bucket
    pub fn serves(&self, bucket: &BucketRef) -> bool {
        &self.props.origin == bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_ref() -> BucketRef {
        BucketRef::new(LogicalId::new("MyBucket").unwrap())
    }

    fn build(behaviors: Vec<Behavior>) -> Result<Distribution> {
        Distribution::build(
            LogicalId::new("MyDistribution").unwrap(),
            DistributionProps::new(bucket_ref(), behaviors),
        )
    }

    #[test]
    fn test_no_default_behavior() {
        assert!(matches!(
            build(vec![]),
            Err(TopologyError::NoDefaultBehavior { entity }) if entity == "MyDistribution"
        ));
        assert!(matches!(
            build(vec![Behavior::path("/images/*")]),
            Err(TopologyError::NoDefaultBehavior { .. })
        ));
    }

    #[test]
    fn test_multiple_default_behaviors() {
        assert!(matches!(
            build(vec![Behavior::default_behavior(), Behavior::default_behavior()]),
            Err(TopologyError::MultipleDefaultBehaviors { count: 2, .. })
        ));
    }

    #[test]
    fn test_single_default_behavior() {
        let distribution =
            build(vec![Behavior::default_behavior(), Behavior::path("/api/*")]).unwrap();
        assert!(distribution.default_behavior().is_some());
        assert!(distribution.serves(&bucket_ref()));
    }

    #[test]
    fn test_behavior_path_rules() {
        let mut default = Behavior::default_behavior();
        default.path_pattern = Some("/*".to_string());
        assert!(matches!(build(vec![default]), Err(TopologyError::InvalidBehavior { .. })));

        let result = build(vec![
            Behavior::default_behavior(),
            Behavior::path("/a/*"),
            Behavior::path("/a/*"),
        ]);
        assert!(matches!(result, Err(TopologyError::InvalidBehavior { .. })));
    }

    #[test]
    fn test_distribution_references_bucket() {
        let distribution =
            build(vec![Behavior::default_behavior(), Behavior::path("/static/*")]).unwrap();
        let nodes = distribution.resources();
        let dist = nodes
            .iter()
            .find(|n| n.resource_type == "AWS::CloudFront::Distribution")
            .unwrap();
        assert!(dist.references().contains("MyBucket"));
        assert!(dist.references().contains("MyDistributionOriginAccessControl"));
        assert_eq!(
            dist.properties["DistributionConfig"]["CacheBehaviors"][0]["PathPattern"],
            "/static/*"
        );
        assert_eq!(
            dist.properties["DistributionConfig"]["DefaultCacheBehavior"]["ViewerProtocolPolicy"],
            "redirect-to-https"
        );
    }

    #[test]
    fn test_bucket_resource() {
        let bucket = Bucket::build(
            LogicalId::new("MyBucket").unwrap(),
            BucketProps::new(RemovalPolicy::Destroy),
        )
        .unwrap();
        let node = bucket.resource();
        assert_eq!(node.deletion_policy, Some(RemovalPolicy::Destroy));
        assert!(node.properties.get("VersioningConfiguration").is_none());

        assert!(
            Bucket::build(
                LogicalId::new("MyBucket").unwrap(),
                BucketProps::new(RemovalPolicy::Snapshot),
            )
            .is_err()
        );
    }
}
