//! Named values exported for downstream consumers

use super::{Bucket, Cluster, DatabaseInstance, Distribution, LogicalId};
use crate::error::{Result, TopologyError};
use crate::graph::{OutputNode, ValueExpr};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which computed value of the source entity an output reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Projection {
    EndpointHostname,
    EndpointPort,
    /// Resolves to the secret's ARN (its `Ref`), usable as a secret id
    SecretName,
    ClusterName,
    ConfigCommand,
    DomainName,
    BucketName,
}

impl Projection {
    pub const ALL: [Projection; 7] = [
        Projection::EndpointHostname,
        Projection::EndpointPort,
        Projection::SecretName,
        Projection::ClusterName,
        Projection::ConfigCommand,
        Projection::DomainName,
        Projection::BucketName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Projection::EndpointHostname => "endpoint-hostname",
            Projection::EndpointPort => "endpoint-port",
            Projection::SecretName => "secret-name",
            Projection::ClusterName => "cluster-name",
            Projection::ConfigCommand => "config-command",
            Projection::DomainName => "domain-name",
            Projection::BucketName => "bucket-name",
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Projection {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        Projection::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Projection::ALL.iter().map(Projection::as_str).collect();
                TopologyError::InvalidConfig(format!(
                    "unknown output value '{}' (expected one of: {})",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// An entity that can hand out computed values
pub trait Exportable {
    fn logical_id(&self) -> &LogicalId;

    /// Value at the projection, `None` when the entity has none
    fn project(&self, projection: Projection) -> Option<ValueExpr>;
}

impl Exportable for Cluster {
    fn logical_id(&self) -> &LogicalId {
        self.id()
    }

    fn project(&self, projection: Projection) -> Option<ValueExpr> {
        match projection {
            Projection::ClusterName => Some(self.cluster_name()),
            Projection::ConfigCommand => Some(self.config_command()),
            _ => None,
        }
    }
}

impl Exportable for Bucket {
    fn logical_id(&self) -> &LogicalId {
        self.id()
    }

    fn project(&self, projection: Projection) -> Option<ValueExpr> {
        match projection {
            Projection::BucketName => Some(self.bucket_name()),
            _ => None,
        }
    }
}

impl Exportable for Distribution {
    fn logical_id(&self) -> &LogicalId {
        self.id()
    }

    fn project(&self, projection: Projection) -> Option<ValueExpr> {
        match projection {
            Projection::DomainName => Some(self.domain_name()),
            _ => None,
        }
    }
}

impl Exportable for DatabaseInstance {
    fn logical_id(&self) -> &LogicalId {
        self.id()
    }

    fn project(&self, projection: Projection) -> Option<ValueExpr> {
        match projection {
            Projection::EndpointHostname => Some(self.endpoint_hostname()),
            Projection::EndpointPort => Some(self.endpoint_port()),
            Projection::SecretName => self.secret_name(),
            _ => None,
        }
    }
}

/// Output declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputProps {
    /// Entity the value is read from
    pub source: LogicalId,
    pub projection: Projection,
    pub description: Option<String>,
}

impl OutputProps {
    pub fn new(source: LogicalId, projection: Projection) -> Self {
        Self {
            source,
            projection,
            description: None,
        }
    }
}

/// A registered output with its resolved value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    name: LogicalId,
    props: OutputProps,
    value: ValueExpr,
}

impl Output {
    pub(crate) fn build(
        name: LogicalId,
        props: OutputProps,
        source: &dyn Exportable,
    ) -> Result<Self> {
        let value = source
            .project(props.projection)
            .ok_or_else(|| TopologyError::MissingProjection {
                entity: source.logical_id().to_string(),
                projection: props.projection.to_string(),
            })?;
        Ok(Self { name, props, value })
    }

    pub fn name(&self) -> &LogicalId {
        &self.name
    }

    pub fn props(&self) -> &OutputProps {
        &self.props
    }

    pub fn value(&self) -> &ValueExpr {
        &self.value
    }

    pub(crate) fn node(&self) -> OutputNode {
        OutputNode {
            name: self.name.to_string(),
            value: self.value.clone(),
            description: self.props.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BucketProps, RemovalPolicy};

    fn bucket() -> Bucket {
        Bucket::build(
            LogicalId::new("MyBucket").unwrap(),
            BucketProps::new(RemovalPolicy::Retain),
        )
        .unwrap()
    }

    #[test]
    fn test_projection_parse() {
        assert_eq!(
            "endpoint-hostname".parse::<Projection>().unwrap(),
            Projection::EndpointHostname
        );
        assert_eq!("secret-name".parse::<Projection>().unwrap(), Projection::SecretName);
        let err = "endpoint".parse::<Projection>().unwrap_err();
        assert!(err.to_string().contains("bucket-name"));
    }

    #[test]
    fn test_output_reads_projection() {
        let bucket = bucket();
        let output = Output::build(
            LogicalId::new("bucketName").unwrap(),
            OutputProps::new(bucket.id().clone(), Projection::BucketName),
            &bucket,
        )
        .unwrap();
        assert_eq!(output.value(), &ValueExpr::reference("MyBucket"));
        assert_eq!(output.node().name, "bucketName");
    }

    #[test]
    fn test_missing_projection() {
        let bucket = bucket();
        let result = Output::build(
            LogicalId::new("dbEndpoint").unwrap(),
            OutputProps::new(bucket.id().clone(), Projection::EndpointHostname),
            &bucket,
        );
        match result {
            Err(TopologyError::MissingProjection { entity, projection }) => {
                assert_eq!(entity, "MyBucket");
                assert_eq!(projection, "endpoint-hostname");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
