//! Topology model
//!
//! Declarations for every entity a stack can hold, plus the typed handles
//! used to reference one entity from another.

mod cluster;
mod database;
mod definition;
mod delivery;
mod iam;
mod network;
mod output;

pub use cluster::*;
pub use database::*;
pub use definition::*;
pub use delivery::*;
pub use iam::*;
pub use network::*;
pub use output::*;

use crate::error::{Result, TopologyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of an entity inside a stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogicalId(String);

impl LogicalId {
    /// Logical ids are ASCII letters, digits, `-` and `_`, starting with a letter
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let Some(first) = id.chars().next() else {
            return Err(TopologyError::InvalidLogicalId {
                id,
                reason: "must not be empty".to_string(),
            });
        };
        if !first.is_ascii_alphabetic() {
            return Err(TopologyError::InvalidLogicalId {
                id,
                reason: "must start with an ASCII letter".to_string(),
            });
        }
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(TopologyError::InvalidLogicalId {
                reason: format!("character '{}' is not allowed", bad),
                id,
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id of a node owned by this entity: `{self}{Suffix}`
    pub fn child(&self, suffix: &str) -> String {
        format!("{}{}", self.0, to_pascal(suffix))
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LogicalId {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `custom-node-group` → `CustomNodeGroup`
pub fn to_pascal(name: &str) -> String {
    name.split(['-', '_', '.', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(LogicalId);

        impl $name {
            pub fn new(id: LogicalId) -> Self {
                Self(id)
            }

            pub fn id(&self) -> &LogicalId {
                &self.0
            }
        }

        impl From<LogicalId> for $name {
            fn from(id: LogicalId) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

handle!(
    /// Reference to a declared network
    NetworkRef
);
handle!(
    /// Reference to a declared IAM role, shared by every consumer
    RoleRef
);
handle!(
    /// Reference to a declared cluster
    ClusterRef
);
handle!(NodeGroupRef);
handle!(ProfileRef);
handle!(AddonRef);
handle!(BucketRef);
handle!(DistributionRef);
handle!(
    /// Reference to a declared database instance
    DatabaseRef
);
handle!(OutputRef);

/// What happens to the physical resource when its declaration is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalPolicy {
    /// Delete the resource
    Destroy,
    /// Keep the resource, orphaned from the stack
    Retain,
    /// Take a final snapshot, then delete (stateful resources only)
    Snapshot,
}

impl RemovalPolicy {
    /// Engine spelling (`DeletionPolicy`)
    pub fn engine_name(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Snapshot => "Snapshot",
        }
    }
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalPolicy::Destroy => write!(f, "destroy"),
            RemovalPolicy::Retain => write!(f, "retain"),
            RemovalPolicy::Snapshot => write!(f, "snapshot"),
        }
    }
}

impl FromStr for RemovalPolicy {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "destroy" => Ok(RemovalPolicy::Destroy),
            "retain" => Ok(RemovalPolicy::Retain),
            "snapshot" => Ok(RemovalPolicy::Snapshot),
            other => Err(TopologyError::InvalidConfig(format!(
                "unknown removal policy '{}' (expected destroy, retain or snapshot)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_id_validation() {
        assert!(LogicalId::new("db-instance").is_ok());
        assert!(LogicalId::new("EKSCluster").is_ok());
        assert!(LogicalId::new("").is_err());
        assert!(LogicalId::new("1vpc").is_err());
        assert!(matches!(
            LogicalId::new("my vpc"),
            Err(TopologyError::InvalidLogicalId { id, .. }) if id == "my vpc"
        ));
    }

    #[test]
    fn test_to_pascal() {
        assert_eq!(to_pascal("custom-node-group"), "CustomNodeGroup");
        assert_eq!(to_pascal("kube-proxy"), "KubeProxy");
        assert_eq!(to_pascal("coredns"), "Coredns");
        assert_eq!(to_pascal("Private1"), "Private1");
    }

    #[test]
    fn test_child_id() {
        let id = LogicalId::new("EKSCluster").unwrap();
        assert_eq!(id.child("addon-vpc-cni"), "EKSClusterAddonVpcCni");
    }
}
