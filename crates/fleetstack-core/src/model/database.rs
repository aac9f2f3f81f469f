//! Managed relational database instance
//!
//! The instance is placed in one subnet classification of its network. The
//! master credential is either generated by the engine's secret primitive
//! (and only referenced here by name) or read from an existing parameter.

use super::network::{Network, SubnetType};
use super::{LogicalId, NetworkRef, RemovalPolicy};
use crate::error::{Result, TopologyError};
use crate::graph::{ResourceNode, ValueExpr, attribute, reference};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

/// Longest retention the engine accepts for automated backups
pub const MAX_BACKUP_RETENTION_DAYS: i32 = 35;

/// Largest storage the engine can provision, in GiB
pub const MAX_STORAGE_GIB: u32 = 65_536;

/// Characters left out of generated passwords so they survive connection strings
const PASSWORD_EXCLUDED_CHARACTERS: &str = " %+~`#$&*()|[]{}:;<>?!'/@\"\\";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Postgres,
    Mysql,
    Mariadb,
}

impl EngineKind {
    pub fn engine_name(&self) -> &'static str {
        match self {
            EngineKind::Postgres => "postgres",
            EngineKind::Mysql => "mysql",
            EngineKind::Mariadb => "mariadb",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            EngineKind::Postgres => 5432,
            EngineKind::Mysql | EngineKind::Mariadb => 3306,
        }
    }
}

impl FromStr for EngineKind {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "postgres" | "postgresql" => Ok(EngineKind::Postgres),
            "mysql" => Ok(EngineKind::Mysql),
            "mariadb" => Ok(EngineKind::Mariadb),
            other => Err(TopologyError::InvalidConfig(format!(
                "unknown database engine '{}' (expected postgres, mysql or mariadb)",
                other
            ))),
        }
    }
}

/// Engine family plus version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEngine {
    pub kind: EngineKind,
    pub version: String,
}

impl DatabaseEngine {
    pub fn new(kind: EngineKind, version: impl Into<String>) -> Result<Self> {
        let version = version.into();
        let valid = !version.is_empty()
            && version.split('.').all(|part| {
                !part.is_empty() && part.chars().all(|c| c.is_ascii_digit())
            });
        if !valid {
            return Err(TopologyError::InvalidConfig(format!(
                "invalid {} version '{}'",
                kind.engine_name(),
                version
            )));
        }
        Ok(Self { kind, version })
    }

    pub fn postgres(version: impl Into<String>) -> Result<Self> {
        Self::new(EngineKind::Postgres, version)
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.engine_name(), self.version)
    }
}

/// Compute class, stored in the engine's `db.<family>.<size>` spelling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceClass(String);

impl InstanceClass {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn family_code(family: &str) -> Option<&'static str> {
    Some(match family {
        "burstable2" => "t2",
        "burstable3" => "t3",
        "burstable4-graviton" | "burstable4_graviton" => "t4g",
        "standard5" => "m5",
        "standard6-graviton" | "standard6_graviton" => "m6g",
        "standard6-intel" | "standard6_intel" => "m6i",
        "memory5" => "r5",
        "memory6-graviton" | "memory6_graviton" => "r6g",
        "memory6-intel" | "memory6_intel" => "r6i",
        _ => return None,
    })
}

impl FromStr for InstanceClass {
    type Err = TopologyError;

    /// Accepts `burstable3.micro` or the engine form `db.t3.micro`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TopologyError::InvalidConfig(format!("invalid instance class '{}'", s));

        if let Some(rest) = s.strip_prefix("db.") {
            let (family, size) = rest.split_once('.').ok_or_else(invalid)?;
            if family.is_empty() || size.is_empty() {
                return Err(invalid());
            }
            return Ok(Self(s.to_string()));
        }

        let (family, size) = s.split_once('.').ok_or_else(invalid)?;
        let code = family_code(&family.to_ascii_lowercase()).ok_or_else(invalid)?;
        if size.is_empty() || !size.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
        Ok(Self(format!("db.{}.{}", code, size.to_ascii_lowercase())))
    }
}

impl fmt::Display for InstanceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Master credential of the instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credentials {
    /// The engine generates the password into a secret; only the username is declared
    GeneratedSecret { username: String },
    /// The password is read from an existing secure parameter
    Password {
        username: String,
        password_parameter: String,
    },
}

impl Credentials {
    pub fn generated(username: impl Into<String>) -> Self {
        Credentials::GeneratedSecret {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Credentials::GeneratedSecret { username } => username,
            Credentials::Password { username, .. } => username,
        }
    }
}

/// What tearing the stack down does to the instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Teardown {
    /// Deletion protection refuses the delete
    Blocked,
    /// The instance and its data are deleted
    Destructive,
    /// A final snapshot is taken, then the instance is deleted
    Snapshot,
    /// The instance is orphaned and keeps running
    Retained,
}

impl fmt::Display for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Teardown::Blocked => "blocked",
            Teardown::Destructive => "destructive",
            Teardown::Snapshot => "snapshot",
            Teardown::Retained => "retained",
        };
        f.write_str(name)
    }
}

/// Database declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseProps {
    pub network: NetworkRef,
    pub subnet_type: SubnetType,
    pub engine: DatabaseEngine,
    pub instance_class: InstanceClass,
    pub credentials: Credentials,
    pub allocated_storage_gib: u32,
    /// Storage autoscaling ceiling; `None` disables autoscaling
    pub max_allocated_storage_gib: Option<u32>,
    /// Signed so that a negative retention is reported rather than wrapped
    pub backup_retention_days: i32,
    pub multi_az: bool,
    pub publicly_accessible: bool,
    pub deletion_protection: bool,
    pub auto_minor_version_upgrade: bool,
    pub allow_major_version_upgrade: bool,
    pub delete_automated_backups: bool,
    pub removal_policy: RemovalPolicy,
    pub database_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInstance {
    id: LogicalId,
    props: DatabaseProps,
    vpc_id: String,
    subnet_ids: Vec<String>,
}

impl DatabaseInstance {
    pub(crate) fn build(id: LogicalId, props: DatabaseProps, network: &Network) -> Result<Self> {
        validate_sizing(&id, &props)?;

        if props.credentials.username().trim().is_empty() {
            return Err(TopologyError::invalid(&id, "master username must not be empty"));
        }
        if let Credentials::Password {
            password_parameter, ..
        } = &props.credentials
            && password_parameter.trim().is_empty()
        {
            return Err(TopologyError::invalid(&id, "password parameter name must not be empty"));
        }
        if let Some(name) = &props.database_name {
            validate_database_name(&id, name)?;
        }

        let subnet_ids: Vec<String> = network
            .subnets(props.subnet_type)
            .iter()
            .map(|s| s.logical_id.clone())
            .collect();
        if subnet_ids.is_empty() {
            return Err(TopologyError::insufficient(
                &id,
                format!(
                    "network '{}' has no {} subnet group",
                    network.id(),
                    props.subnet_type
                ),
            ));
        }

        if props.publicly_accessible && props.subnet_type == SubnetType::PrivateWithEgress {
            tracing::warn!(
                database = %id,
                "Instance is publicly accessible but placed in private subnets; it will not be reachable from outside the network"
            );
        }

        Ok(Self {
            id,
            vpc_id: network.id().to_string(),
            subnet_ids,
            props,
        })
    }

    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    pub fn props(&self) -> &DatabaseProps {
        &self.props
    }

    pub fn teardown(&self) -> Teardown {
        if self.props.deletion_protection {
            return Teardown::Blocked;
        }
        match self.props.removal_policy {
            RemovalPolicy::Destroy => Teardown::Destructive,
            RemovalPolicy::Snapshot => Teardown::Snapshot,
            RemovalPolicy::Retain => Teardown::Retained,
        }
    }

    pub fn endpoint_hostname(&self) -> ValueExpr {
        ValueExpr::get_att(self.id.as_str(), "Endpoint.Address")
    }

    pub fn endpoint_port(&self) -> ValueExpr {
        ValueExpr::get_att(self.id.as_str(), "Endpoint.Port")
    }

    /// Handle of the generated credential secret, if the engine generates one.
    /// The engine's `Ref` of a secret resolves to its ARN, which every secrets
    /// API accepts wherever a secret name is expected.
    pub fn secret_name(&self) -> Option<ValueExpr> {
        match self.props.credentials {
            Credentials::GeneratedSecret { .. } => Some(ValueExpr::reference(self.secret_id())),
            Credentials::Password { .. } => None,
        }
    }

    fn subnet_group_id(&self) -> String {
        self.id.child("SubnetGroup")
    }

    fn security_group_id(&self) -> String {
        self.id.child("SecurityGroup")
    }

    fn secret_id(&self) -> String {
        self.id.child("Secret")
    }

    fn secret_attachment_id(&self) -> String {
        self.id.child("SecretAttachment")
    }

    pub(crate) fn resources(&self) -> Vec<ResourceNode> {
        let db_id = self.id.as_str();
        let subnets: Vec<Value> = self.subnet_ids.iter().map(|s| reference(s)).collect();

        let mut nodes = vec![
            ResourceNode::new(
                self.subnet_group_id(),
                "AWS::RDS::DBSubnetGroup",
                json!({
                    "DBSubnetGroupDescription": format!("Subnet group for {} database", db_id),
                    "SubnetIds": subnets,
                }),
            ),
            ResourceNode::new(
                self.security_group_id(),
                "AWS::EC2::SecurityGroup",
                json!({
                    "GroupDescription": format!("Security group for {} database", db_id),
                    "VpcId": reference(&self.vpc_id),
                    "SecurityGroupEgress": [{ "CidrIp": "0.0.0.0/0", "IpProtocol": "-1" }],
                }),
            ),
        ];

        let (username, password) = match &self.props.credentials {
            Credentials::GeneratedSecret { username } => {
                nodes.push(ResourceNode::new(
                    self.secret_id(),
                    "AWS::SecretsManager::Secret",
                    json!({
                        "GenerateSecretString": {
                            "SecretStringTemplate": json!({ "username": username }).to_string(),
                            "GenerateStringKey": "password",
                            "PasswordLength": 30,
                            "ExcludeCharacters": PASSWORD_EXCLUDED_CHARACTERS,
                        },
                    }),
                ));
                nodes.push(ResourceNode::new(
                    self.secret_attachment_id(),
                    "AWS::SecretsManager::SecretTargetAttachment",
                    json!({
                        "SecretId": reference(&self.secret_id()),
                        "TargetId": reference(db_id),
                        "TargetType": "AWS::RDS::DBInstance",
                    }),
                ));
                (
                    resolve_secret(&self.secret_id(), "username"),
                    resolve_secret(&self.secret_id(), "password"),
                )
            }
            Credentials::Password {
                username,
                password_parameter,
            } => (
                json!(username),
                json!(format!("{{{{resolve:ssm-secure:{}}}}}", password_parameter)),
            ),
        };

        let mut properties = json!({
            "Engine": self.props.engine.kind.engine_name(),
            "EngineVersion": self.props.engine.version,
            "DBInstanceClass": self.props.instance_class.as_str(),
            "AllocatedStorage": self.props.allocated_storage_gib.to_string(),
            "StorageType": "gp2",
            "MasterUsername": username,
            "MasterUserPassword": password,
            "DBSubnetGroupName": reference(&self.subnet_group_id()),
            "VPCSecurityGroups": [attribute(&self.security_group_id(), "GroupId")],
            "Port": self.props.engine.kind.default_port().to_string(),
            "BackupRetentionPeriod": self.props.backup_retention_days,
            "MultiAZ": self.props.multi_az,
            "PubliclyAccessible": self.props.publicly_accessible,
            "DeletionProtection": self.props.deletion_protection,
            "AutoMinorVersionUpgrade": self.props.auto_minor_version_upgrade,
            "AllowMajorVersionUpgrade": self.props.allow_major_version_upgrade,
            "DeleteAutomatedBackups": self.props.delete_automated_backups,
            "CopyTagsToSnapshot": true,
        });
        if let Some(max) = self.props.max_allocated_storage_gib {
            properties["MaxAllocatedStorage"] = json!(max);
        }
        if let Some(name) = &self.props.database_name {
            properties["DBName"] = json!(name);
        }

        nodes.push(
            ResourceNode::new(db_id, "AWS::RDS::DBInstance", properties)
                .with_deletion_policy(self.props.removal_policy),
        );
        nodes
    }
}

/// Dynamic reference into a generated secret
fn resolve_secret(secret_id: &str, key: &str) -> Value {
    json!({
        "Fn::Join": ["", [
            "{{resolve:secretsmanager:",
            reference(secret_id),
            format!(":SecretString:{}::}}}}", key),
        ]]
    })
}

fn validate_sizing(id: &LogicalId, props: &DatabaseProps) -> Result<()> {
    let allocated = props.allocated_storage_gib;
    if allocated == 0 {
        return Err(TopologyError::sizing(id, "allocated storage must be at least 1 GiB"));
    }
    if allocated > MAX_STORAGE_GIB {
        return Err(TopologyError::sizing(
            id,
            format!("allocated storage {} GiB exceeds {} GiB", allocated, MAX_STORAGE_GIB),
        ));
    }
    if let Some(max) = props.max_allocated_storage_gib {
        if max < allocated {
            return Err(TopologyError::sizing(
                id,
                format!(
                    "max allocated storage {} GiB is below allocated storage {} GiB",
                    max, allocated
                ),
            ));
        }
        if max > MAX_STORAGE_GIB {
            return Err(TopologyError::sizing(
                id,
                format!("max allocated storage {} GiB exceeds {} GiB", max, MAX_STORAGE_GIB),
            ));
        }
    }
    if !(0..=MAX_BACKUP_RETENTION_DAYS).contains(&props.backup_retention_days) {
        return Err(TopologyError::sizing(
            id,
            format!(
                "backup retention of {} days is outside 0..={}",
                props.backup_retention_days, MAX_BACKUP_RETENTION_DAYS
            ),
        ));
    }
    Ok(())
}

fn validate_database_name(id: &LogicalId, name: &str) -> Result<()> {
    let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let charset = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !starts_with_letter || !charset || name.len() > 63 {
        return Err(TopologyError::invalid(
            id,
            format!(
                "database name '{}' must start with a letter and contain at most 63 letters, digits or underscores",
                name
            ),
        ));
    }
    Ok(())
}
