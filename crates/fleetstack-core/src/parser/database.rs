//! database node

use super::{
    bool_arg, check_properties, children, declared_id, integer_arg, parsed_arg, required,
    set_once, string_arg, string_prop, unknown_key,
};
use crate::error::{Result, TopologyError};
use crate::model::{
    Credentials, DatabaseEngine, DatabaseProps, Declaration, EngineKind, LogicalId, NetworkRef,
    SubnetType,
};
use kdl::KdlNode;

/// ```kdl
/// database "db-instance" {
///     network "MyVPC"
///     subnet-type "private-with-egress"
///     engine "postgres" version="14"
///     instance-class "burstable3.micro"
///     credentials generated-secret="postgres"
///     allocated-storage 100
///     max-allocated-storage 120
///     backup-retention-days 0
///     multi-az #false
///     publicly-accessible #false
///     auto-minor-version-upgrade #true
///     allow-major-version-upgrade #false
///     delete-automated-backups #true
///     deletion-protection #false
///     removal-policy "destroy"
/// }
/// ```
///
/// Every policy flag is required; only `max-allocated-storage` and
/// `database-name` may be left out.
pub fn parse_database(node: &KdlNode) -> Result<Declaration<DatabaseProps>> {
    let id = declared_id(node)?;
    let owner = id.as_str();

    let mut network = None;
    let mut subnet_type = None;
    let mut engine = None;
    let mut instance_class = None;
    let mut credentials = None;
    let mut allocated_storage = None;
    let mut max_allocated_storage = None;
    let mut backup_retention_days = None;
    let mut multi_az = None;
    let mut publicly_accessible = None;
    let mut deletion_protection = None;
    let mut auto_minor_version_upgrade = None;
    let mut allow_major_version_upgrade = None;
    let mut delete_automated_backups = None;
    let mut removal_policy = None;
    let mut database_name = None;

    for child in children(node) {
        match child.name().value() {
            "network" => {
                set_once(&mut network, LogicalId::new(string_arg(child)?)?, node, owner, child)?
            }
            "subnet-type" => {
                let value = parsed_arg::<SubnetType>(child)?;
                set_once(&mut subnet_type, value, node, owner, child)?
            }
            "engine" => set_once(&mut engine, parse_engine(child, owner)?, node, owner, child)?,
            "instance-class" => {
                set_once(&mut instance_class, parsed_arg(child)?, node, owner, child)?
            }
            "credentials" => {
                let value = parse_credentials(child, owner)?;
                set_once(&mut credentials, value, node, owner, child)?
            }
            "allocated-storage" => {
                let value = integer_arg::<u32>(child)?;
                set_once(&mut allocated_storage, value, node, owner, child)?
            }
            "max-allocated-storage" => {
                let value = integer_arg::<u32>(child)?;
                set_once(&mut max_allocated_storage, value, node, owner, child)?
            }
            "backup-retention-days" => {
                let value = integer_arg::<i32>(child)?;
                set_once(&mut backup_retention_days, value, node, owner, child)?
            }
            "multi-az" => set_once(&mut multi_az, bool_arg(child)?, node, owner, child)?,
            "publicly-accessible" => {
                set_once(&mut publicly_accessible, bool_arg(child)?, node, owner, child)?
            }
            "deletion-protection" => {
                set_once(&mut deletion_protection, bool_arg(child)?, node, owner, child)?
            }
            "auto-minor-version-upgrade" => {
                let value = bool_arg(child)?;
                set_once(&mut auto_minor_version_upgrade, value, node, owner, child)?
            }
            "allow-major-version-upgrade" => {
                let value = bool_arg(child)?;
                set_once(&mut allow_major_version_upgrade, value, node, owner, child)?
            }
            "delete-automated-backups" => {
                let value = bool_arg(child)?;
                set_once(&mut delete_automated_backups, value, node, owner, child)?
            }
            "removal-policy" => {
                set_once(&mut removal_policy, parsed_arg(child)?, node, owner, child)?
            }
            "database-name" => {
                set_once(&mut database_name, string_arg(child)?, node, owner, child)?
            }
            _ => return Err(unknown_key(node, owner, child)),
        }
    }

    let flag = |value: Option<bool>, key: &str| required(value, node, owner, key);

    let props = DatabaseProps {
        network: NetworkRef::new(required(network, node, owner, "network")?),
        subnet_type: required(subnet_type, node, owner, "subnet-type")?,
        engine: required(engine, node, owner, "engine")?,
        instance_class: required(instance_class, node, owner, "instance-class")?,
        credentials: required(credentials, node, owner, "credentials")?,
        allocated_storage_gib: required(allocated_storage, node, owner, "allocated-storage")?,
        max_allocated_storage_gib: max_allocated_storage,
        backup_retention_days: required(
            backup_retention_days,
            node,
            owner,
            "backup-retention-days",
        )?,
        multi_az: flag(multi_az, "multi-az")?,
        publicly_accessible: flag(publicly_accessible, "publicly-accessible")?,
        deletion_protection: flag(deletion_protection, "deletion-protection")?,
        auto_minor_version_upgrade: flag(
            auto_minor_version_upgrade,
            "auto-minor-version-upgrade",
        )?,
        allow_major_version_upgrade: flag(
            allow_major_version_upgrade,
            "allow-major-version-upgrade",
        )?,
        delete_automated_backups: flag(delete_automated_backups, "delete-automated-backups")?,
        removal_policy: required(removal_policy, node, owner, "removal-policy")?,
        database_name,
    };

    Ok(Declaration::new(id, props))
}

/// `engine "postgres" version="14"`
fn parse_engine(node: &KdlNode, owner: &str) -> Result<DatabaseEngine> {
    check_properties(node, owner, &["version"])?;
    let kind: EngineKind = parsed_arg(node)?;
    let version = required(string_prop(node, "version")?, node, owner, "version")?;
    DatabaseEngine::new(kind, version)
}

/// `credentials generated-secret="postgres"` or
/// `credentials username="postgres" password-parameter="/db/password"`
fn parse_credentials(node: &KdlNode, owner: &str) -> Result<Credentials> {
    check_properties(
        node,
        owner,
        &["generated-secret", "username", "password-parameter"],
    )?;
    let generated = string_prop(node, "generated-secret")?;
    let username = string_prop(node, "username")?;
    let parameter = string_prop(node, "password-parameter")?;

    match (generated, username, parameter) {
        (Some(username), None, None) => Ok(Credentials::generated(username)),
        (None, Some(username), Some(password_parameter)) => Ok(Credentials::Password {
            username,
            password_parameter,
        }),
        _ => Err(TopologyError::InvalidConfig(format!(
            "database '{}': credentials take either generated-secret=<username> or username=<name> password-parameter=<name>",
            owner
        ))),
    }
}
