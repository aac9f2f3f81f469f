use super::*;
use crate::error::TopologyError;
use crate::model::{
    AddonOrdering, ClusterLogType, Credentials, IpFamily, PodExecutionRole, Projection,
    RemovalPolicy, SubnetType,
};

#[test]
fn test_parse_network() {
    let kdl = r#"
        network "MyVPC" {
            cidr "10.0.0.0/16"
            max-azs 2
            nat-gateways 1
            subnet "Public" type="public" mask=24
            subnet "Private1" type="private-with-egress" mask=24
        }
    "#;

    let definition = parse_stack_string(kdl, "test".to_string()).unwrap();
    assert_eq!(definition.networks.len(), 1);

    let network = &definition.networks[0];
    assert_eq!(network.id.as_str(), "MyVPC");
    assert_eq!(network.props.cidr.to_string(), "10.0.0.0/16");
    assert_eq!(network.props.max_azs, 2);
    assert_eq!(network.props.nat_gateways, 1);
    assert_eq!(network.props.subnet_groups.len(), 2);
    assert_eq!(network.props.subnet_groups[1].subnet_type, SubnetType::PrivateWithEgress);
    assert_eq!(network.props.subnet_groups[1].mask, 24);
}

#[test]
fn test_parse_network_missing_cidr() {
    let kdl = r#"
        network "MyVPC" {
            max-azs 2
            nat-gateways 0
            subnet "Public" type="public" mask=24
        }
    "#;

    let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
    assert!(err.to_string().contains("missing required key 'cidr'"));
}

#[test]
fn test_unknown_key_is_rejected() {
    let kdl = r#"
        bucket "MyBucket" {
            removal-policy "destroy"
            encryption "kms"
        }
    "#;

    let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
    assert!(matches!(err, TopologyError::InvalidConfig(_)));
    assert!(err.to_string().contains("unknown key 'encryption'"));
}

#[test]
fn test_unknown_top_level_node_is_skipped() {
    let kdl = r#"
        stack "Demo"
        dashboard "ops" {
            widgets 4
        }
        bucket "MyBucket" {
            removal-policy "retain"
        }
    "#;

    let definition = parse_stack_string(kdl, "test".to_string()).unwrap();
    assert_eq!(definition.name, "Demo");
    assert_eq!(definition.len(), 1);
    assert_eq!(definition.buckets[0].props.removal_policy, RemovalPolicy::Retain);
}

#[test]
fn test_parse_role() {
    let kdl = r#"
        role "NodeRole" {
            role-name "eksClusterNodeGroupRole"
            assumed-by "ec2.amazonaws.com"
            managed-policy "AmazonEKSWorkerNodePolicy" "AmazonEC2ContainerRegistryReadOnly"
            managed-policy "AmazonEKS_CNI_Policy"
        }
    "#;

    let definition = parse_stack_string(kdl, "test".to_string()).unwrap();
    let role = &definition.roles[0].props;
    assert_eq!(role.role_name.as_deref(), Some("eksClusterNodeGroupRole"));
    assert_eq!(role.assumed_by, "ec2.amazonaws.com");
    let policies: Vec<&str> = role.managed_policies.iter().map(|p| p.name()).collect();
    assert_eq!(
        policies,
        vec![
            "AmazonEKSWorkerNodePolicy",
            "AmazonEC2ContainerRegistryReadOnly",
            "AmazonEKS_CNI_Policy"
        ]
    );
}

#[test]
fn test_parse_cluster() {
    let kdl = r#"
        addon-ordering "after-capacity"
        cluster "EKSCluster" {
            network "MyVPC"
            version "1.27"
            ip-family "ipv4"
            default-capacity 0
            logging "api" "audit"
            output-config-command #true
            node-group "custom-node-group" {
                instance-types "m5.large" "m5.xlarge"
                ami-type "AL2_x86_64"
                desired-size 2
                max-size 4
                disk-size 20
                node-role "NodeRole"
                label "team" "platform"
            }
            fargate-profile "myProfile" {
                selector namespace="default" {
                    label "tier" "web"
                }
            }
            fargate-profile "jobs" {
                selector namespace="batch"
                pod-execution-role "PodRole"
            }
            addon "kube-proxy"
            addon "coredns" version="v1.10.1-eksbuild.1" resolve-conflicts="overwrite"
        }
    "#;

    let definition = parse_stack_string(kdl, "test".to_string()).unwrap();
    assert_eq!(definition.addon_ordering, AddonOrdering::AfterCapacity);

    let cluster = &definition.clusters[0];
    assert_eq!(cluster.props.network.id().as_str(), "MyVPC");
    assert_eq!(cluster.props.version.as_str(), "1.27");
    assert_eq!(cluster.props.ip_family, IpFamily::Ipv4);
    assert_eq!(cluster.props.default_capacity, 0);
    assert!(cluster.props.logging.contains(&ClusterLogType::Audit));
    assert!(cluster.props.output_config_command);
    assert!(!cluster.props.output_cluster_name);

    let group = &cluster.node_groups[0];
    assert_eq!(group.name, "custom-node-group");
    assert_eq!(group.props.instance_types, vec!["m5.large", "m5.xlarge"]);
    assert_eq!(group.props.desired_size, 2);
    assert_eq!(group.props.min_size, None);
    assert_eq!(group.props.max_size, Some(4));
    assert_eq!(group.props.labels.get("team").map(String::as_str), Some("platform"));

    assert_eq!(cluster.fargate_profiles.len(), 2);
    let profile = &cluster.fargate_profiles[0].props;
    assert_eq!(profile.selectors[0].namespace, "default");
    assert_eq!(profile.pod_execution_role, PodExecutionRole::Generated);
    assert!(matches!(
        &cluster.fargate_profiles[1].props.pod_execution_role,
        PodExecutionRole::Existing(role) if role.id().as_str() == "PodRole"
    ));

    assert_eq!(cluster.addons.len(), 2);
    assert_eq!(cluster.addons[1].version.as_deref(), Some("v1.10.1-eksbuild.1"));
}

#[test]
fn test_cluster_requires_explicit_default_capacity() {
    let kdl = r#"
        cluster "EKSCluster" {
            network "MyVPC"
            version "1.27"
            ip-family "ipv4"
        }
    "#;

    let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
    assert!(err.to_string().contains("default-capacity"));
}

#[test]
fn test_cluster_requires_ip_family() {
    let kdl = r#"
        cluster "EKSCluster" {
            network "MyVPC"
            version "1.27"
            default-capacity 0
        }
    "#;

    let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
    assert!(matches!(err, TopologyError::InvalidConfig(_)));
    assert!(err.to_string().contains("missing required key 'ip-family'"));
}

#[test]
fn test_node_group_requires_ami_type() {
    let kdl = r#"
        cluster "EKSCluster" {
            network "MyVPC"
            version "1.27"
            ip-family "ipv4"
            default-capacity 0
            node-group "custom-node-group" {
                node-role "NodeRole"
                instance-types "m5.large"
                desired-size 2
                disk-size 20
            }
        }
    "#;

    let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
    assert!(matches!(err, TopologyError::InvalidConfig(_)));
    assert!(err.to_string().contains("missing required key 'ami-type'"));
}

#[test]
fn test_parse_distribution_behaviors() {
    let kdl = r#"
        distribution "MyDistribution" {
            origin "MyBucket"
            price-class "100"
            behavior default=#true
            behavior default=#false path="/api/*" viewer-protocol="https-only" methods="all" compress=#false
        }
    "#;

    let definition = parse_stack_string(kdl, "test".to_string()).unwrap();
    let props = &definition.distributions[0].props;
    assert_eq!(props.origin.id().as_str(), "MyBucket");
    assert_eq!(props.behaviors.len(), 2);
    assert!(props.behaviors[0].is_default);
    assert!(!props.behaviors[1].is_default);
    assert_eq!(props.behaviors[1].path_pattern.as_deref(), Some("/api/*"));
    assert!(!props.behaviors[1].compress);
}

#[test]
fn test_behavior_requires_default_flag() {
    let kdl = r#"
        distribution "MyDistribution" {
            origin "MyBucket"
            behavior path="/api/*"
        }
    "#;

    let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
    assert!(matches!(err, TopologyError::InvalidConfig(_)));
    assert!(err.to_string().contains("missing required key 'default'"));
}

#[test]
fn test_behavior_unknown_property() {
    let kdl = r#"
        distribution "MyDistribution" {
            origin "MyBucket"
            behavior default=#true ttl=60
        }
    "#;

    let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
    assert!(err.to_string().contains("unknown property 'ttl'"));
}

#[test]
fn test_parse_database() {
    let kdl = r#"
        database "db-instance" {
            network "MyVPC"
            subnet-type "private-with-egress"
            engine "postgres" version="14"
            instance-class "burstable3.micro"
            credentials generated-secret="postgres"
            allocated-storage 100
            max-allocated-storage 120
            backup-retention-days 0
            multi-az #false
            publicly-accessible #false
            auto-minor-version-upgrade #true
            allow-major-version-upgrade #false
            delete-automated-backups #true
            deletion-protection #false
            removal-policy "destroy"
            database-name "test"
        }
    "#;

    let definition = parse_stack_string(kdl, "test".to_string()).unwrap();
    let props = &definition.databases[0].props;
    assert_eq!(props.subnet_type, SubnetType::PrivateWithEgress);
    assert_eq!(props.engine.version, "14");
    assert_eq!(props.instance_class.as_str(), "db.t3.micro");
    assert_eq!(props.credentials, Credentials::generated("postgres"));
    assert_eq!(props.allocated_storage_gib, 100);
    assert_eq!(props.max_allocated_storage_gib, Some(120));
    assert!(props.auto_minor_version_upgrade);
    assert!(!props.allow_major_version_upgrade);
    assert_eq!(props.database_name.as_deref(), Some("test"));
}

#[test]
fn test_parse_database_password_credentials() {
    let kdl = r#"
        database "db" {
            network "MyVPC"
            subnet-type "public"
            engine "mysql" version="8.0"
            instance-class "db.t3.small"
            credentials username="admin" password-parameter="/prod/db/password"
            allocated-storage 20
            backup-retention-days 7
            multi-az #true
            publicly-accessible #false
            auto-minor-version-upgrade #false
            allow-major-version-upgrade #false
            delete-automated-backups #false
            deletion-protection #true
            removal-policy "snapshot"
        }
    "#;

    let definition = parse_stack_string(kdl, "test".to_string()).unwrap();
    let props = &definition.databases[0].props;
    assert!(matches!(
        &props.credentials,
        Credentials::Password { username, password_parameter }
            if username == "admin" && password_parameter == "/prod/db/password"
    ));
    assert_eq!(props.removal_policy, RemovalPolicy::Snapshot);
    assert_eq!(props.subnet_type, SubnetType::Public);
    assert!(props.multi_az);
}

const DATABASE_KEYS: &[&str] = &[
    "network \"MyVPC\"",
    "subnet-type \"private-with-egress\"",
    "engine \"postgres\" version=\"14\"",
    "instance-class \"burstable3.micro\"",
    "credentials generated-secret=\"postgres\"",
    "allocated-storage 20",
    "backup-retention-days 0",
    "multi-az #false",
    "publicly-accessible #false",
    "auto-minor-version-upgrade #true",
    "allow-major-version-upgrade #false",
    "delete-automated-backups #true",
    "deletion-protection #false",
    "removal-policy \"destroy\"",
];

fn database_kdl(lines: &[&str]) -> String {
    format!("database \"db\" {{\n{}\n}}\n", lines.join("\n"))
}

#[test]
fn test_database_requires_every_policy_key() {
    assert!(parse_stack_string(&database_kdl(DATABASE_KEYS), "test".to_string()).is_ok());

    for omitted in DATABASE_KEYS {
        let key = omitted.split_whitespace().next().unwrap();
        let lines: Vec<&str> = DATABASE_KEYS
            .iter()
            .copied()
            .filter(|line| line != omitted)
            .collect();

        let err = parse_stack_string(&database_kdl(&lines), "test".to_string()).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidConfig(_)), "{}: {}", key, err);
        assert!(
            err.to_string().contains(&format!("missing required key '{}'", key)),
            "{}: {}",
            key,
            err
        );
    }
}

#[test]
fn test_repeated_database_key_is_rejected() {
    let mut lines = DATABASE_KEYS.to_vec();
    lines.push("allocated-storage 40");

    let err = parse_stack_string(&database_kdl(&lines), "test".to_string()).unwrap_err();
    assert!(matches!(err, TopologyError::InvalidConfig(_)));
    assert!(err.to_string().contains("key 'allocated-storage' is set more than once"));
}

#[test]
fn test_repeated_network_key_is_rejected() {
    let kdl = r#"
        network "MyVPC" {
            cidr "10.0.0.0/16"
            max-azs 2
            nat-gateways 1
            cidr "10.1.0.0/16"
            subnet "Public" type="public" mask=24
        }
    "#;

    let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
    assert!(matches!(err, TopologyError::InvalidConfig(_)));
    assert!(err.to_string().contains("network 'MyVPC': key 'cidr' is set more than once"));
}

#[test]
fn test_repeated_node_group_key_is_rejected() {
    let kdl = r#"
        cluster "EKSCluster" {
            network "MyVPC"
            version "1.27"
            ip-family "ipv4"
            default-capacity 0
            node-group "workers" {
                ami-type "AL2_x86_64"
                desired-size 2
                desired-size 3
            }
        }
    "#;

    let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
    assert!(err.to_string().contains("key 'desired-size' is set more than once"));
}

#[test]
fn test_parse_database_ambiguous_credentials() {
    let kdl = r#"
        database "db" {
            network "MyVPC"
            engine "postgres" version="14"
            instance-class "burstable3.micro"
            credentials generated-secret="postgres" username="postgres"
            allocated-storage 20
            backup-retention-days 0
            deletion-protection #false
            removal-policy "destroy"
        }
    "#;

    assert!(parse_stack_string(kdl, "test".to_string()).is_err());
}

#[test]
fn test_parse_output() {
    let kdl = r#"
        output "dbEndpoint" source="db-instance" value="endpoint-hostname"
        output "secretName" source="db-instance" value="secret-name" description="Generated credential"
    "#;

    let definition = parse_stack_string(kdl, "test".to_string()).unwrap();
    assert_eq!(definition.outputs.len(), 2);
    assert_eq!(definition.outputs[0].props.projection, Projection::EndpointHostname);
    assert_eq!(definition.outputs[1].props.source.as_str(), "db-instance");
    assert_eq!(
        definition.outputs[1].props.description.as_deref(),
        Some("Generated credential")
    );
}

#[test]
fn test_parse_output_unknown_projection() {
    let kdl = r#"
        output "dbEndpoint" source="db-instance" value="endpoint"
    "#;

    let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
    assert!(err.to_string().contains("unknown output value 'endpoint'"));
}

#[test]
fn test_invalid_kdl() {
    let result = parse_stack_string("network \"unterminated {", "test".to_string());
    assert!(matches!(result, Err(TopologyError::KdlParse(_))));
}

#[test]
fn test_parse_stack_file_uses_file_stem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.local.kdl");
    std::fs::write(
        &path,
        r#"bucket "MyBucket" { removal-policy "destroy"; }"#,
    )
    .unwrap();

    let definition = parse_stack_file(&path).unwrap();
    assert_eq!(definition.name, "stack");
    assert_eq!(definition.buckets.len(), 1);
}

#[test]
fn test_parse_stack_file_missing() {
    let result = parse_stack_file("/nonexistent/stack.kdl");
    assert!(matches!(result, Err(TopologyError::IoError { .. })));
}
