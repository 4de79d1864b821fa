//! Object fixtures for unit tests

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::Utc;
use kube::api::ObjectMeta;

use canopy_common::crd::{
    object_ref, BackupBucket, BackupBucketSpec, BackupEntry, BackupEntrySpec, Condition,
    ConditionStatus, ControllerDeployment, ControllerDeploymentSpec, ControllerInstallation,
    ControllerInstallationSpec, ControllerInstallationStatus, ControllerRegistration,
    ControllerRegistrationDeployment, ControllerRegistrationSpec, ControllerResource,
    DeploymentPolicy, DeploymentRef, ProviderSpec, Seed, SeedDns, SeedDnsProvider, SeedSpec,
    Shoot, ShootProvider, ShootSpec, CONDITION_REQUIRED,
};

pub fn deletion_timestamp() -> Option<Time> {
    Some(Time(Utc::now()))
}

pub fn seed(name: &str) -> Seed {
    let mut seed = Seed::new(
        name,
        SeedSpec {
            provider: ProviderSpec {
                type_: "aws".to_string(),
                region: Some("eu-west-1".to_string()),
            },
            ..Default::default()
        },
    );
    seed.metadata.resource_version = Some("1".to_string());
    seed
}

pub fn seed_with_dns(name: &str, dns_type: &str) -> Seed {
    let mut seed = seed(name);
    seed.spec.dns = SeedDns {
        provider: Some(SeedDnsProvider {
            type_: dns_type.to_string(),
        }),
        ingress_domain: None,
    };
    seed
}

pub fn registration(name: &str, resources: &[(&str, &str)]) -> ControllerRegistration {
    let mut reg = ControllerRegistration::new(
        name,
        ControllerRegistrationSpec {
            resources: resources
                .iter()
                .map(|(kind, type_)| ControllerResource {
                    kind: kind.to_string(),
                    type_: type_.to_string(),
                    ..Default::default()
                })
                .collect(),
            deployment: None,
        },
    );
    reg.metadata.resource_version = Some("1".to_string());
    reg
}

pub fn with_policy(mut reg: ControllerRegistration, policy: DeploymentPolicy) -> ControllerRegistration {
    reg.spec
        .deployment
        .get_or_insert_with(ControllerRegistrationDeployment::default)
        .policy = Some(policy);
    reg
}

pub fn with_deployment(mut reg: ControllerRegistration, deployment: &str) -> ControllerRegistration {
    reg.spec
        .deployment
        .get_or_insert_with(ControllerRegistrationDeployment::default)
        .deployment_refs = vec![DeploymentRef {
        name: deployment.to_string(),
    }];
    reg
}

pub fn registrations(list: Vec<ControllerRegistration>) -> BTreeMap<String, ControllerRegistration> {
    crate::resolver::registration_map(list)
}

pub fn deployment(name: &str, chart: &str) -> ControllerDeployment {
    let mut deployment = ControllerDeployment::new(
        name,
        ControllerDeploymentSpec {
            type_: "helm".to_string(),
            provider_config: Some(serde_json::json!({ "chart": chart })),
        },
    );
    deployment.metadata.resource_version = Some("7".to_string());
    deployment
}

pub fn installation(name: &str, seed: &str, registration: &str) -> ControllerInstallation {
    ControllerInstallation {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            resource_version: Some("3".to_string()),
            ..Default::default()
        },
        spec: ControllerInstallationSpec {
            seed_ref: object_ref(seed, None),
            registration_ref: object_ref(registration, None),
            deployment_ref: None,
        },
        status: None,
    }
}

pub fn required(mut installation: ControllerInstallation) -> ControllerInstallation {
    installation.status = Some(ControllerInstallationStatus {
        conditions: vec![Condition::new(
            CONDITION_REQUIRED,
            ConditionStatus::True,
            "ExtensionObjectsExist",
            "extension resources still exist",
        )],
    });
    installation
}

pub fn bucket(name: &str, provider: &str, seed: Option<&str>) -> BackupBucket {
    BackupBucket::new(
        name,
        BackupBucketSpec {
            provider: ProviderSpec::new(provider),
            seed_name: seed.map(str::to_string),
        },
    )
}

pub fn entry(name: &str, bucket: &str, seed: Option<&str>) -> BackupEntry {
    let mut entry = BackupEntry::new(
        name,
        BackupEntrySpec {
            bucket_name: bucket.to_string(),
            seed_name: seed.map(str::to_string),
        },
    );
    entry.metadata.namespace = Some("garden-a".to_string());
    entry
}

pub fn shoot(name: &str, namespace: &str, seed: &str) -> Shoot {
    let mut shoot = Shoot::new(
        name,
        ShootSpec {
            seed_name: Some(seed.to_string()),
            provider: ShootProvider {
                type_: "aws".to_string(),
                workers: Vec::new(),
            },
            ..Default::default()
        },
    );
    shoot.metadata.namespace = Some(namespace.to_string());
    shoot
}
