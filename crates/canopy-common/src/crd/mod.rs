//! Custom Resource Definitions for Canopy
//!
//! Cluster-scoped: Seed, ControllerRegistration, ControllerDeployment,
//! ControllerInstallation, BackupBucket. Namespaced: BackupEntry, Shoot.

mod backup;
mod controller_deployment;
mod controller_installation;
mod controller_registration;
mod seed;
mod shoot;
mod types;

pub use backup::{BackupBucket, BackupBucketSpec, BackupEntry, BackupEntrySpec};
pub use controller_deployment::{ControllerDeployment, ControllerDeploymentSpec, DeploymentHashFields};
pub use controller_installation::{
    object_ref, ControllerInstallation, ControllerInstallationSpec, ControllerInstallationStatus,
    CONDITION_REQUIRED,
};
pub use controller_registration::{
    ControllerRegistration, ControllerRegistrationDeployment, ControllerRegistrationSpec,
    ControllerResource, DeploymentPolicy, DeploymentRef,
};
pub use seed::{Seed, SeedBackup, SeedDns, SeedDnsProvider, SeedSpec};
pub use shoot::{
    ContainerRuntime, Cri, Machine, MachineImage, Networking, Shoot, ShootDns, ShootDnsProvider,
    ShootExtension, ShootProvider, ShootSpec, ShootStatus, Worker,
};
pub use types::{find_condition, Condition, ConditionStatus, ProviderSpec};

use kube::Resource;

/// True when the object carries a deletion timestamp
pub fn is_deleting<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}
