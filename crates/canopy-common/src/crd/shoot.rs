//! Shoot Custom Resource Definition
//!
//! A Shoot is a tenant cluster whose control plane runs on a seed. Only the
//! parts of the spec that decide which extensions the shoot needs are
//! modelled here.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for a Shoot
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "core.canopy.dev",
    version = "v1beta1",
    kind = "Shoot",
    plural = "shoots",
    namespaced,
    status = "ShootStatus",
    printcolumn = r#"{"name":"Provider","type":"string","jsonPath":".spec.provider.type"}"#,
    printcolumn = r#"{"name":"Seed","type":"string","jsonPath":".status.seedName"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ShootSpec {
    /// Seed the shoot is scheduled to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,

    /// Infrastructure provider and worker pools
    pub provider: ShootProvider,

    /// Pod network
    #[serde(default)]
    pub networking: Networking,

    /// Extensions explicitly enabled or disabled for this shoot
    #[serde(default)]
    pub extensions: Vec<ShootExtension>,

    /// DNS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<ShootDns>,
}

/// Infrastructure provider of a shoot
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShootProvider {
    /// Provider type, e.g. `aws`
    #[serde(rename = "type")]
    pub type_: String,

    /// Worker pools
    #[serde(default)]
    pub workers: Vec<Worker>,
}

/// A worker pool
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    /// Pool name
    pub name: String,

    /// Machine configuration
    #[serde(default)]
    pub machine: Machine,

    /// Container runtime interface configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cri: Option<Cri>,
}

/// Machine configuration of a worker pool
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    /// Machine type, e.g. `m5.large`
    #[serde(default, rename = "type")]
    pub type_: String,

    /// Operating system image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MachineImage>,
}

/// Operating system image of a worker pool
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineImage {
    /// Image name, e.g. `ubuntu`
    pub name: String,

    /// Image version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Container runtime interface of a worker pool
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cri {
    /// CRI name, e.g. `containerd`
    pub name: String,

    /// Additional container runtimes, e.g. `gvisor`
    #[serde(default)]
    pub container_runtimes: Vec<ContainerRuntime>,
}

/// An additional container runtime
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ContainerRuntime {
    /// Runtime type
    #[serde(rename = "type")]
    pub type_: String,
}

/// Pod network configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Networking {
    /// Network plugin type, e.g. `calico`
    #[serde(default, rename = "type")]
    pub type_: String,
}

/// An extension enabled or disabled for a shoot
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShootExtension {
    /// Extension type
    #[serde(rename = "type")]
    pub type_: String,

    /// Opt out of a globally enabled extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

impl ShootExtension {
    /// True when the shoot opted out of this extension
    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }
}

/// DNS configuration of a shoot
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShootDns {
    /// External domain of the shoot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// DNS providers managing the shoot's domains
    #[serde(default)]
    pub providers: Vec<ShootDnsProvider>,
}

/// A DNS provider of a shoot
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShootDnsProvider {
    /// Provider type, e.g. `aws-route53`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// Marks the provider managing the external domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,

    /// Secret with provider credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

impl ShootDnsProvider {
    /// True when the provider is marked primary
    pub fn is_primary(&self) -> bool {
        self.primary.unwrap_or(false)
    }
}

/// Status of a Shoot
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShootStatus {
    /// Seed currently hosting the control plane
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,

    /// Cluster identity, set once the shoot was fully provisioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl Shoot {
    /// True when either the spec or the status assigns the shoot to the seed
    pub fn is_assigned_to(&self, seed: &str) -> bool {
        self.spec.seed_name.as_deref() == Some(seed)
            || self.status.as_ref().and_then(|s| s.seed_name.as_deref()) == Some(seed)
    }

    /// True once the shoot was fully provisioned
    pub fn was_provisioned(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.uid.as_deref())
            .is_some_and(|uid| !uid.is_empty())
    }
}
