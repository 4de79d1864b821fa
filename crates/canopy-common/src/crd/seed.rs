//! Seed Custom Resource Definition
//!
//! A Seed is a cluster that hosts shoot control planes and the extension
//! controllers serving them.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ProviderSpec;

/// Specification for a Seed
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "core.canopy.dev",
    version = "v1beta1",
    kind = "Seed",
    plural = "seeds",
    namespaced = false,
    printcolumn = r#"{"name":"Provider","type":"string","jsonPath":".spec.provider.type"}"#,
    printcolumn = r#"{"name":"Region","type":"string","jsonPath":".spec.provider.region"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SeedSpec {
    /// Infrastructure provider of the seed cluster
    pub provider: ProviderSpec,

    /// DNS configuration of the seed
    #[serde(default)]
    pub dns: SeedDns,

    /// Backup configuration for shoot control plane state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<SeedBackup>,
}

/// DNS configuration of a seed
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeedDns {
    /// DNS provider managing the seed's ingress domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<SeedDnsProvider>,

    /// Ingress domain of the seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_domain: Option<String>,
}

/// DNS provider of a seed
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeedDnsProvider {
    /// DNS provider type, e.g. `aws-route53`
    #[serde(rename = "type")]
    pub type_: String,
}

/// Backup configuration of a seed
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeedBackup {
    /// Backup provider type, e.g. `aws`
    pub provider: String,

    /// Region of the backup object store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl SeedSpec {
    /// DNS provider type, if the seed manages DNS
    pub fn dns_provider_type(&self) -> Option<&str> {
        self.dns.provider.as_ref().map(|p| p.type_.as_str())
    }
}
