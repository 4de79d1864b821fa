//! ControllerDeployment Custom Resource Definition
//!
//! Opaque deployment configuration for an extension controller. The payload
//! is interpreted by the deployer of the given type, never by Canopy itself.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for a ControllerDeployment
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "core.canopy.dev",
    version = "v1beta1",
    kind = "ControllerDeployment",
    plural = "controllerdeployments",
    shortname = "ctrldeploy",
    namespaced = false,
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ControllerDeploymentSpec {
    /// Deployer type, e.g. `helm`
    #[serde(rename = "type")]
    pub type_: String,

    /// Deployer specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub provider_config: Option<serde_json::Value>,
}

/// Fields of a deployment that feed its drift-detection hash
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentHashFields<'a> {
    /// Deployer type
    #[serde(rename = "type")]
    pub type_: &'a str,
    /// Deployer configuration
    pub provider_config: &'a Option<serde_json::Value>,
}

impl ControllerDeploymentSpec {
    /// The fields that identify what gets deployed
    pub fn hash_fields(&self) -> DeploymentHashFields<'_> {
        DeploymentHashFields {
            type_: &self.type_,
            provider_config: &self.provider_config,
        }
    }
}

fn preserve_unknown_fields(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
    serde_json::from_value(serde_json::json!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true,
        "nullable": true
    }))
    .unwrap_or(schemars::schema::Schema::Bool(true))
}
