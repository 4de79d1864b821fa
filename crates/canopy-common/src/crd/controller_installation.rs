//! ControllerInstallation Custom Resource Definition
//!
//! Binds exactly one ControllerRegistration to exactly one Seed. The
//! installation is created and deleted by the registration controller; its
//! status is owned by the extension deployer.

use k8s_openapi::api::core::v1::ObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{find_condition, Condition, ConditionStatus};

/// Condition type set by the extension while its resources are still in use
pub const CONDITION_REQUIRED: &str = "Required";

/// Specification for a ControllerInstallation
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "core.canopy.dev",
    version = "v1beta1",
    kind = "ControllerInstallation",
    plural = "controllerinstallations",
    shortname = "ctrlinst",
    namespaced = false,
    status = "ControllerInstallationStatus",
    printcolumn = r#"{"name":"Seed","type":"string","jsonPath":".spec.seedRef.name"}"#,
    printcolumn = r#"{"name":"Registration","type":"string","jsonPath":".spec.registrationRef.name"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ControllerInstallationSpec {
    /// Seed the controller is installed on
    pub seed_ref: ObjectReference,

    /// Registration being installed
    pub registration_ref: ObjectReference,

    /// Deployment configuration used for the installation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_ref: Option<ObjectReference>,
}

/// Status of a ControllerInstallation
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerInstallationStatus {
    /// Conditions reported by the extension deployer
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl ControllerInstallationSpec {
    /// Name of the referenced seed
    pub fn seed_name(&self) -> &str {
        self.seed_ref.name.as_deref().unwrap_or_default()
    }

    /// Name of the referenced registration
    pub fn registration_name(&self) -> &str {
        self.registration_ref.name.as_deref().unwrap_or_default()
    }
}

impl ControllerInstallation {
    /// True when the extension reports that its resources are still needed
    pub fn is_required(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| find_condition(&s.conditions, CONDITION_REQUIRED))
            .is_some_and(|c| c.status == ConditionStatus::True)
    }
}

/// Build an object reference by name and observed resource version
pub fn object_ref(name: impl Into<String>, resource_version: Option<String>) -> ObjectReference {
    ObjectReference {
        name: Some(name.into()),
        resource_version,
        ..Default::default()
    }
}
