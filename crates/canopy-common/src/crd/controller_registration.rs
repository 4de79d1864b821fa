//! ControllerRegistration Custom Resource Definition
//!
//! A ControllerRegistration announces an extension controller and the
//! `(Kind, Type)` resources it can reconcile. Its deployment section decides
//! on which seeds and under which policy the controller gets installed.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ExtensionId;

/// Specification for a ControllerRegistration
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "core.canopy.dev",
    version = "v1beta1",
    kind = "ControllerRegistration",
    plural = "controllerregistrations",
    shortname = "ctrlreg",
    namespaced = false,
    printcolumn = r#"{"name":"Policy","type":"string","jsonPath":".spec.deployment.policy"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRegistrationSpec {
    /// Extension resources the controller is responsible for
    #[serde(default)]
    pub resources: Vec<ControllerResource>,

    /// How and where the controller is deployed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<ControllerRegistrationDeployment>,
}

/// A `(Kind, Type)` resource served by a registered controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerResource {
    /// Extension kind, e.g. `Infrastructure`
    pub kind: String,

    /// Extension type, e.g. `aws`
    #[serde(rename = "type")]
    pub type_: String,

    /// Enable this extension for every shoot unless explicitly disabled.
    /// Only meaningful for kind `Extension`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub globally_enabled: Option<bool>,

    /// Marks the controller as primary owner of the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
}

impl ControllerResource {
    /// The extension identity this resource serves
    pub fn id(&self) -> ExtensionId {
        ExtensionId::new(&self.kind, &self.type_)
    }
}

/// Deployment section of a ControllerRegistration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRegistrationDeployment {
    /// Deploy policy, `OnDemand` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<DeploymentPolicy>,

    /// Label selector restricting eligible seeds; absent matches every seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_selector: Option<LabelSelector>,

    /// References to ControllerDeployments. Only the first one is honoured.
    #[serde(default)]
    pub deployment_refs: Vec<DeploymentRef>,
}

/// Reference to a ControllerDeployment by name
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct DeploymentRef {
    /// Name of the ControllerDeployment
    pub name: String,
}

/// When a registered controller is installed on a seed
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum DeploymentPolicy {
    /// Only when one of its resources is required on the seed
    #[default]
    OnDemand,
    /// On every seed that is not being deleted
    Always,
    /// On every seed hosting at least one shoot
    AlwaysExceptNoShoots,
}

impl std::fmt::Display for DeploymentPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnDemand => write!(f, "OnDemand"),
            Self::Always => write!(f, "Always"),
            Self::AlwaysExceptNoShoots => write!(f, "AlwaysExceptNoShoots"),
        }
    }
}

impl ControllerRegistrationSpec {
    /// Effective deploy policy
    pub fn policy(&self) -> DeploymentPolicy {
        self.deployment
            .as_ref()
            .and_then(|d| d.policy)
            .unwrap_or_default()
    }

    /// Seed selector, if one is configured
    pub fn seed_selector(&self) -> Option<&LabelSelector> {
        self.deployment.as_ref().and_then(|d| d.seed_selector.as_ref())
    }

    /// The honoured deployment reference
    pub fn first_deployment_ref(&self) -> Option<&str> {
        self.deployment
            .as_ref()
            .and_then(|d| d.deployment_refs.first())
            .map(|r| r.name.as_str())
    }

    /// Extension identities served by this registration
    pub fn extension_ids(&self) -> impl Iterator<Item = ExtensionId> + '_ {
        self.resources.iter().map(ControllerResource::id)
    }

    /// Validate the registration
    ///
    /// A registration without resources can only ever be installed through an
    /// always-deploy policy. Every `(kind, type)` pair may appear only once.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.resources.is_empty() && self.policy() == DeploymentPolicy::OnDemand {
            return Err(crate::Error::internal_with_context(
                "validation",
                "resources may only be empty with deploy policy Always or AlwaysExceptNoShoots",
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for resource in &self.resources {
            if resource.kind.is_empty() || resource.type_.is_empty() {
                return Err(crate::Error::internal_with_context(
                    "validation",
                    format!("resource \"{}\" needs both kind and type", resource.id()),
                ));
            }
            if !seen.insert(resource.id()) {
                return Err(crate::Error::internal_with_context(
                    "validation",
                    format!("duplicate resource \"{}\"", resource.id()),
                ));
            }
        }
        Ok(())
    }
}
