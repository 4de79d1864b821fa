//! CRD installation utilities
//!
//! The operator installs its own CRDs on startup using server-side apply, so
//! the stored schemas always match the running binary.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use canopy_common::crd::{
    BackupBucket, BackupEntry, ControllerDeployment, ControllerInstallation,
    ControllerRegistration, Seed, Shoot,
};
use canopy_registration::CONTROLLER_NAME;

/// Every CRD the registration controller reads or writes
pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![
        Seed::crd(),
        ControllerRegistration::crd(),
        ControllerDeployment::crd(),
        ControllerInstallation::crd(),
        BackupBucket::crd(),
        BackupEntry::crd(),
        Shoot::crd(),
    ]
}

/// Render all CRDs as one multi-document YAML stream
pub fn crd_manifests() -> anyhow::Result<String> {
    let docs = all_crds()
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("failed to serialize CRD: {}", e))?;
    Ok(docs.join("---\n"))
}

/// Install or update all CRDs
pub async fn ensure_crds(client: &Client) -> anyhow::Result<()> {
    let api: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(CONTROLLER_NAME).force();

    for crd in all_crds() {
        let name = crd.metadata.name.clone().unwrap_or_default();
        tracing::info!(crd = %name, "installing CRD");
        api.patch(&name, &params, &Patch::Apply(&crd))
            .await
            .map_err(|e| anyhow::anyhow!("failed to install {} CRD: {}", name, e))?;
    }

    tracing::info!("Canopy CRDs installed/updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_crd_names_are_unique_and_in_api_group() {
        let names: BTreeSet<String> = all_crds()
            .into_iter()
            .map(|c| c.metadata.name.unwrap_or_default())
            .collect();

        assert_eq!(names.len(), 7);
        assert!(names.iter().all(|n| n.ends_with(".core.canopy.dev")));
        assert!(names.contains("controllerinstallations.core.canopy.dev"));
    }

    #[test]
    fn test_manifests_separate_documents() {
        let yaml = crd_manifests().unwrap();
        assert_eq!(yaml.matches("---\n").count(), 6);
        assert!(yaml.contains("kind: CustomResourceDefinition"));
    }
}
