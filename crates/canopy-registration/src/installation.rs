//! Installation synchronization
//!
//! Converges the ControllerInstallations of a seed to the wanted
//! registrations. Each installation carries three hash labels derived from
//! spec content only, so extension deployers can detect changes and an
//! unchanged input never causes a write.

use std::collections::{BTreeMap, BTreeSet};

use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

use canopy_common::crd::{
    is_deleting, object_ref, ControllerDeployment, ControllerInstallation,
    ControllerInstallationSpec, ControllerRegistration, Seed,
};
use canopy_common::hash::spec_hash;
use canopy_common::{
    Error, DEPLOYMENT_HASH_LABEL, REGISTRATION_SPEC_HASH_LABEL, SEED_SPEC_HASH_LABEL,
};

use crate::client::RegistrationClient;

/// Map registration name to the installation binding it to `seed`
///
/// Fails on installations referencing an unknown registration and on more
/// than one installation for the same registration.
pub fn registration_installations(
    installations: &[ControllerInstallation],
    registrations: &BTreeMap<String, ControllerRegistration>,
    seed: &str,
) -> Result<BTreeMap<String, ControllerInstallation>, Error> {
    let mut by_registration: BTreeMap<String, Vec<&ControllerInstallation>> = BTreeMap::new();

    for installation in installations
        .iter()
        .filter(|i| i.spec.seed_name() == seed)
    {
        let registration = installation.spec.registration_name();
        if !registrations.contains_key(registration) {
            return Err(Error::unknown_registration(seed, registration));
        }
        by_registration
            .entry(registration.to_string())
            .or_default()
            .push(installation);
    }

    by_registration
        .into_iter()
        .map(|(registration, found)| match found.as_slice() {
            [installation] => Ok((registration, (*installation).clone())),
            _ => Err(Error::DuplicateInstallation {
                seed: seed.to_string(),
                registration,
                installations: found.iter().map(|i| i.name_any()).collect(),
            }),
        })
        .collect()
}

/// Drift-detection labels of an installation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashLabels {
    /// Hash of the seed spec
    pub seed_spec: String,
    /// Hash of the registration spec
    pub registration_spec: String,
    /// Hash of the deployment type and provider config
    pub deployment: Option<String>,
}

impl HashLabels {
    /// Compute the labels from spec content
    pub fn compute(
        seed: &Seed,
        registration: &ControllerRegistration,
        deployment: Option<&ControllerDeployment>,
    ) -> Result<Self, Error> {
        Ok(Self {
            seed_spec: spec_hash(&seed.spec)?,
            registration_spec: spec_hash(&registration.spec)?,
            deployment: deployment
                .map(|d| spec_hash(&d.spec.hash_fields()))
                .transpose()?,
        })
    }

    /// Write the labels, removing the deployment hash when there is no deployment
    pub fn apply(&self, labels: &mut BTreeMap<String, String>) {
        labels.insert(SEED_SPEC_HASH_LABEL.to_string(), self.seed_spec.clone());
        labels.insert(
            REGISTRATION_SPEC_HASH_LABEL.to_string(),
            self.registration_spec.clone(),
        );
        match &self.deployment {
            Some(hash) => {
                labels.insert(DEPLOYMENT_HASH_LABEL.to_string(), hash.clone());
            }
            None => {
                labels.remove(DEPLOYMENT_HASH_LABEL);
            }
        }
    }
}

/// Create or update an installation for every wanted registration
///
/// Registrations are processed in name order. The first error aborts the
/// remaining registrations.
pub async fn deploy_wanted_installations(
    client: &dyn RegistrationClient,
    seed: &Seed,
    wanted: &BTreeSet<String>,
    registrations: &BTreeMap<String, ControllerRegistration>,
    existing: &BTreeMap<String, ControllerInstallation>,
) -> Result<(), Error> {
    let seed_name = seed.name_any();

    for name in wanted {
        let registration = registrations
            .get(name)
            .ok_or_else(|| Error::unknown_registration(&seed_name, name))?;

        if is_deleting(registration) {
            info!(
                seed = %seed_name,
                registration = %name,
                "not deploying ControllerInstallation for registration in deletion"
            );
            continue;
        }

        let deployment = match registration.spec.first_deployment_ref() {
            Some(deployment) => Some(client.get_deployment(deployment).await.map_err(|e| {
                Error::DeploymentUnavailable {
                    registration: name.clone(),
                    deployment: deployment.to_string(),
                    source: Box::new(e),
                }
            })?),
            None => None,
        };

        let current = existing.get(name);
        if let Some(installation) = current.filter(|i| is_deleting(*i)) {
            return Err(Error::InstallationDeletionPending {
                seed: seed_name.clone(),
                registration: name.clone(),
                installation: installation.name_any(),
            });
        }

        deploy_installation(client, seed, registration, deployment.as_ref(), current).await?;
    }

    Ok(())
}

async fn deploy_installation(
    client: &dyn RegistrationClient,
    seed: &Seed,
    registration: &ControllerRegistration,
    deployment: Option<&ControllerDeployment>,
    existing: Option<&ControllerInstallation>,
) -> Result<(), Error> {
    let registration_name = registration.name_any();
    let spec = ControllerInstallationSpec {
        seed_ref: object_ref(seed.name_any(), seed.resource_version()),
        registration_ref: object_ref(&registration_name, registration.resource_version()),
        deployment_ref: deployment.map(|d| object_ref(d.name_any(), d.resource_version())),
    };
    let labels = HashLabels::compute(seed, registration, deployment)?;

    let Some(existing) = existing else {
        let mut installation = ControllerInstallation {
            metadata: ObjectMeta {
                generate_name: Some(format!("{}-", registration_name)),
                ..Default::default()
            },
            spec,
            status: None,
        };
        labels.apply(installation.labels_mut());
        let created = client.create_installation(&installation).await?;
        info!(
            seed = %seed.name_any(),
            registration = %registration_name,
            installation = %created.name_any(),
            "created ControllerInstallation"
        );
        return Ok(());
    };

    let name = existing.name_any();
    let Some(current) = client.get_installation(&name).await? else {
        // Deleted since it was listed; recreate under the same name
        let mut installation = ControllerInstallation {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                ..Default::default()
            },
            spec,
            status: None,
        };
        labels.apply(installation.labels_mut());
        client.create_installation(&installation).await?;
        info!(
            seed = %seed.name_any(),
            registration = %registration_name,
            installation = %name,
            "recreated vanished ControllerInstallation"
        );
        return Ok(());
    };

    let mut desired = current.clone();
    desired.spec = spec;
    labels.apply(desired.labels_mut());
    if desired.spec == current.spec && desired.meta().labels == current.meta().labels {
        debug!(installation = %name, "ControllerInstallation up to date");
        return Ok(());
    }

    client.replace_installation(&desired).await?;
    info!(
        seed = %seed.name_any(),
        registration = %registration_name,
        installation = %name,
        "updated ControllerInstallation"
    );
    Ok(())
}

/// Delete every installation whose registration is not wanted
///
/// An installation that is already gone counts as deleted.
pub async fn delete_unneeded_installations(
    client: &dyn RegistrationClient,
    wanted: &BTreeSet<String>,
    existing: &BTreeMap<String, ControllerInstallation>,
) -> Result<(), Error> {
    for (registration, installation) in existing {
        if wanted.contains(registration) {
            continue;
        }

        let name = installation.name_any();
        info!(installation = %name, registration = %registration, "deleting unneeded ControllerInstallation");
        match client.delete_installation(&name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(installation = %name, "ControllerInstallation already gone");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockRegistrationClient;
    use crate::testing::{
        deletion_timestamp, deployment, installation, registration, registrations, seed,
        with_deployment,
    };
    use mockall::predicate::eq;

    fn names(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn api_error(code: u16) -> Error {
        Error::from(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "test".to_string(),
            reason: "Test".to_string(),
            code,
        }))
    }

    /// An installation as the synchronizer would have written it
    fn converged(name: &str, seed: &Seed, registration: &ControllerRegistration) -> ControllerInstallation {
        let mut inst = installation(name, &seed.name_any(), &registration.name_any());
        inst.spec.seed_ref = object_ref(seed.name_any(), seed.resource_version());
        inst.spec.registration_ref =
            object_ref(registration.name_any(), registration.resource_version());
        HashLabels::compute(seed, registration, None)
            .unwrap()
            .apply(inst.labels_mut());
        inst
    }

    // =========================================================================
    // Registration to installation map
    // =========================================================================

    #[test]
    fn test_installations_of_other_seeds_are_ignored() {
        let regs = registrations(vec![registration("dns", &[])]);
        let map = registration_installations(
            &[installation("dns-a", "s1", "dns"), installation("dns-b", "s2", "dns")],
            &regs,
            "s1",
        )
        .unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map["dns"].name_any(), "dns-a");
    }

    #[test]
    fn test_installation_of_unknown_registration_is_fatal() {
        let err = registration_installations(
            &[installation("ghost-a", "s1", "ghost")],
            &BTreeMap::new(),
            "s1",
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownRegistration { ref registration, .. } if registration == "ghost"));
    }

    #[test]
    fn test_duplicate_installation_is_fatal() {
        let regs = registrations(vec![registration("dns", &[])]);
        let err = registration_installations(
            &[installation("dns-a", "s1", "dns"), installation("dns-b", "s1", "dns")],
            &regs,
            "s1",
        )
        .unwrap_err();

        match err {
            Error::DuplicateInstallation { installations, .. } => {
                assert_eq!(installations, vec!["dns-a".to_string(), "dns-b".to_string()]);
            }
            other => panic!("expected DuplicateInstallation, got {other:?}"),
        }
    }

    // =========================================================================
    // Hash labels
    // =========================================================================

    #[test]
    fn test_hash_labels_are_deterministic_and_sized() {
        let seed = seed("s1");
        let reg = registration("dns", &[("DNSRecord", "aws-route53")]);
        let dep = deployment("dns", "dns-chart");

        let a = HashLabels::compute(&seed, &reg, Some(&dep)).unwrap();
        let b = HashLabels::compute(&seed.clone(), &reg.clone(), Some(&dep.clone())).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.seed_spec.len(), 16);
        assert_eq!(a.registration_spec.len(), 16);
        assert_eq!(a.deployment.as_ref().map(String::len), Some(16));
    }

    #[test]
    fn test_hash_labels_ignore_metadata() {
        let mut s1 = seed("s1");
        let mut s2 = seed("s1");
        s1.metadata.resource_version = Some("10".to_string());
        s2.metadata.resource_version = Some("99".to_string());
        s2.metadata.labels = Some([("x".to_string(), "y".to_string())].into());
        let reg = registration("dns", &[]);

        assert_eq!(
            HashLabels::compute(&s1, &reg, None).unwrap(),
            HashLabels::compute(&s2, &reg, None).unwrap()
        );
    }

    #[test]
    fn test_hash_labels_follow_spec_changes() {
        let reg = registration("dns", &[]);
        let mut changed = seed("s1");
        changed.spec.provider.type_ = "gcp".to_string();

        let before = HashLabels::compute(&seed("s1"), &reg, None).unwrap();
        let after = HashLabels::compute(&changed, &reg, None).unwrap();
        assert_ne!(before.seed_spec, after.seed_spec);
        assert_eq!(before.registration_spec, after.registration_spec);
    }

    #[test]
    fn test_missing_deployment_removes_label() {
        let mut labels = BTreeMap::from([(DEPLOYMENT_HASH_LABEL.to_string(), "stale".to_string())]);
        HashLabels::compute(&seed("s1"), &registration("dns", &[]), None)
            .unwrap()
            .apply(&mut labels);

        assert!(!labels.contains_key(DEPLOYMENT_HASH_LABEL));
        assert!(labels.contains_key(SEED_SPEC_HASH_LABEL));
        assert!(labels.contains_key(REGISTRATION_SPEC_HASH_LABEL));
    }

    // =========================================================================
    // Deploy phase
    // =========================================================================

    #[tokio::test]
    async fn test_new_installation_uses_generate_name() {
        let seed = seed("s1");
        let regs = registrations(vec![with_deployment(registration("dns", &[]), "dns-deploy")]);

        let mut client = MockRegistrationClient::new();
        client
            .expect_get_deployment()
            .with(eq("dns-deploy"))
            .returning(|_| Ok(deployment("dns-deploy", "chart")));
        client
            .expect_create_installation()
            .withf(|inst| {
                inst.metadata.name.is_none()
                    && inst.metadata.generate_name.as_deref() == Some("dns-")
                    && inst.spec.seed_name() == "s1"
                    && inst.spec.registration_name() == "dns"
                    && inst
                        .spec
                        .deployment_ref
                        .as_ref()
                        .and_then(|r| r.resource_version.as_deref())
                        == Some("7")
                    && inst.labels().contains_key(DEPLOYMENT_HASH_LABEL)
            })
            .times(1)
            .returning(|inst| {
                let mut created = inst.clone();
                created.metadata.name = Some("dns-x7k2p".to_string());
                Ok(created)
            });

        deploy_wanted_installations(&client, &seed, &names(&["dns"]), &regs, &BTreeMap::new())
            .await
            .unwrap();
    }

    /// Story: re-running with unchanged specs writes nothing
    #[tokio::test]
    async fn story_unchanged_installation_is_not_written() {
        let seed = seed("s1");
        let reg = registration("dns", &[]);
        let existing = converged("dns-a", &seed, &reg);
        let regs = registrations(vec![reg]);

        let mut client = MockRegistrationClient::new();
        let current = existing.clone();
        client
            .expect_get_installation()
            .with(eq("dns-a"))
            .returning(move |_| Ok(Some(current.clone())));
        client.expect_replace_installation().never();
        client.expect_create_installation().never();

        deploy_wanted_installations(
            &client,
            &seed,
            &names(&["dns"]),
            &regs,
            &BTreeMap::from([("dns".to_string(), existing)]),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_drifted_installation_is_replaced_from_fresh_copy() {
        let mut seed = seed("s1");
        let reg = registration("dns", &[]);
        let listed = converged("dns-a", &seed, &reg);
        seed.spec.provider.region = Some("eu-central-1".to_string());
        let regs = registrations(vec![reg]);

        // Someone bumped the object after it was listed
        let mut fresh = listed.clone();
        fresh.metadata.resource_version = Some("4".to_string());
        fresh.metadata.labels.get_or_insert_with(BTreeMap::new).insert("team".to_string(), "dns".to_string());

        let expected_hash = spec_hash(&seed.spec).unwrap();
        let mut client = MockRegistrationClient::new();
        client
            .expect_get_installation()
            .returning(move |_| Ok(Some(fresh.clone())));
        client
            .expect_replace_installation()
            .withf(move |inst| {
                inst.metadata.resource_version.as_deref() == Some("4")
                    && inst.labels().get("team").map(String::as_str) == Some("dns")
                    && inst.labels().get(SEED_SPEC_HASH_LABEL) == Some(&expected_hash)
            })
            .times(1)
            .returning(|inst| Ok(inst.clone()));

        deploy_wanted_installations(
            &client,
            &seed,
            &names(&["dns"]),
            &regs,
            &BTreeMap::from([("dns".to_string(), listed)]),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_vanished_installation_is_recreated_under_old_name() {
        let seed = seed("s1");
        let reg = registration("dns", &[]);
        let listed = converged("dns-a", &seed, &reg);
        let regs = registrations(vec![reg]);

        let mut client = MockRegistrationClient::new();
        client.expect_get_installation().returning(|_| Ok(None));
        client
            .expect_create_installation()
            .withf(|inst| {
                inst.metadata.name.as_deref() == Some("dns-a")
                    && inst.metadata.generate_name.is_none()
            })
            .times(1)
            .returning(|inst| Ok(inst.clone()));

        deploy_wanted_installations(
            &client,
            &seed,
            &names(&["dns"]),
            &regs,
            &BTreeMap::from([("dns".to_string(), listed)]),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_deleting_registration_is_skipped() {
        let mut reg = registration("dns", &[]);
        reg.metadata.deletion_timestamp = deletion_timestamp();
        let regs = registrations(vec![reg]);

        let client = MockRegistrationClient::new();
        deploy_wanted_installations(&client, &seed("s1"), &names(&["dns"]), &regs, &BTreeMap::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deleting_installation_blocks_deploy() {
        let mut existing = installation("dns-a", "s1", "dns");
        existing.metadata.deletion_timestamp = deletion_timestamp();
        let regs = registrations(vec![registration("dns", &[])]);

        let client = MockRegistrationClient::new();
        let err = deploy_wanted_installations(
            &client,
            &seed("s1"),
            &names(&["dns"]),
            &regs,
            &BTreeMap::from([("dns".to_string(), existing)]),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            Error::InstallationDeletionPending { ref installation, .. } if installation == "dns-a"
        ));
    }

    #[tokio::test]
    async fn test_unavailable_deployment_aborts_remaining_registrations() {
        let regs = registrations(vec![
            with_deployment(registration("a-first", &[]), "missing"),
            registration("b-second", &[]),
        ]);

        let mut client = MockRegistrationClient::new();
        client
            .expect_get_deployment()
            .returning(|name| Err(Error::not_found("ControllerDeployment", name)));
        client.expect_create_installation().never();

        let err = deploy_wanted_installations(
            &client,
            &seed("s1"),
            &names(&["a-first", "b-second"]),
            &regs,
            &BTreeMap::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            Error::DeploymentUnavailable { ref registration, ref deployment, ref source }
                if registration == "a-first" && deployment == "missing" && source.is_not_found()
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_deployment_read_failure_keeps_source_error() {
        let regs = registrations(vec![with_deployment(registration("dns", &[]), "dns-chart")]);

        let mut client = MockRegistrationClient::new();
        client
            .expect_get_deployment()
            .with(eq("dns-chart"))
            .returning(|_| Err(api_error(500)));
        client.expect_create_installation().never();

        let err = deploy_wanted_installations(
            &client,
            &seed("s1"),
            &names(&["dns"]),
            &regs,
            &BTreeMap::new(),
        )
        .await
        .unwrap_err();

        match &err {
            Error::DeploymentUnavailable { source, .. } => {
                assert!(matches!(**source, Error::Kube { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_write_conflict_is_returned() {
        let mut seed = seed("s1");
        let reg = registration("dns", &[]);
        let listed = converged("dns-a", &seed, &reg);
        seed.spec.provider.type_ = "gcp".to_string();
        let regs = registrations(vec![reg]);

        let mut client = MockRegistrationClient::new();
        let fresh = listed.clone();
        client
            .expect_get_installation()
            .returning(move |_| Ok(Some(fresh.clone())));
        client
            .expect_replace_installation()
            .returning(|_| Err(api_error(409)));

        let err = deploy_wanted_installations(
            &client,
            &seed,
            &names(&["dns"]),
            &regs,
            &BTreeMap::from([("dns".to_string(), listed)]),
        )
        .await
        .unwrap_err();
        assert!(err.is_conflict());
    }

    // =========================================================================
    // Delete phase
    // =========================================================================

    #[tokio::test]
    async fn test_unwanted_installations_are_deleted() {
        let existing = BTreeMap::from([
            ("dns".to_string(), installation("dns-a", "s1", "dns")),
            ("provider-aws".to_string(), installation("aws-a", "s1", "provider-aws")),
        ]);

        let mut client = MockRegistrationClient::new();
        client
            .expect_delete_installation()
            .with(eq("dns-a"))
            .times(1)
            .returning(|_| Ok(()));

        delete_unneeded_installations(&client, &names(&["provider-aws"]), &existing)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_already_deleted_installation_is_success() {
        let existing = BTreeMap::from([("dns".to_string(), installation("dns-a", "s1", "dns"))]);

        let mut client = MockRegistrationClient::new();
        client
            .expect_delete_installation()
            .returning(|_| Err(api_error(404)));

        delete_unneeded_installations(&client, &BTreeSet::new(), &existing)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_failure_is_returned() {
        let existing = BTreeMap::from([("dns".to_string(), installation("dns-a", "s1", "dns"))]);

        let mut client = MockRegistrationClient::new();
        client
            .expect_delete_installation()
            .returning(|_| Err(api_error(500)));

        assert!(delete_unneeded_installations(&client, &BTreeSet::new(), &existing)
            .await
            .is_err());
    }
}
