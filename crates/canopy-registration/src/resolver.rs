//! Registration resolution
//!
//! Maps required extension identities to the ControllerRegistrations that
//! serve them, adds registrations deployed by policy, and carries over
//! installations their extension still marks as required.

use std::collections::{BTreeMap, BTreeSet};

use kube::ResourceExt;
use tracing::{debug, warn};

use canopy_common::crd::{is_deleting, ControllerInstallation, ControllerRegistration, DeploymentPolicy, Seed};
use canopy_common::{Error, ExtensionId};

/// Index registrations by name
pub fn registration_map(
    registrations: impl IntoIterator<Item = ControllerRegistration>,
) -> BTreeMap<String, ControllerRegistration> {
    registrations
        .into_iter()
        .map(|r| (r.name_any(), r))
        .collect()
}

/// Names of the registrations that should be installed on `seed`
///
/// Seed eligibility is not checked here; see
/// [`filter_by_seed_selector`](crate::eligibility::filter_by_seed_selector).
/// Registrations failing validation are skipped and serve no extension.
pub fn wanted_registration_names(
    required: &BTreeSet<ExtensionId>,
    installations: &[ControllerInstallation],
    registrations: &BTreeMap<String, ControllerRegistration>,
    shoot_count: usize,
    seed: &Seed,
) -> Result<BTreeSet<String>, Error> {
    let seed_name = seed.name_any();
    let seed_deleting = is_deleting(seed);

    let mut by_extension: BTreeMap<ExtensionId, Vec<&str>> = BTreeMap::new();
    let mut wanted = BTreeSet::new();

    for (name, registration) in registrations {
        if let Err(e) = registration.spec.validate() {
            warn!(
                seed = %seed_name,
                registration = %name,
                error = %e,
                "skipping invalid registration"
            );
            continue;
        }

        match registration.spec.policy() {
            DeploymentPolicy::Always if !seed_deleting => {
                wanted.insert(name.clone());
            }
            DeploymentPolicy::AlwaysExceptNoShoots if shoot_count > 0 => {
                wanted.insert(name.clone());
            }
            _ => {}
        }

        for id in registration.spec.extension_ids() {
            by_extension.entry(id).or_default().push(name);
        }
    }

    for id in required {
        let names = by_extension
            .get(id)
            .ok_or_else(|| Error::missing_extension_controller(&seed_name, id.to_string()))?;
        wanted.extend(names.iter().map(|n| n.to_string()));
    }

    for installation in installations {
        if installation.spec.seed_name() == seed_name && installation.is_required() {
            let registration = installation.spec.registration_name();
            if wanted.insert(registration.to_string()) {
                debug!(
                    seed = %seed_name,
                    registration,
                    installation = %installation.name_any(),
                    "keeping installation its extension still requires"
                );
            }
        }
    }

    Ok(wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        deletion_timestamp, installation, registration, registrations, required, seed, with_policy,
    };
    use canopy_common::extension::kinds;

    fn required_set(ids: &[(&str, &str)]) -> BTreeSet<ExtensionId> {
        ids.iter().map(|(k, t)| ExtensionId::new(*k, *t)).collect()
    }

    fn names(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_required_extensions_map_to_all_serving_registrations() {
        let regs = registrations(vec![
            registration("provider-aws", &[(kinds::INFRASTRUCTURE, "aws"), (kinds::WORKER, "aws")]),
            registration("provider-aws-next", &[(kinds::INFRASTRUCTURE, "aws")]),
            registration("provider-gcp", &[(kinds::INFRASTRUCTURE, "gcp")]),
        ]);

        let wanted = wanted_registration_names(
            &required_set(&[(kinds::INFRASTRUCTURE, "aws")]),
            &[],
            &regs,
            1,
            &seed("s1"),
        )
        .unwrap();

        assert_eq!(wanted, names(&["provider-aws", "provider-aws-next"]));
    }

    /// Story: a required extension nobody serves blocks the whole seed
    #[test]
    fn story_missing_extension_controller_fails() {
        let regs = registrations(vec![registration(
            "provider-aws",
            &[(kinds::BACKUP_BUCKET, "aws")],
        )]);

        let err = wanted_registration_names(
            &required_set(&[(kinds::BACKUP_BUCKET, "aws"), (kinds::BACKUP_ENTRY, "aws")]),
            &[],
            &regs,
            0,
            &seed("s1"),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            Error::MissingExtensionController { ref seed, ref extension }
                if seed == "s1" && extension == "BackupEntry/aws"
        ));
    }

    #[test]
    fn test_always_policy_respects_seed_deletion() {
        let regs = registrations(vec![with_policy(
            registration("networking-calico", &[]),
            DeploymentPolicy::Always,
        )]);

        let mut s = seed("s1");
        let wanted = wanted_registration_names(&BTreeSet::new(), &[], &regs, 0, &s).unwrap();
        assert_eq!(wanted, names(&["networking-calico"]));

        s.metadata.deletion_timestamp = deletion_timestamp();
        let wanted = wanted_registration_names(&BTreeSet::new(), &[], &regs, 0, &s).unwrap();
        assert!(wanted.is_empty());
    }

    #[test]
    fn test_always_except_no_shoots_policy_counts_shoots() {
        let regs = registrations(vec![with_policy(
            registration("os-ubuntu", &[]),
            DeploymentPolicy::AlwaysExceptNoShoots,
        )]);

        let wanted =
            wanted_registration_names(&BTreeSet::new(), &[], &regs, 0, &seed("s1")).unwrap();
        assert!(wanted.is_empty());

        let wanted =
            wanted_registration_names(&BTreeSet::new(), &[], &regs, 3, &seed("s1")).unwrap();
        assert_eq!(wanted, names(&["os-ubuntu"]));

        // Shoots still count while the seed is deleting
        let mut s = seed("s1");
        s.metadata.deletion_timestamp = deletion_timestamp();
        let wanted = wanted_registration_names(&BTreeSet::new(), &[], &regs, 1, &s).unwrap();
        assert_eq!(wanted, names(&["os-ubuntu"]));
    }

    /// Story: an extension still draining resources keeps its installation
    #[test]
    fn story_required_installation_is_carried_over() {
        let regs = registrations(vec![
            registration("dns-old", &[(kinds::DNS_RECORD, "aws-route53")]),
            registration("dns-unused", &[(kinds::DNS_RECORD, "gcp-clouddns")]),
        ]);
        let installations = vec![
            required(installation("dns-old-x1", "s1", "dns-old")),
            installation("dns-unused-x2", "s1", "dns-unused"),
            required(installation("dns-old-x3", "s2", "dns-old")),
        ];

        let wanted =
            wanted_registration_names(&BTreeSet::new(), &installations, &regs, 0, &seed("s1"))
                .unwrap();
        assert_eq!(wanted, names(&["dns-old"]));

        let wanted =
            wanted_registration_names(&BTreeSet::new(), &installations, &regs, 0, &seed("s3"))
                .unwrap();
        assert!(wanted.is_empty());
    }

    /// Story: a broken registration is ignored instead of installed
    #[test]
    fn story_invalid_registration_is_skipped() {
        let mut duplicated = registration("provider-aws-dup", &[(kinds::INFRASTRUCTURE, "aws")]);
        duplicated.spec.resources.push(duplicated.spec.resources[0].clone());
        let regs = registrations(vec![
            registration("provider-aws", &[(kinds::INFRASTRUCTURE, "aws")]),
            duplicated,
            // OnDemand without resources can never be installed
            registration("orphan", &[]),
        ]);

        let wanted = wanted_registration_names(
            &required_set(&[(kinds::INFRASTRUCTURE, "aws")]),
            &[],
            &regs,
            1,
            &seed("s1"),
        )
        .unwrap();
        assert_eq!(wanted, names(&["provider-aws"]));

        // An extension served only by an invalid registration has no controller
        let regs = registrations(vec![registration(
            "provider-gcp",
            &[(kinds::INFRASTRUCTURE, "gcp"), (kinds::INFRASTRUCTURE, "gcp")],
        )]);
        let err = wanted_registration_names(
            &required_set(&[(kinds::INFRASTRUCTURE, "gcp")]),
            &[],
            &regs,
            1,
            &seed("s1"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingExtensionController { .. }));
    }

    #[test]
    fn test_registration_map_indexes_by_name() {
        let map = registration_map(vec![registration("a", &[]), registration("b", &[])]);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
