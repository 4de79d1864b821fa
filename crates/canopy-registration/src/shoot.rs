//! Extension requirements of a single shoot
//!
//! [`ShootRequirements`] is the seam the aggregator calls once per shoot.
//! [`SpecShootRequirements`] derives the requirements from the shoot spec,
//! the hosting seed and the globally enabled extensions.

use std::collections::BTreeSet;

use async_trait::async_trait;
use kube::ResourceExt;

#[cfg(test)]
use mockall::automock;

use canopy_common::crd::{ControllerRegistration, Seed, Shoot};
use canopy_common::extension::kinds;
use canopy_common::{Error, ExtensionId};

use crate::config::{Domain, RegistrationConfig};

/// DNS provider type for domains nobody manages
pub const UNMANAGED_DNS_PROVIDER: &str = "unmanaged";

/// Computes the extensions one shoot needs on its seed
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ShootRequirements: Send + Sync {
    /// Required extension identities of `shoot` hosted on `seed`
    ///
    /// `registrations` is the full registration list, used to find globally
    /// enabled extensions.
    async fn required_extensions(
        &self,
        shoot: &Shoot,
        seed: &Seed,
        registrations: &[ControllerRegistration],
    ) -> Result<BTreeSet<ExtensionId>, Error>;
}

/// Derives shoot requirements from the shoot spec
#[derive(Clone, Debug)]
pub struct SpecShootRequirements {
    use_dns_records: bool,
    internal_domain: Option<Domain>,
    default_domains: Vec<Domain>,
}

impl SpecShootRequirements {
    /// Create from the controller configuration
    pub fn from_config(config: &RegistrationConfig) -> Self {
        Self {
            use_dns_records: config.use_dns_records,
            internal_domain: config.internal_domain.clone(),
            default_domains: config.default_domains.clone(),
        }
    }

    /// Resolve the external domain of a shoot and the provider managing it
    ///
    /// A shoot without a domain has no external domain. A domain needs either
    /// a primary provider with credentials, a covering default domain or an
    /// unmanaged primary provider.
    pub fn external_domain(&self, shoot: &Shoot) -> Result<Option<Domain>, Error> {
        let Some(dns) = shoot.spec.dns.as_ref() else {
            return Ok(None);
        };
        let Some(domain) = dns.domain.as_deref() else {
            return Ok(None);
        };

        let primary = dns.providers.iter().find(|p| p.is_primary());
        if let Some(type_) = primary
            .filter(|p| p.secret_name.is_some())
            .and_then(|p| p.type_.as_deref())
        {
            return Ok(Some(Domain::new(domain, type_)));
        }
        if let Some(default) = self.default_domains.iter().find(|d| d.covers(domain)) {
            return Ok(Some(Domain::new(domain, &default.provider)));
        }
        if primary.and_then(|p| p.type_.as_deref()) == Some(UNMANAGED_DNS_PROVIDER) {
            return Ok(Some(Domain::new(domain, UNMANAGED_DNS_PROVIDER)));
        }

        Err(Error::IncompleteDnsConfig {
            shoot: shoot_key(shoot),
            message: format!(
                "domain {:?} has neither a primary provider with credentials nor a matching default domain",
                domain
            ),
        })
    }

    fn dns_requirements(
        &self,
        shoot: &Shoot,
        external: Option<&Domain>,
        required: &mut BTreeSet<ExtensionId>,
    ) {
        let managed = |d: &&Domain| d.provider != UNMANAGED_DNS_PROVIDER;

        if self.use_dns_records {
            for domain in self.internal_domain.iter().chain(external).filter(managed) {
                required.insert(ExtensionId::new(kinds::DNS_RECORD, &domain.provider));
            }
            return;
        }

        let declared = shoot
            .spec
            .dns
            .iter()
            .flat_map(|dns| &dns.providers)
            .filter_map(|p| p.type_.as_deref())
            .filter(|t| *t != UNMANAGED_DNS_PROVIDER);
        for type_ in declared {
            required.insert(ExtensionId::new(kinds::DNS_PROVIDER, type_));
        }
        for domain in self.internal_domain.iter().chain(external).filter(managed) {
            required.insert(ExtensionId::new(kinds::DNS_PROVIDER, &domain.provider));
        }
    }
}

#[async_trait]
impl ShootRequirements for SpecShootRequirements {
    async fn required_extensions(
        &self,
        shoot: &Shoot,
        seed: &Seed,
        registrations: &[ControllerRegistration],
    ) -> Result<BTreeSet<ExtensionId>, Error> {
        let external = self.external_domain(shoot)?;
        let spec = &shoot.spec;
        let provider = spec.provider.type_.as_str();
        let mut required = BTreeSet::new();

        if let Some(backup) = seed.spec.backup.as_ref() {
            required.insert(ExtensionId::new(kinds::BACKUP_BUCKET, &backup.provider));
            required.insert(ExtensionId::new(kinds::BACKUP_ENTRY, &backup.provider));
        }

        required.insert(ExtensionId::new(
            kinds::CONTROL_PLANE,
            &seed.spec.provider.type_,
        ));
        required.insert(ExtensionId::new(kinds::CONTROL_PLANE, provider));
        required.insert(ExtensionId::new(kinds::INFRASTRUCTURE, provider));
        if !spec.provider.workers.is_empty() {
            required.insert(ExtensionId::new(kinds::WORKER, provider));
        }
        if !spec.networking.type_.is_empty() {
            required.insert(ExtensionId::new(kinds::NETWORK, &spec.networking.type_));
        }

        // Globally enabled extensions first, then the shoot's own opt-ins and opt-outs
        let mut extensions: BTreeSet<&str> = registrations
            .iter()
            .flat_map(|r| &r.spec.resources)
            .filter(|r| r.kind == kinds::EXTENSION && r.globally_enabled.unwrap_or(false))
            .map(|r| r.type_.as_str())
            .collect();
        for extension in &spec.extensions {
            if extension.is_disabled() {
                extensions.remove(extension.type_.as_str());
            } else {
                extensions.insert(extension.type_.as_str());
            }
        }
        for type_ in extensions {
            required.insert(ExtensionId::new(kinds::EXTENSION, type_));
        }

        for worker in &spec.provider.workers {
            if let Some(image) = worker.machine.image.as_ref() {
                required.insert(ExtensionId::new(
                    kinds::OPERATING_SYSTEM_CONFIG,
                    &image.name,
                ));
            }
            for runtime in worker.cri.iter().flat_map(|cri| &cri.container_runtimes) {
                required.insert(ExtensionId::new(kinds::CONTAINER_RUNTIME, &runtime.type_));
            }
        }

        self.dns_requirements(shoot, external.as_ref(), &mut required);

        Ok(required)
    }
}

/// `namespace/name` of a shoot
pub fn shoot_key(shoot: &Shoot) -> String {
    format!(
        "{}/{}",
        shoot.namespace().unwrap_or_default(),
        shoot.name_any()
    )
}
