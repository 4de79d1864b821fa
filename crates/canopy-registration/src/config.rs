//! Configuration of the registration controller
//!
//! Loaded once at start-up from a YAML file and shared through the
//! controller [`Context`](crate::Context).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use canopy_common::Error;

const DEFAULT_ERROR_REQUEUE_SECS: u64 = 30;

/// A DNS domain together with the provider type that manages it
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    /// Domain name, e.g. `internal.canopy.example.com`
    pub domain: String,

    /// DNS provider type, e.g. `aws-route53`
    pub provider: String,
}

impl Domain {
    /// Create a domain managed by the given provider
    pub fn new(domain: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            provider: provider.into(),
        }
    }

    /// True when `name` is this domain or one of its subdomains
    pub fn covers(&self, name: &str) -> bool {
        let name = name.trim_end_matches('.');
        let domain = self.domain.trim_end_matches('.');
        name == domain
            || name
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

/// Registration controller configuration
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationConfig {
    /// Require `DNSRecord` extensions instead of legacy `DNSProvider` ones
    #[serde(default = "default_use_dns_records")]
    pub use_dns_records: bool,

    /// Domain for the internal API server records of every shoot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_domain: Option<Domain>,

    /// Domains offered to shoots without their own DNS provider
    #[serde(default)]
    pub default_domains: Vec<Domain>,

    /// Delay before a failed reconcile is retried
    #[serde(default = "default_error_requeue_secs")]
    pub error_requeue_secs: u64,
}

fn default_use_dns_records() -> bool {
    true
}

fn default_error_requeue_secs() -> u64 {
    DEFAULT_ERROR_REQUEUE_SECS
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            use_dns_records: default_use_dns_records(),
            internal_domain: None,
            default_domains: Vec::new(),
            error_requeue_secs: DEFAULT_ERROR_REQUEUE_SECS,
        }
    }
}

impl RegistrationConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::serialization_for_kind("RegistrationConfig", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::internal_with_context(
                "config",
                format!("cannot read {}: {}", path.display(), e),
            )
        })?;
        Self::from_yaml(&yaml)
    }

    /// Reject configurations the controller cannot work with
    pub fn validate(&self) -> Result<(), Error> {
        if self.error_requeue_secs == 0 {
            return Err(Error::internal_with_context(
                "config",
                "errorRequeueSecs must be greater than zero",
            ));
        }
        for domain in self.internal_domain.iter().chain(&self.default_domains) {
            if domain.domain.is_empty() || domain.provider.is_empty() {
                return Err(Error::internal_with_context(
                    "config",
                    format!("domain {:?} needs both domain and provider", domain.domain),
                ));
            }
        }
        Ok(())
    }

    /// Backoff applied by the error policy
    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}
