//! Extension identities
//!
//! An extension requirement is identified by the `(Kind, Type)` pair of the
//! extension resource it needs, e.g. `BackupBucket/aws`. The string form is
//! `Kind/Type`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Extension resource kinds known to the platform
pub mod kinds {
    /// Backup bucket in an object store
    pub const BACKUP_BUCKET: &str = "BackupBucket";
    /// Backup entry inside a bucket
    pub const BACKUP_ENTRY: &str = "BackupEntry";
    /// Shoot control plane components
    pub const CONTROL_PLANE: &str = "ControlPlane";
    /// Container runtime on worker nodes
    pub const CONTAINER_RUNTIME: &str = "ContainerRuntime";
    /// DNS provider (legacy DNS management)
    pub const DNS_PROVIDER: &str = "DNSProvider";
    /// DNS record
    pub const DNS_RECORD: &str = "DNSRecord";
    /// Generic extension
    pub const EXTENSION: &str = "Extension";
    /// Shoot infrastructure
    pub const INFRASTRUCTURE: &str = "Infrastructure";
    /// Pod network
    pub const NETWORK: &str = "Network";
    /// Worker node operating system configuration
    pub const OPERATING_SYSTEM_CONFIG: &str = "OperatingSystemConfig";
    /// Worker machines
    pub const WORKER: &str = "Worker";
}

/// A `(Kind, Type)` extension requirement
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExtensionId {
    /// Extension resource kind, e.g. `BackupBucket`
    pub kind: String,
    /// Provider type, e.g. `aws`
    #[serde(rename = "type")]
    pub type_: String,
}

impl ExtensionId {
    /// Create an identity from kind and type
    pub fn new(kind: impl Into<String>, type_: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            type_: type_.into(),
        }
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.type_)
    }
}

impl std::str::FromStr for ExtensionId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((kind, type_)) if !kind.is_empty() && !type_.is_empty() => {
                Ok(Self::new(kind, type_))
            }
            _ => Err(crate::Error::serialization_for_kind(
                "ExtensionId",
                format!("expected Kind/Type, got {:?}", s),
            )),
        }
    }
}
