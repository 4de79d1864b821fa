//! BackupBucket and BackupEntry Custom Resource Definitions
//!
//! Buckets live in a provider object store and are assigned to a seed.
//! Entries reference a bucket by name and may be assigned to a different
//! seed than their bucket while a shoot is migrating.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ProviderSpec;

/// Specification for a BackupBucket
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "core.canopy.dev",
    version = "v1beta1",
    kind = "BackupBucket",
    plural = "backupbuckets",
    namespaced = false,
    printcolumn = r#"{"name":"Provider","type":"string","jsonPath":".spec.provider.type"}"#,
    printcolumn = r#"{"name":"Seed","type":"string","jsonPath":".spec.seedName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupBucketSpec {
    /// Object store provider
    pub provider: ProviderSpec,

    /// Seed responsible for the bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,
}

/// Specification for a BackupEntry
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "core.canopy.dev",
    version = "v1beta1",
    kind = "BackupEntry",
    plural = "backupentries",
    namespaced,
    printcolumn = r#"{"name":"Bucket","type":"string","jsonPath":".spec.bucketName"}"#,
    printcolumn = r#"{"name":"Seed","type":"string","jsonPath":".spec.seedName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntrySpec {
    /// Name of the BackupBucket holding the entry
    pub bucket_name: String,

    /// Seed responsible for the entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,
}

impl BackupBucketSpec {
    /// True when the bucket is assigned to the given seed
    pub fn is_assigned_to(&self, seed: &str) -> bool {
        self.seed_name.as_deref() == Some(seed)
    }
}

impl BackupEntrySpec {
    /// True when the entry is assigned to the given seed
    pub fn is_assigned_to(&self, seed: &str) -> bool {
        self.seed_name.as_deref() == Some(seed)
    }
}
