//! Requirement aggregation
//!
//! Computes the set of extension identities a seed needs from its backup
//! buckets, backup entries, shoots and its own configuration. A broken
//! individual source (dangling bucket reference, failing shoot) is logged
//! and skipped; it never aborts the whole computation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use kube::ResourceExt;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use canopy_common::crd::{
    is_deleting, BackupBucket, BackupEntry, ControllerRegistration, Seed, Shoot,
};
use canopy_common::extension::kinds;
use canopy_common::{Error, ExtensionId};

use crate::shoot::{shoot_key, ShootRequirements};

/// Requirements of the buckets assigned to `seed`
///
/// Also returns the provider type of every bucket by name, regardless of
/// which seed it belongs to.
pub fn backup_bucket_requirements(
    buckets: &[BackupBucket],
    seed: &str,
) -> (BTreeSet<ExtensionId>, BTreeMap<String, String>) {
    let mut required = BTreeSet::new();
    let mut provider_types = BTreeMap::new();

    for bucket in buckets {
        provider_types.insert(bucket.name_any(), bucket.spec.provider.type_.clone());

        if bucket.spec.is_assigned_to(seed) {
            required.insert(ExtensionId::new(
                kinds::BACKUP_BUCKET,
                &bucket.spec.provider.type_,
            ));
        }
    }

    (required, provider_types)
}

/// Requirements of the entries assigned to `seed`
///
/// An entry is served by the provider of the bucket it references.
pub fn backup_entry_requirements(
    entries: &[BackupEntry],
    bucket_provider_types: &BTreeMap<String, String>,
    seed: &str,
) -> BTreeSet<ExtensionId> {
    let mut required = BTreeSet::new();

    for entry in entries.iter().filter(|e| e.spec.is_assigned_to(seed)) {
        match bucket_provider_types.get(&entry.spec.bucket_name) {
            Some(provider) => {
                required.insert(ExtensionId::new(kinds::BACKUP_ENTRY, provider));
            }
            None => warn!(
                seed,
                backup_entry = %entry.name_any(),
                bucket = %entry.spec.bucket_name,
                "BackupBucket referenced by BackupEntry not found, skipping"
            ),
        }
    }

    required
}

/// Requirements of the shoots assigned to the seed
///
/// Runs one task per shoot and unions the results once all of them are
/// done. A failing shoot contributes nothing. A panicking task fails the
/// whole computation; dropping the returned future aborts the remaining tasks.
pub async fn shoot_requirements(
    resolver: Arc<dyn ShootRequirements>,
    shoots: &[Shoot],
    seed: Arc<Seed>,
    registrations: Arc<Vec<ControllerRegistration>>,
) -> Result<BTreeSet<ExtensionId>, Error> {
    let seed_name = seed.name_any();
    let mut tasks = JoinSet::new();

    for shoot in shoots.iter().filter(|s| s.is_assigned_to(&seed_name)) {
        let shoot = shoot.clone();
        let resolver = Arc::clone(&resolver);
        let seed = Arc::clone(&seed);
        let registrations = Arc::clone(&registrations);

        tasks.spawn(async move {
            let result = resolver
                .required_extensions(&shoot, &seed, &registrations)
                .await;
            (ShootOutcome::of(&shoot), result)
        });
    }

    let mut required = BTreeSet::new();
    while let Some(joined) = tasks.join_next().await {
        let (shoot, result) = joined.map_err(|e| {
            Error::internal_with_context(
                "requirements",
                format!("shoot requirement task failed: {}", e),
            )
        })?;

        match result {
            Ok(ids) => required.extend(ids),
            Err(e) if shoot.suppresses(&e) => debug!(
                seed = %seed_name,
                shoot = %shoot.key,
                error = %e,
                "ignoring incomplete DNS config of shoot deleted before provisioning"
            ),
            Err(e) => warn!(
                seed = %seed_name,
                shoot = %shoot.key,
                error = %e,
                "could not compute required extensions of shoot"
            ),
        }
    }

    Ok(required)
}

struct ShootOutcome {
    key: String,
    deleting: bool,
    provisioned: bool,
}

impl ShootOutcome {
    fn of(shoot: &Shoot) -> Self {
        Self {
            key: shoot_key(shoot),
            deleting: is_deleting(shoot),
            provisioned: shoot.was_provisioned(),
        }
    }

    /// A shoot deleted before it was ever provisioned may lack DNS config
    fn suppresses(&self, error: &Error) -> bool {
        matches!(error, Error::IncompleteDnsConfig { .. }) && self.deleting && !self.provisioned
    }
}

/// Requirements of the seed's own configuration
///
/// A deleting seed requires nothing, so its installations can be cleaned up.
pub fn seed_requirements(seed: &Seed, use_dns_records: bool) -> BTreeSet<ExtensionId> {
    let mut required = BTreeSet::new();
    if is_deleting(seed) {
        return required;
    }

    if let Some(dns_type) = seed.spec.dns_provider_type() {
        let kind = if use_dns_records {
            kinds::DNS_RECORD
        } else {
            kinds::DNS_PROVIDER
        };
        required.insert(ExtensionId::new(kind, dns_type));
    }

    required
}

/// Live objects the requirements are computed from
pub struct RequirementSources<'a> {
    /// All backup buckets
    pub buckets: &'a [BackupBucket],
    /// Backup entries, at least those of the seed
    pub entries: &'a [BackupEntry],
    /// Shoots, at least those of the seed
    pub shoots: &'a [Shoot],
    /// All registrations
    pub registrations: Arc<Vec<ControllerRegistration>>,
}

/// Union of all requirement sources of a seed
pub async fn required_extensions(
    resolver: Arc<dyn ShootRequirements>,
    sources: RequirementSources<'_>,
    seed: Arc<Seed>,
    use_dns_records: bool,
) -> Result<BTreeSet<ExtensionId>, Error> {
    let seed_name = seed.name_any();

    let (mut required, bucket_provider_types) =
        backup_bucket_requirements(sources.buckets, &seed_name);
    required.extend(backup_entry_requirements(
        sources.entries,
        &bucket_provider_types,
        &seed_name,
    ));
    required.extend(seed_requirements(&seed, use_dns_records));
    required.extend(
        shoot_requirements(resolver, sources.shoots, seed, sources.registrations).await?,
    );

    debug!(
        seed = %seed_name,
        required = ?required.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "computed required extensions"
    );
    Ok(required)
}
