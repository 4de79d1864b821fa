//! Controller runner - builds the seed registration controller future
//!
//! The controller reconciles Seeds. Every other input of a reconcile is
//! watched as well and mapped back to the seed(s) it affects.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use canopy_common::crd::{
    BackupBucket, BackupEntry, ControllerDeployment, ControllerInstallation,
    ControllerRegistration, Seed, Shoot,
};
use canopy_registration::{error_policy, reconcile, Context, RegistrationConfig};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Boxed controller future
pub type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Build the seed registration controller
pub fn build_registration_controller(client: Client, config: RegistrationConfig) -> ControllerFuture {
    let ctx = Arc::new(Context::builder(client.clone(), config).build());
    let watcher = || WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS);

    let controller = Controller::new(Api::<Seed>::all(client.clone()), watcher());
    let seeds_for_registrations = controller.store();
    let seeds_for_deployments = controller.store();

    tracing::info!("- Seed registration controller");

    Box::pin(
        controller
            .watches(
                Api::<ControllerRegistration>::all(client.clone()),
                watcher(),
                move |_| all_seeds(&seeds_for_registrations),
            )
            .watches(
                Api::<ControllerDeployment>::all(client.clone()),
                watcher(),
                move |_| all_seeds(&seeds_for_deployments),
            )
            .watches(
                Api::<ControllerInstallation>::all(client.clone()),
                watcher(),
                seed_of_installation,
            )
            .watches(
                Api::<BackupBucket>::all(client.clone()),
                watcher(),
                seed_of_bucket,
            )
            .watches(
                Api::<BackupEntry>::all(client.clone()),
                watcher(),
                seed_of_entry,
            )
            .watches(Api::<Shoot>::all(client), watcher(), seeds_of_shoot)
            .shutdown_on_signal()
            .run(reconcile, error_policy, ctx)
            .for_each(log_reconcile_result("Seed")),
    )
}

/// Registrations and deployments can change the outcome on any seed
fn all_seeds(store: &Store<Seed>) -> Vec<ObjectRef<Seed>> {
    store
        .state()
        .iter()
        .map(|seed| ObjectRef::from_obj(seed.as_ref()))
        .collect()
}

fn seed_of_installation(installation: ControllerInstallation) -> Option<ObjectRef<Seed>> {
    let seed = installation.spec.seed_name();
    (!seed.is_empty()).then(|| ObjectRef::new(seed))
}

fn seed_of_bucket(bucket: BackupBucket) -> Option<ObjectRef<Seed>> {
    bucket.spec.seed_name.as_deref().map(ObjectRef::new)
}

fn seed_of_entry(entry: BackupEntry) -> Option<ObjectRef<Seed>> {
    entry.spec.seed_name.as_deref().map(ObjectRef::new)
}

/// A migrating shoot affects both its target and its current seed
fn seeds_of_shoot(shoot: Shoot) -> Vec<ObjectRef<Seed>> {
    let mut seeds: Vec<&str> = shoot
        .spec
        .seed_name
        .as_deref()
        .into_iter()
        .chain(shoot.status.as_ref().and_then(|s| s.seed_name.as_deref()))
        .collect();
    seeds.sort_unstable();
    seeds.dedup();
    seeds.into_iter().map(ObjectRef::new).collect()
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
