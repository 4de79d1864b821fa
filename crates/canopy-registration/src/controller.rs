//! Seed reconciliation entry point
//!
//! One reconcile computes the required extensions of a seed, resolves them
//! to registrations, filters by seed eligibility and converges the seed's
//! ControllerInstallations. The kube-rs `Controller` guarantees that a seed
//! is never reconciled twice at the same time.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use tracing::{error, info, instrument};

use canopy_common::crd::Seed;
use canopy_common::events::{EventPublisher, KubeEventPublisher, NoopEventPublisher, SeedEvent};
use canopy_common::Error;

use crate::client::{KubeRegistrationClient, RegistrationClient};
use crate::config::RegistrationConfig;
use crate::eligibility::filter_by_seed_selector;
use crate::installation::{
    delete_unneeded_installations, deploy_wanted_installations, registration_installations,
};
use crate::requirements::{required_extensions, RequirementSources};
use crate::resolver::{registration_map, wanted_registration_names};
use crate::shoot::{ShootRequirements, SpecShootRequirements};
use crate::CONTROLLER_NAME;

/// Controller context shared by all reconciles
pub struct Context {
    /// Object store access (trait object for testability)
    pub client: Arc<dyn RegistrationClient>,
    /// Per-shoot requirement computation
    pub shoots: Arc<dyn ShootRequirements>,
    /// Event publisher for surfacing fatal errors on the seed
    pub events: Arc<dyn EventPublisher>,
    /// Controller configuration
    pub config: Arc<RegistrationConfig>,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client, config: RegistrationConfig) -> ContextBuilder {
        ContextBuilder::new(client, config)
    }

    /// Create a context for tests, without a Kubernetes connection
    pub fn for_testing(
        client: Arc<dyn RegistrationClient>,
        shoots: Arc<dyn ShootRequirements>,
        config: RegistrationConfig,
    ) -> Self {
        Self {
            client,
            shoots,
            events: Arc::new(NoopEventPublisher),
            config: Arc::new(config),
        }
    }
}

/// Builder for constructing [`Context`] instances
///
/// Every collaborator not set explicitly defaults to its production
/// implementation.
pub struct ContextBuilder {
    client: Client,
    config: RegistrationConfig,
    registration_client: Option<Arc<dyn RegistrationClient>>,
    shoots: Option<Arc<dyn ShootRequirements>>,
    events: Option<Arc<dyn EventPublisher>>,
}

impl ContextBuilder {
    fn new(client: Client, config: RegistrationConfig) -> Self {
        Self {
            client,
            config,
            registration_client: None,
            shoots: None,
            events: None,
        }
    }

    /// Override the object store client
    pub fn registration_client(mut self, client: Arc<dyn RegistrationClient>) -> Self {
        self.registration_client = Some(client);
        self
    }

    /// Override the per-shoot requirement computation
    pub fn shoot_requirements(mut self, shoots: Arc<dyn ShootRequirements>) -> Self {
        self.shoots = Some(shoots);
        self
    }

    /// Override the event publisher
    pub fn event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        let config = self.config;
        Context {
            client: self
                .registration_client
                .unwrap_or_else(|| Arc::new(KubeRegistrationClient::new(self.client.clone()))),
            shoots: self
                .shoots
                .unwrap_or_else(|| Arc::new(SpecShootRequirements::from_config(&config))),
            events: self.events.unwrap_or_else(|| {
                Arc::new(KubeEventPublisher::new(self.client.clone(), CONTROLLER_NAME))
            }),
            config: Arc::new(config),
        }
    }
}

/// Reconcile a seed handed over by the kube-rs `Controller`
///
/// Fatal errors are published as a Warning event on the seed before they are
/// returned to the controller for requeueing.
#[instrument(skip(seed, ctx), fields(seed = %seed.name_any()))]
pub async fn reconcile(seed: Arc<Seed>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = seed.name_any();

    match reconcile_seed(&name, &ctx).await {
        Ok(action) => Ok(action),
        Err(e) => {
            ctx.events
                .publish(SeedEvent::reconcile_failed(seed.object_ref(&()), &e))
                .await;
            Err(e)
        }
    }
}

/// Reconcile the ControllerInstallations of the named seed
///
/// Reads a fresh copy of every input, so the result never depends on what
/// triggered the reconcile.
pub async fn reconcile_seed(name: &str, ctx: &Context) -> Result<Action, Error> {
    let client = ctx.client.as_ref();

    let Some(seed) = client.get_seed(name).await? else {
        info!(seed = %name, "seed is gone, stop reconciling");
        return Ok(Action::await_change());
    };
    info!(seed = %name, "reconciling ControllerInstallations");

    let registration_list = Arc::new(client.list_registrations().await?);
    let installations = client.list_installations().await?;
    let buckets = client.list_backup_buckets().await?;
    let entries = client.list_backup_entries(name).await?;
    let shoots = client.list_shoots(name).await?;

    let seed = Arc::new(seed);
    let required = required_extensions(
        Arc::clone(&ctx.shoots),
        RequirementSources {
            buckets: &buckets,
            entries: &entries,
            shoots: &shoots,
            registrations: Arc::clone(&registration_list),
        },
        Arc::clone(&seed),
        ctx.config.use_dns_records,
    )
    .await?;

    let registrations = registration_map(registration_list.iter().cloned());
    let candidates = wanted_registration_names(
        &required,
        &installations,
        &registrations,
        shoots.len(),
        &seed,
    )?;
    let wanted = filter_by_seed_selector(&candidates, &registrations, name, seed.labels())?;
    let existing = registration_installations(&installations, &registrations, name)?;

    deploy_wanted_installations(client, &seed, &wanted, &registrations, &existing).await?;
    delete_unneeded_installations(client, &wanted, &existing).await?;

    info!(
        seed = %name,
        installations = wanted.len(),
        "ControllerInstallations converged"
    );
    Ok(Action::await_change())
}

/// Requeue a failed seed after the configured backoff
pub fn error_policy(seed: Arc<Seed>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        seed = %seed.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );
    Action::requeue(ctx.config.error_requeue())
}
