//! Object store access for the registration controller
//!
//! [`RegistrationClient`] is the only way the engine touches the API server,
//! so every decision can be tested against mocks or an in-memory store.

use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use canopy_common::crd::{
    BackupBucket, BackupEntry, ControllerDeployment, ControllerInstallation,
    ControllerRegistration, Seed, Shoot,
};
use canopy_common::Error;

use crate::CONTROLLER_NAME;

/// Trait abstracting the object store operations of the registration controller
///
/// Listing installations and backup entries must be strongly consistent:
/// acting on a stale view could create a second installation for the same
/// registration and seed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RegistrationClient: Send + Sync {
    /// Get a Seed by name, `None` when it no longer exists
    async fn get_seed(&self, name: &str) -> Result<Option<Seed>, Error>;

    /// List all ControllerRegistrations
    async fn list_registrations(&self) -> Result<Vec<ControllerRegistration>, Error>;

    /// List all ControllerInstallations
    async fn list_installations(&self) -> Result<Vec<ControllerInstallation>, Error>;

    /// List all BackupBuckets
    ///
    /// Every bucket is needed, not only the seed's own, because entries may
    /// reference buckets of another seed during a migration.
    async fn list_backup_buckets(&self) -> Result<Vec<BackupBucket>, Error>;

    /// List the BackupEntries assigned to a seed
    async fn list_backup_entries(&self, seed: &str) -> Result<Vec<BackupEntry>, Error>;

    /// List the Shoots whose spec or status assigns them to a seed
    async fn list_shoots(&self, seed: &str) -> Result<Vec<Shoot>, Error>;

    /// Get a ControllerDeployment by name
    async fn get_deployment(&self, name: &str) -> Result<ControllerDeployment, Error>;

    /// Get a ControllerInstallation by name, `None` when it no longer exists
    async fn get_installation(&self, name: &str) -> Result<Option<ControllerInstallation>, Error>;

    /// Create a ControllerInstallation, honouring `generateName`
    async fn create_installation(
        &self,
        installation: &ControllerInstallation,
    ) -> Result<ControllerInstallation, Error>;

    /// Replace a ControllerInstallation
    ///
    /// The object's resourceVersion is sent along, so the write fails with a
    /// conflict if somebody else changed it since it was read.
    async fn replace_installation(
        &self,
        installation: &ControllerInstallation,
    ) -> Result<ControllerInstallation, Error>;

    /// Delete a ControllerInstallation by name
    async fn delete_installation(&self, name: &str) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
///
/// Every call goes straight to the API server, which gives the strongly
/// consistent reads the engine needs.
pub struct KubeRegistrationClient {
    client: Client,
}

impl KubeRegistrationClient {
    /// Create a new KubeRegistrationClient wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RegistrationClient for KubeRegistrationClient {
    async fn get_seed(&self, name: &str) -> Result<Option<Seed>, Error> {
        let api: Api<Seed> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn list_registrations(&self) -> Result<Vec<ControllerRegistration>, Error> {
        let api: Api<ControllerRegistration> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_installations(&self) -> Result<Vec<ControllerInstallation>, Error> {
        let api: Api<ControllerInstallation> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_backup_buckets(&self) -> Result<Vec<BackupBucket>, Error> {
        let api: Api<BackupBucket> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_backup_entries(&self, seed: &str) -> Result<Vec<BackupEntry>, Error> {
        let api: Api<BackupEntry> = Api::all(self.client.clone());
        Ok(api
            .list(&ListParams::default())
            .await?
            .items
            .into_iter()
            .filter(|entry| entry.spec.is_assigned_to(seed))
            .collect())
    }

    async fn list_shoots(&self, seed: &str) -> Result<Vec<Shoot>, Error> {
        let api: Api<Shoot> = Api::all(self.client.clone());
        Ok(api
            .list(&ListParams::default())
            .await?
            .items
            .into_iter()
            .filter(|shoot| shoot.is_assigned_to(seed))
            .collect())
    }

    async fn get_deployment(&self, name: &str) -> Result<ControllerDeployment, Error> {
        let api: Api<ControllerDeployment> = Api::all(self.client.clone());
        api.get_opt(name)
            .await?
            .ok_or_else(|| Error::not_found("ControllerDeployment", name))
    }

    async fn get_installation(&self, name: &str) -> Result<Option<ControllerInstallation>, Error> {
        let api: Api<ControllerInstallation> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn create_installation(
        &self,
        installation: &ControllerInstallation,
    ) -> Result<ControllerInstallation, Error> {
        let api: Api<ControllerInstallation> = Api::all(self.client.clone());
        Ok(api.create(&Self::post_params(), installation).await?)
    }

    async fn replace_installation(
        &self,
        installation: &ControllerInstallation,
    ) -> Result<ControllerInstallation, Error> {
        let api: Api<ControllerInstallation> = Api::all(self.client.clone());
        let name = installation
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::internal_with_context("client", "installation has no name"))?;
        Ok(api.replace(name, &Self::post_params(), installation).await?)
    }

    async fn delete_installation(&self, name: &str) -> Result<(), Error> {
        let api: Api<ControllerInstallation> = Api::all(self.client.clone());
        api.delete(name, &DeleteParams::default()).await?;
        debug!(installation = %name, "delete requested");
        Ok(())
    }
}
