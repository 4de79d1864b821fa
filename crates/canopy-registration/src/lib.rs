//! Extension controller registration for Canopy seeds
//!
//! For every seed this crate computes which `(Kind, Type)` extensions are
//! required, resolves them to ControllerRegistrations, filters them by seed
//! eligibility and converges the seed's ControllerInstallations to match.
//!
//! Data flows one way:
//!
//! ```text
//! live objects -> requirements -> resolver -> eligibility -> installation -> store
//! ```

pub mod client;
pub mod config;
pub mod controller;
pub mod eligibility;
pub mod installation;
pub mod requirements;
pub mod resolver;
pub mod shoot;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{KubeRegistrationClient, RegistrationClient};
pub use config::{Domain, RegistrationConfig};
pub use controller::{error_policy, reconcile, reconcile_seed, Context, ContextBuilder};
pub use shoot::{ShootRequirements, SpecShootRequirements};

/// Field manager and event reporter name of the registration controller
pub const CONTROLLER_NAME: &str = "canopy-registration";
