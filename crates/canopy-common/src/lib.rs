//! Common types for Canopy: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod extension;
pub mod hash;
pub mod selector;
pub mod telemetry;

pub use error::Error;
pub use extension::ExtensionId;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group for all Canopy custom resources
pub const API_GROUP: &str = "core.canopy.dev";

/// API version for all Canopy custom resources
pub const API_VERSION: &str = "v1beta1";

/// Label on a ControllerInstallation carrying the hash of the seed spec
pub const SEED_SPEC_HASH_LABEL: &str = "seed-spec-hash";

/// Label on a ControllerInstallation carrying the hash of the registration spec
pub const REGISTRATION_SPEC_HASH_LABEL: &str = "registration-spec-hash";

/// Label on a ControllerInstallation carrying the hash of the deployment config
pub const DEPLOYMENT_HASH_LABEL: &str = "deployment-hash";
