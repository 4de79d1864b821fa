//! Error types for Canopy controllers
//!
//! Errors are structured with fields so that a failed reconcile can be
//! diagnosed from the log line alone. Variants that concern a single seed
//! carry the seed name; variants that concern a registration carry its name.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Canopy operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Object does not exist in the store
    #[error("{kind} {name:?} not found")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Name of the missing object
        name: String,
    },

    /// A required extension has no ControllerRegistration that can serve it
    #[error(
        "need to install an extension controller for {extension:?} on seed {seed:?} but no appropriate ControllerRegistration found"
    )]
    MissingExtensionController {
        /// Seed being reconciled
        seed: String,
        /// The `Kind/Type` identity nobody declares
        extension: String,
    },

    /// A registration's seed selector cannot be evaluated
    #[error("invalid seed selector on ControllerRegistration {registration:?}: {message}")]
    InvalidSeedSelector {
        /// Name of the offending registration
        registration: String,
        /// What is wrong with the selector
        message: String,
    },

    /// A registration name was referenced but no such registration exists
    #[error("ControllerRegistration {registration:?} referenced for seed {seed:?} does not exist")]
    UnknownRegistration {
        /// Seed being reconciled
        seed: String,
        /// The dangling registration name
        registration: String,
    },

    /// More than one installation binds the same registration to the same seed
    #[error(
        "seed {seed:?} has multiple ControllerInstallations for registration {registration:?}: {installations:?}"
    )]
    DuplicateInstallation {
        /// Seed being reconciled
        seed: String,
        /// Registration bound more than once
        registration: String,
        /// Names of the conflicting installations
        installations: Vec<String>,
    },

    /// The old installation is still being deleted
    #[error(
        "cannot deploy new ControllerInstallation for {registration:?} on seed {seed:?} because the deletion of {installation:?} is still pending"
    )]
    InstallationDeletionPending {
        /// Seed being reconciled
        seed: String,
        /// Registration that is wanted
        registration: String,
        /// Installation that is terminating
        installation: String,
    },

    /// The ControllerDeployment referenced by a registration cannot be read
    #[error(
        "cannot deploy ControllerInstallation for {registration:?} because ControllerDeployment {deployment:?} cannot be retrieved: {source}"
    )]
    DeploymentUnavailable {
        /// Registration being deployed
        registration: String,
        /// Referenced deployment
        deployment: String,
        /// Failure reading the deployment
        #[source]
        source: Box<Error>,
    },

    /// A shoot declares a DNS domain without a usable provider
    #[error("incomplete DNS configuration for shoot {shoot}: {message}")]
    IncompleteDnsConfig {
        /// `namespace/name` of the shoot
        shoot: String,
        /// What is missing
        message: String,
    },

    /// Computing a single shoot's required extensions failed
    #[error("cannot compute required extensions for shoot {shoot}: {message}")]
    ShootRequirements {
        /// `namespace/name` of the shoot
        shoot: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "requirements", "synchronizer")
        context: String,
    },
}

impl Error {
    /// Create a not-found error for the given kind and name
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a missing extension controller error
    pub fn missing_extension_controller(
        seed: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self::MissingExtensionController {
            seed: seed.into(),
            extension: extension.into(),
        }
    }

    /// Create an invalid seed selector error
    pub fn invalid_seed_selector(registration: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidSeedSelector {
            registration: registration.into(),
            message: msg.into(),
        }
    }

    /// Create an unknown registration error
    pub fn unknown_registration(seed: impl Into<String>, registration: impl Into<String>) -> Self {
        Self::UnknownRegistration {
            seed: seed.into(),
            registration: registration.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a per-shoot requirement error
    pub fn shoot_requirements(shoot: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ShootRequirements {
            shoot: shoot.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error with the given message
    ///
    /// For simple internal errors without specific context.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Returns true if the error means the object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            _ => false,
        }
    }

    /// Returns true if a write lost an optimistic concurrency race
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 409)
    }

    /// Check if this error is retryable
    ///
    /// Configuration errors are resolved by an operator changing objects, so
    /// retrying them only makes sense on the slow periodic path. Everything
    /// that depends on the live state of the store is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Conflicts resolve on re-read; other 4xx need a spec change
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code) && ae.code != 409
                )
            }
            Error::NotFound { .. } => true,
            Error::MissingExtensionController { .. } => false,
            Error::InvalidSeedSelector { .. } => false,
            Error::UnknownRegistration { .. } => true,
            Error::DuplicateInstallation { .. } => false,
            Error::InstallationDeletionPending { .. } => true,
            // A missing deployment has to be created by an operator
            Error::DeploymentUnavailable { source, .. } => {
                !source.is_not_found() && source.is_retryable()
            }
            Error::IncompleteDnsConfig { .. } => false,
            Error::ShootRequirements { .. } => true,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the seed name if this error is associated with a specific seed
    pub fn seed(&self) -> Option<&str> {
        match self {
            Error::MissingExtensionController { seed, .. } => Some(seed),
            Error::UnknownRegistration { seed, .. } => Some(seed),
            Error::DuplicateInstallation { seed, .. } => Some(seed),
            Error::InstallationDeletionPending { seed, .. } => Some(seed),
            _ => None,
        }
    }

    /// Get the registration name if this error is associated with one
    pub fn registration(&self) -> Option<&str> {
        match self {
            Error::InvalidSeedSelector { registration, .. } => Some(registration),
            Error::UnknownRegistration { registration, .. } => Some(registration),
            Error::DuplicateInstallation { registration, .. } => Some(registration),
            Error::InstallationDeletionPending { registration, .. } => Some(registration),
            Error::DeploymentUnavailable { registration, .. } => Some(registration),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::serialization(e.to_string())
    }
}
