//! Seed events
//!
//! A seed whose reconcile fails fatally gets a Warning event, so the reason
//! shows up in `kubectl describe seed`. Publishing is best effort: a failed
//! publish is logged and never fails the reconcile.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

use crate::Error;

/// Upper bound of an event note accepted by the API server
pub const MAX_NOTE_BYTES: usize = 1024;

/// Well-known event reason strings.
pub mod reasons {
    /// A required extension has no registration
    pub const MISSING_EXTENSION_CONTROLLER: &str = "MissingExtensionController";
    /// A registration's seed selector is malformed
    pub const INVALID_SEED_SELECTOR: &str = "InvalidSeedSelector";
    /// An old installation is still terminating
    pub const INSTALLATION_DELETION_PENDING: &str = "InstallationDeletionPending";
    /// Any other fatal reconcile failure
    pub const RECONCILE_FAILED: &str = "ExtensionReconcileFailed";
}

/// Action recorded on every seed event
pub const RECONCILE_ACTION: &str = "Reconcile";

/// An event about one seed
#[derive(Clone, Debug, PartialEq)]
pub struct SeedEvent {
    /// The seed the event is attached to
    pub seed: ObjectReference,
    /// Normal or Warning
    pub type_: EventType,
    /// Machine-readable reason, one of [`reasons`]
    pub reason: &'static str,
    /// Human-readable message, at most [`MAX_NOTE_BYTES`]
    pub note: String,
}

impl SeedEvent {
    /// Warning event describing a fatal reconcile error
    pub fn reconcile_failed(seed: ObjectReference, error: &Error) -> Self {
        let reason = match error {
            Error::MissingExtensionController { .. } => reasons::MISSING_EXTENSION_CONTROLLER,
            Error::InvalidSeedSelector { .. } => reasons::INVALID_SEED_SELECTOR,
            Error::InstallationDeletionPending { .. } => reasons::INSTALLATION_DELETION_PENDING,
            _ => reasons::RECONCILE_FAILED,
        };
        Self {
            seed,
            type_: EventType::Warning,
            reason,
            note: truncate_note(error.to_string()),
        }
    }
}

fn truncate_note(mut note: String) -> String {
    if note.len() > MAX_NOTE_BYTES {
        let mut end = MAX_NOTE_BYTES;
        while !note.is_char_boundary(end) {
            end -= 1;
        }
        note.truncate(end);
    }
    note
}

/// Sink for seed events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish the event; never fails
    async fn publish(&self, event: SeedEvent);
}

/// Publishes through `kube::runtime::events::Recorder`
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// The controller name becomes the event's reporting component
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, event: SeedEvent) {
        let SeedEvent {
            seed,
            type_,
            reason,
            note,
        } = event;
        let kube_event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(note),
            action: RECONCILE_ACTION.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&kube_event, &seed).await {
            warn!(
                seed = seed.name.as_deref().unwrap_or_default(),
                reason,
                error = %e,
                "failed to publish seed event"
            );
        }
    }
}

/// Drops every event
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, _event: SeedEvent) {}
}
