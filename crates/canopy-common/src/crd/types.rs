//! Supporting types shared by the Canopy CRDs

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Status of a condition
///
/// Extensions may report statuses Canopy does not know (e.g. `Progressing`);
/// those read as `Unknown`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition holds
    True,
    /// Condition does not hold
    False,
    /// Not reported, or a status Canopy does not understand
    #[default]
    #[serde(other)]
    Unknown,
}

/// A condition written by an extension controller
///
/// Canopy only reads conditions, so every field but the type tolerates being
/// absent.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, e.g. `Required` or `Healthy`
    #[serde(rename = "type")]
    pub type_: String,

    /// Whether the condition holds
    #[serde(default)]
    pub status: ConditionStatus,

    /// Machine-readable reason
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// When the status last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,

    /// When the condition was last reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// A condition that changed just now
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Some(now),
            last_update_time: Some(now),
        }
    }
}

/// The condition of the given type, if reported
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Provider selection shared by seeds and backup buckets
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Provider type, e.g. `aws`
    #[serde(rename = "type")]
    pub type_: String,

    /// Provider region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl ProviderSpec {
    /// Create a provider spec with only a type
    pub fn new(type_: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            region: None,
        }
    }
}
