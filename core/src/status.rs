//! The status resource of a long-running operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Lifecycle state derived from the raw `status` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Running,
    Succeeded,
    Failed,
}

impl OperationState {
    /// `"Succeeded"` and `"Failed"` are terminal; every other string is running.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "Succeeded" => OperationState::Succeeded,
            "Failed" => OperationState::Failed,
            _ => OperationState::Running,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, OperationState::Running)
    }
}

/// Where a finished operation put its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultPayload<'a> {
    /// JSON text embedded in `processingResult`.
    Embedded(&'a str),
    /// URL of a separately downloadable artifact.
    ResourceLocation(&'a str),
    Empty,
}

/// One snapshot of an operation's status resource.
///
/// A missing `status` reads as `""` (running) and a missing or `null`
/// `progress` reads as `0.0`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub progress: f32,
    #[serde(default, rename = "createdDateTime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "lastActionDateTime")]
    pub last_action_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_result: Option<String>,
    #[serde(default)]
    pub resource_location: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl OperationStatus {
    pub fn state(&self) -> OperationState {
        OperationState::from_raw(&self.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Empty strings count as absent.
    pub fn payload(&self) -> ResultPayload<'_> {
        if let Some(text) = non_empty(&self.processing_result) {
            return ResultPayload::Embedded(text);
        }
        if let Some(url) = non_empty(&self.resource_location) {
            return ResultPayload::ResourceLocation(url);
        }
        ResultPayload::Empty
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f32>::deserialize(deserializer).map(Option::unwrap_or_default)
}
