//! Result Resolver: pulls the final payload out of a finished operation.

use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::status::{OperationStatus, ResultPayload};

/// What a caller expects a finished operation to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// JSON embedded in `processingResult`.
    EmbeddedJson,
    /// A URL in `resourceLocation`, fetched later by the download helper.
    ResourceUrl,
}

/// A resolved operation result.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    Decoded(T),
    ResourceUrl(String),
}

pub fn resolve<T: DeserializeOwned>(
    status: &OperationStatus,
    shape: ResultShape,
) -> Result<Resolved<T>, ApiError> {
    match shape {
        ResultShape::EmbeddedJson => resolve_embedded(status).map(Resolved::Decoded),
        ResultShape::ResourceUrl => resolve_resource_location(status).map(Resolved::ResourceUrl),
    }
}

/// Decode `processingResult` into `T`. An absent or empty result is a failure.
pub fn resolve_embedded<T: DeserializeOwned>(status: &OperationStatus) -> Result<T, ApiError> {
    match status.payload() {
        ResultPayload::Embedded(text) => {
            serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
        }
        _ => Err(ApiError::OperationFailed("processingResult is empty".to_string())),
    }
}

/// The artifact URL in `resourceLocation`. An absent or empty URL is a failure.
pub fn resolve_resource_location(status: &OperationStatus) -> Result<String, ApiError> {
    match status.resource_location.as_deref() {
        Some(url) if !url.is_empty() => Ok(url.to_string()),
        _ => Err(ApiError::OperationFailed("resourceLocation is empty".to_string())),
    }
}

/// Decode the body of a synchronous 200 response.
pub fn decode_completed<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}
