//! Turns a non-success response body into an [`ApiError`].
//!
//! The services use two error shapes. The structured one is tried first and
//! only counts when it carries a positive `statusCode`; any other JSON object
//! is read as the coded shape, with missing fields left empty. Only a body
//! that is not a JSON object becomes `ApiError::Decode`.

use serde::Deserialize;

use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredBody {
    #[serde(default)]
    status_code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct CodedBody {
    #[serde(default)]
    error: CodedDetail,
}

#[derive(Default, Deserialize)]
struct CodedDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Normalize an error body. Never fails; malformed input yields `Decode`.
pub fn normalize(body: &[u8], status: u16) -> ApiError {
    if let Ok(structured) = serde_json::from_slice::<StructuredBody>(body) {
        if structured.status_code > 0 {
            return ApiError::StructuredApi {
                status_code: structured.status_code,
                message: structured.message,
            };
        }
    }

    match serde_json::from_slice::<CodedBody>(body) {
        Ok(coded) => ApiError::CodedApi {
            code: coded.error.code,
            message: coded.error.message,
        },
        Err(e) => ApiError::Decode(format!("unrecognized error body (HTTP {status}): {e}")),
    }
}
