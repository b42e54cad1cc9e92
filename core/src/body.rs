//! Request bodies and content-type inference.

use serde::Serialize;

use crate::error::ApiError;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// The closed set of request bodies the dispatcher knows how to send.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized as `application/json`.
    Json(serde_json::Value),
    /// Raw bytes. Without an explicit content type the bytes are sniffed.
    Bytes {
        data: Vec<u8>,
        content_type: Option<String>,
    },
    Empty,
}

impl RequestBody {
    /// Serialize a typed request object into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| ApiError::Serialization(e.to_string()))
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        RequestBody::Bytes {
            data: data.into(),
            content_type: None,
        }
    }

    /// Encode into wire bytes plus the content type to announce, if any.
    pub(crate) fn into_wire(self) -> Result<(Option<Vec<u8>>, Option<String>), ApiError> {
        match self {
            RequestBody::Json(value) => {
                let data =
                    serde_json::to_vec(&value).map_err(|e| ApiError::Serialization(e.to_string()))?;
                Ok((Some(data), Some(JSON_CONTENT_TYPE.to_string())))
            }
            RequestBody::Bytes { data, content_type } => {
                let content_type = content_type.unwrap_or_else(|| sniff_content_type(&data));
                Ok((Some(data), Some(content_type)))
            }
            RequestBody::Empty => Ok((None, None)),
        }
    }
}

/// Guess a MIME type from magic numbers, falling back to octet-stream.
pub fn sniff_content_type(data: &[u8]) -> String {
    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}
