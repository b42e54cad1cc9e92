//! The per-call media argument: a remote URL or inline bytes.
//!
//! Statically typed callers construct an [`Argument`] through `From`; callers
//! holding loosely typed JSON go through `TryFrom<serde_json::Value>`, which
//! is where unsupported inputs are rejected.

use serde::Serialize;

use crate::body::RequestBody;
use crate::error::ApiError;

/// Media handed to an operation. Exactly one variant per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// The service fetches the media itself.
    RemoteReference(String),
    /// The media is uploaded as the request body.
    InlineBytes(Vec<u8>),
}

#[derive(Serialize)]
struct UrlBody<'a> {
    url: &'a str,
}

impl Argument {
    /// Shape the request body: `{"url": ..}` JSON or raw bytes.
    pub fn into_body(self) -> Result<RequestBody, ApiError> {
        match self {
            Argument::RemoteReference(url) => RequestBody::json(&UrlBody { url: &url }),
            Argument::InlineBytes(data) => Ok(RequestBody::bytes(data)),
        }
    }
}

impl From<&str> for Argument {
    fn from(url: &str) -> Self {
        Argument::RemoteReference(url.to_string())
    }
}

impl From<String> for Argument {
    fn from(url: String) -> Self {
        Argument::RemoteReference(url)
    }
}

impl From<Vec<u8>> for Argument {
    fn from(data: Vec<u8>) -> Self {
        Argument::InlineBytes(data)
    }
}

impl From<&[u8]> for Argument {
    fn from(data: &[u8]) -> Self {
        Argument::InlineBytes(data.to_vec())
    }
}

impl TryFrom<serde_json::Value> for Argument {
    type Error = ApiError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        let type_name = match value {
            Value::String(url) => return Ok(Argument::RemoteReference(url)),
            Value::Array(items) => match bytes_from_array(&items) {
                Some(data) => return Ok(Argument::InlineBytes(data)),
                None => "array",
            },
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Object(_) => "object",
        };
        Err(ApiError::UnsupportedArgumentType {
            type_name: type_name.to_string(),
        })
    }
}

fn bytes_from_array(items: &[serde_json::Value]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}
