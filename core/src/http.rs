//! HTTP wire types described as plain data.
//!
//! # Design
//! The dispatcher builds `HttpRequest` values and classifies `HttpResponse`
//! values without touching the network. Only a [`Transport`](crate::Transport)
//! executes I/O, which keeps request shaping and response classification
//! deterministic and easy to test against scripted responses.

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An HTTP request described as plain data.
///
/// `url` already carries the encoded query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
///
/// Produced once per exchange by a transport and consumed by classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The poll URL of an accepted operation, if the server sent a usable one.
    pub fn operation_location(&self) -> Option<&str> {
        self.header(OPERATION_LOCATION)
            .map(str::trim)
            .filter(|location| !location.is_empty())
    }
}

/// Response header carrying the status URL of an accepted operation.
pub const OPERATION_LOCATION: &str = "Operation-Location";

/// Request header carrying the API key.
pub const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

pub const CONTENT_TYPE: &str = "Content-Type";

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
