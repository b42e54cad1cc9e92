//! Request Dispatcher: shapes one request, sends it, classifies the answer.
//!
//! # Design
//! `build_request` and `classify` are pure; `send` glues them around a
//! single `Transport::execute`. Only three outcomes exist: a 200 body, a
//! 202 with its `Operation-Location`, or a normalized error.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::body::RequestBody;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, API_KEY_HEADER, CONTENT_TYPE};
use crate::normalize::normalize;
use crate::transport::Transport;

/// Where and how to send one call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub url: String,
    pub api_key: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
}

impl RequestTarget {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// The encoded URL including query parameters.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.url)
    }
}

/// A classified successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// HTTP 200: the body is the final payload.
    Completed(Vec<u8>),
    /// HTTP 202: the operation continues at this status URL.
    Accepted(String),
}

/// Build the wire request for a target, body and method.
pub fn build_request(
    target: &RequestTarget,
    body: RequestBody,
    method: HttpMethod,
) -> Result<HttpRequest, ApiError> {
    let (body, content_type) = body.into_wire()?;

    let mut headers = Vec::with_capacity(target.headers.len() + 2);
    if let Some(content_type) = content_type {
        headers.push((CONTENT_TYPE.to_string(), content_type));
    }
    headers.push((API_KEY_HEADER.to_string(), target.api_key.clone()));
    for (name, value) in &target.headers {
        match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(existing) => existing.1 = value.clone(),
            None => headers.push((name.clone(), value.clone())),
        }
    }

    Ok(HttpRequest {
        method,
        url: target.full_url(),
        headers,
        body,
    })
}

/// Classify a raw response into 200 / 202 / error.
pub fn classify(response: HttpResponse) -> Result<Dispatched, ApiError> {
    match response.status {
        200 => Ok(Dispatched::Completed(response.body)),
        202 => response
            .operation_location()
            .map(|location| Dispatched::Accepted(location.to_string()))
            .ok_or(ApiError::MissingOperationLocation),
        status => Err(normalize(&response.body, status)),
    }
}

/// Sends requests through a transport and classifies the responses.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    verbose: bool,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, verbose: bool) -> Self {
        Self { transport, verbose }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Send one request and classify its response.
    pub fn send(
        &self,
        target: &RequestTarget,
        body: RequestBody,
        method: HttpMethod,
    ) -> Result<Dispatched, ApiError> {
        let response = self.exchange(build_request(target, body, method)?)?;
        let dispatched = classify(response)?;
        if let Dispatched::Accepted(location) = &dispatched {
            wire_event!(self.verbose, %location, "operation accepted");
        }
        Ok(dispatched)
    }

    /// Execute a prepared request, logging both directions.
    pub fn exchange(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        wire_event!(
            self.verbose,
            method = request.method.as_str(),
            url = %request.url,
            bytes = request.body.as_ref().map_or(0, Vec::len),
            "request"
        );
        let response = self.transport.execute(request)?;
        wire_event!(
            self.verbose,
            status = response.status,
            bytes = response.body.len(),
            "response"
        );
        Ok(response)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}
