//! `VisionClient`: one call from argument to typed result.
//!
//! # Design
//! The client owns nothing mutable. Each call shapes its body, dispatches
//! once, and for a 202 runs its own poll loop with a fresh `PollHandle`, so
//! concurrent calls through a shared client never interact.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::argument::Argument;
use crate::body::RequestBody;
use crate::config::ClientConfig;
use crate::dispatcher::{build_request, Dispatched, Dispatcher, RequestTarget};
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::normalize::normalize;
use crate::poller::{PollHandle, PollObserver, Poller};
use crate::resolver::{decode_completed, resolve_embedded, resolve_resource_location};
use crate::status::OperationStatus;
use crate::transport::{Download, Transport, UreqTransport};

/// The immediate outcome of submitting an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The service answered synchronously with this body.
    Completed(Vec<u8>),
    /// The service accepted the work; poll this handle for the outcome.
    Accepted(PollHandle),
}

#[derive(Debug, Clone)]
pub struct VisionClient {
    config: ClientConfig,
    dispatcher: Dispatcher,
    poller: Poller,
}

impl VisionClient {
    /// A client on the default blocking transport.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout, config.max_response_bytes);
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let dispatcher = Dispatcher::new(transport, config.verbose);
        let poller = Poller::new(dispatcher.clone());
        Self {
            config,
            dispatcher,
            poller,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Typed request/response call. A 202 is polled and its embedded result decoded.
    pub fn call_json<T: DeserializeOwned>(
        &self,
        target: &RequestTarget,
        body: RequestBody,
        method: HttpMethod,
    ) -> Result<T, ApiError> {
        match self.dispatcher.send(target, body, method)? {
            Dispatched::Completed(bytes) => decode_completed(&bytes),
            Dispatched::Accepted(location) => {
                let status = self.wait(location, &target.api_key, PollObserver::new())?;
                resolve_embedded(&status)
            }
        }
    }

    /// Call an endpoint that answers with raw bytes, such as a thumbnail.
    pub fn call_raw(
        &self,
        target: &RequestTarget,
        body: RequestBody,
        method: HttpMethod,
    ) -> Result<Vec<u8>, ApiError> {
        match self.dispatcher.send(target, body, method)? {
            Dispatched::Completed(bytes) => Ok(bytes),
            Dispatched::Accepted(_) => Err(ApiError::UnexpectedStatus(202)),
        }
    }

    /// Post a media argument without waiting for the outcome.
    pub fn submit(
        &self,
        target: &RequestTarget,
        argument: impl Into<Argument>,
    ) -> Result<Submission, ApiError> {
        let body = argument.into().into_body()?;
        Ok(match self.dispatcher.send(target, body, HttpMethod::Post)? {
            Dispatched::Completed(bytes) => Submission::Completed(bytes),
            Dispatched::Accepted(location) => {
                Submission::Accepted(PollHandle::new(location, target.api_key.clone()))
            }
        })
    }

    /// Run a long-running operation whose result is embedded JSON.
    pub fn run_operation<T: DeserializeOwned>(
        &self,
        target: &RequestTarget,
        argument: impl Into<Argument>,
        observer: PollObserver<'_>,
    ) -> Result<T, ApiError> {
        match self.submit(target, argument)? {
            Submission::Completed(bytes) => decode_completed(&bytes),
            Submission::Accepted(handle) => {
                let status = self.poller.poll(handle, &self.config.poll, observer)?;
                resolve_embedded(&status)
            }
        }
    }

    /// Run a long-running operation that renders an artifact; returns its URL.
    pub fn run_resource_operation(
        &self,
        target: &RequestTarget,
        argument: impl Into<Argument>,
        observer: PollObserver<'_>,
    ) -> Result<String, ApiError> {
        match self.submit(target, argument)? {
            Submission::Completed(_) => Err(ApiError::UnexpectedStatus(200)),
            Submission::Accepted(handle) => {
                let status = self.poller.poll(handle, &self.config.poll, observer)?;
                resolve_resource_location(&status)
            }
        }
    }

    fn wait(
        &self,
        location: String,
        api_key: &str,
        observer: PollObserver<'_>,
    ) -> Result<OperationStatus, ApiError> {
        self.poller
            .poll(PollHandle::new(location, api_key), &self.config.poll, observer)
    }

    /// Stream the resource at `url` into `sink`. Returns the bytes written.
    pub fn download(&self, url: &str, api_key: &str, sink: &mut dyn Write) -> Result<u64, ApiError> {
        let request = build_request(
            &RequestTarget::new(url, api_key),
            RequestBody::Empty,
            HttpMethod::Get,
        )?;
        wire_event!(self.config.verbose, %url, "download");
        match self.dispatcher.transport().download(request, sink)? {
            Download::Written(bytes) => {
                wire_event!(self.config.verbose, %url, bytes, "download finished");
                Ok(bytes)
            }
            Download::Rejected(response) => Err(normalize(&response.body, response.status)),
        }
    }

    /// Download into a newly created file at `path`.
    ///
    /// A failed download may leave a partial file behind.
    pub fn download_to_path(
        &self,
        url: &str,
        api_key: &str,
        path: impl AsRef<Path>,
    ) -> Result<u64, ApiError> {
        let mut out = BufWriter::new(File::create(path)?);
        let written = self.download(url, api_key, &mut out)?;
        out.flush()?;
        Ok(written)
    }
}

impl Default for VisionClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
