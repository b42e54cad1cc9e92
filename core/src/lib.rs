//! Client core for asynchronous machine-vision HTTP operations.
//!
//! # Overview
//! The remote services answer a request either synchronously (HTTP 200) or by
//! accepting it (HTTP 202) and handing back an `Operation-Location` to poll.
//! This crate shapes requests, classifies responses, normalizes both of the
//! services' error bodies, polls accepted operations to a terminal state and
//! resolves their results, either embedded JSON or a downloadable resource.
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest` / `HttpResponse`);
//!   shaping and classification are pure, only a `Transport` does I/O.
//! - `UreqTransport` is the blocking default. A poll loop blocks its calling
//!   thread; progress callbacks run on that thread.
//! - Diagnostics go through `tracing`; `ClientConfig::verbose` raises the
//!   wire events from `trace` to `info`.

/// Emit a wire-level event at `info` when verbose, `trace` otherwise.
macro_rules! wire_event {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    };
}

pub mod argument;
pub mod body;
pub mod cancel;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod normalize;
pub mod poller;
pub mod resolver;
pub mod status;
pub mod transport;

#[cfg(test)]
mod testing;

pub use argument::Argument;
pub use body::RequestBody;
pub use cancel::CancelHandle;
pub use client::{Submission, VisionClient};
pub use config::{ClientConfig, PollOptions};
pub use dispatcher::{Dispatched, Dispatcher, RequestTarget};
pub use error::{ApiError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use normalize::normalize;
pub use poller::{PollHandle, PollObserver, Poller, StatusPoll};
pub use resolver::{resolve, ResultShape, Resolved};
pub use status::{OperationState, OperationStatus, ResultPayload};
pub use transport::{Download, Transport, UreqTransport};
