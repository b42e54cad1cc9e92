//! Operation Poller: drives accepted operations to a terminal state.
//!
//! # Design
//! [`StatusPoll`] is the single-use, lazy sequence of status snapshots. It
//! sleeps before every fetch (the first included), stops after
//! `max_attempts` fetches, and ends exactly once: with a `Succeeded`
//! snapshot or with an error (`OperationFailed`, `OperationTimedOut`,
//! `Cancelled`, or whatever the fetch itself produced). [`Poller::poll`]
//! consumes that sequence and adds progress notification on top.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crate::body::RequestBody;
use crate::cancel::CancelHandle;
use crate::config::PollOptions;
use crate::dispatcher::{build_request, classify, Dispatched, Dispatcher, RequestTarget};
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::status::{OperationState, OperationStatus};

/// What is needed to keep polling one in-flight operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollHandle {
    pub status_url: String,
    pub api_key: String,
}

impl PollHandle {
    pub fn new(status_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            status_url: status_url.into(),
            api_key: api_key.into(),
        }
    }
}

type ProgressFn<'a> = Box<dyn FnMut(&str, f32) + 'a>;

/// Per-call hooks into a poll loop: progress callback and cancellation.
#[derive(Default)]
pub struct PollObserver<'a> {
    on_progress: Option<ProgressFn<'a>>,
    cancel: Option<CancelHandle>,
}

impl<'a> PollObserver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with `(status, progress)` whenever a running snapshot reports
    /// a progress value different from the last one delivered. Runs on the
    /// polling thread, so it should return quickly.
    pub fn on_progress(mut self, callback: impl FnMut(&str, f32) + 'a) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn cancel_with(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }
}

impl std::fmt::Debug for PollObserver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollObserver")
            .field("on_progress", &self.on_progress.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

/// Lazy sequence of status snapshots for one accepted operation.
#[derive(Debug)]
pub struct StatusPoll {
    dispatcher: Dispatcher,
    target: RequestTarget,
    options: PollOptions,
    cancel: Option<CancelHandle>,
    attempts: u32,
    finished: bool,
}

impl StatusPoll {
    /// Number of status fetches made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn step(&mut self) -> Result<OperationStatus, ApiError> {
        if self.attempts >= self.options.max_attempts {
            return Err(ApiError::OperationTimedOut {
                attempts: self.options.max_attempts,
            });
        }

        match &self.cancel {
            Some(cancel) => {
                if cancel.is_cancelled() || cancel.sleep(self.options.interval) {
                    return Err(ApiError::Cancelled);
                }
            }
            None => thread::sleep(self.options.interval),
        }

        self.attempts += 1;
        let status = self.fetch()?;
        match status.state() {
            OperationState::Failed => Err(ApiError::OperationFailed(status.message().to_string())),
            OperationState::Succeeded | OperationState::Running => Ok(status),
        }
    }

    fn fetch(&self) -> Result<OperationStatus, ApiError> {
        let request = build_request(&self.target, RequestBody::Empty, HttpMethod::Get)?;
        match classify(self.dispatcher.exchange(request)?)? {
            Dispatched::Completed(body) => {
                serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
            }
            Dispatched::Accepted(_) => Err(ApiError::UnexpectedStatus(202)),
        }
    }
}

impl Iterator for StatusPoll {
    type Item = Result<OperationStatus, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.step();
        self.finished = !matches!(&item, Ok(status) if !status.is_terminal());
        Some(item)
    }
}

impl std::iter::FusedIterator for StatusPoll {}

/// Runs poll loops through a dispatcher.
#[derive(Debug, Clone)]
pub struct Poller {
    dispatcher: Dispatcher,
}

impl Poller {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Start a lazy snapshot sequence for `handle`.
    pub fn snapshots(
        &self,
        handle: PollHandle,
        options: PollOptions,
        cancel: Option<CancelHandle>,
    ) -> StatusPoll {
        wire_event!(
            self.dispatcher.verbose(),
            status_url = %handle.status_url,
            "checking operation location"
        );
        StatusPoll {
            dispatcher: self.dispatcher.clone(),
            target: RequestTarget::new(handle.status_url, handle.api_key),
            options,
            cancel,
            attempts: 0,
            finished: false,
        }
    }

    /// Poll until the operation succeeds, fails, times out or is cancelled.
    ///
    /// Progress is delivered only when it changes; the first running tick is
    /// compared against a `-1.0` sentinel. A panicking callback is logged and
    /// does not stop the loop.
    pub fn poll(
        &self,
        handle: PollHandle,
        options: &PollOptions,
        observer: PollObserver<'_>,
    ) -> Result<OperationStatus, ApiError> {
        let PollObserver {
            mut on_progress,
            cancel,
        } = observer;
        let verbose = self.dispatcher.verbose();
        let mut last_progress = -1.0_f32;

        for snapshot in self.snapshots(handle, options.clone(), cancel) {
            let status = snapshot?;
            if status.state() == OperationState::Succeeded {
                return Ok(status);
            }

            wire_event!(verbose, status = %status.status, progress = status.progress, "operation running");
            if let Some(callback) = on_progress.as_mut() {
                if status.progress != last_progress {
                    last_progress = status.progress;
                    notify(callback, &status);
                }
            }
        }

        Err(ApiError::OperationTimedOut {
            attempts: options.max_attempts,
        })
    }
}

fn notify(callback: &mut ProgressFn<'_>, status: &OperationStatus) {
    let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
        callback(&status.status, status.progress);
    }));
    if delivered.is_err() {
        tracing::warn!(status = %status.status, "progress callback panicked; polling continues");
    }
}
