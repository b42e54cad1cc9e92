//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Download, Transport};

/// Replays canned responses in order and records every request.
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(responses: Vec<HttpResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ApiError::Transport("script exhausted".to_string()))
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.next(request)
    }

    fn download(&self, request: HttpRequest, sink: &mut dyn Write) -> Result<Download, ApiError> {
        let response = self.next(request)?;
        if !(200..300).contains(&response.status) {
            return Ok(Download::Rejected(response));
        }
        sink.write_all(&response.body)?;
        Ok(Download::Written(response.body.len() as u64))
    }
}
