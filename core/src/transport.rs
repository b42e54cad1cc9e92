//! The I/O seam: executes `HttpRequest` values.
//!
//! # Design
//! Everything above this trait works on plain data. `UreqTransport` is the
//! blocking default; tests substitute scripted transports. Status codes are
//! never treated as transport failures here, classification belongs to the
//! dispatcher.

use std::io::{self, Read, Write};
use std::time::Duration;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Outcome of streaming a response body into a sink.
#[derive(Debug)]
pub enum Download {
    /// A 2xx body was copied into the sink; carries the byte count.
    Written(u64),
    /// A non-2xx response. Nothing was written to the sink.
    Rejected(HttpResponse),
}

/// Executes HTTP exchanges on behalf of the dispatcher.
pub trait Transport: Send + Sync {
    /// Perform one exchange and buffer the response body.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;

    /// Perform one exchange and stream a successful body into `sink`.
    fn download(&self, request: HttpRequest, sink: &mut dyn Write) -> Result<Download, ApiError>;
}

/// Default size limit for buffered response bodies.
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 10 * 1024 * 1024;

/// Blocking transport backed by a shared `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    max_response_bytes: u64,
}

impl UreqTransport {
    pub fn new(timeout: Option<Duration>, max_response_bytes: u64) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self {
            agent,
            max_response_bytes,
        }
    }

    fn call(&self, request: &HttpRequest) -> Result<ureq::http::Response<ureq::Body>, ApiError> {
        let agent = &self.agent;
        let url = request.url.as_str();
        let headers = request.headers.as_slice();

        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, None) => with_headers(agent.get(url), headers).call(),
            (HttpMethod::Get, Some(data)) => with_headers(agent.get(url), headers)
                .force_send_body()
                .send(data),
            (HttpMethod::Delete, None) => with_headers(agent.delete(url), headers).call(),
            (HttpMethod::Delete, Some(data)) => with_headers(agent.delete(url), headers)
                .force_send_body()
                .send(data),
            (HttpMethod::Post, Some(data)) => with_headers(agent.post(url), headers).send(data),
            (HttpMethod::Post, None) => with_headers(agent.post(url), headers).send_empty(),
            (HttpMethod::Put, Some(data)) => with_headers(agent.put(url), headers).send(data),
            (HttpMethod::Put, None) => with_headers(agent.put(url), headers).send_empty(),
            (HttpMethod::Patch, Some(data)) => with_headers(agent.patch(url), headers).send(data),
            (HttpMethod::Patch, None) => with_headers(agent.patch(url), headers).send_empty(),
        };
        result.map_err(|e| ApiError::Transport(e.to_string()))
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport")
            .field("max_response_bytes", &self.max_response_bytes)
            .finish_non_exhaustive()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None, DEFAULT_MAX_RESPONSE_BYTES)
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut response = self.call(&request)?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response
            .body_mut()
            .with_config()
            .limit(self.max_response_bytes)
            .read_to_vec()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn download(&self, request: HttpRequest, sink: &mut dyn Write) -> Result<Download, ApiError> {
        let mut response = self.call(&request)?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        if !(200..300).contains(&status) {
            let body = response
                .body_mut()
                .with_config()
                .limit(self.max_response_bytes)
                .read_to_vec()
                .map_err(|e| ApiError::Transport(e.to_string()))?;
            return Ok(Download::Rejected(HttpResponse {
                status,
                headers,
                body,
            }));
        }

        let mut reader = response.into_body().into_reader();
        let written = copy_to_sink(&mut reader, sink)?;
        sink.flush()?;
        Ok(Download::Written(written))
    }
}

/// Read failures are `Transport` errors; write failures stay `Io`.
fn copy_to_sink(reader: &mut impl Read, sink: &mut dyn Write) -> Result<u64, ApiError> {
    let mut buf = [0u8; 8 * 1024];
    let mut written = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(written),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ApiError::Transport(e.to_string())),
        };
        sink.write_all(&buf[..n])?;
        written += n as u64;
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn collect_headers(headers: &ureq::http::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Yields `data` once, then fails like a dropped connection.
    struct Truncated<'a> {
        data: &'a [u8],
    }

    impl Read for Truncated<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer reset"));
            }
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn copy_counts_every_byte() {
        let data = vec![7u8; 20_000];
        let mut sink = Vec::new();
        let written = copy_to_sink(&mut data.as_slice(), &mut sink).unwrap();
        assert_eq!(written, 20_000);
        assert_eq!(sink, data);
    }

    #[test]
    fn read_failure_is_a_transport_error() {
        let mut sink = Vec::new();
        let err = copy_to_sink(&mut Truncated { data: b"partial" }, &mut sink).unwrap_err();
        assert!(matches!(err, ApiError::Transport(ref m) if m.contains("peer reset")));
        assert_eq!(sink, b"partial");
    }

    #[test]
    fn write_failure_is_an_io_error() {
        let err = copy_to_sink(&mut &b"body"[..], &mut FullDisk).unwrap_err();
        assert!(matches!(err, ApiError::Io(_)));
    }
}
