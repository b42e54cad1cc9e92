//! End-to-end tests against the live mock service.
//!
//! # Design
//! Starts the mock server on a random port, then drives `VisionClient` over
//! real HTTP through `UreqTransport`. Poll intervals are shortened so the
//! scripted operations finish in milliseconds.

use std::time::Duration;

use serde::Deserialize;
use vision_core::{
    ApiError, Argument, CancelHandle, ClientConfig, HttpMethod, PollObserver, PollOptions,
    RequestBody, RequestTarget, Submission, VisionClient,
};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

#[derive(Debug, Deserialize)]
struct Tracking {
    version: u32,
    framerate: u32,
    fragments: Vec<serde_json::Value>,
}

/// Start the mock server on a random port and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client(max_attempts: u32) -> VisionClient {
    let config = ClientConfig::default()
        .with_verbose(true)
        .with_timeout(Duration::from_secs(10))
        .with_poll(PollOptions::new(max_attempts, Duration::from_millis(5)));
    VisionClient::new(config)
}

fn target(base: &str, path: &str) -> RequestTarget {
    RequestTarget::new(format!("{base}{path}"), mock_server::API_KEY)
}

#[test]
fn synchronous_analyze_with_url_and_query() {
    let base = start_server();
    let client = client(10);

    let t = target(&base, "/vision/v1.0/analyze").with_query("visualFeatures", "Categories,Tags");
    let body = Argument::from("http://example.com/cat.jpg").into_body().unwrap();
    let result: serde_json::Value = client.call_json(&t, body, HttpMethod::Post).unwrap();

    assert_eq!(result["media"]["url"], "http://example.com/cat.jpg");
    assert_eq!(result["visualFeatures"], serde_json::json!(["Categories", "Tags"]));
}

#[test]
fn inline_bytes_are_sent_with_sniffed_content_type() {
    let base = start_server();
    let client = client(10);

    let t = target(&base, "/vision/v1.0/analyze");
    let result: serde_json::Value = client
        .call_json(&t, Argument::from(PNG).into_body().unwrap(), HttpMethod::Post)
        .unwrap();

    assert_eq!(result["media"]["source"], "bytes");
    assert_eq!(result["media"]["contentType"], "image/png");
    assert_eq!(result["media"]["bytes"], PNG.len());
}

#[test]
fn long_running_operation_reports_progress_once_per_change() {
    let base = start_server();
    let client = client(10);

    let mut progress = Vec::new();
    let tracking: Tracking = client
        .run_operation(
            &target(&base, "/video/v1.0/trackface"),
            "http://example.com/clip.mp4",
            PollObserver::new().on_progress(|status, p| progress.push((status.to_string(), p))),
        )
        .unwrap();

    assert_eq!(tracking.version, 1);
    assert_eq!(tracking.framerate, 30);
    assert_eq!(tracking.fragments.len(), 1);
    assert_eq!(
        progress,
        vec![("NotStarted".to_string(), 0.0), ("Running".to_string(), 0.5)]
    );
}

#[test]
fn resource_operation_then_download() {
    let base = start_server();
    let client = client(10);

    let url = client
        .run_resource_operation(
            &target(&base, "/video/v1.0/stabilize"),
            b"raw video bytes".to_vec(),
            PollObserver::new(),
        )
        .unwrap();
    assert!(url.starts_with(&base));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stabilized.mp4");
    let written = client
        .download_to_path(&url, mock_server::API_KEY, &path)
        .unwrap();

    assert_eq!(written, mock_server::RENDERED_VIDEO.len() as u64);
    assert_eq!(std::fs::read(&path).unwrap(), mock_server::RENDERED_VIDEO);
}

#[test]
fn failed_operation_surfaces_service_message() {
    let base = start_server();
    let client = client(10);

    let err = client
        .run_operation::<Tracking>(
            &target(&base, "/video/v1.0/broken"),
            "http://example.com/clip.mp4",
            PollObserver::new(),
        )
        .unwrap_err();

    match err {
        ApiError::OperationFailed(message) => assert!(message.contains("unsupported format")),
        other => panic!("expected OperationFailed, got {other:?}"),
    }
}

#[test]
fn accepted_without_location_fails_fast() {
    let base = start_server();
    let client = client(10);

    let err = client
        .run_operation::<Tracking>(
            &target(&base, "/video/v1.0/lost"),
            "http://example.com/clip.mp4",
            PollObserver::new(),
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::MissingOperationLocation));
}

#[test]
fn operation_times_out_when_attempts_run_out() {
    let base = start_server();
    let client = client(2);

    let err = client
        .run_operation::<Tracking>(
            &target(&base, "/video/v1.0/trackface"),
            "http://example.com/clip.mp4",
            PollObserver::new(),
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::OperationTimedOut { attempts: 2 }));
}

#[test]
fn cancelled_operation_stops_polling() {
    let base = start_server();
    let client = client(10);

    let cancel = CancelHandle::new();
    let trigger = cancel.clone();
    let err = client
        .run_operation::<Tracking>(
            &target(&base, "/video/v1.0/trackface"),
            "http://example.com/clip.mp4",
            PollObserver::new()
                .cancel_with(cancel)
                .on_progress(move |_, _| trigger.cancel()),
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::Cancelled));
}

#[test]
fn wrong_key_yields_structured_error() {
    let base = start_server();
    let client = client(10);

    let t = RequestTarget::new(format!("{base}/vision/v1.0/analyze"), "wrong-key");
    let err = client
        .call_json::<serde_json::Value>(&t, RequestBody::bytes(PNG), HttpMethod::Post)
        .unwrap_err();
    assert!(matches!(err, ApiError::StructuredApi { status_code: 401, .. }));
}

#[test]
fn bad_request_yields_coded_error() {
    let base = start_server();
    let client = client(10);

    let t = target(&base, "/vision/v1.0/analyze");
    let body = RequestBody::json(&serde_json::json!({ "link": "x" })).unwrap();
    let err = client
        .call_json::<serde_json::Value>(&t, body, HttpMethod::Post)
        .unwrap_err();
    assert!(matches!(err, ApiError::CodedApi { ref code, .. } if code == "InvalidImageUrl"));
}

#[test]
fn raw_endpoint_returns_bytes() {
    let base = start_server();
    let client = client(10);

    let bytes = client
        .call_raw(
            &target(&base, "/vision/v1.0/thumbnail").with_query("width", "64"),
            RequestBody::Empty,
            HttpMethod::Get,
        )
        .unwrap();
    assert_eq!(bytes, mock_server::THUMBNAIL);
}

#[test]
fn every_method_reaches_the_wire_with_query() {
    let base = start_server();
    let client = client(10);

    let t = target(&base, "/echo").with_query("name", "a b&c");
    for (method, expected) in [
        (HttpMethod::Get, "GET"),
        (HttpMethod::Post, "POST"),
        (HttpMethod::Put, "PUT"),
        (HttpMethod::Patch, "PATCH"),
        (HttpMethod::Delete, "DELETE"),
    ] {
        let body = RequestBody::json(&serde_json::json!({ "faceIds": ["f1"] })).unwrap();
        let echo: serde_json::Value = client.call_json(&t, body, method).unwrap();
        assert_eq!(echo["method"], expected, "{expected}");
        assert_eq!(echo["query"]["name"], "a b&c", "{expected}");
        assert_eq!(echo["contentType"], "application/json", "{expected}");
        assert_eq!(echo["json"]["faceIds"][0], "f1", "{expected}");
    }
}

#[test]
fn bodyless_requests_send_no_bytes() {
    let base = start_server();
    let client = client(10);

    for method in [HttpMethod::Get, HttpMethod::Delete, HttpMethod::Post] {
        let echo: serde_json::Value = client
            .call_json(&target(&base, "/echo"), RequestBody::Empty, method)
            .unwrap();
        assert_eq!(echo["bytes"], 0, "{}", method.as_str());
        assert!(echo["json"].is_null(), "{}", method.as_str());
    }
}

/// Serve one response that promises more body than it delivers, then hang up.
fn start_truncating_server() -> String {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\npartial")
            .unwrap();
    });
    format!("http://{addr}")
}

#[test]
fn dropped_connection_during_download_is_a_transport_error() {
    let base = start_truncating_server();
    let client = client(10);

    let mut sink = Vec::new();
    let err = client
        .download(&format!("{base}/content"), mock_server::API_KEY, &mut sink)
        .unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "got {err:?}");
}

#[test]
fn submission_can_be_polled_as_snapshots() {
    let base = start_server();
    let client = client(10);

    let handle = match client
        .submit(&target(&base, "/video/v1.0/trackface"), "http://example.com/clip.mp4")
        .unwrap()
    {
        Submission::Accepted(handle) => handle,
        Submission::Completed(_) => panic!("expected an accepted operation"),
    };

    let states: Vec<String> = client
        .poller()
        .snapshots(handle, client.config().poll.clone(), None)
        .map(|snapshot| snapshot.unwrap().status)
        .collect();
    assert_eq!(states, vec!["NotStarted", "Running", "Running", "Succeeded"]);
}

#[test]
fn polling_an_unknown_operation_is_fatal() {
    let base = start_server();
    let client = client(10);

    let handle = vision_core::PollHandle::new(
        format!("{base}/video/v1.0/operations/00000000-0000-0000-0000-000000000000"),
        mock_server::API_KEY,
    );
    let err = client
        .poller()
        .poll(handle, &client.config().poll, PollObserver::new())
        .unwrap_err();
    assert!(matches!(err, ApiError::CodedApi { ref code, .. } if code == "NotFound"));
}
