//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::sync::{Arc, Mutex};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Deterministic test payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| u8::try_from((i * 31 + i / 7) % 251).unwrap_or(0))
        .collect()
}

/// Lowercase hex MD5 of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Parses `bytes=<start>-<end>` into an inclusive range.
pub fn parse_range(value: &str) -> Option<(usize, usize)> {
    let range = value.trim().strip_prefix("bytes=")?;
    let (start, end) = range.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}

/// Serves GET requests for one file, honouring `Range` headers with 206.
#[derive(Clone)]
pub struct RangeResponder {
    body: Arc<Vec<u8>>,
    ranges: Arc<Mutex<Vec<(usize, usize)>>>,
}

impl RangeResponder {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Arc::new(body),
            ranges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Ranges requested so far, in arrival order.
    pub fn ranges(&self) -> Vec<(usize, usize)> {
        self.ranges.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let requested = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_range);

        let Some((start, end)) = requested else {
            return ResponseTemplate::new(200).set_body_bytes(self.body.as_slice());
        };
        if end < start || end >= self.body.len() {
            return ResponseTemplate::new(416);
        }
        if let Ok(mut ranges) = self.ranges.lock() {
            ranges.push((start, end));
        }
        ResponseTemplate::new(206)
            .insert_header(
                "content-range",
                format!("bytes {start}-{end}/{}", self.body.len()).as_str(),
            )
            .set_body_bytes(&self.body[start..=end])
    }
}

/// HEAD response advertising `body` with the given `ETag`.
pub fn head_response(body: &[u8], etag: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("accept-ranges", "bytes")
        .insert_header("etag", format!("\"{etag}\"").as_str())
        .insert_header("content-type", "application/octet-stream")
        .set_body_bytes(body)
}

/// Mounts HEAD and ranged GET handlers for `file_path` and returns the GET responder.
pub async fn mount_file(server: &MockServer, file_path: &str, body: &[u8]) -> RangeResponder {
    let responder = RangeResponder::new(body.to_vec());
    Mock::given(method("HEAD"))
        .and(path(file_path))
        .respond_with(head_response(body, &md5_hex(body)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(responder.clone())
        .mount(server)
        .await;
    responder
}
