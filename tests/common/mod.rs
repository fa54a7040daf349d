#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::{HeaderMap, Method};
use yacme_core::key::AccountKey;
use yacme_core::protocol::{Transport, TransportError};

mod http_example;

pub use self::http_example::parse_http_response_example;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn fixture(name: &str) -> http::Response<Vec<u8>> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    parse_http_response_example(&std::fs::read_to_string(path).expect("fixture exists"))
        .map(String::into_bytes)
}

pub fn key(name: &str) -> Arc<AccountKey> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("reference-keys")
        .join(format!("{name}.pem"));
    let pem = std::fs::read_to_string(path).expect("reference key exists");
    Arc::new(AccountKey::from_pkcs8_pem(&pem).expect("reference key parses"))
}

/// A response with the given status, headers and body.
pub fn response(
    status: u16,
    headers: &[(&str, &str)],
    body: impl Into<Vec<u8>>,
) -> http::Response<Vec<u8>> {
    let mut builder = http::Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(body.into()).unwrap()
}

/// What the mock transport saw.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).expect("request body is UTF-8")
    }
}

/// A transport which replays queued responses and records every request.
///
/// When the queue is empty, requests fail as if the connection was refused.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<http::Response<Vec<u8>>, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: http::Response<Vec<u8>>) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_fixture(&self, name: &str) {
        self.push(fixture(name));
    }

    pub fn push_failure(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_owned()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> Result<http::Response<Vec<u8>>, TransportError> {
        let (parts, body) = request.into_parts();
        self.requests.lock().unwrap().push(RecordedRequest {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        });

        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(TransportError::other(message)),
            None => Err(TransportError::other("connection refused")),
        }
    }
}
