//! Local carrier stand-in for adapter tests.

use std::io::Read;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

use tiny_http::{Header, Response, Server, StatusCode};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

pub struct TestServer {
    pub base_url: String,
    seen: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    /// Serve the canned `(status, body)` responses in order, one per request.
    pub fn spawn(responses: Vec<(u16, String)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("server");
        let base_url = format!("http://{}", server.server_addr());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_thread = Arc::clone(&seen);

        let handle = thread::spawn(move || {
            for (status, body) in responses {
                let mut req = server.recv().expect("request");
                let mut request_body = String::new();
                let _ = req.as_reader().read_to_string(&mut request_body);
                seen_thread.lock().expect("lock").push(RecordedRequest {
                    method: req.method().to_string(),
                    url: req.url().to_string(),
                    headers: req
                        .headers()
                        .iter()
                        .map(|h| (h.field.to_string(), h.value.as_str().to_string()))
                        .collect(),
                    body: request_body,
                });

                let content_type: &[u8] = if body.trim_start().starts_with('<') {
                    b"application/xml"
                } else {
                    b"application/json"
                };
                let resp = Response::from_string(body)
                    .with_status_code(StatusCode(status))
                    .with_header(Header::from_bytes(&b"Content-Type"[..], content_type).expect("header"));
                req.respond(resp).expect("respond");
            }
        });

        Self {
            base_url,
            seen,
            handle: Some(handle),
        }
    }

    /// Wait for every canned response to be served and return what was received.
    pub fn finish(mut self) -> Vec<RecordedRequest> {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("server thread");
        }
        let seen = self.seen.lock().expect("lock");
        seen.clone()
    }
}

/// A base URL nothing is listening on.
pub fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{}", addr)
}
