//! `Transport` collaborator surface.
//!
//! Network transport, TLS, and HTTP framing are out of scope for the
//! page-lifecycle engine; this module defines the interface the scheduler
//! drives plus a `reqwest`-backed implementation and an in-memory mock used
//! throughout this crate's tests.

use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Classification the scheduler uses to decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Transient,
    Permanent,
}

#[derive(Debug, Error)]
#[error("transport error for {url}: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
    pub kind: TransportErrorKind,
}

impl TransportError {
    #[must_use]
    pub const fn retriable(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Transient)
    }
}

/// Totals reported when a transfer completes.
#[derive(Debug, Clone)]
pub struct TransferTotals {
    pub bytes: u64,
    pub mime: Option<String>,
}

/// Options accompanying an `open` call.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    pub timeout: Option<Duration>,
}

/// Events a transport stream emits back to its caller.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    FirstByte,
    Bytes(u64),
    Complete(TransferTotals),
    Failed(TransportError),
}

/// The network surface the scheduler's workers drive. A real
/// implementation speaks HTTP/1.1, HTTP/2, or HTTP/3 beneath this trait;
/// those framing details are out of scope here.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Open `url` and stream its body, invoking `on_event` for each
    /// lifecycle event. Returns once the transfer completes or fails.
    async fn fetch(&self, url: &str, opts: OpenOptions, on_event: &mut dyn FnMut(TransportEvent));

    /// Best-effort cancellation of an in-flight fetch for `url`.
    async fn cancel(&self, url: &str);
}

/// A `Transport` backed by `reqwest`, streaming response bytes as they
/// arrive.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, url: &str, opts: OpenOptions, on_event: &mut dyn FnMut(TransportEvent)) {
        use futures::StreamExt;

        let mut request = self.client.get(url);
        if let Some(timeout) = opts.timeout {
            request = request.timeout(timeout);
        }
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                on_event(TransportEvent::Failed(classify_reqwest_error(url, &err)));
                return;
            }
        };
        on_event(TransportEvent::FirstByte);
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let mut total_bytes = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    total_bytes += bytes.len() as u64;
                    on_event(TransportEvent::Bytes(bytes.len() as u64));
                }
                Err(err) => {
                    on_event(TransportEvent::Failed(classify_reqwest_error(url, &err)));
                    return;
                }
            }
        }
        on_event(TransportEvent::Complete(TransferTotals { bytes: total_bytes, mime }));
    }

    async fn cancel(&self, _url: &str) {
        // `reqwest` streams are canceled by dropping them; the scheduler
        // stops polling the worker task that owns the stream, which is
        // sufficient here since this transport holds no other per-fetch state.
    }
}

fn classify_reqwest_error(url: &str, err: &reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() || err.is_connect() {
        TransportErrorKind::Transient
    } else {
        TransportErrorKind::Permanent
    };
    TransportError {
        url: url.to_owned(),
        message: err.to_string(),
        kind,
    }
}

/// An in-memory `Transport` double for tests: each URL maps to a scripted
/// outcome, played back synchronously.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Success { bytes: Bytes, mime: Option<String> },
    Fail(TransportErrorKind),
}

#[derive(Debug, Default)]
pub struct MockTransport {
    scripts: HashMap<String, ScriptedOutcome>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&mut self, url: &str, outcome: ScriptedOutcome) {
        self.scripts.insert(url.to_owned(), outcome);
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, url: &str, _opts: OpenOptions, on_event: &mut dyn FnMut(TransportEvent)) {
        match self.scripts.get(url) {
            Some(ScriptedOutcome::Success { bytes, mime }) => {
                on_event(TransportEvent::FirstByte);
                on_event(TransportEvent::Bytes(bytes.len() as u64));
                on_event(TransportEvent::Complete(TransferTotals {
                    bytes: bytes.len() as u64,
                    mime: mime.clone(),
                }));
            }
            Some(ScriptedOutcome::Fail(kind)) => {
                on_event(TransportEvent::Failed(TransportError {
                    url: url.to_owned(),
                    message: "scripted failure".to_owned(),
                    kind: *kind,
                }));
            }
            None => {
                on_event(TransportEvent::Failed(TransportError {
                    url: url.to_owned(),
                    message: "no script registered".to_owned(),
                    kind: TransportErrorKind::Permanent,
                }));
            }
        }
    }

    async fn cancel(&self, _url: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_transport_replays_scripted_success() {
        let mut transport = MockTransport::new();
        transport.script(
            "http://ex/a",
            ScriptedOutcome::Success {
                bytes: Bytes::from_static(b"hello"),
                mime: Some("text/html".to_owned()),
            },
        );
        let mut events = Vec::new();
        transport
            .fetch("http://ex/a", OpenOptions::default(), &mut |event| events.push(format!("{event:?}")))
            .await;
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn mock_transport_reports_scripted_failure() {
        let mut transport = MockTransport::new();
        transport.script("http://ex/a", ScriptedOutcome::Fail(TransportErrorKind::Transient));
        let mut failed = false;
        transport
            .fetch("http://ex/a", OpenOptions::default(), &mut |event| {
                if matches!(event, TransportEvent::Failed(_)) {
                    failed = true;
                }
            })
            .await;
        assert!(failed);
    }
}
