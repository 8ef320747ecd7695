//! Synchronous execution adapter.
//!
//! Honors a blocking call contract on top of the event-driven transport: the
//! exchange is delegated to an isolated worker thread that owns its own
//! tokio runtime and drives a fresh asynchronous client over the same
//! injected transport — so redirects, header preparation, and error handling
//! all go through the one state machine. The worker reports exactly once
//! over a one-shot channel and the caller performs a blocking receive; a
//! panicked worker drops the sender, which the caller surfaces as a
//! [`ClientError::Worker`] instead of a crash. Blocking is confined to this
//! path only; the default asynchronous path never waits.

use crate::client::{Client, Settings};
use crate::errors::ClientError;
use crate::events::EventKind;
use crate::headers::HeaderTable;
use crate::transport::Transport;
use anyhow::Context;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Finished response snapshot handed back from the worker.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Run one exchange to completion on an isolated worker, blocking the caller
/// until the outcome is in.
pub(crate) fn execute(
    transport: Arc<dyn Transport>,
    settings: &Settings,
    headers: HeaderTable,
    body: Option<String>,
    with_credentials: bool,
) -> Result<SyncOutcome, ClientError> {
    let settings = settings.clone();
    let (tx, rx) = std::sync::mpsc::channel();

    std::thread::Builder::new()
        .name("fetchline-sync".to_string())
        .spawn(move || {
            let result = run_worker(transport, settings, headers, body, with_credentials);
            let _ = tx.send(result);
        })
        .map_err(|e| ClientError::Worker(format!("cannot spawn worker thread: {e}")))?;

    match rx.recv() {
        Ok(result) => result,
        Err(_) => Err(ClientError::Worker(
            "worker terminated without reporting a result".to_string(),
        )),
    }
}

fn run_worker(
    transport: Arc<dyn Transport>,
    settings: Settings,
    headers: HeaderTable,
    body: Option<String>,
    with_credentials: bool,
) -> Result<SyncOutcome, ClientError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot build worker runtime")
        .map_err(|e| ClientError::Worker(format!("{e:#}")))?;

    runtime.block_on(async move {
        let client = Client::with_transport(transport);
        client.open_with(
            &settings.method,
            &settings.url,
            true,
            settings.user.as_deref(),
            settings.password.as_deref(),
        )?;
        client.replace_request_headers(headers);
        client.set_with_credentials(with_credentials);

        // One completion signal, whichever terminal event lands first.
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let done_tx = Arc::new(Mutex::new(Some(done_tx)));
        for kind in [EventKind::LoadEnd, EventKind::Error, EventKind::Abort] {
            let done_tx = done_tx.clone();
            client.add_event_listener(kind, move |_| {
                if let Some(tx) = done_tx.lock().unwrap().take() {
                    let _ = tx.send(());
                }
            });
        }

        client.send(body.as_deref())?;
        done_rx
            .await
            .map_err(|_| ClientError::Worker("completion signal dropped".to_string()))?;

        if client.error_flag() {
            return Err(ClientError::Transport(client.status_text()));
        }
        Ok(SyncOutcome {
            status: client.status(),
            status_text: client.status_text(),
            headers: client.response_headers_snapshot(),
            body: client.response_text(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RequestState;
    use crate::events::Event;
    use crate::transport::mock::MockTransport;
    use crate::transport::{AbortHandle, RequestOptions, TransportSink};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Drive the mock transport from a second thread once the worker has
    /// issued its call.
    fn drive<F>(transport: Arc<MockTransport>, f: F) -> std::thread::JoinHandle<()>
    where
        F: FnOnce(Arc<MockTransport>) + Send + 'static,
    {
        std::thread::spawn(move || {
            while transport.issued() == 0 {
                std::thread::sleep(Duration::from_millis(2));
            }
            f(transport);
        })
    }

    #[test]
    fn blocking_send_returns_only_after_done() {
        let transport = MockTransport::new();
        let client = Client::with_transport(transport.clone());
        client
            .open_with("GET", "http://localhost/x", false, None, None)
            .unwrap();

        let driver = drive(transport.clone(), |t| {
            t.deliver_headers(0, 200, &[("X-A", "1")]);
            t.deliver_data(0, "sync ");
            t.deliver_data(0, "body");
            t.deliver_end(0);
        });

        client.send(None).unwrap();
        driver.join().unwrap();

        assert_eq!(client.ready_state(), RequestState::Done);
        assert_eq!(client.status(), 200);
        assert_eq!(client.response_text(), "sync body");
        assert_eq!(client.get_response_header("x-a").as_deref(), Some("1"));
    }

    #[test]
    fn blocking_send_follows_redirects_before_returning() {
        let transport = MockTransport::new();
        let client = Client::with_transport(transport.clone());
        client
            .open_with("GET", "http://localhost/start", false, None, None)
            .unwrap();

        let driver = drive(transport.clone(), |t| {
            t.deliver_headers(0, 302, &[("Location", "/final")]);
            while t.issued() < 2 {
                std::thread::sleep(Duration::from_millis(2));
            }
            t.deliver_headers(1, 200, &[]);
            t.deliver_data(1, "landed");
            t.deliver_end(1);
        });

        client.send(None).unwrap();
        driver.join().unwrap();

        assert_eq!(client.status(), 200);
        assert_eq!(client.response_text(), "landed");
        assert_eq!(transport.options(1).path, "/final");
    }

    #[test]
    fn worker_transport_error_surfaces_as_error_event() {
        let transport = MockTransport::new();
        let client = Client::with_transport(transport.clone());

        let errored = Arc::new(AtomicBool::new(false));
        let e = errored.clone();
        client.add_event_listener(EventKind::Error, move |_| {
            e.store(true, Ordering::SeqCst);
        });

        client
            .open_with("GET", "http://localhost/x", false, None, None)
            .unwrap();

        let driver = drive(transport.clone(), |t| {
            t.deliver_error(0, "connection refused");
        });

        client.send(None).unwrap();
        driver.join().unwrap();

        assert!(errored.load(Ordering::SeqCst));
        assert_eq!(client.ready_state(), RequestState::Done);
        assert_eq!(client.status(), 0);
        assert!(client.response_text().contains("connection refused"));
    }

    #[test]
    fn request_headers_survive_the_worker_handoff() {
        let transport = MockTransport::new();
        let client = Client::with_transport(transport.clone());
        client
            .open_with("POST", "http://localhost/submit", false, None, None)
            .unwrap();
        client.set_request_header("X-Custom", "kept").unwrap();

        let driver = drive(transport.clone(), |t| {
            t.deliver_headers(0, 200, &[]);
            t.deliver_end(0);
        });

        client.send(Some("payload")).unwrap();
        driver.join().unwrap();

        let options = transport.options(0);
        assert!(options
            .headers
            .iter()
            .any(|(n, v)| n == "X-Custom" && v == "kept"));
        assert!(options
            .headers
            .iter()
            .any(|(n, v)| n == "Content-Length" && v == "7"));
        assert_eq!(options.body.as_deref(), Some("payload".as_bytes()));
    }

    /// A transport that dies inside the worker must come back as an error
    /// result, never as a caller panic.
    struct PanickingTransport;

    impl crate::transport::Transport for PanickingTransport {
        fn issue(
            &self,
            _options: RequestOptions,
            _sink: Arc<dyn TransportSink>,
        ) -> Box<dyn AbortHandle> {
            panic!("transport blew up");
        }
    }

    #[test]
    fn worker_panic_is_surfaced_not_propagated() {
        let client = Client::with_transport(Arc::new(PanickingTransport));

        let errored = Arc::new(AtomicBool::new(false));
        let e = errored.clone();
        client.add_event_listener(EventKind::Error, move |_: Event| {
            e.store(true, Ordering::SeqCst);
        });

        client
            .open_with("GET", "http://localhost/x", false, None, None)
            .unwrap();
        client.send(None).unwrap();

        assert!(errored.load(Ordering::SeqCst));
        assert_eq!(client.status(), 0);
        assert!(client.response_text().contains("worker"));
    }
}
