//! The chain-building facade over a [`TaskQueue`].
//!
//! Each call appends one action and returns the pipeline, so steps chain:
//! a timed pause, a network fetch, an arbitrary callback. Pauses and fetches
//! are suspending actions; they arrange their own resume signal (the timer
//! firing, the client's completion dispatch) so the next step runs once the
//! async work is done.

use crate::client::Client;
use crate::events::EventKind;
use crate::queue::{Action, TaskQueue};
use crate::transport::http::HttpTransport;
use crate::transport::Transport;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a [`Pipeline::fetch`] step hands to its callback.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: u16,
    /// Raw response body (a failure diagnostic when `error` is set).
    pub body: String,
    /// The body parsed as JSON, when it parses.
    pub json: Option<serde_json::Value>,
    /// Set when the fetch errored or was aborted instead of loading.
    pub error: Option<String>,
}

type FetchCallback = Box<dyn FnOnce(FetchOutcome) + Send>;

/// An ordered pipeline of deferred steps over one suspending queue.
#[derive(Clone)]
pub struct Pipeline {
    queue: TaskQueue,
    transport: Arc<dyn Transport>,
}

impl Pipeline {
    /// A pipeline fetching over the default reqwest-backed transport.
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new()?)))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            queue: TaskQueue::new(),
            transport,
        }
    }

    /// A fresh pipeline sharing this one's transport.
    pub fn fork(&self) -> Self {
        Self {
            queue: TaskQueue::new(),
            transport: self.transport.clone(),
        }
    }

    /// The underlying queue, for callers wiring their own suspending steps.
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Append a plain step.
    pub fn then<F>(&self, f: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.append(Action::new(f));
        self
    }

    /// Append a timed pause. The queue suspends until the timer fires.
    /// Requires an ambient tokio runtime.
    pub fn wait(&self, duration: Duration) -> &Self {
        let queue = self.queue.clone();
        self.queue.append(Action::suspending(move || {
            let queue = queue.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                queue.resume();
            });
        }));
        self
    }

    /// Append a GET fetch. The queue suspends until the request completes;
    /// `error` and `abort` also resume it so a failed fetch cannot stall the
    /// chain.
    pub fn fetch<F>(&self, url: &str, f: F) -> &Self
    where
        F: FnOnce(FetchOutcome) + Send + 'static,
    {
        let queue = self.queue.clone();
        let transport = self.transport.clone();
        let url = url.to_string();

        self.queue.append(Action::suspending(move || {
            let client = Client::with_transport(transport);
            let finish: Arc<Mutex<Option<FetchCallback>>> =
                Arc::new(Mutex::new(Some(Box::new(f))));

            let complete = {
                let queue = queue.clone();
                move |outcome: FetchOutcome| {
                    if let Some(callback) = finish.lock().unwrap().take() {
                        callback(outcome);
                        queue.resume();
                    }
                }
            };

            // Listeners go in after open(): open's implicit abort dispatches
            // an abort event that must not complete this step.
            let opened = client.open("GET", &url);

            {
                let client = client.clone();
                let complete = complete.clone();
                client.clone().add_event_listener(EventKind::Load, move |_| {
                    let body = client.response_text();
                    complete(FetchOutcome {
                        status: client.status(),
                        json: serde_json::from_str(&body).ok(),
                        body,
                        error: None,
                    });
                });
            }
            {
                let client = client.clone();
                let complete = complete.clone();
                client.clone().add_event_listener(EventKind::Error, move |_| {
                    complete(FetchOutcome {
                        status: client.status(),
                        body: client.response_text(),
                        json: None,
                        error: Some(client.status_text()),
                    });
                });
            }
            {
                let complete = complete.clone();
                client.add_event_listener(EventKind::Abort, move |_| {
                    complete(FetchOutcome {
                        status: 0,
                        body: String::new(),
                        json: None,
                        error: Some("aborted".to_string()),
                    });
                });
            }

            // Contract violations (bad scheme, etc.) must not stall the
            // queue either; they complete the step as an error outcome.
            let result = opened.and_then(|_| client.send(None));
            if let Err(e) = result {
                complete(FetchOutcome {
                    status: 0,
                    body: e.to_string(),
                    json: None,
                    error: Some(e.to_string()),
                });
            }
        }));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(log: &Arc<Mutex<Vec<String>>>, entry: &str) {
        log.lock().unwrap().push(entry.to_string());
    }

    #[test]
    fn then_steps_run_in_chain_order() {
        let transport = MockTransport::new();
        let pipeline = Pipeline::with_transport(transport);
        let order = log();

        let (a, b) = (order.clone(), order.clone());
        pipeline
            .then(move || push(&a, "a"))
            .then(move || push(&b, "b"));

        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn fetch_suspends_the_chain_until_load() {
        let transport = MockTransport::new();
        let pipeline = Pipeline::with_transport(transport.clone());
        let order = log();

        let fetched = order.clone();
        let after = order.clone();
        pipeline
            .fetch("http://localhost/data", move |outcome| {
                push(&fetched, &format!("fetch:{}:{}", outcome.status, outcome.body));
            })
            .then(move || push(&after, "after"));

        // The fetch issued but nothing has completed; the chain is parked
        assert_eq!(transport.issued(), 1);
        assert!(pipeline.queue().is_paused());
        assert!(order.lock().unwrap().is_empty());

        transport.deliver_headers(0, 200, &[]);
        transport.deliver_data(0, "payload");
        transport.deliver_end(0);

        assert_eq!(
            *order.lock().unwrap(),
            vec!["fetch:200:payload", "after"]
        );
        assert!(!pipeline.queue().is_paused());
    }

    #[test]
    fn fetch_parses_json_bodies() {
        let transport = MockTransport::new();
        let pipeline = Pipeline::with_transport(transport.clone());
        let seen = Arc::new(Mutex::new(None));

        let sink = seen.clone();
        pipeline.fetch("http://localhost/api", move |outcome| {
            *sink.lock().unwrap() = outcome.json;
        });

        transport.deliver_headers(0, 200, &[("Content-Type", "application/json")]);
        transport.deliver_data(0, r#"{"answer": 42}"#);
        transport.deliver_end(0);

        let value = seen.lock().unwrap().take().unwrap();
        assert_eq!(value["answer"], 42);
    }

    #[test]
    fn failed_fetch_resumes_the_chain_with_an_error_outcome() {
        let transport = MockTransport::new();
        let pipeline = Pipeline::with_transport(transport.clone());
        let order = log();

        let fetched = order.clone();
        let after = order.clone();
        pipeline
            .fetch("http://localhost/broken", move |outcome| {
                assert!(outcome.error.is_some());
                assert_eq!(outcome.status, 0);
                push(&fetched, "fetch-error");
            })
            .then(move || push(&after, "after"));

        transport.deliver_error(0, "connection refused");

        assert_eq!(*order.lock().unwrap(), vec!["fetch-error", "after"]);
    }

    #[test]
    fn unsupported_fetch_target_does_not_stall_the_chain() {
        let transport = MockTransport::new();
        let pipeline = Pipeline::with_transport(transport);
        let order = log();

        let fetched = order.clone();
        let after = order.clone();
        pipeline
            .fetch("gopher://nowhere/", move |outcome| {
                assert!(outcome.error.is_some());
                push(&fetched, "fetch-error");
            })
            .then(move || push(&after, "after"));

        assert_eq!(*order.lock().unwrap(), vec!["fetch-error", "after"]);
    }

    #[test]
    fn steps_appended_while_suspended_keep_their_order() {
        let transport = MockTransport::new();
        let pipeline = Pipeline::with_transport(transport.clone());
        let order = log();

        let fetched = order.clone();
        pipeline.fetch("http://localhost/x", move |_| push(&fetched, "fetch"));

        let b = order.clone();
        let c = order.clone();
        pipeline.then(move || push(&b, "b"));
        pipeline.then(move || push(&c, "c"));

        transport.deliver_headers(0, 200, &[]);
        transport.deliver_end(0);

        assert_eq!(*order.lock().unwrap(), vec!["fetch", "b", "c"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wait_suspends_until_the_timer_fires() {
        let transport = MockTransport::new();
        let pipeline = Pipeline::with_transport(transport);
        let order = log();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let a = order.clone();
        let b = order.clone();
        pipeline
            .then(move || push(&a, "before"))
            .wait(Duration::from_millis(20))
            .then(move || {
                push(&b, "after");
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(());
                }
            });

        // The pause step parked the chain
        assert_eq!(*order.lock().unwrap(), vec!["before"]);
        assert!(pipeline.queue().is_paused());

        rx.await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["before", "after"]);
    }

    #[test]
    fn fork_gets_an_independent_queue() {
        let transport = MockTransport::new();
        let pipeline = Pipeline::with_transport(transport.clone());
        let forked = pipeline.fork();
        let order = log();

        let fetched = order.clone();
        pipeline.fetch("http://localhost/x", move |_| push(&fetched, "fetch"));
        assert!(pipeline.queue().is_paused());

        // The fork is unaffected by the parked original
        let f = order.clone();
        forked.then(move || push(&f, "forked"));
        assert_eq!(*order.lock().unwrap(), vec!["forked"]);
    }
}
