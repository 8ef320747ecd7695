//! reqwest-backed transport.
//!
//! Redirect following is disabled here: the client owns redirect policy and
//! re-issues hops itself. The body is streamed to the sink chunk by chunk.
//! Requires an ambient tokio runtime; `issue` spawns the exchange task.

use crate::transport::{AbortHandle, RequestOptions, ResponseHead, Transport, TransportSink};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

struct TokenAbort {
    token: CancellationToken,
}

impl AbortHandle for TokenAbort {
    fn abort(&self) {
        self.token.cancel();
    }
}

impl Transport for HttpTransport {
    fn issue(&self, options: RequestOptions, sink: Arc<dyn TransportSink>) -> Box<dyn AbortHandle> {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let client = self.client.clone();
        let url = options.url();

        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {
                    log::debug!("transport call cancelled: {url}");
                }
                _ = run_exchange(client, options, sink) => {}
            }
        });

        Box::new(TokenAbort { token })
    }
}

async fn run_exchange(client: reqwest::Client, options: RequestOptions, sink: Arc<dyn TransportSink>) {
    let url = options.url();

    let method = match reqwest::Method::from_bytes(options.method.as_bytes()) {
        Ok(method) => method,
        Err(e) => {
            sink.on_error(format!("invalid method '{}': {e}", options.method));
            return;
        }
    };

    let mut request = client.request(method, &url);
    for (name, value) in &options.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    if let Some(body) = options.body.clone() {
        request = request.body(body);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            log::error!("request to {url} failed: {e}");
            sink.on_error(e.to_string());
            return;
        }
    };

    let status = response.status();
    let headers: BTreeMap<String, String> = response
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();

    sink.on_headers(ResponseHead {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
        headers,
    });

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => sink.on_data(&bytes),
            Err(e) => {
                sink.on_error(e.to_string());
                return;
            }
        }
    }

    sink.on_end();
}
