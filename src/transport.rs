//! The transport capability the client is built against.
//!
//! A transport takes a fully prepared [`RequestOptions`] and a
//! [`TransportSink`], performs the exchange, and reports progress through
//! the sink: one `on_headers`, zero or more `on_data` chunks, then exactly
//! one of `on_end` or `on_error`.
//!
//! Contract: `issue` must return without invoking the sink. Events are
//! delivered later (from a spawned task or an external driver), never
//! reentrantly from inside `issue`. The client relies on this to keep its
//! redirect re-issue atomic.

pub mod http;

use std::collections::BTreeMap;
use std::sync::Arc;

/// One prepared transport call: everything needed to put a request on the
/// wire. Built by the client at `send()` time, rebuilt per redirect hop.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: String,
    pub host: String,
    pub port: u16,
    /// Path plus query string.
    pub path: String,
    pub ssl: bool,
    /// Canonical-cased request headers.
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub with_credentials: bool,
}

impl RequestOptions {
    /// Reassemble the target URL for this call.
    pub fn url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        let default_port = if self.ssl { 443 } else { 80 };
        if self.port == default_port {
            format!("{scheme}://{}{}", self.host, self.path)
        } else {
            format!("{scheme}://{}:{}{}", self.host, self.port, self.path)
        }
    }
}

/// Status line and headers of one response, delivered before any body data.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: u16,
    pub status_text: String,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
}

/// Receives transport progress for one issued call.
pub trait TransportSink: Send + Sync {
    fn on_headers(&self, head: ResponseHead);
    fn on_data(&self, chunk: &[u8]);
    fn on_end(&self);
    fn on_error(&self, error: String);
}

/// Cancels an in-flight transport call. Dropping the handle does not cancel.
pub trait AbortHandle: Send {
    fn abort(&self);
}

/// Capability to issue HTTP exchanges. Injected into every client.
pub trait Transport: Send + Sync {
    fn issue(&self, options: RequestOptions, sink: Arc<dyn TransportSink>) -> Box<dyn AbortHandle>;
}
