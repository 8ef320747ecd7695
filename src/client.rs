//! The request lifecycle state machine.
//!
//! A [`Client`] is one logical HTTP request: one `open()`/`send()` pair plus
//! every redirect hop it silently follows. It owns the request headers, the
//! buffered response, and the listener registry, and it consumes transport
//! events to drive the `Unsent → Opened → HeadersReceived → Loading → Done`
//! sequence. Clients are cheap-clone handles over a shared inner; all
//! mutation happens on delivery of one call or one transport event, and
//! event dispatch always runs outside the state lock so handlers may
//! re-enter the client.

use crate::errors::ClientError;
use crate::events::{Event, EventKind, Handler, ListenerId, Listeners};
use crate::headers::{self, format_response_headers, HeaderTable};
use crate::sync::{self, SyncOutcome};
use crate::transport::http::HttpTransport;
use crate::transport::{AbortHandle, RequestOptions, ResponseHead, Transport, TransportSink};
use base64::Engine;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use url::Url;

/// Default `User-Agent` installed on every `open()`/`abort()` reset.
pub const DEFAULT_USER_AGENT: &str = concat!("fetchline/", env!("CARGO_PKG_VERSION"));

/// Redirect chains longer than this surface as a transport error.
const MAX_REDIRECT_HOPS: u32 = 20;

/// Progress of one request. Never decreases except through `abort()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RequestState {
    Unsent = 0,
    Opened = 1,
    HeadersReceived = 2,
    Loading = 3,
    Done = 4,
}

/// Snapshot of method/url/credentials taken at `open()` time. Replaced
/// wholesale on a redirect hop (method downgraded to GET on a 303).
#[derive(Debug, Clone)]
pub struct Settings {
    pub method: String,
    pub url: String,
    pub is_async: bool,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Where `send()` resolved the target to.
enum Target {
    Local(PathBuf),
    Network {
        ssl: bool,
        host: String,
        port: u16,
        path: String,
    },
}

struct ClientInner {
    state: RequestState,
    settings: Option<Settings>,
    send_flag: bool,
    error_flag: bool,
    status: u16,
    status_text: String,
    response_text: String,
    response_headers: BTreeMap<String, String>,
    request_headers: HeaderTable,
    listeners: Listeners,
    transport: Arc<dyn Transport>,
    in_flight: Option<Box<dyn AbortHandle>>,
    redirect_hops: u32,
    with_credentials: bool,
    /// Bumped by every `open()`/`abort()`; transport events carrying a stale
    /// generation are discarded.
    generation: u64,
    /// Bumped per issued transport call. A redirect hop or a failure
    /// supersedes the previous call; its remaining stream events (the
    /// redirect response's own body and end) must never reach the state
    /// machine.
    call_seq: u64,
}

impl ClientInner {
    fn is_async(&self) -> bool {
        self.settings.as_ref().map(|s| s.is_async).unwrap_or(true)
    }

    /// Apply a state transition and queue the dispatches it implies.
    fn set_state(&mut self, state: RequestState, pending: &mut Vec<Event>) {
        if state == RequestState::Loading || self.state != state {
            self.state = state;

            if self.is_async() || state < RequestState::Opened || state == RequestState::Done {
                pending.push(Event::new(EventKind::ReadyStateChange));
            }
            if state == RequestState::Done && !self.error_flag {
                pending.push(Event::new(EventKind::Load));
                pending.push(Event::new(EventKind::LoadEnd));
            }
        }
    }

    /// Capture a failure: zero the status, keep the diagnostic as body text,
    /// force `Done`, queue the `error` dispatch.
    fn handle_error(&mut self, error: String, pending: &mut Vec<Event>) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        // Late chunks from the failed call must not append to the diagnostic
        self.call_seq += 1;
        self.status = 0;
        self.status_text = error.clone();
        self.response_text = error;
        self.error_flag = true;
        self.send_flag = false;
        self.set_state(RequestState::Done, pending);
        pending.push(Event::new(EventKind::Error));
    }

    /// Cancel and reset. A request that was mid-sequence still passes
    /// through Done so observers see the terminal dispatch; the state is
    /// left at Done for the caller to clear once that dispatch has run.
    fn abort_to_done(&mut self, pending: &mut Vec<Event>) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.generation += 1;

        self.request_headers.reset();
        self.status = 0;
        self.status_text.clear();
        self.response_text.clear();
        self.response_headers.clear();
        self.redirect_hops = 0;
        self.error_flag = true;

        if self.state != RequestState::Unsent
            && (self.state != RequestState::Opened || self.send_flag)
            && self.state != RequestState::Done
        {
            self.send_flag = false;
            self.set_state(RequestState::Done, pending);
        }
    }

    /// Build the options for the next redirect hop, mutating the settings in
    /// place. Same headers, no body; method downgrades to GET only on a 303.
    fn redirect_options(&mut self, head: &ResponseHead) -> Result<RequestOptions, String> {
        let location = head
            .headers
            .get("location")
            .cloned()
            .ok_or_else(|| "redirect response without a Location header".to_string())?;

        let Some(settings) = self.settings.as_mut() else {
            return Err("redirect with no active request".to_string());
        };

        let base = Url::parse(&settings.url)
            .map_err(|e| format!("cannot parse current url '{}': {e}", settings.url))?;
        let target = base
            .join(&location)
            .map_err(|e| format!("cannot resolve redirect location '{location}': {e}"))?;

        let ssl = match target.scheme() {
            "https" => true,
            "http" => false,
            other => return Err(format!("redirect to unsupported scheme '{other}'")),
        };
        let host = target
            .host_str()
            .ok_or_else(|| format!("redirect target '{target}' has no host"))?
            .to_string();
        let port = target.port().unwrap_or(if ssl { 443 } else { 80 });
        let path = match target.query() {
            Some(q) => format!("{}?{q}", target.path()),
            None => target.path().to_string(),
        };

        if head.status == 303 {
            settings.method = "GET".to_string();
        }
        settings.url = target.to_string();
        let method = settings.method.clone();

        Ok(RequestOptions {
            method,
            host,
            port,
            path,
            ssl,
            headers: self.request_headers.to_pairs(),
            body: None,
            with_credentials: self.with_credentials,
        })
    }

    /// Issue one transport call, superseding any previous one: the old
    /// in-flight handle is aborted and the call tag advances so the old
    /// call's remaining events are discarded.
    fn issue_call(&mut self, client: &Client, options: RequestOptions) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.call_seq += 1;
        let sink = Arc::new(ClientSink {
            client: client.clone(),
            generation: self.generation,
            call: self.call_seq,
        });
        let handle = self.transport.issue(options, sink);
        self.in_flight = Some(handle);
    }
}

/// Forwards transport events for one issued call back into the client,
/// tagged with the generation and the call the events belong to.
struct ClientSink {
    client: Client,
    generation: u64,
    call: u64,
}

impl TransportSink for ClientSink {
    fn on_headers(&self, head: ResponseHead) {
        self.client.transport_headers(self.generation, self.call, head);
    }

    fn on_data(&self, chunk: &[u8]) {
        self.client.transport_data(self.generation, self.call, chunk);
    }

    fn on_end(&self) {
        self.client.transport_end(self.generation, self.call);
    }

    fn on_error(&self, error: String) {
        self.client.transport_error(self.generation, self.call, error);
    }
}

/// One logical HTTP request's state machine. Cheap to clone; clones share
/// the same request.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Mutex<ClientInner>>,
}

impl Client {
    /// Create a client over the default reqwest-backed transport.
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new()?)))
    }

    /// Create a client over an injected transport capability.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClientInner {
                state: RequestState::Unsent,
                settings: None,
                send_flag: false,
                error_flag: false,
                status: 0,
                status_text: String::new(),
                response_text: String::new(),
                response_headers: BTreeMap::new(),
                request_headers: HeaderTable::new(DEFAULT_USER_AGENT),
                listeners: Listeners::default(),
                transport,
                in_flight: None,
                redirect_hops: 0,
                with_credentials: false,
                generation: 0,
                call_seq: 0,
            })),
        }
    }

    // ****************************************
    // ** Lifecycle operations

    /// Open an asynchronous request. See [`Client::open_with`].
    pub fn open(&self, method: &str, url: &str) -> Result<(), ClientError> {
        self.open_with(method, url, true, None, None)
    }

    /// Record the settings for one request and transition to `Opened`.
    ///
    /// Implicitly aborts any prior in-flight request on this client (the
    /// abort dispatch included), clears the error flag, and resets the
    /// header table to its defaults.
    pub fn open_with(
        &self,
        method: &str,
        url: &str,
        is_async: bool,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<(), ClientError> {
        let mut pending = Vec::new();
        let result = {
            let mut inner = self.inner.lock().unwrap();
            inner.abort_to_done(&mut pending);
            inner.state = RequestState::Unsent;
            pending.push(Event::new(EventKind::Abort));
            inner.error_flag = false;

            if !headers::is_allowed_method(method) {
                Err(ClientError::Security(method.to_string()))
            } else {
                inner.settings = Some(Settings {
                    method: method.to_string(),
                    url: url.to_string(),
                    is_async,
                    user: user.map(str::to_string),
                    password: password.map(str::to_string),
                });
                inner.set_state(RequestState::Opened, &mut pending);
                Ok(())
            }
        };
        // The implicit abort dispatched regardless of whether open succeeded.
        self.dispatch_pending(pending);
        result
    }

    /// Send the request, with an optional body.
    ///
    /// Asynchronous requests return as soon as the transport call is issued;
    /// progress arrives through events. Synchronous requests block until the
    /// whole exchange (redirects included) is finished.
    pub fn send(&self, body: Option<&str>) -> Result<(), ClientError> {
        let (settings, target, generation) = {
            let inner = self.inner.lock().unwrap();
            if inner.state != RequestState::Opened {
                return Err(ClientError::InvalidState(
                    "connection must be opened before send() is called",
                ));
            }
            if inner.send_flag {
                return Err(ClientError::InvalidState("send has already been called"));
            }
            let settings = inner
                .settings
                .clone()
                .ok_or(ClientError::InvalidState("no request settings recorded"))?;
            let target = resolve_target(&settings.url)?;
            (settings, target, inner.generation)
        };

        match target {
            Target::Local(path) => self.send_local(&settings, path, generation),
            Target::Network {
                ssl,
                host,
                port,
                path,
            } => {
                if settings.is_async {
                    self.send_network(&settings, ssl, host, port, path, body, generation)
                } else {
                    self.send_blocking(&settings, body, generation)
                }
            }
        }
    }

    /// Load a `file:` target. Only GET is permitted.
    fn send_local(
        &self,
        settings: &Settings,
        path: PathBuf,
        generation: u64,
    ) -> Result<(), ClientError> {
        if settings.method != "GET" {
            return Err(ClientError::UnsupportedMethod {
                method: settings.method.clone(),
                scheme: "file".to_string(),
            });
        }

        {
            let mut inner = self.inner.lock().unwrap();
            inner.error_flag = false;
        }

        if settings.is_async {
            let client = self.clone();
            tokio::spawn(async move {
                let result = tokio::fs::read_to_string(&path).await;
                client.complete_local_read(generation, result.map_err(|e| e.to_string()));
            });
        } else {
            let result = std::fs::read_to_string(&path).map_err(|e| e.to_string());
            self.complete_local_read(generation, result);
        }
        Ok(())
    }

    fn complete_local_read(&self, generation: u64, result: Result<String, String>) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.generation != generation {
                return;
            }
            match result {
                Ok(data) => {
                    inner.status = 200;
                    inner.status_text = "OK".to_string();
                    inner.response_text = data;
                    inner.set_state(RequestState::Done, &mut pending);
                }
                Err(e) => inner.handle_error(e, &mut pending),
            }
        }
        self.dispatch_pending(pending);
    }

    /// Dispatch over the network transport, asynchronously.
    fn send_network(
        &self,
        settings: &Settings,
        ssl: bool,
        host: String,
        port: u16,
        path: String,
        body: Option<&str>,
        generation: u64,
    ) -> Result<(), ClientError> {
        let options = {
            let mut inner = self.inner.lock().unwrap();

            // The server may reject a request without a Host header; the
            // port is appended unless it is the scheme default.
            let default_port = (ssl && port == 443) || (!ssl && port == 80);
            let host_value = if default_port {
                host.clone()
            } else {
                format!("{host}:{port}")
            };
            inner.request_headers.replace_internal("Host", &host_value);

            if let Some(user) = &settings.user {
                let password = settings.password.clone().unwrap_or_default();
                let token = base64::engine::general_purpose::STANDARD
                    .encode(format!("{user}:{password}"));
                inner
                    .request_headers
                    .replace_internal("Authorization", &format!("Basic {token}"));
            }

            let body_bytes: Option<Vec<u8>> =
                if settings.method == "GET" || settings.method == "HEAD" {
                    None
                } else {
                    body.map(|b| b.as_bytes().to_vec())
                };

            if let Some(bytes) = &body_bytes {
                inner
                    .request_headers
                    .replace_internal("Content-Length", &bytes.len().to_string());
                if !inner.request_headers.contains("Content-Type") {
                    inner
                        .request_headers
                        .set_internal("Content-Type", "text/plain;charset=UTF-8");
                }
            } else if settings.method == "POST" {
                // Bodyless POST still gets an explicit zero length; some
                // servers reject it otherwise.
                inner
                    .request_headers
                    .replace_internal("Content-Length", "0");
            }

            inner.error_flag = false;

            RequestOptions {
                method: settings.method.clone(),
                host,
                port,
                path,
                ssl,
                headers: inner.request_headers.to_pairs(),
                body: body_bytes,
                with_credentials: inner.with_credentials,
            }
        };

        {
            let mut inner = self.inner.lock().unwrap();
            inner.send_flag = true;
            inner.redirect_hops = 0;
        }
        // Dispatched here, before the transport call, for historical
        // compatibility: observers see the transition even though no state
        // changed yet.
        self.dispatch_pending(vec![Event::new(EventKind::ReadyStateChange)]);

        {
            let mut inner = self.inner.lock().unwrap();
            // A handler may have aborted or reopened during that dispatch; a
            // stale generation means this send is dead.
            if inner.generation != generation || !inner.send_flag {
                return Ok(());
            }
            inner.issue_call(self, options);
        }
        self.dispatch_pending(vec![Event::new(EventKind::LoadStart)]);
        Ok(())
    }

    /// Honor the blocking call contract: delegate the exchange to the sync
    /// adapter's isolated worker and apply its outcome before returning.
    fn send_blocking(
        &self,
        settings: &Settings,
        body: Option<&str>,
        generation: u64,
    ) -> Result<(), ClientError> {
        let (transport, table, with_credentials) = {
            let mut inner = self.inner.lock().unwrap();
            inner.error_flag = false;
            (
                inner.transport.clone(),
                inner.request_headers.clone(),
                inner.with_credentials,
            )
        };
        let outcome = sync::execute(
            transport,
            settings,
            table,
            body.map(str::to_string),
            with_credentials,
        );
        self.apply_sync_outcome(generation, outcome);
        Ok(())
    }

    fn apply_sync_outcome(&self, generation: u64, outcome: Result<SyncOutcome, ClientError>) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.generation != generation {
                return;
            }
            match outcome {
                Ok(out) => {
                    inner.status = out.status;
                    inner.status_text = out.status_text;
                    inner.response_headers = out.headers;
                    inner.response_text = out.body;
                    inner.set_state(RequestState::Done, &mut pending);
                }
                Err(e) => inner.handle_error(e.to_string(), &mut pending),
            }
        }
        self.dispatch_pending(pending);
    }

    /// Cancel any in-flight request and reset to `Unsent`.
    ///
    /// A request that was mid-sequence passes through `Done` first so that
    /// observers depending on the terminal dispatch still see it. Idempotent:
    /// aborting a never-sent or already-done client just resets the headers
    /// and dispatches `abort`.
    pub fn abort(&self) {
        let mut pending = Vec::new();
        let generation = {
            let mut inner = self.inner.lock().unwrap();
            inner.abort_to_done(&mut pending);
            inner.generation
        };
        // Observers of the terminal dispatch read Done; the reset to Unsent
        // happens after, and only if no handler reopened the client.
        self.dispatch_pending(pending);
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.generation == generation {
                inner.state = RequestState::Unsent;
            }
        }
        self.dispatch_pending(vec![Event::new(EventKind::Abort)]);
    }

    // ****************************************
    // ** Request headers

    /// Set a request header, accumulating repeated names with `", "`.
    ///
    /// Forbidden (connection-control / framing) names are refused as a
    /// warned no-op, not an error.
    pub fn set_request_header(&self, name: &str, value: &str) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != RequestState::Opened {
            return Err(ClientError::InvalidState(
                "set_request_header can only be called when state is Opened",
            ));
        }
        if !headers::is_allowed_header(name) {
            log::warn!("refused to set unsafe header \"{name}\"");
            return Ok(());
        }
        if inner.send_flag {
            return Err(ClientError::InvalidState("send is in flight"));
        }
        inner.request_headers.set(name, value);
        Ok(())
    }

    /// Stored request header value, or `""`. Case-insensitive.
    pub fn get_request_header(&self, name: &str) -> String {
        self.inner.lock().unwrap().request_headers.get(name).to_string()
    }

    // ****************************************
    // ** Response access

    /// A response header, available once headers were received and no error
    /// occurred. Lookup is case-insensitive.
    pub fn get_response_header(&self, name: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        if inner.state < RequestState::HeadersReceived || inner.error_flag {
            return None;
        }
        inner
            .response_headers
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    /// All response headers as `Name: value` lines separated by CR+LF.
    /// Cookie-setting headers are excluded. Empty below `HeadersReceived`
    /// or after an error.
    pub fn get_all_response_headers(&self) -> String {
        let inner = self.inner.lock().unwrap();
        if inner.state < RequestState::HeadersReceived || inner.error_flag {
            return String::new();
        }
        format_response_headers(&inner.response_headers)
    }

    pub fn ready_state(&self) -> RequestState {
        self.inner.lock().unwrap().state
    }

    pub fn status(&self) -> u16 {
        self.inner.lock().unwrap().status
    }

    pub fn status_text(&self) -> String {
        self.inner.lock().unwrap().status_text.clone()
    }

    /// The accumulated response body. After an error this holds the
    /// diagnostic text.
    pub fn response_text(&self) -> String {
        self.inner.lock().unwrap().response_text.clone()
    }

    pub fn with_credentials(&self) -> bool {
        self.inner.lock().unwrap().with_credentials
    }

    pub fn set_with_credentials(&self, value: bool) {
        self.inner.lock().unwrap().with_credentials = value;
    }

    // ****************************************
    // ** Events

    /// Register a listener; returns a token for removal.
    pub fn add_event_listener<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.inner
            .lock()
            .unwrap()
            .listeners
            .add(kind, Arc::new(handler))
    }

    /// Remove a previously registered listener. Only the matching token
    /// removes it.
    pub fn remove_event_listener(&self, id: ListenerId) {
        self.inner.lock().unwrap().listeners.remove(id);
    }

    /// Install the singular handler for a kind; it fires before the
    /// registered listener list.
    pub fn set_on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.inner
            .lock()
            .unwrap()
            .listeners
            .set_singular(kind, Arc::new(handler));
    }

    pub fn clear_on(&self, kind: EventKind) {
        self.inner.lock().unwrap().listeners.clear_singular(kind);
    }

    /// Fire queued events in order. Handlers run without the state lock and
    /// may re-enter the client.
    fn dispatch_pending(&self, pending: Vec<Event>) {
        for event in pending {
            let handlers: Vec<Handler> = {
                let inner = self.inner.lock().unwrap();
                inner.listeners.handlers_for(event.kind)
            };
            for handler in handlers {
                handler(event);
            }
        }
    }

    // ****************************************
    // ** Transport event consumption (async path)

    fn transport_headers(&self, generation: u64, call: u64, head: ResponseHead) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.generation != generation || inner.call_seq != call || !inner.send_flag {
                return;
            }

            if matches!(head.status, 301 | 302 | 303 | 307) {
                inner.redirect_hops += 1;
                if inner.redirect_hops > MAX_REDIRECT_HOPS {
                    inner.handle_error(
                        format!("redirect limit of {MAX_REDIRECT_HOPS} hops exceeded"),
                        &mut pending,
                    );
                } else {
                    match inner.redirect_options(&head) {
                        Ok(options) => {
                            // The hop is invisible: same generation, no state
                            // change, just a fresh transport call. The 302's
                            // own call is superseded; its body and stream end
                            // never reach the state machine.
                            inner.issue_call(self, options);
                        }
                        Err(e) => inner.handle_error(e, &mut pending),
                    }
                }
            } else {
                inner.set_state(RequestState::HeadersReceived, &mut pending);
                inner.status = head.status;
                inner.status_text = head.status_text;
                inner.response_headers = head.headers;
            }
        }
        self.dispatch_pending(pending);
    }

    fn transport_data(&self, generation: u64, call: u64, chunk: &[u8]) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.generation != generation || inner.call_seq != call {
                return;
            }
            if !chunk.is_empty() {
                inner
                    .response_text
                    .push_str(&String::from_utf8_lossy(chunk));
            }
            // Loading is re-entered (and re-announced) on every chunk while
            // the send is still in flight.
            if inner.send_flag {
                inner.set_state(RequestState::Loading, &mut pending);
            }
        }
        self.dispatch_pending(pending);
    }

    fn transport_end(&self, generation: u64, call: u64) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.generation != generation || inner.call_seq != call {
                return;
            }
            // An end that arrives after the send flag was cleared (post
            // abort) is discarded.
            if inner.send_flag {
                inner.in_flight = None;
                inner.set_state(RequestState::Done, &mut pending);
                inner.send_flag = false;
            }
        }
        self.dispatch_pending(pending);
    }

    fn transport_error(&self, generation: u64, call: u64, error: String) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.generation != generation || inner.call_seq != call {
                return;
            }
            inner.handle_error(error, &mut pending);
        }
        self.dispatch_pending(pending);
    }

    // ****************************************
    // ** Internal access for the sync adapter

    /// Replace the whole request header table (sync worker hand-off).
    pub(crate) fn replace_request_headers(&self, table: HeaderTable) {
        self.inner.lock().unwrap().request_headers = table;
    }

    pub(crate) fn response_headers_snapshot(&self) -> BTreeMap<String, String> {
        self.inner.lock().unwrap().response_headers.clone()
    }

    pub(crate) fn error_flag(&self) -> bool {
        self.inner.lock().unwrap().error_flag
    }
}

/// Resolve a request URL to its dispatch target. Scheme-less input goes to
/// `localhost` over plain HTTP.
fn resolve_target(raw: &str) -> Result<Target, ClientError> {
    match Url::parse(raw) {
        Ok(url) => match url.scheme() {
            "https" | "http" => {
                let ssl = url.scheme() == "https";
                let host = url
                    .host_str()
                    .ok_or_else(|| ClientError::UnsupportedScheme(raw.to_string()))?
                    .to_string();
                let port = url.port().unwrap_or(if ssl { 443 } else { 80 });
                let path = match url.query() {
                    Some(q) => format!("{}?{q}", url.path()),
                    None => url.path().to_string(),
                };
                Ok(Target::Network {
                    ssl,
                    host,
                    port,
                    path,
                })
            }
            "file" => {
                let path = url
                    .to_file_path()
                    .unwrap_or_else(|_| PathBuf::from(url.path()));
                Ok(Target::Local(path))
            }
            other => Err(ClientError::UnsupportedScheme(other.to_string())),
        },
        // No scheme at all: a bare path is dispatched against localhost.
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let path = if raw.starts_with('/') {
                raw.to_string()
            } else {
                format!("/{raw}")
            };
            Ok(Target::Network {
                ssl: false,
                host: "localhost".to_string(),
                port: 80,
                path,
            })
        }
        Err(_) => Err(ClientError::UnsupportedScheme(raw.to_string())),
    }
}
