//! Lifecycle event kinds and the listener registry.
//!
//! Events carry only their kind; the {type, dispatch-to-handler} contract is
//! all a host needs. Each kind has a list of registered listeners plus one
//! singular handler slot (the `on<event>` equivalent) that fires before the
//! list.

use std::fmt::Display;
use std::sync::Arc;

/// The lifecycle events a [`Client`](crate::client::Client) can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The ready state changed (or `Loading` was re-entered on a body chunk)
    ReadyStateChange,
    /// The request was handed to the transport
    LoadStart,
    /// The request completed without error
    Load,
    /// The request reached its end state, error or not
    LoadEnd,
    /// A transport-level failure occurred
    Error,
    /// The request was aborted
    Abort,
}

impl EventKind {
    #[cfg(test)]
    const ALL: [EventKind; 6] = [
        EventKind::ReadyStateChange,
        EventKind::LoadStart,
        EventKind::Load,
        EventKind::LoadEnd,
        EventKind::Error,
        EventKind::Abort,
    ];

    fn index(self) -> usize {
        match self {
            EventKind::ReadyStateChange => 0,
            EventKind::LoadStart => 1,
            EventKind::Load => 2,
            EventKind::LoadEnd => 3,
            EventKind::Error => 4,
            EventKind::Abort => 5,
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::ReadyStateChange => "readystatechange",
            EventKind::LoadStart => "loadstart",
            EventKind::Load => "load",
            EventKind::LoadEnd => "loadend",
            EventKind::Error => "error",
            EventKind::Abort => "abort",
        };
        write!(f, "{name}")
    }
}

/// A dispatched lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self { kind }
    }
}

/// Handlers are shared so dispatch can run outside the client's state lock.
pub type Handler = Arc<dyn Fn(Event) + Send + Sync>;

/// Token returned by [`Listeners::add`], used to remove that listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId {
    kind: EventKind,
    seq: u64,
}

#[derive(Default)]
struct KindSlot {
    /// The singular handler; fires before the registered list.
    singular: Option<Handler>,
    list: Vec<(u64, Handler)>,
}

/// Per-client listener registry, one slot per [`EventKind`].
#[derive(Default)]
pub struct Listeners {
    slots: [KindSlot; 6],
    next_seq: u64,
}

impl Listeners {
    pub fn add(&mut self, kind: EventKind, handler: Handler) -> ListenerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots[kind.index()].list.push((seq, handler));
        ListenerId { kind, seq }
    }

    pub fn remove(&mut self, id: ListenerId) {
        self.slots[id.kind.index()].list.retain(|(seq, _)| *seq != id.seq);
    }

    pub fn set_singular(&mut self, kind: EventKind, handler: Handler) {
        self.slots[kind.index()].singular = Some(handler);
    }

    pub fn clear_singular(&mut self, kind: EventKind) {
        self.slots[kind.index()].singular = None;
    }

    /// Snapshot the handlers for one kind, singular slot first.
    pub fn handlers_for(&self, kind: EventKind) -> Vec<Handler> {
        let slot = &self.slots[kind.index()];
        let mut out = Vec::with_capacity(slot.list.len() + 1);
        if let Some(h) = &slot.singular {
            out.push(h.clone());
        }
        out.extend(slot.list.iter().map(|(_, h)| h.clone()));
        out
    }

    #[cfg(test)]
    fn total_registered(&self) -> usize {
        EventKind::ALL
            .iter()
            .map(|k| self.handlers_for(*k).len())
            .sum()
    }
}
