pub mod client;
pub mod errors;
pub mod events;
pub mod headers;
pub mod pipeline;
pub mod queue;
pub mod sync;
pub mod transport;

pub use client::*;
