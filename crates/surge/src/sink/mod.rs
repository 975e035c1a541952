//! The message-sink boundary.
//!
//! The engine never speaks a broker protocol itself. Each worker owns one
//! [`MessageSink`] connection, opened through a [`SinkConnector`], and hands
//! it records together with a [`DeliveryCallback`]. The sink resolves that
//! callback exactly once with either the delivery metadata or the error, on
//! whatever thread suits it.
//!
//! ## Structure
//!
//! - [`StreamSink`] - JSON-lines writer on a background thread (stdout by
//!   default, see [`StdoutConnector`]).
//! - [`DiscardSink`] - acknowledges everything inline, writes nothing.

mod discard;
mod stream;

pub use discard::*;
pub use stream::*;

use crate::{Message, SinkError};
use serde::Serialize;
use std::collections::BTreeMap;

/// Completion of one send: `Ok` on delivery, `Err` on failure.
pub type DeliveryCallback = Box<dyn FnOnce(Result<DeliveryMetadata, SinkError>) + Send + 'static>;

/// What a sink reports about a delivered record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeliveryMetadata {
    pub topic: String,
    /// Per-connection position of the record.
    pub offset: u64,
    /// Size of the delivered value.
    pub value_len: usize,
}

/// One logical producer connection.
///
/// Connections are never shared between workers, so methods take `&mut self`.
pub trait MessageSink: Send + 'static {
    /// Submits a record without waiting for it to be delivered.
    ///
    /// `on_complete` must be invoked exactly once, possibly from another
    /// thread, possibly before `send` returns.
    fn send(&mut self, topic: &str, message: Message, on_complete: DeliveryCallback);

    /// Blocks until every previously submitted send has completed.
    fn flush(&mut self) -> Result<(), SinkError>;

    /// Releases the connection. Callers flush first; sends still in flight at
    /// close time may be dropped.
    fn close(self) -> Result<(), SinkError>;
}

/// Opens one sink connection per worker.
pub trait SinkConnector: Send + Sync {
    type Sink: MessageSink;

    fn connect(&self, worker_id: usize) -> Result<Self::Sink, SinkError>;
}

/// Broker connection parameters. The engine passes them through to the
/// connector without looking at them.
pub type BrokerOptions = BTreeMap<String, String>;
