//! A sink that serializes records as JSON lines onto any [`Write`]r.
//!
//! Each connection owns a dedicated writer thread. `send` only enqueues the
//! record, so it never blocks the worker on I/O, and completions are invoked
//! from the writer thread, the same shape as a real broker client whose
//! delivery reports arrive on its network thread.

use super::{BrokerOptions, DeliveryCallback, DeliveryMetadata, MessageSink, SinkConnector};
use crate::{Message, SinkError};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::{
    borrow::Cow,
    io::{self, Write},
    thread::{self, JoinHandle},
};

enum Command {
    Record {
        topic: String,
        message: Message,
        on_complete: DeliveryCallback,
    },
    Flush(Sender<io::Result<()>>),
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    topic: &'a str,
    offset: u64,
    key: Option<Cow<'a, str>>,
    value: Cow<'a, str>,
    headers: Vec<(&'a str, Cow<'a, str>)>,
}

impl<'a> JsonRecord<'a> {
    fn new(topic: &'a str, offset: u64, message: &'a Message) -> Self {
        Self {
            topic,
            offset,
            key: message.key.as_deref().map(String::from_utf8_lossy),
            value: String::from_utf8_lossy(&message.value),
            headers: message
                .headers
                .iter()
                .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value)))
                .collect(),
        }
    }
}

/// A JSON-lines sink connection backed by a writer thread.
#[derive(Debug)]
pub struct StreamSink {
    tx: Sender<Command>,
    handle: JoinHandle<()>,
}

impl StreamSink {
    /// Spawns the writer thread for `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Io`] if the thread cannot be spawned.
    pub fn spawn<W>(writer: W, name: impl Into<String>) -> Result<Self, SinkError>
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || write_loop(writer, rx))?;
        Ok(Self { tx, handle })
    }
}

fn write_loop<W: Write>(mut writer: W, rx: Receiver<Command>) {
    let mut offset = 0_u64;

    for command in rx {
        match command {
            Command::Record {
                topic,
                message,
                on_complete,
            } => {
                let outcome = write_record(&mut writer, &topic, offset, &message).map(|()| {
                    let metadata = DeliveryMetadata {
                        topic: topic.clone(),
                        offset,
                        value_len: message.value.len(),
                    };
                    offset += 1;
                    metadata
                });
                on_complete(outcome.map_err(SinkError::from));
            }
            Command::Flush(reply) => {
                let _ = reply.send(writer.flush());
            }
        }
    }

    if let Err(e) = writer.flush() {
        tracing::warn!(error = %e, "final flush of stream sink failed");
    }
}

/// Writes one record as a single `write_all`, so connections sharing a writer
/// that locks per call (such as [`io::Stdout`]) never interleave partial lines.
fn write_record<W: Write>(
    writer: &mut W,
    topic: &str,
    offset: u64,
    message: &Message,
) -> io::Result<()> {
    let mut line =
        serde_json::to_vec(&JsonRecord::new(topic, offset, message)).map_err(io::Error::from)?;
    line.push(b'\n');
    writer.write_all(&line)
}

impl MessageSink for StreamSink {
    fn send(&mut self, topic: &str, message: Message, on_complete: DeliveryCallback) {
        let command = Command::Record {
            topic: topic.to_string(),
            message,
            on_complete,
        };
        if let Err(rejected) = self.tx.send(command) {
            // Writer thread is gone; the callback still has to fire once.
            if let Command::Record { on_complete, .. } = rejected.into_inner() {
                on_complete(Err(SinkError::Closed));
            }
        }
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(Command::Flush(reply_tx))
            .map_err(|_| SinkError::Closed)?;
        reply_rx.recv().map_err(|_| SinkError::Closed)??;
        Ok(())
    }

    fn close(self) -> Result<(), SinkError> {
        drop(self.tx);
        self.handle.join().map_err(|_| SinkError::Closed)
    }
}

/// Opens one [`StreamSink`] on standard output per worker.
///
/// Every connection writes to the same process-wide stdout. `Stdout` takes
/// its lock once per `write_all`, which keeps each JSON line whole.
#[derive(Clone, Debug, Default)]
pub struct StdoutConnector {
    options: BrokerOptions,
}

impl StdoutConnector {
    pub fn new(options: BrokerOptions) -> Self {
        Self { options }
    }
}

impl SinkConnector for StdoutConnector {
    type Sink = StreamSink;

    fn connect(&self, worker_id: usize) -> Result<Self::Sink, SinkError> {
        tracing::debug!(worker_id, options = ?self.options, "opening stdout sink");
        StreamSink::spawn(io::stdout(), format!("stdout-sink-{worker_id}"))
    }
}
