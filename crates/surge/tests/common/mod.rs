#![allow(dead_code)]

use parking_lot::Mutex;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};
use surge::{DeliveryCallback, DeliveryMetadata, Message, MessageSink, SinkConnector, SinkError};

/// Everything the recording sinks of one connector observed.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    connects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    seqs: Arc<Mutex<Vec<u64>>>,
}

impl Recorder {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::Acquire)
    }

    pub fn sends(&self) -> usize {
        self.seqs.lock().len()
    }

    /// Sequence numbers seen by all sinks, sorted.
    pub fn sorted_seqs(&self) -> Vec<u64> {
        let mut seqs = self.seqs.lock().clone();
        seqs.sort_unstable();
        seqs
    }
}

/// Hands out sinks that record every send and complete it inline.
#[derive(Clone, Debug, Default)]
pub struct RecordingConnector {
    pub recorder: Recorder,
    /// Per-send latency, to simulate a slow broker.
    pub send_delay: Duration,
    /// Sequence numbers for which the send fails.
    pub fail_when: Option<fn(u64) -> bool>,
    /// Refuse connections for worker ids at or above this one.
    pub refuse_from: Option<usize>,
    /// Panic inside `send`, taking the worker thread down.
    pub panic_on_send: bool,
}

impl RecordingConnector {
    pub fn slow(send_delay: Duration) -> Self {
        Self {
            send_delay,
            ..Self::default()
        }
    }

    pub fn failing(fail_when: fn(u64) -> bool) -> Self {
        Self {
            fail_when: Some(fail_when),
            ..Self::default()
        }
    }
}

impl SinkConnector for RecordingConnector {
    type Sink = RecordingSink;

    fn connect(&self, worker_id: usize) -> Result<Self::Sink, SinkError> {
        if self.refuse_from.is_some_and(|from| worker_id >= from) {
            return Err(SinkError::Rejected {
                reason: "connection refused".to_string(),
            });
        }
        self.recorder.connects.fetch_add(1, Ordering::AcqRel);
        Ok(RecordingSink {
            recorder: self.recorder.clone(),
            send_delay: self.send_delay,
            fail_when: self.fail_when,
            panic_on_send: self.panic_on_send,
            offset: 0,
        })
    }
}

pub struct RecordingSink {
    recorder: Recorder,
    send_delay: Duration,
    fail_when: Option<fn(u64) -> bool>,
    panic_on_send: bool,
    offset: u64,
}

/// Recovers the sequence number from a `key-<seq>` key.
fn seq_of(message: &Message) -> u64 {
    let key = message.key.as_deref().expect("template messages are keyed");
    std::str::from_utf8(key)
        .ok()
        .and_then(|k| k.rsplit('-').next())
        .and_then(|n| n.parse().ok())
        .expect("key ends in a sequence number")
}

impl MessageSink for RecordingSink {
    fn send(&mut self, topic: &str, message: Message, on_complete: DeliveryCallback) {
        if !self.send_delay.is_zero() {
            thread::sleep(self.send_delay);
        }

        if self.panic_on_send {
            panic!("sink exploded");
        }

        let seq = seq_of(&message);
        self.recorder.seqs.lock().push(seq);

        if self.fail_when.is_some_and(|fail| fail(seq)) {
            on_complete(Err(SinkError::Rejected {
                reason: format!("seq {seq} refused"),
            }));
            return;
        }

        let metadata = DeliveryMetadata {
            topic: topic.to_string(),
            offset: self.offset,
            value_len: message.value.len(),
        };
        self.offset += 1;
        on_complete(Ok(metadata));
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn close(self) -> Result<(), SinkError> {
        self.recorder.closes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
