use super::{DeliveryCallback, DeliveryMetadata, MessageSink, SinkConnector};
use crate::{Message, SinkError};

/// Acknowledges every record inline without writing it anywhere.
///
/// Handy for measuring how fast the engine itself can generate and dispatch,
/// with no transport in the way.
#[derive(Debug, Default)]
pub struct DiscardSink {
    next_offset: u64,
}

impl MessageSink for DiscardSink {
    fn send(&mut self, topic: &str, message: Message, on_complete: DeliveryCallback) {
        let metadata = DeliveryMetadata {
            topic: topic.to_string(),
            offset: self.next_offset,
            value_len: message.value.len(),
        };
        self.next_offset += 1;
        on_complete(Ok(metadata));
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn close(self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardConnector;

impl SinkConnector for DiscardConnector {
    type Sink = DiscardSink;

    fn connect(&self, _worker_id: usize) -> Result<Self::Sink, SinkError> {
        Ok(DiscardSink::default())
    }
}
