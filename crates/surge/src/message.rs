//! Messages, work items, and the pluggable message-construction capability.

use crate::DeliveryMetadata;
use bytes::Bytes;

/// A record ready to be handed to a sink. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub key: Option<Bytes>,
    pub value: Bytes,
    pub headers: Vec<(String, Bytes)>,
}

impl Message {
    /// A message with only a value.
    pub fn from_value(value: impl Into<Bytes>) -> Self {
        Self {
            key: None,
            value: value.into(),
            headers: Vec::new(),
        }
    }
}

/// One unit of work produced by the generation loop.
///
/// Created exactly once, consumed by exactly one worker, never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    /// Strictly increasing, starting at 1.
    pub seq: u64,
    /// Wall-clock milliseconds at creation.
    pub timestamp_ms: u64,
    pub message: Message,
}

/// Builds the message for each generated sequence number.
///
/// `build_message` runs on the generation thread. `on_delivery` runs on
/// whichever thread the sink completes a successful send on, so
/// implementations must be `Send + Sync`.
pub trait MessageBuilder: Send + Sync {
    fn build_message(&self, seq: u64, timestamp_ms: u64) -> Message;

    /// Invoked after each successful send. Does nothing by default.
    fn on_delivery(&self, _metadata: &DeliveryMetadata) {}
}

/// Settings for [`TemplateBuilder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateConfig {
    /// Payload text; `{seq}` and `{ts}` are substituted.
    pub payload_template: String,
    /// Payloads shorter than this are right-padded with `x`.
    pub message_size_bytes: usize,
    /// The key is this prefix followed by the sequence number.
    pub key_prefix: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            payload_template: "{ts}|{seq}".to_string(),
            message_size_bytes: 256,
            key_prefix: "key-".to_string(),
        }
    }
}

/// The stock [`MessageBuilder`]: a templated, padded payload keyed by
/// sequence number and stamped with a `ts` header.
#[derive(Clone, Debug, Default)]
pub struct TemplateBuilder {
    config: TemplateConfig,
}

impl TemplateBuilder {
    pub const PAD_BYTE: u8 = b'x';

    pub fn new(config: TemplateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }
}

impl MessageBuilder for TemplateBuilder {
    fn build_message(&self, seq: u64, timestamp_ms: u64) -> Message {
        let ts = timestamp_ms.to_string();
        let payload = self
            .config
            .payload_template
            .replace("{seq}", &seq.to_string())
            .replace("{ts}", &ts);

        let mut value = payload.into_bytes();
        if value.len() < self.config.message_size_bytes {
            value.resize(self.config.message_size_bytes, Self::PAD_BYTE);
        }

        Message {
            key: Some(Bytes::from(format!("{}{seq}", self.config.key_prefix))),
            value: Bytes::from(value),
            headers: vec![("ts".to_string(), Bytes::from(ts))],
        }
    }
}
