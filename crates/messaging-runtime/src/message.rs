//! Message types shared by every backend.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Payload of a [`Message`]. The variant is fixed when the message is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// UTF-8 text, optionally tagged with a content type of the caller's choosing
    Text {
        body: String,
        content_type: Option<String>,
    },
    /// Raw bytes, transported without re-encoding
    Bytes(Bytes),
    /// A backend-specific body that only adapters of that backend understand
    Opaque { kind: String, payload: Bytes },
}

impl MessageBody {
    /// Short name of the variant, used in logs and errors
    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Bytes(_) => "bytes",
            Self::Opaque { kind, .. } => kind,
        }
    }
}

/// A message travelling through an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Identifier of the logical message; empty means "generate on send"
    pub message_id: String,
    pub correlation_id: Option<String>,
    pub reply_queue: Option<String>,
    /// Time-to-live. Zero or negative means "use the queue configuration"
    pub life_time: Duration,
    /// Set on receive from the wire timestamp
    pub send_date_time: Option<DateTime<Utc>>,
    /// Set on receive
    pub receive_date: Option<DateTime<Utc>>,
    pub properties: HashMap<String, String>,
    body: MessageBody,
}

impl Message {
    /// Create new message with the given body
    pub fn new(body: MessageBody) -> Self {
        Self {
            message_id: String::new(),
            correlation_id: None,
            reply_queue: None,
            life_time: Duration::zero(),
            send_date_time: None,
            receive_date: None,
            properties: HashMap::new(),
            body,
        }
    }

    /// Create text message without an explicit content type
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(MessageBody::Text {
            body: body.into(),
            content_type: None,
        })
    }

    /// Create bytes message
    pub fn bytes(body: impl Into<Bytes>) -> Self {
        Self::new(MessageBody::Bytes(body.into()))
    }

    /// Set message id
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    /// Add correlation ID for request/response tracking
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Set the queue a response should be sent to
    pub fn with_reply_queue(mut self, reply_queue: impl Into<String>) -> Self {
        self.reply_queue = Some(reply_queue.into());
        self
    }

    /// Set time-to-live
    pub fn with_life_time(mut self, life_time: Duration) -> Self {
        self.life_time = life_time;
        self
    }

    /// Add header
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Get body
    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Take the body, consuming the message
    pub fn into_body(self) -> MessageBody {
        self.body
    }

    /// Content type carried by text messages. Always `None` for other bodies.
    pub fn content_type(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text { content_type, .. } => content_type.as_deref(),
            MessageBody::Bytes(_) | MessageBody::Opaque { .. } => None,
        }
    }

    /// Whether the message carries its own positive lifetime
    pub fn has_life_time(&self) -> bool {
        self.life_time > Duration::zero()
    }

    /// Whether the reply queue is absent or whitespace only
    pub fn reply_queue_is_blank(&self) -> bool {
        self.reply_queue
            .as_deref()
            .map_or(true, |queue| queue.trim().is_empty())
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
