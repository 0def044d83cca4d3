//! AMQP client seam and the broker's native property envelope.
//!
//! The network client is not part of this crate. Anything that can open a
//! channel and publish/get with [`WireProperties`] can back the RabbitMQ
//! adapter.

use super::configuration::RabbitMqQueueConfiguration;
use crate::error::MessagingError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value of a header in an AMQP header table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderValue {
    String(String),
    Bytes(#[serde(with = "bytes_serde")] Bytes),
    Long(i64),
    Bool(bool),
}

/// Per-message metadata published alongside the body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireProperties {
    pub message_id: String,
    pub headers: HashMap<String, HeaderValue>,
    /// `2` marks the message persistent
    pub delivery_mode: u8,
    /// Time-to-live in decimal milliseconds
    pub expiration: String,
    /// Windows file time (100 ns ticks since 1601-01-01 UTC)
    pub timestamp: i64,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// A message pulled from a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub body: Bytes,
    pub properties: WireProperties,
}

/// An open channel to the broker
#[async_trait]
pub trait AmqpChannel: Send + Sync {
    /// Declare a queue, creating it if it does not exist
    async fn declare_queue(&mut self, queue: &str, durable: bool) -> Result<(), MessagingError>;

    /// Declare an exchange of the given type
    async fn declare_exchange(
        &mut self,
        exchange: &str,
        exchange_type: &str,
        durable: bool,
    ) -> Result<(), MessagingError>;

    /// Bind a queue to an exchange
    async fn bind_queue(
        &mut self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), MessagingError>;

    /// Publish a message. `exchange == ""` is the default exchange.
    async fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: Bytes,
        properties: WireProperties,
    ) -> Result<(), MessagingError>;

    /// Pull the next message from a queue, acknowledging it
    async fn get(&mut self, queue: &str) -> Result<Option<Delivery>, MessagingError>;

    /// Put the channel in transactional mode
    async fn tx_select(&mut self) -> Result<(), MessagingError>;

    /// Commit everything published since the last commit
    async fn tx_commit(&mut self) -> Result<(), MessagingError>;

    /// Close the channel. Uncommitted publishes are discarded.
    async fn close(&mut self) -> Result<(), MessagingError>;
}

/// Opens channels for a queue configuration
#[async_trait]
pub trait AmqpClientFactory: Send + Sync {
    async fn connect(
        &self,
        configuration: &RabbitMqQueueConfiguration,
    ) -> Result<Box<dyn AmqpChannel>, MessagingError>;
}

/// Custom serialization for Bytes
mod bytes_serde {
    use base64::{engine::general_purpose, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = general_purpose::STANDARD.encode(bytes);
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)?;
        Ok(Bytes::from(decoded))
    }
}
