//! RabbitMQ message adapter.
//!
//! The adapter opens its channel on first use, declares the configured
//! topology, and switches the channel into transactional mode when the queue
//! is transacted. `dispose` closes the channel; the adapter refuses further
//! work afterwards.

use super::client::{AmqpChannel, AmqpClientFactory};
use super::configuration::RabbitMqQueueConfiguration;
use super::converter;
use crate::adapter::{MessageAdapter, ReceivingMessageAdapter, TransactedMessageAdapter};
use crate::configuration::QueueConfiguration;
use crate::error::{ConfigurationError, MessagingError};
use crate::message::{Message, MessageBody};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;

const DEFAULT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(50);

/// Adapter for one RabbitMQ queue
pub struct RabbitMqMessageAdapter {
    configuration: RabbitMqQueueConfiguration,
    client_factory: Arc<dyn AmqpClientFactory>,
    channel: Option<Box<dyn AmqpChannel>>,
    disposed: bool,
    poll_interval: std::time::Duration,
}

impl RabbitMqMessageAdapter {
    /// Create adapter. No connection is opened until the first operation.
    pub fn new(
        configuration: RabbitMqQueueConfiguration,
        client_factory: Arc<dyn AmqpClientFactory>,
    ) -> Self {
        Self {
            configuration,
            client_factory,
            channel: None,
            disposed: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set how often `receive` polls an empty queue
    pub fn with_poll_interval(mut self, poll_interval: std::time::Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Get RabbitMQ configuration
    pub fn rabbit_configuration(&self) -> &RabbitMqQueueConfiguration {
        &self.configuration
    }

    /// Open the channel and declare topology. Does nothing when already connected.
    pub async fn connect(&mut self) -> Result<(), MessagingError> {
        self.ensure_not_disposed()?;
        if self.channel.is_some() {
            return Ok(());
        }

        let configuration = &self.configuration;
        let mut channel = self.client_factory.connect(configuration).await?;

        if let Err(error) = declare_topology(channel.as_mut(), configuration).await {
            if let Err(close_error) = channel.close().await {
                warn!(
                    queue_id = %configuration.id,
                    error = %close_error,
                    "Failed to close channel after topology error"
                );
            }
            return Err(error);
        }

        info!(
            queue_id = %configuration.id,
            server = %configuration.server,
            port = configuration.port,
            transacted = configuration.transacted,
            "Connected RabbitMQ adapter"
        );
        self.channel = Some(channel);
        Ok(())
    }

    fn ensure_not_disposed(&self) -> Result<(), MessagingError> {
        if self.disposed {
            return Err(MessagingError::AdapterDisposed {
                queue_id: self.configuration.id.clone(),
            });
        }
        Ok(())
    }

    fn connected_channel(&mut self) -> Result<&mut Box<dyn AmqpChannel>, MessagingError> {
        let queue_id = &self.configuration.id;
        self.channel
            .as_mut()
            .ok_or_else(|| MessagingError::ConnectionFailed {
                message: format!("no open channel for queue '{}'", queue_id),
            })
    }
}

fn body_bytes(message: &Message) -> Result<Bytes, MessagingError> {
    match message.body() {
        MessageBody::Text { body, .. } => Ok(Bytes::from(body.clone())),
        MessageBody::Bytes(bytes) => Ok(bytes.clone()),
        MessageBody::Opaque { kind, .. } => {
            Err(MessagingError::UnsupportedMessageType { kind: kind.clone() })
        }
    }
}

/// Declare queue and exchange, bind them, and enter transactional mode if configured
async fn declare_topology(
    channel: &mut dyn AmqpChannel,
    configuration: &RabbitMqQueueConfiguration,
) -> Result<(), MessagingError> {
    if let Some(queue) = configuration.queue_name() {
        channel.declare_queue(queue, configuration.durable).await?;
    }

    if let Some(exchange) = configuration.exchange_name() {
        channel
            .declare_exchange(exchange, &configuration.exchange_type, configuration.durable)
            .await?;

        if let Some(queue) = configuration.queue_name() {
            if configuration.routings.is_empty() {
                channel.bind_queue(queue, exchange, queue).await?;
            }
            for routing_key in &configuration.routings {
                channel.bind_queue(queue, exchange, routing_key).await?;
            }
        }
    }

    if configuration.transacted {
        channel.tx_select().await?;
    }
    Ok(())
}

#[async_trait]
impl MessageAdapter for RabbitMqMessageAdapter {
    fn configuration(&self) -> &dyn QueueConfiguration {
        &self.configuration
    }

    async fn send(&mut self, message: &Message) -> Result<(), MessagingError> {
        self.ensure_not_disposed()?;

        let properties = converter::to_wire_properties(message, &self.configuration)?;
        let body = body_bytes(message)?;
        let (exchange, routing_key) = self.configuration.publish_target();
        let (exchange, routing_key) = (exchange.to_string(), routing_key.to_string());

        self.connect().await?;
        let message_id = properties.message_id.clone();
        self.connected_channel()?
            .publish(&exchange, &routing_key, body, properties)
            .await?;

        debug!(
            queue_id = %self.configuration.id,
            message_id = %message_id,
            exchange = %exchange,
            routing_key = %routing_key,
            "Published message"
        );
        Ok(())
    }

    async fn dispose(&mut self) -> Result<(), MessagingError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;

        if let Some(mut channel) = self.channel.take() {
            channel.close().await?;
        }

        info!(queue_id = %self.configuration.id, "Disposed RabbitMQ adapter");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    fn as_transacted(&mut self) -> Option<&mut dyn TransactedMessageAdapter> {
        Some(self)
    }

    fn as_receiver(&mut self) -> Option<&mut dyn ReceivingMessageAdapter> {
        Some(self)
    }
}

#[async_trait]
impl TransactedMessageAdapter for RabbitMqMessageAdapter {
    async fn commit_if_transacted(&mut self, message: &Message) -> Result<(), MessagingError> {
        self.ensure_not_disposed()?;
        if !self.configuration.transacted {
            return Ok(());
        }

        let Some(channel) = self.channel.as_mut() else {
            return Ok(());
        };
        channel.tx_commit().await?;

        debug!(
            queue_id = %self.configuration.id,
            message_id = %message.message_id,
            "Committed transaction"
        );
        Ok(())
    }
}

#[async_trait]
impl ReceivingMessageAdapter for RabbitMqMessageAdapter {
    async fn receive(&mut self, timeout: Duration) -> Result<Option<Message>, MessagingError> {
        self.ensure_not_disposed()?;
        let queue = self
            .configuration
            .queue_name()
            .map(str::to_string)
            .ok_or_else(|| ConfigurationError::Missing {
                key: format!("{}.queue_name", self.configuration.id),
            })?;

        self.connect().await?;
        let deadline = Instant::now() + timeout.to_std().unwrap_or_default();

        loop {
            if let Some(delivery) = self.connected_channel()?.get(&queue).await? {
                let message = converter::to_message(delivery.body, &delivery.properties)?;
                debug!(
                    queue_id = %self.configuration.id,
                    message_id = %message.message_id,
                    "Received message"
                );
                return Ok(Some(message));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
