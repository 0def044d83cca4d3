//! RabbitMQ queue configuration.

use crate::configuration::{duration_serde, ConfigurationsList, QueueConfiguration};
use crate::error::ConfigurationError;
use chrono::Duration;
use serde::Deserialize;

const EXCHANGE_TYPES: [&str; 4] = ["direct", "fanout", "topic", "headers"];

fn default_port() -> u16 {
    5672
}

fn default_virtual_host() -> String {
    "/".to_string()
}

fn default_exchange_type() -> String {
    "direct".to_string()
}

fn default_durable() -> bool {
    true
}

/// Settings of one RabbitMQ queue
#[derive(Debug, Clone, Deserialize)]
pub struct RabbitMqQueueConfiguration {
    pub id: String,
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_virtual_host")]
    pub virtual_host: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Queue to declare and consume from
    #[serde(default)]
    pub queue_name: Option<String>,
    /// Exchange to publish to; the default exchange when absent
    #[serde(default)]
    pub exchange_name: Option<String>,
    #[serde(default = "default_exchange_type")]
    pub exchange_type: String,
    /// Routing keys binding the queue to the exchange. The first is used to publish.
    #[serde(default)]
    pub routings: Vec<String>,
    #[serde(default, with = "duration_serde")]
    pub lifetime: Option<Duration>,
    #[serde(default)]
    pub reply_queue: Option<String>,
    /// Publish inside AMQP transactions committed per message
    #[serde(default)]
    pub transacted: bool,
    #[serde(default = "default_durable")]
    pub durable: bool,
}

impl RabbitMqQueueConfiguration {
    /// Create configuration for a queue on the default exchange
    pub fn new(id: impl Into<String>, server: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            server: server.into(),
            port: default_port(),
            virtual_host: default_virtual_host(),
            user: None,
            password: None,
            queue_name: Some(queue_name.into()),
            exchange_name: None,
            exchange_type: default_exchange_type(),
            routings: Vec::new(),
            lifetime: None,
            reply_queue: None,
            transacted: false,
            durable: default_durable(),
        }
    }

    /// Publish through an exchange
    pub fn with_exchange(mut self, exchange_name: impl Into<String>, exchange_type: impl Into<String>) -> Self {
        self.exchange_name = Some(exchange_name.into());
        self.exchange_type = exchange_type.into();
        self
    }

    /// Add routing key
    pub fn with_routing(mut self, routing_key: impl Into<String>) -> Self {
        self.routings.push(routing_key.into());
        self
    }

    /// Set default message lifetime
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Set default reply queue
    pub fn with_reply_queue(mut self, reply_queue: impl Into<String>) -> Self {
        self.reply_queue = Some(reply_queue.into());
        self
    }

    /// Enable transactional publishing
    pub fn transacted(mut self) -> Self {
        self.transacted = true;
        self
    }

    /// Queue name, ignoring blank values
    pub fn queue_name(&self) -> Option<&str> {
        non_blank(self.queue_name.as_deref())
    }

    /// Exchange name, ignoring blank values
    pub fn exchange_name(&self) -> Option<&str> {
        non_blank(self.exchange_name.as_deref())
    }

    /// Exchange and routing key a message is published with
    pub fn publish_target(&self) -> (&str, &str) {
        match self.exchange_name() {
            Some(exchange) => {
                let routing_key = self
                    .routings
                    .first()
                    .map(String::as_str)
                    .or_else(|| self.queue_name())
                    .unwrap_or("");
                (exchange, routing_key)
            }
            None => ("", self.queue_name().unwrap_or("")),
        }
    }

    /// Check the parameters needed to connect and publish
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |message: &str| ConfigurationError::Invalid {
            queue_id: self.id.clone(),
            message: message.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "id".to_string(),
            });
        }

        if self.server.trim().is_empty() {
            return Err(invalid("server must not be empty"));
        }

        if self.port == 0 {
            return Err(invalid("port must not be 0"));
        }

        match self.exchange_name() {
            None => {
                if self.queue_name().is_none() {
                    return Err(invalid(
                        "queue_name is required when no exchange_name is configured",
                    ));
                }
            }
            Some(_) => {
                if !EXCHANGE_TYPES.contains(&self.exchange_type.as_str()) {
                    return Err(invalid(&format!(
                        "exchange_type '{}' is not one of {}",
                        self.exchange_type,
                        EXCHANGE_TYPES.join(", ")
                    )));
                }
            }
        }

        Ok(())
    }
}

impl QueueConfiguration for RabbitMqQueueConfiguration {
    fn id(&self) -> &str {
        &self.id
    }

    fn lifetime(&self) -> Option<Duration> {
        self.lifetime
    }

    fn reply_queue(&self) -> Option<&str> {
        self.reply_queue.as_deref()
    }
}

/// The `rabbitmq` configuration section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RabbitMqConfiguration {
    #[serde(default)]
    pub queues: Vec<RabbitMqQueueConfiguration>,
}

impl ConfigurationsList for RabbitMqConfiguration {
    type Queue = RabbitMqQueueConfiguration;

    fn queues(&self) -> &[RabbitMqQueueConfiguration] {
        &self.queues
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "configuration_tests.rs"]
mod tests;
