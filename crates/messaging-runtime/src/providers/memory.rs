//! In-memory AMQP broker for testing and development.
//!
//! [`InMemoryBroker`] implements [`AmqpClientFactory`]; every channel it opens
//! shares the broker's storage. It models the parts of AMQP the RabbitMQ
//! adapter relies on:
//! - Queues and exchanges (`direct`, `fanout`, `topic`, `headers`)
//! - Routing through the default exchange and through bindings
//! - Transactional channels that hold publishes until commit
//! - String headers delivered back as byte arrays, like AMQP long strings
//!
//! Unroutable messages are dropped, as a broker does for non-mandatory
//! publishes. `headers` exchanges route to every binding.

use crate::error::MessagingError;
use crate::providers::rabbitmq::{
    AmqpChannel, AmqpClientFactory, Delivery, HeaderValue, RabbitMqQueueConfiguration,
    WireProperties,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

const PROVIDER: &str = "in-memory";

// ============================================================================
// Internal Storage Structures
// ============================================================================

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, VecDeque<Delivery>>,
    exchanges: HashMap<String, Exchange>,
    available: bool,
    connections: usize,
    open_channels: usize,
}

struct Exchange {
    exchange_type: String,
    /// (queue, routing key)
    bindings: Vec<(String, String)>,
}

impl BrokerState {
    fn route(
        &mut self,
        exchange: &str,
        routing_key: &str,
        delivery: Delivery,
    ) -> Result<(), MessagingError> {
        let targets: Vec<String> = if exchange.is_empty() {
            vec![routing_key.to_string()]
        } else {
            let target = self
                .exchanges
                .get(exchange)
                .ok_or_else(|| not_found(format!("no exchange '{}'", exchange)))?;
            target
                .bindings
                .iter()
                .filter(|(_, key)| match target.exchange_type.as_str() {
                    "direct" => key == routing_key,
                    "topic" => topic_matches(key, routing_key),
                    _ => true,
                })
                .map(|(queue, _)| queue.clone())
                .collect()
        };

        let mut routed = false;
        for target in targets {
            if let Some(queue) = self.queues.get_mut(&target) {
                queue.push_back(delivery.clone());
                routed = true;
            }
        }

        if !routed {
            debug!(exchange, routing_key, "Dropped unroutable message");
        }
        Ok(())
    }
}

fn not_found(message: String) -> MessagingError {
    MessagingError::ProviderError {
        provider: PROVIDER.to_string(),
        code: "404".to_string(),
        message,
    }
}

/// AMQP topic matching: `*` matches one word, `#` matches zero or more
fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    fn matches(pattern: &[&str], key: &[&str]) -> bool {
        match (pattern.first(), key.first()) {
            (None, None) => true,
            (Some(&"#"), _) => {
                matches(&pattern[1..], key) || (!key.is_empty() && matches(pattern, &key[1..]))
            }
            (Some(&"*"), Some(_)) => matches(&pattern[1..], &key[1..]),
            (Some(p), Some(k)) if p == k => matches(&pattern[1..], &key[1..]),
            _ => false,
        }
    }

    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches(&pattern, &key)
}

/// String headers arrive as byte arrays on the consuming side
fn as_delivered(mut properties: WireProperties) -> WireProperties {
    for value in properties.headers.values_mut() {
        if let HeaderValue::String(text) = value {
            *value = HeaderValue::Bytes(Bytes::from(std::mem::take(text)));
        }
    }
    properties
}

// ============================================================================
// InMemoryBroker
// ============================================================================

/// Shared in-process broker
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    /// Create empty, reachable broker
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                available: true,
                ..BrokerState::default()
            })),
        }
    }

    /// Simulate the broker going down or coming back
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Number of messages waiting in a queue
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, VecDeque::len)
    }

    /// Whether a queue has been declared
    pub fn has_queue(&self, queue: &str) -> bool {
        self.lock().queues.contains_key(queue)
    }

    /// Copies of the messages waiting in a queue, oldest first
    pub fn peek(&self, queue: &str) -> Vec<Delivery> {
        self.lock()
            .queues
            .get(queue)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of channels opened so far
    pub fn connection_count(&self) -> usize {
        self.lock().connections
    }

    /// Number of channels opened and not yet closed
    pub fn open_channel_count(&self) -> usize {
        self.lock().open_channels
    }

    /// Broker state for a channel, failing when the channel is closed or the broker is down
    fn channel_state(&self, open: bool) -> Result<MutexGuard<'_, BrokerState>, MessagingError> {
        if !open {
            return Err(MessagingError::ProviderError {
                provider: PROVIDER.to_string(),
                code: "504".to_string(),
                message: "channel is closed".to_string(),
            });
        }

        let state = self.lock();
        if !state.available {
            return Err(MessagingError::ConnectionFailed {
                message: "connection to broker lost".to_string(),
            });
        }
        Ok(state)
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        // A panic while holding the lock cannot leave the maps half-updated
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AmqpClientFactory for InMemoryBroker {
    async fn connect(
        &self,
        configuration: &RabbitMqQueueConfiguration,
    ) -> Result<Box<dyn AmqpChannel>, MessagingError> {
        let mut state = self.lock();
        if !state.available {
            return Err(MessagingError::ConnectionFailed {
                message: format!(
                    "broker {}:{} is unreachable",
                    configuration.server, configuration.port
                ),
            });
        }
        state.connections += 1;
        state.open_channels += 1;

        Ok(Box::new(InMemoryChannel {
            broker: self.clone(),
            open: true,
            transacted: false,
            pending: Vec::new(),
        }))
    }
}

// ============================================================================
// InMemoryChannel
// ============================================================================

struct PendingPublish {
    exchange: String,
    routing_key: String,
    delivery: Delivery,
}

struct InMemoryChannel {
    broker: InMemoryBroker,
    open: bool,
    transacted: bool,
    pending: Vec<PendingPublish>,
}

impl InMemoryChannel {
    fn state(&self) -> Result<MutexGuard<'_, BrokerState>, MessagingError> {
        self.broker.channel_state(self.open)
    }
}

#[async_trait]
impl AmqpChannel for InMemoryChannel {
    async fn declare_queue(&mut self, queue: &str, _durable: bool) -> Result<(), MessagingError> {
        self.state()?.queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn declare_exchange(
        &mut self,
        exchange: &str,
        exchange_type: &str,
        _durable: bool,
    ) -> Result<(), MessagingError> {
        let mut state = self.state()?;
        match state.exchanges.get(exchange) {
            Some(existing) if existing.exchange_type != exchange_type => {
                Err(MessagingError::ProviderError {
                    provider: PROVIDER.to_string(),
                    code: "406".to_string(),
                    message: format!(
                        "exchange '{}' already declared as '{}'",
                        exchange, existing.exchange_type
                    ),
                })
            }
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(
                    exchange.to_string(),
                    Exchange {
                        exchange_type: exchange_type.to_string(),
                        bindings: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn bind_queue(
        &mut self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), MessagingError> {
        let mut state = self.state()?;
        if !state.queues.contains_key(queue) {
            return Err(not_found(format!("no queue '{}'", queue)));
        }

        let target = state
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| not_found(format!("no exchange '{}'", exchange)))?;
        let binding = (queue.to_string(), routing_key.to_string());
        if !target.bindings.contains(&binding) {
            target.bindings.push(binding);
        }
        Ok(())
    }

    async fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: Bytes,
        properties: WireProperties,
    ) -> Result<(), MessagingError> {
        let delivery = Delivery {
            body,
            properties: as_delivered(properties),
        };

        if self.transacted {
            // Surface a closed channel or lost connection immediately
            drop(self.state()?);
            self.pending.push(PendingPublish {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                delivery,
            });
            return Ok(());
        }

        self.state()?.route(exchange, routing_key, delivery)
    }

    async fn get(&mut self, queue: &str) -> Result<Option<Delivery>, MessagingError> {
        let mut state = self.state()?;
        let messages = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| not_found(format!("no queue '{}'", queue)))?;
        Ok(messages.pop_front())
    }

    async fn tx_select(&mut self) -> Result<(), MessagingError> {
        drop(self.state()?);
        self.transacted = true;
        Ok(())
    }

    async fn tx_commit(&mut self) -> Result<(), MessagingError> {
        if !self.transacted {
            return Err(MessagingError::ProviderError {
                provider: PROVIDER.to_string(),
                code: "406".to_string(),
                message: "channel is not in transactional mode".to_string(),
            });
        }

        // Publishes stay pending when the broker cannot be reached
        let mut state = self.broker.channel_state(self.open)?;
        for publish in std::mem::take(&mut self.pending) {
            state.route(&publish.exchange, &publish.routing_key, publish.delivery)?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), MessagingError> {
        if self.open {
            self.open = false;
            let mut state = self.broker.lock();
            state.open_channels = state.open_channels.saturating_sub(1);
        }
        self.pending.clear();
        Ok(())
    }
}
