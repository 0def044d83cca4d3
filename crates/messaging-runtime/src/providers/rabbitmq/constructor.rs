//! Construction hooks for RabbitMQ adapters.

use super::adapter::RabbitMqMessageAdapter;
use super::client::AmqpClientFactory;
use super::configuration::{RabbitMqConfiguration, RabbitMqQueueConfiguration};
use crate::adapter::MessageAdapter;
use crate::error::ConfigurationError;
use crate::factory::{AdapterStrategy, QueueMessageAdapterConstructor};
use std::sync::Arc;

/// Name of the configuration section holding RabbitMQ queues
pub const SECTION_NAME: &str = "rabbitmq";

/// Adapter constructor bound to the `rabbitmq` section
pub type RabbitMqAdapterConstructor =
    QueueMessageAdapterConstructor<RabbitMqConfiguration, RabbitMqAdapterStrategy>;

/// Validates RabbitMQ queue parameters and builds adapters sharing one client factory
pub struct RabbitMqAdapterStrategy {
    client_factory: Arc<dyn AmqpClientFactory>,
}

impl RabbitMqAdapterStrategy {
    pub fn new(client_factory: Arc<dyn AmqpClientFactory>) -> Self {
        Self { client_factory }
    }
}

impl AdapterStrategy<RabbitMqQueueConfiguration> for RabbitMqAdapterStrategy {
    fn check_parameters(
        &self,
        configuration: &RabbitMqQueueConfiguration,
    ) -> Result<(), ConfigurationError> {
        configuration.validate()
    }

    fn create_adapter(&self, configuration: &RabbitMqQueueConfiguration) -> Box<dyn MessageAdapter> {
        Box::new(RabbitMqMessageAdapter::new(
            configuration.clone(),
            Arc::clone(&self.client_factory),
        ))
    }
}

/// Create a RabbitMQ constructor from the `rabbitmq` section of `config`
pub fn constructor(
    config: &config::Config,
    client_factory: Arc<dyn AmqpClientFactory>,
) -> RabbitMqAdapterConstructor {
    RabbitMqAdapterConstructor::new(
        config,
        SECTION_NAME,
        RabbitMqAdapterStrategy::new(client_factory),
    )
}

#[cfg(test)]
#[path = "constructor_tests.rs"]
mod tests;
