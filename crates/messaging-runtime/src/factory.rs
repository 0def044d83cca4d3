//! Adapter construction from bound configuration.
//!
//! [`QueueMessageAdapterConstructor`] holds the configuration handling that is
//! the same for every backend: binding a configuration section, looking a
//! queue up by id, and refusing unknown ids. The backend supplies only an
//! [`AdapterStrategy`] that validates its own parameters and builds the
//! adapter.
//!
//! [`MessagingComponentFactory`] is the composition-root view: it asks every
//! registered constructor whether it knows a queue id and builds senders for
//! whichever one does.

use crate::adapter::MessageAdapter;
use crate::configuration::{ConfigurationsList, QueueConfiguration};
use crate::error::{ConfigurationError, MessagingError};
use crate::sender::{CallContextFactory, MessageSender};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "factory_tests.rs"]
mod tests;

// ============================================================================
// Backend Hooks
// ============================================================================

/// Backend-specific half of adapter construction
pub trait AdapterStrategy<Q>: Send + Sync {
    /// Validate backend parameters of a queue before an adapter is built
    fn check_parameters(&self, configuration: &Q) -> Result<(), ConfigurationError>;

    /// Build an adapter for a validated queue configuration
    fn create_adapter(&self, configuration: &Q) -> Box<dyn MessageAdapter>;
}

// ============================================================================
// Constructor Contract
// ============================================================================

/// Creates adapters by queue id for one backend
pub trait MessageAdapterConstructor: Send + Sync {
    /// Name of the configuration section this constructor was bound to
    fn backend_name(&self) -> &str;

    /// Create adapter for a configured queue
    fn create(&self, queue_id: &str) -> Result<Box<dyn MessageAdapter>, MessagingError>;

    /// Create adapters for all configured queues, in configuration order
    fn create_all(&self) -> Result<Vec<Box<dyn MessageAdapter>>, MessagingError>;

    /// Check whether a queue is configured, without building anything
    fn has_queue(&self, queue_id: &str) -> bool;

    /// Ids of all configured queues, in configuration order
    fn queue_ids(&self) -> Vec<String>;
}

// ============================================================================
// QueueMessageAdapterConstructor
// ============================================================================

/// Configuration-driven adapter constructor, shared by all backends
pub struct QueueMessageAdapterConstructor<L, S> {
    backend_name: String,
    configuration: Option<L>,
    strategy: S,
}

impl<L, S> QueueMessageAdapterConstructor<L, S>
where
    L: ConfigurationsList + DeserializeOwned,
    S: AdapterStrategy<L::Queue>,
{
    /// Bind `section_name` of the configuration tree to the list type.
    ///
    /// A missing or malformed section leaves the constructor without queues;
    /// every later lookup reports "not found".
    pub fn new(config: &config::Config, section_name: &str, strategy: S) -> Self {
        let configuration = match config.get::<L>(section_name) {
            Ok(list) => {
                info!(
                    section = section_name,
                    queues = list.queues().len(),
                    "Bound messaging configuration section"
                );
                Some(list)
            }
            Err(e) => {
                warn!(
                    section = section_name,
                    error = %e,
                    "Messaging configuration section could not be bound; no queues configured"
                );
                None
            }
        };

        Self::from_configurations(section_name, configuration, strategy)
    }

    /// Create constructor from an already bound configuration list
    pub fn from_configurations(
        backend_name: impl Into<String>,
        configuration: Option<L>,
        strategy: S,
    ) -> Self {
        Self {
            backend_name: backend_name.into(),
            configuration,
            strategy,
        }
    }

    /// Get bound configuration list
    pub fn configuration(&self) -> Option<&L> {
        self.configuration.as_ref()
    }

    fn queue_configuration(&self, queue_id: &str) -> Option<&L::Queue> {
        self.configuration
            .as_ref()
            .and_then(|list| list.queue_configuration(queue_id))
    }

    fn create_internal(
        &self,
        queue_configuration: &L::Queue,
    ) -> Result<Box<dyn MessageAdapter>, MessagingError> {
        self.strategy.check_parameters(queue_configuration)?;

        debug!(
            backend = %self.backend_name,
            queue_id = queue_configuration.id(),
            "Creating message adapter"
        );
        Ok(self.strategy.create_adapter(queue_configuration))
    }
}

impl<L, S> MessageAdapterConstructor for QueueMessageAdapterConstructor<L, S>
where
    L: ConfigurationsList + DeserializeOwned,
    S: AdapterStrategy<L::Queue>,
{
    fn backend_name(&self) -> &str {
        &self.backend_name
    }

    fn create(&self, queue_id: &str) -> Result<Box<dyn MessageAdapter>, MessagingError> {
        let queue_configuration = self.queue_configuration(queue_id).ok_or_else(|| {
            MessagingError::ConfigurationNotFound {
                queue_id: queue_id.to_string(),
            }
        })?;

        self.create_internal(queue_configuration)
    }

    fn create_all(&self) -> Result<Vec<Box<dyn MessageAdapter>>, MessagingError> {
        match &self.configuration {
            None => Ok(Vec::new()),
            Some(list) => list
                .queues()
                .iter()
                .map(|queue| self.create_internal(queue))
                .collect(),
        }
    }

    fn has_queue(&self, queue_id: &str) -> bool {
        self.queue_configuration(queue_id).is_some()
    }

    fn queue_ids(&self) -> Vec<String> {
        self.configuration
            .as_ref()
            .map(|list| list.queues().iter().map(|q| q.id().to_string()).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// MessagingComponentFactory
// ============================================================================

/// Builds adapters and senders across every registered backend
pub struct MessagingComponentFactory {
    constructors: Vec<Arc<dyn MessageAdapterConstructor>>,
    call_context_factory: Arc<dyn CallContextFactory>,
    application_name: String,
}

impl MessagingComponentFactory {
    /// Create factory with no backends registered
    pub fn new(
        call_context_factory: Arc<dyn CallContextFactory>,
        application_name: impl Into<String>,
    ) -> Self {
        Self {
            constructors: Vec::new(),
            call_context_factory,
            application_name: application_name.into(),
        }
    }

    /// Register a backend constructor. Earlier registrations win on duplicate ids.
    pub fn with_constructor(mut self, constructor: Arc<dyn MessageAdapterConstructor>) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Registered constructors, in registration order
    pub fn constructors(&self) -> &[Arc<dyn MessageAdapterConstructor>] {
        &self.constructors
    }

    /// Check whether any backend knows the queue
    pub fn has_queue(&self, queue_id: &str) -> bool {
        self.constructors.iter().any(|c| c.has_queue(queue_id))
    }

    /// Create adapter for a queue from whichever backend configures it
    pub fn create_message_adapter(
        &self,
        queue_id: &str,
    ) -> Result<Box<dyn MessageAdapter>, MessagingError> {
        let constructor = self
            .constructors
            .iter()
            .find(|c| c.has_queue(queue_id))
            .ok_or_else(|| MessagingError::ConfigurationNotFound {
                queue_id: queue_id.to_string(),
            })?;

        constructor.create(queue_id)
    }

    /// Create sender for a queue
    pub fn create_message_sender(&self, queue_id: &str) -> Result<MessageSender, MessagingError> {
        let adapter = self.create_message_adapter(queue_id)?;

        Ok(MessageSender::new(
            adapter,
            Arc::clone(&self.call_context_factory),
            self.application_name.clone(),
        ))
    }
}
