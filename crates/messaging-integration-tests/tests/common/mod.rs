//! Common test utilities for messaging-runtime integration tests
//!
//! This module provides:
//! - Configuration files written to temporary paths
//! - A call-context factory returning a fixed context
//! - A wired environment: configuration, in-memory broker and component factory

use messaging_runtime::providers::rabbitmq::{self, RabbitMqAdapterConstructor};
use messaging_runtime::providers::InMemoryBroker;
use messaging_runtime::{CallContext, CallContextFactory, MessagingComponentFactory};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const APPLICATION_NAME: &str = "integration-tests";

// ============================================================================
// Configuration Files
// ============================================================================

/// Write `contents` to a temporary file whose extension selects the format
pub fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp file should be created");
    file.write_all(contents.as_bytes())
        .expect("config should be written");
    file
}

/// Two plain queues, one transacted queue and one topic-routed queue
#[allow(dead_code)]
pub const STANDARD_CONFIG: &str = r#"
rabbitmq:
  queues:
    - id: orders
      server: localhost
      queue_name: orders
      lifetime: 1h
      reply_queue: orders-replies
    - id: payments
      server: localhost
      queue_name: payments
      transacted: true
      lifetime: 90s
    - id: events
      server: localhost
      queue_name: order-events
      exchange_name: events
      exchange_type: topic
      routings:
        - orders.created
    - id: audit
      server: localhost
      queue_name: audit
"#;

// ============================================================================
// Call Context
// ============================================================================

/// Call-context factory returning one fixed context
#[derive(Clone, Default)]
pub struct FixedCallContextFactory {
    context: CallContext,
    calls: Arc<AtomicUsize>,
}

impl FixedCallContextFactory {
    #[allow(dead_code)]
    pub fn new(context: CallContext) -> Self {
        Self {
            context,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CallContextFactory for FixedCallContextFactory {
    fn create(&self) -> CallContext {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.context.clone()
    }
}

// ============================================================================
// Test Environment
// ============================================================================

/// Configuration bound to an in-memory broker
#[allow(dead_code)]
pub struct TestEnvironment {
    pub broker: InMemoryBroker,
    pub rabbitmq: Arc<RabbitMqAdapterConstructor>,
    pub factory: MessagingComponentFactory,
    pub call_context_factory: FixedCallContextFactory,
    _config_file: tempfile::NamedTempFile,
}

impl TestEnvironment {
    /// Environment over a YAML configuration with an empty call context
    #[allow(dead_code)]
    pub fn from_yaml(yaml: &str) -> Self {
        Self::with_context(yaml, CallContext::default())
    }

    /// Environment over a YAML configuration with a fixed call context
    pub fn with_context(yaml: &str, context: CallContext) -> Self {
        let config_file = write_config(".yaml", yaml);
        let config = messaging_runtime::settings::load(Some(config_file.path()))
            .expect("configuration should load");

        let broker = InMemoryBroker::new();
        let rabbitmq = Arc::new(rabbitmq::constructor(&config, Arc::new(broker.clone())));
        let call_context_factory = FixedCallContextFactory::new(context);
        let factory = MessagingComponentFactory::new(
            Arc::new(call_context_factory.clone()),
            APPLICATION_NAME,
        )
        .with_constructor(rabbitmq.clone());

        Self {
            broker,
            rabbitmq,
            factory,
            call_context_factory,
            _config_file: config_file,
        }
    }
}
