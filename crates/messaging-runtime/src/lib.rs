//! # Messaging Runtime
//!
//! Broker-independent messaging contract. Application code works with one
//! [`Message`] type; backend adapters translate it to and from the wire format
//! of a concrete transport.
//!
//! This library provides:
//! - A closed message model (text, bytes, backend-specific opaque bodies)
//! - Configuration-driven adapter construction keyed by queue id
//! - A capability-based adapter contract (send, receive, transactional commit)
//! - A sender that enriches messages with call context and commits when the
//!   adapter is transactional
//! - A RabbitMQ-style backend and an in-memory AMQP broker for tests and
//!   development
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all messaging operations
//! - [`message`] - Message structures
//! - [`configuration`] - Queue configuration traits and duration parsing
//! - [`adapter`] - Adapter capability traits
//! - [`factory`] - Adapter construction from bound configuration
//! - [`sender`] - Call-context enrichment and transactional send
//! - [`settings`] - Loading the raw configuration tree
//! - [`providers`] - Backend implementations

pub mod adapter;
pub mod configuration;
pub mod error;
pub mod factory;
pub mod message;
pub mod providers;
pub mod sender;
pub mod settings;

// Re-export commonly used types at crate root for convenience
pub use adapter::{MessageAdapter, ReceivingMessageAdapter, TransactedMessageAdapter};
pub use configuration::{ConfigurationsList, QueueConfiguration};
pub use error::{ConfigurationError, MessagingError};
pub use factory::{
    AdapterStrategy, MessageAdapterConstructor, MessagingComponentFactory,
    QueueMessageAdapterConstructor,
};
pub use message::{Message, MessageBody};
pub use sender::{
    prepare_message, CallContext, CallContextFactory, EmptyCallContextFactory, MessageSender,
};
