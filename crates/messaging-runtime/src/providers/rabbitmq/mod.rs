//! RabbitMQ backend.
//!
//! - [`configuration`] - the `rabbitmq` configuration section
//! - [`converter`] - message to wire-property mapping and back
//! - [`client`] - the AMQP client seam and wire types
//! - [`adapter`] - the adapter with send, receive and transactional commit
//! - [`constructor`] - validation and build hooks for adapter construction

pub mod adapter;
pub mod client;
pub mod configuration;
pub mod constructor;
pub mod converter;

pub use adapter::RabbitMqMessageAdapter;
pub use client::{AmqpChannel, AmqpClientFactory, Delivery, HeaderValue, WireProperties};
pub use configuration::{RabbitMqConfiguration, RabbitMqQueueConfiguration};
pub use constructor::{constructor, RabbitMqAdapterConstructor, RabbitMqAdapterStrategy, SECTION_NAME};
