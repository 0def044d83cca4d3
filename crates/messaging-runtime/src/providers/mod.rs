//! Backend implementations.
//!
//! [`rabbitmq`] adapts the runtime to an AMQP-style broker reached through the
//! [`rabbitmq::AmqpClientFactory`] seam. [`memory`] implements that seam with
//! an in-process broker for tests and development.

pub mod memory;
pub mod rabbitmq;

pub use memory::InMemoryBroker;
pub use rabbitmq::{RabbitMqAdapterConstructor, RabbitMqMessageAdapter};
