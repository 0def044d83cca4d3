//! Adapter capability traits.
//!
//! Every backend adapter implements [`MessageAdapter`]. Adapters that can
//! commit a transaction or pull messages additionally implement
//! [`TransactedMessageAdapter`] or [`ReceivingMessageAdapter`] and advertise
//! it through [`MessageAdapter::as_transacted`] / [`MessageAdapter::as_receiver`],
//! so callers holding a `Box<dyn MessageAdapter>` can ask for a capability
//! without knowing the backend.
//!
//! I/O operations take `&mut self`: an adapter serves one logical producer or
//! consumer at a time.

use crate::configuration::QueueConfiguration;
use crate::error::MessagingError;
use crate::message::Message;
use async_trait::async_trait;
use chrono::Duration;

/// Mandatory capability of every adapter: sending and releasing resources
#[async_trait]
pub trait MessageAdapter: Send + Sync {
    /// Configuration of the queue this adapter was built for
    fn configuration(&self) -> &dyn QueueConfiguration;

    /// Send a message. Transport failures are returned unchanged.
    async fn send(&mut self, message: &Message) -> Result<(), MessagingError>;

    /// Release backend resources. Calling it again is a no-op.
    async fn dispose(&mut self) -> Result<(), MessagingError>;

    /// Whether the adapter currently holds an open backend connection
    fn is_connected(&self) -> bool;

    /// Transactional capability, if the backend supports it
    fn as_transacted(&mut self) -> Option<&mut dyn TransactedMessageAdapter> {
        None
    }

    /// Receiving capability, if the backend supports it
    fn as_receiver(&mut self) -> Option<&mut dyn ReceivingMessageAdapter> {
        None
    }
}

/// Adapters whose sends can be part of a backend transaction
#[async_trait]
pub trait TransactedMessageAdapter: Send + Sync {
    /// Commit the pending transaction for `message` if the queue is transacted
    async fn commit_if_transacted(&mut self, message: &Message) -> Result<(), MessagingError>;
}

/// Adapters that can pull messages from their queue
#[async_trait]
pub trait ReceivingMessageAdapter: Send + Sync {
    /// Wait up to `timeout` for the next message
    async fn receive(&mut self, timeout: Duration) -> Result<Option<Message>, MessagingError>;
}
