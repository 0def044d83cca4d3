//! Sending messages through an adapter.
//!
//! [`MessageSender`] owns one adapter. Each send fills queue defaults into the
//! message, stamps call-context headers onto it, hands it to the adapter and,
//! when the adapter is transactional, commits it. A failed send is never
//! committed.

use crate::adapter::MessageAdapter;
use crate::configuration::QueueConfiguration;
use crate::error::MessagingError;
use crate::message::Message;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;

/// Header keys written by [`MessageSender`]
pub mod headers {
    pub const APPLICATION_NAME: &str = "ApplicationName";
    pub const REQUEST_ID: &str = "RequestId";
    pub const USER_ID: &str = "UserId";
    pub const USER_DOMAIN: &str = "UserDomain";
    pub const REQUEST_CALLER_IP: &str = "RequestCallerIp";
    pub const ACCOUNT_ID: &str = "AccountId";
}

// ============================================================================
// Call Context
// ============================================================================

/// Ambient metadata of the operation that produced a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub request_id: Option<String>,
    pub user_id: Option<String>,
    pub user_domain: Option<String>,
    pub request_caller_ip: Option<String>,
    pub account_id: Option<String>,
}

impl CallContext {
    /// Header entries for the populated fields
    fn header_entries(&self) -> Vec<(&'static str, &str)> {
        [
            (headers::REQUEST_ID, &self.request_id),
            (headers::USER_ID, &self.user_id),
            (headers::USER_DOMAIN, &self.user_domain),
            (headers::REQUEST_CALLER_IP, &self.request_caller_ip),
            (headers::ACCOUNT_ID, &self.account_id),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
        .collect()
    }
}

/// Supplies the call context of the current operation
#[cfg_attr(test, mockall::automock)]
pub trait CallContextFactory: Send + Sync {
    fn create(&self) -> CallContext;
}

/// Call-context factory for processes without per-request context
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCallContextFactory;

impl CallContextFactory for EmptyCallContextFactory {
    fn create(&self) -> CallContext {
        CallContext::default()
    }
}

// ============================================================================
// Message Preparation
// ============================================================================

/// Fill queue defaults into `message` and stamp the sender headers on it.
///
/// Lifetime and reply queue come from `configuration` only when the message
/// has none. Headers the caller already set are never overwritten.
pub fn prepare_message(
    mut message: Message,
    configuration: &dyn QueueConfiguration,
    application_name: &str,
    context: &CallContext,
) -> Message {
    if !message.has_life_time() {
        if let Some(lifetime) = configuration.lifetime() {
            message.life_time = lifetime;
        }
    }
    if message.reply_queue_is_blank() {
        if let Some(reply_queue) = configuration.reply_queue() {
            message.reply_queue = Some(reply_queue.to_string());
        }
    }

    message
        .properties
        .entry(headers::APPLICATION_NAME.to_string())
        .or_insert_with(|| application_name.to_string());
    for (key, value) in context.header_entries() {
        message
            .properties
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    message
}

// ============================================================================
// MessageSender
// ============================================================================

/// Sends messages through a single adapter
pub struct MessageSender {
    adapter: Option<Box<dyn MessageAdapter>>,
    queue_id: String,
    call_context_factory: Arc<dyn CallContextFactory>,
    application_name: String,
}

impl MessageSender {
    /// Create sender that owns `adapter`
    pub fn new(
        adapter: Box<dyn MessageAdapter>,
        call_context_factory: Arc<dyn CallContextFactory>,
        application_name: impl Into<String>,
    ) -> Self {
        let queue_id = adapter.configuration().id().to_string();
        Self {
            adapter: Some(adapter),
            queue_id,
            call_context_factory,
            application_name: application_name.into(),
        }
    }

    /// Id of the queue this sender writes to
    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    /// Whether [`MessageSender::dispose`] has been called
    pub fn is_disposed(&self) -> bool {
        self.adapter.is_none()
    }

    /// Send a message and commit it if the adapter is transactional.
    ///
    /// Returns the message as it was handed to the adapter.
    pub async fn send_message(&mut self, message: Message) -> Result<Message, MessagingError> {
        let adapter = self
            .adapter
            .as_mut()
            .ok_or_else(|| MessagingError::AdapterDisposed {
                queue_id: self.queue_id.clone(),
            })?;

        let context = self.call_context_factory.create();
        let message = prepare_message(
            message,
            adapter.configuration(),
            &self.application_name,
            &context,
        );

        adapter.send(&message).await?;
        debug!(
            queue_id = %self.queue_id,
            message_id = %message.message_id,
            "Message sent"
        );

        if let Some(transacted) = adapter.as_transacted() {
            transacted.commit_if_transacted(&message).await?;
            debug!(queue_id = %self.queue_id, "Send committed");
        }

        Ok(message)
    }

    /// Dispose the adapter. Later calls do nothing.
    pub async fn dispose(&mut self) -> Result<(), MessagingError> {
        let Some(mut adapter) = self.adapter.take() else {
            return Ok(());
        };

        info!(queue_id = %self.queue_id, "Disposing message sender");
        adapter.dispose().await
    }
}

impl Drop for MessageSender {
    fn drop(&mut self) {
        if self.adapter.is_some() {
            warn!(
                queue_id = %self.queue_id,
                "Message sender dropped without dispose; releasing adapter"
            );
        }
    }
}
