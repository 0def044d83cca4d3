//! Integration tests for sending through the factory and receiving from the broker

mod common;

use bytes::Bytes;
use chrono::Duration;
use common::{TestEnvironment, APPLICATION_NAME, STANDARD_CONFIG};
use messaging_runtime::sender::headers;
use messaging_runtime::{CallContext, Message, MessageBody, MessagingError};

fn request_context() -> CallContext {
    CallContext {
        request_id: Some("req-42".to_string()),
        user_id: Some("jdoe".to_string()),
        user_domain: Some("corp".to_string()),
        request_caller_ip: Some("10.0.0.7".to_string()),
        account_id: None,
    }
}

async fn receive_one(env: &TestEnvironment, queue_id: &str) -> Option<Message> {
    let mut adapter = env
        .factory
        .create_message_adapter(queue_id)
        .expect("queue should be configured");
    let message = adapter
        .as_receiver()
        .expect("RabbitMQ adapters can receive")
        .receive(Duration::milliseconds(200))
        .await
        .expect("receive should succeed");
    adapter.dispose().await.expect("dispose should succeed");
    message
}

/// Verify that a text message arrives with its body, ids and enriched headers
#[tokio::test]
async fn test_text_round_trip_with_call_context() {
    let env = TestEnvironment::with_context(STANDARD_CONFIG, request_context());
    let mut sender = env.factory.create_message_sender("orders").unwrap();

    let sent = sender
        .send_message(
            Message::text("order #1")
                .with_message_id("ORD-1")
                .with_correlation_id("corr-1")
                .with_property("tenant", "acme"),
        )
        .await
        .unwrap();
    sender.dispose().await.unwrap();

    let received = receive_one(&env, "orders").await.expect("message should arrive");

    assert_eq!(received.body(), sent.body());
    assert_eq!(received.message_id, "ORD-1");
    assert_eq!(received.correlation_id.as_deref(), Some("corr-1"));
    assert_eq!(received.reply_queue.as_deref(), Some("orders-replies"));
    assert_eq!(received.life_time, Duration::hours(1));
    assert_eq!(received.properties, sent.properties);
    assert_eq!(
        received.properties.get(headers::APPLICATION_NAME).map(String::as_str),
        Some(APPLICATION_NAME)
    );
    assert_eq!(
        received.properties.get(headers::REQUEST_ID).map(String::as_str),
        Some("req-42")
    );
    assert!(!received.properties.contains_key(headers::ACCOUNT_ID));
    assert_eq!(env.call_context_factory.calls(), 1);
}

/// Verify that bytes bodies are delivered unchanged
#[tokio::test]
async fn test_bytes_round_trip() {
    let env = TestEnvironment::from_yaml(STANDARD_CONFIG);
    let mut sender = env.factory.create_message_sender("audit").unwrap();
    let payload = Bytes::from_static(&[0x00, 0xff, 0x10, 0x80]);

    sender
        .send_message(Message::bytes(payload.clone()))
        .await
        .unwrap();
    sender.dispose().await.unwrap();

    let received = receive_one(&env, "audit").await.unwrap();

    assert_eq!(received.body(), &MessageBody::Bytes(payload));
    assert_eq!(received.content_type(), None);
    assert!(!received.message_id.is_empty());
}

/// Verify that a transacted queue only exposes the message after the sender commits
#[tokio::test]
async fn test_transacted_queue_commits_on_send() {
    let env = TestEnvironment::from_yaml(STANDARD_CONFIG);
    let mut sender = env.factory.create_message_sender("payments").unwrap();

    let sent = sender.send_message(Message::text("pay")).await.unwrap();

    assert_eq!(env.broker.queue_depth("payments"), 1);
    assert_eq!(sent.life_time, Duration::seconds(90));
    sender.dispose().await.unwrap();

    let received = receive_one(&env, "payments").await.unwrap();
    assert_eq!(received.life_time, Duration::seconds(90));
}

/// Verify that routing through a topic exchange reaches the bound queue
#[tokio::test]
async fn test_exchange_routing() {
    let env = TestEnvironment::from_yaml(STANDARD_CONFIG);
    let mut sender = env.factory.create_message_sender("events").unwrap();

    sender.send_message(Message::text("created")).await.unwrap();
    sender.dispose().await.unwrap();

    assert_eq!(env.broker.queue_depth("order-events"), 1);
    let received = receive_one(&env, "events").await.unwrap();
    assert_eq!(
        received.body(),
        &MessageBody::Text {
            body: "created".to_string(),
            content_type: None
        }
    );
}

/// Verify that a broker outage is reported as a transient failure
#[tokio::test]
async fn test_broker_outage_is_transient() {
    let env = TestEnvironment::from_yaml(STANDARD_CONFIG);
    env.broker.set_available(false);
    let mut sender = env.factory.create_message_sender("orders").unwrap();

    let error = sender
        .send_message(Message::text("lost"))
        .await
        .unwrap_err();

    assert!(matches!(error, MessagingError::ConnectionFailed { .. }));
    assert!(error.is_transient());
    sender.dispose().await.unwrap();

    env.broker.set_available(true);
    assert!(receive_one(&env, "orders").await.is_none());
}

/// Verify that a disposed sender refuses to send
#[tokio::test]
async fn test_disposed_sender_refuses_messages() {
    let env = TestEnvironment::from_yaml(STANDARD_CONFIG);
    let mut sender = env.factory.create_message_sender("orders").unwrap();

    sender.dispose().await.unwrap();
    sender.dispose().await.unwrap();

    assert!(sender.is_disposed());
    assert!(matches!(
        sender.send_message(Message::text("late")).await,
        Err(MessagingError::AdapterDisposed { .. })
    ));
    assert_eq!(env.broker.queue_depth("orders"), 0);
}
