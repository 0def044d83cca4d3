//! Tests for adapter construction and the component factory.

use super::*;
use crate::adapter::TransactedMessageAdapter;
use crate::message::Message;
use crate::sender::{headers, EmptyCallContextFactory};
use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Test Backend
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct StubQueue {
    id: String,
    #[serde(default)]
    valid: Option<bool>,
}

impl QueueConfiguration for StubQueue {
    fn id(&self) -> &str {
        &self.id
    }

    fn lifetime(&self) -> Option<Duration> {
        None
    }

    fn reply_queue(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StubList {
    #[serde(default)]
    queues: Vec<StubQueue>,
}

impl ConfigurationsList for StubList {
    type Queue = StubQueue;

    fn queues(&self) -> &[StubQueue] {
        &self.queues
    }
}

struct StubAdapter {
    configuration: StubQueue,
    sent: Arc<Mutex<Vec<Message>>>,
}

#[async_trait]
impl MessageAdapter for StubAdapter {
    fn configuration(&self) -> &dyn QueueConfiguration {
        &self.configuration
    }

    async fn send(&mut self, message: &Message) -> Result<(), MessagingError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn dispose(&mut self) -> Result<(), MessagingError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn as_transacted(&mut self) -> Option<&mut dyn TransactedMessageAdapter> {
        None
    }
}

#[derive(Default)]
struct StubStrategy {
    checks: Arc<AtomicUsize>,
    builds: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<Message>>>,
}

impl AdapterStrategy<StubQueue> for StubStrategy {
    fn check_parameters(&self, configuration: &StubQueue) -> Result<(), ConfigurationError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if configuration.valid == Some(false) {
            return Err(ConfigurationError::Invalid {
                queue_id: configuration.id.clone(),
                message: "marked invalid".to_string(),
            });
        }
        Ok(())
    }

    fn create_adapter(&self, configuration: &StubQueue) -> Box<dyn MessageAdapter> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Box::new(StubAdapter {
            configuration: configuration.clone(),
            sent: Arc::clone(&self.sent),
        })
    }
}

type StubConstructor = QueueMessageAdapterConstructor<StubList, StubStrategy>;

fn stub_queue(id: &str) -> StubQueue {
    StubQueue {
        id: id.to_string(),
        valid: None,
    }
}

fn stub_constructor(ids: &[&str]) -> StubConstructor {
    let list = StubList {
        queues: ids.iter().map(|id| stub_queue(id)).collect(),
    };
    StubConstructor::from_configurations("stub", Some(list), StubStrategy::default())
}

fn load(yaml: &str) -> config::Config {
    config::Config::builder()
        .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
        .build()
        .expect("configuration should build")
}

// ============================================================================
// QueueMessageAdapterConstructor
// ============================================================================

mod constructor {
    use super::*;

    #[test]
    fn test_create_validates_then_builds() {
        let strategy = StubStrategy::default();
        let checks = Arc::clone(&strategy.checks);
        let builds = Arc::clone(&strategy.builds);
        let list = StubList {
            queues: vec![stub_queue("a")],
        };
        let constructor = StubConstructor::from_configurations("stub", Some(list), strategy);

        let adapter = constructor.create("a").unwrap();

        assert_eq!(adapter.configuration().id(), "a");
        assert_eq!(checks.load(Ordering::SeqCst), 1);
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_create_unknown_id_fails_without_validation() {
        let strategy = StubStrategy::default();
        let checks = Arc::clone(&strategy.checks);
        let constructor = StubConstructor::from_configurations(
            "stub",
            Some(StubList {
                queues: vec![stub_queue("a")],
            }),
            strategy,
        );

        let result = constructor.create("z");

        assert!(matches!(
            result,
            Err(MessagingError::ConfigurationNotFound { ref queue_id }) if queue_id == "z"
        ));
        assert_eq!(checks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_validation_failure_skips_build() {
        let strategy = StubStrategy::default();
        let checks = Arc::clone(&strategy.checks);
        let builds = Arc::clone(&strategy.builds);
        let mut broken = stub_queue("broken");
        broken.valid = Some(false);
        let constructor = StubConstructor::from_configurations(
            "stub",
            Some(StubList {
                queues: vec![broken],
            }),
            strategy,
        );

        assert!(constructor.has_queue("broken"));
        assert_eq!(checks.load(Ordering::SeqCst), 0);

        assert!(matches!(
            constructor.create("broken"),
            Err(MessagingError::Configuration(ConfigurationError::Invalid { .. }))
        ));
        assert_eq!(checks.load(Ordering::SeqCst), 1);
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_has_queue_builds_nothing() {
        let strategy = StubStrategy::default();
        let checks = Arc::clone(&strategy.checks);
        let builds = Arc::clone(&strategy.builds);
        let constructor = StubConstructor::from_configurations(
            "stub",
            Some(StubList {
                queues: vec![stub_queue("a")],
            }),
            strategy,
        );

        assert!(constructor.has_queue("a"));
        assert!(!constructor.has_queue("b"));
        assert_eq!(checks.load(Ordering::SeqCst), 0);
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicate_ids_resolve_to_first() {
        let constructor = stub_constructor(&["dup", "other", "dup"]);

        assert_eq!(constructor.queue_ids(), vec!["dup", "other", "dup"]);
        assert_eq!(constructor.create("dup").unwrap().configuration().id(), "dup");
    }

    #[test]
    fn test_create_all_preserves_order() {
        let constructor = stub_constructor(&["c", "a", "b"]);

        let adapters = constructor.create_all().unwrap();

        let ids: Vec<&str> = adapters.iter().map(|a| a.configuration().id()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_create_all_without_configuration_is_empty() {
        let constructor =
            StubConstructor::from_configurations("stub", None, StubStrategy::default());

        assert!(constructor.create_all().unwrap().is_empty());
        assert!(constructor.queue_ids().is_empty());
    }

    #[test]
    fn test_new_binds_named_section() {
        let config = load(
            r#"
stub:
  queues:
    - id: first
    - id: second
"#,
        );

        let constructor = StubConstructor::new(&config, "stub", StubStrategy::default());

        assert_eq!(constructor.backend_name(), "stub");
        assert_eq!(constructor.configuration().map(|l| l.queues.len()), Some(2));
        assert!(constructor.has_queue("second"));
    }

    #[test]
    fn test_new_with_missing_section_has_no_configuration() {
        let config = load("unrelated: true\n");

        let constructor = StubConstructor::new(&config, "stub", StubStrategy::default());

        assert!(constructor.configuration().is_none());
        assert!(!constructor.has_queue("first"));
    }
}

// ============================================================================
// MessagingComponentFactory
// ============================================================================

mod component_factory {
    use super::*;

    fn factory(constructors: Vec<Arc<dyn MessageAdapterConstructor>>) -> MessagingComponentFactory {
        constructors.into_iter().fold(
            MessagingComponentFactory::new(Arc::new(EmptyCallContextFactory), "factory-tests"),
            |factory, constructor| factory.with_constructor(constructor),
        )
    }

    #[test]
    fn test_has_queue_across_backends() {
        let factory = factory(vec![
            Arc::new(stub_constructor(&["a"])),
            Arc::new(stub_constructor(&["b"])),
        ]);

        assert_eq!(factory.constructors().len(), 2);
        assert!(factory.has_queue("a"));
        assert!(factory.has_queue("b"));
        assert!(!factory.has_queue("c"));
    }

    #[test]
    fn test_create_adapter_uses_owning_backend() {
        let first = StubStrategy::default();
        let first_builds = Arc::clone(&first.builds);
        let second = StubStrategy::default();
        let second_builds = Arc::clone(&second.builds);
        let factory = factory(vec![
            Arc::new(StubConstructor::from_configurations(
                "first",
                Some(StubList {
                    queues: vec![stub_queue("a")],
                }),
                first,
            )),
            Arc::new(StubConstructor::from_configurations(
                "second",
                Some(StubList {
                    queues: vec![stub_queue("b")],
                }),
                second,
            )),
        ]);

        let adapter = factory.create_message_adapter("b").unwrap();

        assert_eq!(adapter.configuration().id(), "b");
        assert_eq!(first_builds.load(Ordering::SeqCst), 0);
        assert_eq!(second_builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_queue_is_not_found() {
        let factory = factory(vec![Arc::new(stub_constructor(&["a"]))]);

        assert!(matches!(
            factory.create_message_adapter("missing"),
            Err(MessagingError::ConfigurationNotFound { .. })
        ));
        assert!(matches!(
            factory.create_message_sender("missing"),
            Err(MessagingError::ConfigurationNotFound { .. })
        ));
    }

    #[test]
    fn test_factory_without_backends_knows_nothing() {
        let factory = factory(Vec::new());

        assert!(!factory.has_queue("a"));
        assert!(factory.create_message_adapter("a").is_err());
    }

    #[tokio::test]
    async fn test_sender_carries_application_name() {
        let strategy = StubStrategy::default();
        let sent = Arc::clone(&strategy.sent);
        let factory = factory(vec![Arc::new(StubConstructor::from_configurations(
            "stub",
            Some(StubList {
                queues: vec![stub_queue("a")],
            }),
            strategy,
        ))]);

        let mut sender = factory.create_message_sender("a").unwrap();
        assert_eq!(sender.queue_id(), "a");
        sender.send_message(Message::text("hi")).await.unwrap();
        sender.dispose().await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].properties.get(headers::APPLICATION_NAME),
            Some(&"factory-tests".to_string())
        );
    }
}
