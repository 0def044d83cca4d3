//! Queue configuration traits shared by all backends.
//!
//! Each backend binds one named configuration section to a type implementing
//! [`ConfigurationsList`]. The list holds one entry per queue, keyed by the
//! queue id, and each entry carries at least a lifetime and a reply queue on
//! top of its backend-specific fields.

use chrono::Duration;

/// Settings of a single queue, as seen by the backend-independent code
pub trait QueueConfiguration: Send + Sync {
    /// Identifier the application uses to ask for this queue
    fn id(&self) -> &str;

    /// Default time-to-live for messages that do not carry their own
    fn lifetime(&self) -> Option<Duration>;

    /// Default reply queue for messages that do not name one
    fn reply_queue(&self) -> Option<&str>;
}

/// Ordered collection of queue configurations for one backend
pub trait ConfigurationsList: Send + Sync {
    type Queue: QueueConfiguration + Clone + 'static;

    /// All queues, in configuration order
    fn queues(&self) -> &[Self::Queue];

    /// Look up a queue by id
    fn queue_configuration(&self, queue_id: &str) -> Option<&Self::Queue> {
        self.queues().iter().find(|queue| queue.id() == queue_id)
    }
}

/// Serde support for optional durations in configuration files.
///
/// Accepts `humantime` text (`"1h"`, `"250ms"`) or a whole number of
/// milliseconds, either as an integer or as a string of digits.
pub mod duration_serde {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Millis(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration.and_then(|d| d.to_std().ok()) {
            Some(std) => serializer.serialize_str(&humantime::format_duration(std).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<RawDuration>::deserialize(deserializer)?;
        let std = match raw {
            None => return Ok(None),
            Some(RawDuration::Millis(ms)) => std::time::Duration::from_millis(ms),
            Some(RawDuration::Text(text)) => parse(&text).map_err(serde::de::Error::custom)?,
        };

        Duration::from_std(std)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }

    fn parse(text: &str) -> Result<std::time::Duration, String> {
        let text = text.trim();
        if let Ok(ms) = text.parse::<u64>() {
            return Ok(std::time::Duration::from_millis(ms));
        }

        humantime::parse_duration(text).map_err(|e| format!("invalid duration '{}': {}", text, e))
    }
}

#[cfg(test)]
#[path = "configuration_tests.rs"]
mod tests;
