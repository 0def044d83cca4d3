//! Conversion between [`Message`] and [`WireProperties`].

use super::client::{HeaderValue, WireProperties};
use crate::configuration::QueueConfiguration;
use crate::error::MessagingError;
use crate::message::{Message, MessageBody};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};

/// Expiration used when neither the message nor the queue sets a lifetime (one hour)
pub const DEFAULT_LIFETIME: &str = "3600000";

/// AMQP delivery mode marking a message persistent
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

pub const TEXT_CONTENT_TYPE: &str = "Text";
pub const BYTES_CONTENT_TYPE: &str = "Bytes";

/// File-time ticks between 1601-01-01 and the Unix epoch
const FILE_TIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;
const FILE_TIME_TICKS_PER_SECOND: i64 = 10_000_000;

/// Build the wire properties a message is published with
pub fn to_wire_properties(
    message: &Message,
    configuration: &dyn QueueConfiguration,
) -> Result<WireProperties, MessagingError> {
    let content_type = content_type(message)?;

    let message_id = if message.message_id.is_empty() {
        uuid::Uuid::new_v4().to_string().to_uppercase()
    } else {
        message.message_id.clone()
    };

    let headers = message
        .properties
        .iter()
        .map(|(key, value)| (key.clone(), HeaderValue::String(value.clone())))
        .collect();

    Ok(WireProperties {
        message_id,
        headers,
        delivery_mode: PERSISTENT_DELIVERY_MODE,
        expiration: expiration(message, configuration),
        timestamp: to_file_time(Utc::now()),
        content_type,
        reply_to: if message.reply_queue_is_blank() {
            None
        } else {
            message.reply_queue.clone()
        },
        correlation_id: message
            .correlation_id
            .clone()
            .filter(|id| !id.is_empty()),
    })
}

/// Rebuild a message from a delivered body and its properties
pub fn to_message(body: Bytes, properties: &WireProperties) -> Result<Message, MessagingError> {
    let life_time = parse_expiration(&properties.expiration)?;
    let send_date_time = from_file_time(properties.timestamp)?;

    let mut message = match properties.content_type.as_str() {
        BYTES_CONTENT_TYPE => Message::bytes(body),
        TEXT_CONTENT_TYPE => Message::text(String::from_utf8_lossy(&body).into_owned()),
        custom => Message::new(MessageBody::Text {
            body: String::from_utf8_lossy(&body).into_owned(),
            content_type: Some(custom.to_string()).filter(|c| !c.is_empty()),
        }),
    };

    message.message_id = properties.message_id.clone();
    message.correlation_id = properties.correlation_id.clone();
    message.reply_queue = properties.reply_to.clone();
    message.life_time = life_time;
    message.send_date_time = Some(send_date_time);
    message.receive_date = Some(Utc::now());
    message.properties = properties
        .headers
        .iter()
        .map(|(key, value)| (key.clone(), header_text(value)))
        .collect();

    Ok(message)
}

/// Encode a UTC time as Windows file time
pub fn to_file_time(time: DateTime<Utc>) -> i64 {
    time.timestamp() * FILE_TIME_TICKS_PER_SECOND
        + i64::from(time.timestamp_subsec_nanos() / 100)
        + FILE_TIME_UNIX_EPOCH
}

/// Decode Windows file time into a UTC time
pub fn from_file_time(ticks: i64) -> Result<DateTime<Utc>, MessagingError> {
    let invalid = || MessagingError::InvalidTimestamp { value: ticks };

    let unix_ticks = ticks.checked_sub(FILE_TIME_UNIX_EPOCH).ok_or_else(invalid)?;
    let seconds = unix_ticks.div_euclid(FILE_TIME_TICKS_PER_SECOND);
    let nanos = (unix_ticks.rem_euclid(FILE_TIME_TICKS_PER_SECOND) * 100) as u32;

    DateTime::from_timestamp(seconds, nanos).ok_or_else(invalid)
}

fn content_type(message: &Message) -> Result<String, MessagingError> {
    match message.body() {
        MessageBody::Text { content_type, .. } => Ok(content_type
            .clone()
            .unwrap_or_else(|| TEXT_CONTENT_TYPE.to_string())),
        MessageBody::Bytes(_) => Ok(BYTES_CONTENT_TYPE.to_string()),
        MessageBody::Opaque { kind, .. } => {
            Err(MessagingError::UnsupportedMessageType { kind: kind.clone() })
        }
    }
}

fn expiration(message: &Message, configuration: &dyn QueueConfiguration) -> String {
    if message.life_time > Duration::zero() {
        return ceil_millis(message.life_time).to_string();
    }

    match configuration.lifetime() {
        Some(lifetime) if lifetime > Duration::zero() => ceil_millis(lifetime).to_string(),
        Some(lifetime) => lifetime.num_milliseconds().to_string(),
        None => DEFAULT_LIFETIME.to_string(),
    }
}

// Expiration is whole milliseconds, so a positive lifetime rounds up to at least 1.
fn ceil_millis(lifetime: Duration) -> i64 {
    match lifetime.num_microseconds() {
        Some(micros) => (micros / 1000 + i64::from(micros % 1000 != 0)).max(1),
        None => lifetime.num_milliseconds().max(1),
    }
}

fn parse_expiration(expiration: &str) -> Result<Duration, MessagingError> {
    expiration
        .trim()
        .parse::<i64>()
        .map(|ms| Duration::milliseconds(ms.max(-i64::MAX)))
        .map_err(|source| MessagingError::InvalidExpiration {
            value: expiration.to_string(),
            source,
        })
}

// Only string and byte-array headers carry text; other AMQP field types read as "".
fn header_text(value: &HeaderValue) -> String {
    match value {
        HeaderValue::String(text) => text.clone(),
        HeaderValue::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        HeaderValue::Long(_) | HeaderValue::Bool(_) => String::new(),
    }
}

#[cfg(test)]
#[path = "converter_tests.rs"]
mod tests;
