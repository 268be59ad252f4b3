//! Topic canonicalization for the telemetry and event channels

use crate::config::MqttSection;
use thiserror::Error;

/// Canonical form: segments separated by single slashes, no leading or
/// trailing slash (`"/sensors//scd40/"` -> `"sensors/scd40"`).
pub fn canonicalize_topic(topic: &str) -> String {
    topic
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Validate a publish topic after canonicalization
pub fn validate_topic(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }

    for ch in topic.chars() {
        if ch == '+' || ch == '#' {
            return Err(TopicError::Wildcard(ch));
        }
        if ch.is_control() {
            return Err(TopicError::ControlChar);
        }
    }

    Ok(())
}

/// Topic validation errors
#[derive(Debug, Error, PartialEq)]
pub enum TopicError {
    #[error("Topic cannot be empty")]
    Empty,
    #[error("Publish topic contains wildcard: '{0}'")]
    Wildcard(char),
    #[error("Topic contains a control character")]
    ControlChar,
}

/// The two fixed publish targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    /// Periodic measurements
    pub telemetry: String,
    /// Out-of-band status events
    pub events: String,
}

impl TopicSet {
    pub fn new(telemetry: &str, events: &str) -> Result<Self, TopicError> {
        let telemetry = canonicalize_topic(telemetry);
        let events = canonicalize_topic(events);
        validate_topic(&telemetry)?;
        validate_topic(&events)?;
        Ok(Self { telemetry, events })
    }

    pub fn from_config(config: &MqttSection) -> Result<Self, TopicError> {
        Self::new(&config.telemetry_topic, &config.events_topic)
    }
}

impl Default for TopicSet {
    fn default() -> Self {
        Self {
            telemetry: "sensors/scd40".to_string(),
            events: "sensors/scd40/events".to_string(),
        }
    }
}
